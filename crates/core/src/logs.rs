use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::models::TargetIdentity;

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct TaskLogs {
    pub stdout: String,
    pub stderr: String,
}

/// Reads task output captured under `<cache>/states/<project>/<task>/`.
#[derive(Debug, Clone)]
pub struct LogReader {
    cache_dir: PathBuf,
}

impl LogReader {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self { Self { cache_dir: cache_dir.into() } }

    pub fn task_dir(&self, identity: &TargetIdentity) -> PathBuf {
        self.cache_dir
            .join("states")
            .join(identity.project_component())
            .join(identity.task_component())
    }

    pub async fn read_logs(&self, identity: &TargetIdentity) -> Result<TaskLogs> {
        let dir = self.task_dir(identity);
        Ok(TaskLogs {
            stdout: read_optional(&dir.join("stdout.log")).await?,
            stderr: read_optional(&dir.join("stderr.log")).await?,
        })
    }
}

async fn read_optional(path: &Path) -> Result<String> {
    match tokio::fs::read(path).await {
        Ok(data) => Ok(String::from_utf8_lossy(&data).into_owned()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!("No log file at {}", path.display());
            Ok(String::new())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_dir_is_sanitized() {
        let reader = LogReader::new("/repo/.moon/cache");
        let identity = TargetIdentity::parse("../secret:build/.");
        assert_eq!(
            reader.task_dir(&identity),
            PathBuf::from("/repo/.moon/cache/states/secret/build")
        );
    }

    #[tokio::test]
    async fn test_read_logs() {
        let dir = tempfile::tempdir().unwrap();
        let reader = LogReader::new(dir.path());
        let identity = TargetIdentity::parse("web:test");
        let task_dir = reader.task_dir(&identity);
        std::fs::create_dir_all(&task_dir).unwrap();
        std::fs::write(task_dir.join("stdout.log"), "ok\n").unwrap();

        let logs = reader.read_logs(&identity).await.unwrap();
        assert_eq!(logs, TaskLogs { stdout: "ok\n".to_string(), stderr: String::new() });

        let missing = reader.read_logs(&TargetIdentity::parse("other:task")).await.unwrap();
        assert_eq!(missing, TaskLogs::default());
    }
}
