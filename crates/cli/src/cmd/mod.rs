pub mod publish;
pub mod render;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use run_report_core::{
    config::{CommentMode, Config},
    logs::LogReader,
    models::{FailedTaskInfo, RunReport, collect_failures},
};
use typed_path::Utf8NativePathBuf;

/// Command line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub config: Option<Utf8NativePathBuf>,
    pub report: Option<Utf8NativePathBuf>,
    pub workspace_root: Option<Utf8NativePathBuf>,
    pub mode: Option<CommentMode>,
    pub identifier: Option<String>,
    pub max_log_lines: Option<usize>,
}

pub fn load_config(overrides: Overrides) -> Result<Config> {
    let mut config = match &overrides.config {
        Some(path) => Config::load(Path::new(path.as_str()))?,
        None => Config::default(),
    };
    if let Some(report) = overrides.report {
        config.report.path = report.to_string();
    }
    if let Some(root) = overrides.workspace_root {
        config.report.workspace_root = root.to_string();
    }
    if let Some(mode) = overrides.mode {
        config.comment.mode = mode;
    }
    if let Some(identifier) = overrides.identifier {
        config.comment.identifier = identifier;
    }
    if let Some(max_log_lines) = overrides.max_log_lines {
        config.comment.max_log_lines = max_log_lines;
    }
    Ok(config)
}

/// Paths in the config are relative to the workspace root.
pub fn workspace_path(config: &Config, path: &str) -> PathBuf {
    Path::new(&config.report.workspace_root).join(path)
}

/// Load the report and collect its failures. `None` when no report exists.
pub async fn load_failures(config: &Config) -> Result<Option<Vec<FailedTaskInfo>>> {
    let report_path = workspace_path(config, &config.report.path);
    let Some(report) = RunReport::load(&report_path).await? else {
        tracing::warn!("No run report found at {}", report_path.display());
        return Ok(None);
    };
    let logs = LogReader::new(workspace_path(config, &config.report.cache_dir));
    let failures = collect_failures(&report, &logs)
        .await
        .with_context(|| format!("Failed to collect failures from {}", report_path.display()))?;
    Ok(Some(failures))
}
