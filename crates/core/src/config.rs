use std::{fmt, fs::File, io::BufReader, path::Path, str::FromStr};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_IDENTIFIER: &str = "run-report";
pub const DEFAULT_MAX_LOG_LINES: usize = 200;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub report: ReportConfig,
    pub comment: CommentConfig,
    pub github: GitHubConfig,
}

impl Config {
    /// Load a YAML config file. Every field is optional.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open config file {}", path.display()))?;
        serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    pub path: String,
    pub workspace_root: String,
    pub cache_dir: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            path: ".moon/cache/runReport.json".to_string(),
            workspace_root: ".".to_string(),
            cache_dir: ".moon/cache".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CommentConfig {
    pub enabled: bool,
    pub mode: CommentMode,
    pub identifier: String,
    pub max_log_lines: usize,
}

impl Default for CommentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: CommentMode::Aggregate,
            identifier: DEFAULT_IDENTIFIER.to_string(),
            max_log_lines: DEFAULT_MAX_LOG_LINES,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub token: Option<String>,
    pub api_url: Option<String>,
}

/// How failures are laid out across comments.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommentMode {
    /// A single document with one section per failing task.
    #[default]
    Aggregate,
    /// A summary table plus one comment per failing task.
    PerTask,
}

impl CommentMode {
    pub const fn variants() -> &'static [Self] { &[Self::Aggregate, Self::PerTask] }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aggregate => "aggregate",
            Self::PerTask => "per-task",
        }
    }
}

impl FromStr for CommentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::variants().iter().copied().find(|v| v.as_str() == s).ok_or_else(|| {
            let expected = Self::variants().iter().map(|v| v.as_str()).collect::<Vec<_>>();
            format!("Invalid comment mode '{s}', expected one of: {}", expected.join(", "))
        })
    }
}

impl fmt::Display for CommentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Values provided by the CI environment for the current job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunContext {
    pub server_url: String,
    pub api_url: Option<String>,
    /// `owner/repo`
    pub repository: Option<String>,
    pub sha: Option<String>,
    pub run_id: Option<u64>,
    /// The job key (`jobs.<key>` in the workflow file).
    pub job: Option<String>,
    pub token: Option<String>,
    pub event_path: Option<String>,
    /// Issue or pull request number from the triggering event, if any.
    pub event_issue: Option<u64>,
    pub output_path: Option<String>,
    pub summary_path: Option<String>,
}

impl RunContext {
    pub fn from_env<F>(lookup: F) -> Self
    where F: Fn(&str) -> Option<String> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            server_url: get("GITHUB_SERVER_URL")
                .unwrap_or_else(|| "https://github.com".to_string()),
            api_url: get("GITHUB_API_URL"),
            repository: get("GITHUB_REPOSITORY"),
            sha: get("GITHUB_SHA"),
            run_id: get("GITHUB_RUN_ID").and_then(|v| v.trim().parse().ok()),
            job: get("GITHUB_JOB"),
            token: get("GITHUB_TOKEN"),
            event_path: get("GITHUB_EVENT_PATH"),
            event_issue: None,
            output_path: get("GITHUB_OUTPUT"),
            summary_path: get("GITHUB_STEP_SUMMARY"),
        }
    }

    /// Split `owner/repo`.
    pub fn owner_repo(&self) -> Option<(&str, &str)> {
        let (owner, repo) = self.repository.as_deref()?.split_once('/')?;
        (!owner.is_empty() && !repo.is_empty()).then_some((owner, repo))
    }
}

/// Find the issue or pull request number in a webhook event payload.
pub fn event_issue_number(event: &serde_json::Value) -> Option<u64> {
    event
        .pointer("/pull_request/number")
        .or_else(|| event.pointer("/issue/number"))
        .or_else(|| event.get("number"))
        .and_then(serde_json::Value::as_u64)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_comment_mode_from_str() {
        assert_eq!("aggregate".parse::<CommentMode>(), Ok(CommentMode::Aggregate));
        assert_eq!("per-task".parse::<CommentMode>(), Ok(CommentMode::PerTask));
        assert!("table".parse::<CommentMode>().is_err());
    }

    #[test]
    fn test_config_yaml_defaults() {
        let config: Config =
            serde_yaml::from_str("comment:\n  mode: per-task\n  max_log_lines: 5\n").unwrap();
        assert_eq!(config.comment.mode, CommentMode::PerTask);
        assert_eq!(config.comment.max_log_lines, 5);
        assert!(config.comment.enabled);
        assert_eq!(config.comment.identifier, DEFAULT_IDENTIFIER);
        assert_eq!(config.report.path, ".moon/cache/runReport.json");
        assert!(config.github.token.is_none());
    }

    #[test]
    fn test_run_context_from_env() {
        let env = HashMap::from([
            ("GITHUB_REPOSITORY", "moonrepo/moon"),
            ("GITHUB_RUN_ID", "1234"),
            ("GITHUB_JOB", "ci"),
            ("GITHUB_TOKEN", " "),
        ]);
        let ctx = RunContext::from_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(ctx.server_url, "https://github.com");
        assert_eq!(ctx.run_id, Some(1234));
        assert_eq!(ctx.job.as_deref(), Some("ci"));
        assert_eq!(ctx.token, None);
        assert_eq!(ctx.owner_repo(), Some(("moonrepo", "moon")));
    }

    #[test]
    fn test_event_issue_number() {
        let cases = [
            (serde_json::json!({ "pull_request": { "number": 12 }, "number": 3 }), Some(12)),
            (serde_json::json!({ "issue": { "number": 7 } }), Some(7)),
            (serde_json::json!({ "number": 3 }), Some(3)),
            (serde_json::json!({ "ref": "refs/heads/main" }), None),
        ];
        for (event, expected) in cases {
            assert_eq!(event_issue_number(&event), expected);
        }
    }
}
