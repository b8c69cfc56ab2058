use std::{fmt, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::logs::LogReader;

/// The run report written by `moon ci` / `moon run`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl RunReport {
    pub fn parse(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).context("Failed to parse run report")
    }

    /// Load the report from disk. A missing file means nothing has run yet.
    pub async fn load(path: &Path) -> Result<Option<Self>> {
        match tokio::fs::read(path).await {
            Ok(data) => Self::parse(&data)
                .with_context(|| format!("Failed to parse {}", path.display()))
                .map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    /// Failed task actions, in report order.
    pub fn failed_tasks(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter().filter(|action| action.is_failed_task())
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionStatus {
    Cached,
    CachedFromRemote,
    Failed,
    FailedAndAbort,
    Invalid,
    Passed,
    Running,
    Skipped,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub status: ActionStatus,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub node: ActionNode,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionNode {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub params: ActionParams,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionParams {
    #[serde(default)]
    pub target: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Operation {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub meta: Option<OperationMeta>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationMeta {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
}

impl Operation {
    fn kind(&self) -> Option<&str> {
        self.meta.as_ref().and_then(|m| m.kind.as_deref()).or(self.kind.as_deref())
    }

    fn command(&self) -> Option<&str> {
        self.meta.as_ref().and_then(|m| m.command.as_deref()).or(self.command.as_deref())
    }
}

impl Action {
    pub fn is_failed_task(&self) -> bool {
        self.node.action == "run-task"
            && matches!(self.status, ActionStatus::Failed | ActionStatus::FailedAndAbort)
    }

    pub fn target(&self) -> &str {
        self.target.as_deref().or(self.node.params.target.as_deref()).unwrap_or_default()
    }

    /// Command of the first task execution operation.
    pub fn command(&self) -> Option<&str> {
        self.operations.iter().find(|op| op.kind() == Some("task-execution"))?.command()
    }
}

const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TargetIdentity {
    pub project: String,
    pub task: String,
}

impl TargetIdentity {
    pub fn parse(target: &str) -> Self {
        let (project, task) = target.split_once(':').unwrap_or((target, ""));
        let or_unknown =
            |s: &str| if s.is_empty() { UNKNOWN.to_string() } else { s.to_string() };
        Self { project: or_unknown(project), task: or_unknown(task) }
    }

    pub fn project_component(&self) -> String { safe_component(&self.project) }

    pub fn task_component(&self) -> String { safe_component(&self.task) }
}

impl fmt::Display for TargetIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.project, self.task)
    }
}

/// Make a value usable as a single path component.
pub fn safe_component(value: &str) -> String {
    let replaced = value.replace(['/', '\\'], "-");
    let trimmed = replaced.trim_matches(|c: char| c == '.' || c == '-');
    if trimmed.is_empty() { UNKNOWN.to_string() } else { trimmed.to_string() }
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct FailedTaskInfo {
    pub target: String,
    pub error: Option<String>,
    pub command: Option<String>,
    pub stdout: String,
    pub stderr: String,
}

/// Build failure records for every failed task, reading each task's logs.
pub async fn collect_failures(report: &RunReport, logs: &LogReader) -> Result<Vec<FailedTaskInfo>> {
    let mut failures = vec![];
    for action in report.failed_tasks() {
        let identity = TargetIdentity::parse(action.target());
        let target = match action.target() {
            "" => identity.to_string(),
            target => target.to_string(),
        };
        let task_logs = logs
            .read_logs(&identity)
            .await
            .with_context(|| format!("Failed to read logs for {target}"))?;
        failures.push(FailedTaskInfo {
            target,
            error: action.error.clone(),
            command: action.command().map(str::to_string),
            stdout: task_logs.stdout,
            stderr: task_logs.stderr,
        });
    }
    tracing::debug!("Collected {} failed tasks", failures.len());
    Ok(failures)
}
