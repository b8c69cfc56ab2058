use run_report_core::{config::RunContext, util::strip_ansi};
use url::Url;

use crate::{GitHubApi, WorkflowJob};

const IN_PROGRESS: &str = "in_progress";

/// Where the current step's log lives in the Actions log viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkContext {
    pub server_url: String,
    pub repository: String,
    pub run_id: u64,
    pub job_id: u64,
    pub step_number: u64,
}

impl LinkContext {
    /// URL of the job log anchored at `line` of the current step.
    pub fn log_url(&self, line: usize) -> String {
        let path = format!("{}/actions/runs/{}/job/{}", self.repository, self.run_id, self.job_id);
        let fragment = format!("step:{}:{line}", self.step_number);
        let base = format!("{}/", self.server_url.trim_end_matches('/'));
        match Url::parse(&base).and_then(|base| base.join(&path)) {
            Ok(mut url) => {
                url.set_fragment(Some(&fragment));
                url.to_string()
            }
            Err(_) => format!("{base}{path}#{fragment}"),
        }
    }
}

/// Locate the running job and step for the current workflow run.
///
/// Returns `None` when the context is incomplete or the lookup fails; callers
/// then render without links.
pub async fn resolve_link_context(api: &impl GitHubApi, run: &RunContext) -> Option<LinkContext> {
    let (Some(repository), Some(run_id), Some(job_key)) =
        (run.repository.as_deref(), run.run_id, run.job.as_deref())
    else {
        tracing::debug!("Missing run or job information, log links disabled");
        return None;
    };
    let jobs = match api.list_jobs_for_run(run_id).await {
        Ok(jobs) => jobs,
        Err(e) => {
            tracing::warn!("Failed to list jobs for run {}: {:?}", run_id, e);
            return None;
        }
    };
    let Some((job_id, step_number)) = select_job_step(&jobs, job_key) else {
        tracing::debug!("No in-progress job matching '{}' in run {}", job_key, run_id);
        return None;
    };
    Some(LinkContext {
        server_url: run.server_url.clone(),
        repository: repository.to_string(),
        run_id,
        job_id,
        step_number,
    })
}

/// Pick the in-progress job whose name starts with `job_key` (matrix jobs are
/// named `key (a, b)`) and its in-progress step.
pub fn select_job_step(jobs: &[WorkflowJob], job_key: &str) -> Option<(u64, u64)> {
    let job = jobs.iter().find(|job| job.status == IN_PROGRESS && job.name.starts_with(job_key))?;
    let step = job.steps.iter().find(|step| step.status == IN_PROGRESS)?;
    Some((job.id, step.number))
}

/// Collapsible groups printed to the job log, with a running line counter.
///
/// `start_line` is the step log line the first group opens on. Anything else
/// written to the step log before the groups (stdout or stderr) must be
/// counted into it, or every anchor is off by that many lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleLog {
    output: String,
    next_line: usize,
}

/// Groups printed before any other step output.
impl Default for ConsoleLog {
    fn default() -> Self { Self::new(1) }
}

impl ConsoleLog {
    pub fn new(start_line: usize) -> Self { Self { output: String::new(), next_line: start_line } }

    /// Append a group and return the line its content starts at.
    pub fn group(&mut self, title: &str, text: &str) -> usize {
        let text = strip_ansi(text);
        let text = text.trim_end_matches(['\r', '\n']);
        self.output.push_str("::group::");
        self.output.push_str(title);
        self.output.push('\n');
        self.output.push_str(text);
        self.output.push_str("\n::endgroup::\n");

        let anchor = self.next_line + 1;
        self.next_line += text.split('\n').count() + 2;
        anchor
    }

    pub fn is_empty(&self) -> bool { self.output.is_empty() }

    pub fn as_str(&self) -> &str { &self.output }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{WorkflowStep, testing::FakeGitHub};

    fn job(id: u64, name: &str, status: &str, steps: &[(u64, &str)]) -> WorkflowJob {
        WorkflowJob {
            id,
            name: name.to_string(),
            status: status.to_string(),
            steps: steps
                .iter()
                .map(|&(number, status)| WorkflowStep { number, status: status.to_string() })
                .collect(),
        }
    }

    fn run_context() -> RunContext {
        RunContext {
            server_url: "https://github.com".to_string(),
            repository: Some("moonrepo/moon".to_string()),
            run_id: Some(99),
            job: Some("ci".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_select_job_step() {
        let jobs = [
            job(1, "lint", "in_progress", &[(1, "in_progress")]),
            job(2, "ci (ubuntu, 1)", "completed", &[(1, "completed")]),
            job(3, "ci (ubuntu, 2)", "in_progress", &[
                (1, "completed"),
                (2, "completed"),
                (3, "in_progress"),
                (4, "queued"),
            ]),
        ];
        assert_eq!(select_job_step(&jobs, "ci"), Some((3, 3)));
        assert_eq!(select_job_step(&jobs, "lint"), Some((1, 1)));
        assert_eq!(select_job_step(&jobs, "deploy"), None);
        assert_eq!(select_job_step(&[job(4, "ci", "in_progress", &[])], "ci"), None);
    }

    #[test]
    fn test_log_url() {
        let ctx = LinkContext {
            server_url: "https://github.com".to_string(),
            repository: "moonrepo/moon".to_string(),
            run_id: 99,
            job_id: 3,
            step_number: 4,
        };
        assert_eq!(
            ctx.log_url(12),
            "https://github.com/moonrepo/moon/actions/runs/99/job/3#step:4:12"
        );
    }

    #[test]
    fn test_console_line_numbers() {
        let mut console = ConsoleLog::new(1);
        let first = console.group("Full stdout for a:build", "one\ntwo\nthree\n");
        let second = console.group("Full stderr for a:build", "\x1b[31mfour\x1b[0m");
        assert_eq!(first, 2);
        // 1 open + 3 content + 1 close
        assert_eq!(second, 7);
        assert_eq!(console.clone().group("third", "five"), 10);
        assert_eq!(
            console.as_str(),
            "::group::Full stdout for a:build\none\ntwo\nthree\n::endgroup::\n::group::Full \
             stderr for a:build\nfour\n::endgroup::\n"
        );
    }

    #[test]
    fn test_console_start_line_offsets_anchors() {
        let mut console = ConsoleLog::new(4);
        assert_eq!(console.group("Full stderr for a:build", "x\ny"), 5);
        assert_eq!(console.group("Full stdout for a:build", "z"), 9);
    }

    #[tokio::test]
    async fn test_resolve_link_context() {
        let api = FakeGitHub::default();
        api.set_jobs(vec![job(7, "ci (macos)", "in_progress", &[(5, "in_progress")])]);
        let ctx = resolve_link_context(&api, &run_context()).await.unwrap();
        assert_eq!((ctx.run_id, ctx.job_id, ctx.step_number), (99, 7, 5));

        let missing_job = RunContext { job: None, ..run_context() };
        assert_eq!(resolve_link_context(&api, &missing_job).await, None);

        api.fail_with("network down");
        assert_eq!(resolve_link_context(&api, &run_context()).await, None);
    }
}
