use anyhow::{Context, Result};
use argp::FromArgs;
use run_report_core::config::{CommentMode, Config, RunContext, event_issue_number};
use run_report_github::{
    GitHub, GitHubApi,
    comments::publish,
    links::{ConsoleLog, resolve_link_context},
    render::{RenderOptions, render_report},
};
use typed_path::Utf8NativePathBuf;

use crate::{
    cmd::{Overrides, load_config, load_failures},
    outputs::{Outputs, write_outputs, write_summary},
    util::{comment_mode, console_start_line, native_path},
};

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Report failed tasks and reconcile pull request comments.
#[argp(subcommand, name = "publish")]
pub struct Args {
    #[argp(option, short = 'c', from_str_fn(native_path))]
    /// YAML config file
    config: Option<Utf8NativePathBuf>,
    #[argp(option, short = 'r', from_str_fn(native_path))]
    /// run report file (relative to the workspace root)
    report: Option<Utf8NativePathBuf>,
    #[argp(option, from_str_fn(native_path))]
    /// workspace root
    workspace_root: Option<Utf8NativePathBuf>,
    #[argp(option, from_str_fn(comment_mode))]
    /// comment layout: aggregate or per-task
    mode: Option<CommentMode>,
    #[argp(option)]
    /// identifies this job's comments (use a distinct value per shard)
    identifier: Option<String>,
    #[argp(option)]
    /// maximum lines of a log shown inline, 0 to never inline
    max_log_lines: Option<usize>,
    #[argp(option)]
    /// GitHub token (defaults to $GITHUB_TOKEN)
    token: Option<String>,
    #[argp(switch)]
    /// render and write outputs without commenting
    no_comment: bool,
    #[argp(option, short = 'o', from_str_fn(native_path))]
    /// also write markdown to output file
    output: Option<Utf8NativePathBuf>,
}

async fn read_event_issue(path: Option<&str>) -> Option<u64> {
    let path = path?;
    let data = match tokio::fs::read(path).await {
        Ok(data) => data,
        Err(e) => {
            tracing::debug!("Failed to read event payload {}: {}", path, e);
            return None;
        }
    };
    let event = serde_json::from_slice::<serde_json::Value>(&data).ok()?;
    event_issue_number(&event)
}

pub async fn run(args: Args) -> Result<()> {
    let mut config = load_config(Overrides {
        config: args.config,
        report: args.report,
        workspace_root: args.workspace_root,
        mode: args.mode,
        identifier: args.identifier,
        max_log_lines: args.max_log_lines,
    })?;
    if args.no_comment {
        config.comment.enabled = false;
    }

    let mut run = RunContext::from_env(|key| std::env::var(key).ok());
    run.event_issue = read_event_issue(run.event_path.as_deref()).await;

    let github = if config.comment.enabled {
        let token = args
            .token
            .or_else(|| config.github.token.clone())
            .or_else(|| run.token.clone())
            .context("Missing GitHub token: pass --token or set GITHUB_TOKEN")?;
        let (owner, repo) =
            run.owner_repo().context("Missing repository: set GITHUB_REPOSITORY")?;
        let api_url = config.github.api_url.as_deref().or(run.api_url.as_deref());
        Some(GitHub::new(&token, api_url, owner, repo)?)
    } else {
        None
    };
    report_failures(github.as_ref(), &config, &run, args.output.as_ref()).await
}

/// Render the failures, publish them through `api` when given and write the
/// step outputs. No report or no failures writes `has-failures=false` and
/// skips commenting.
pub async fn report_failures(
    api: Option<&impl GitHubApi>,
    config: &Config,
    run: &RunContext,
    output: Option<&Utf8NativePathBuf>,
) -> Result<()> {
    let Some(failures) = load_failures(config).await? else {
        write_outputs(run.output_path.as_deref(), &Outputs::default())?;
        return Ok(());
    };
    if failures.is_empty() {
        tracing::info!("No failed tasks");
        write_outputs(run.output_path.as_deref(), &Outputs::default())?;
        return Ok(());
    }

    let link = match api {
        Some(api) if config.comment.mode == CommentMode::Aggregate => {
            resolve_link_context(api, run).await
        }
        _ => None,
    };
    let options = RenderOptions {
        mode: config.comment.mode,
        identifier: &config.comment.identifier,
        max_log_lines: config.comment.max_log_lines,
        link: link.as_ref(),
        ..Default::default()
    };
    let mut console = ConsoleLog::new(console_start_line());
    let rendered = render_report(&failures, &options, &mut console);
    print!("{}", console.as_str());
    tracing::info!("Found {} failed tasks", failures.len());

    let report = rendered.text();
    if let Some(out_path) = output {
        std::fs::write(out_path.with_platform_encoding(), &report)
            .with_context(|| format!("Failed to write output file '{}'", out_path))?;
    }

    let outcome = match api {
        Some(api) => publish(api, run, &config.comment.identifier, &rendered.units).await,
        None => Default::default(),
    };
    if let Some(issue) = outcome.issue {
        tracing::info!(
            "Reconciled comments on #{}: {} created, {} updated, {} deleted",
            issue,
            outcome.created.len(),
            outcome.updated.len(),
            outcome.deleted.len()
        );
    }

    write_summary(run.summary_path.as_deref(), &report)?;
    write_outputs(run.output_path.as_deref(), &Outputs {
        has_failures: true,
        comment_created: outcome.mutated(),
        report,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use run_report_github::{
        testing::{Call, FakeGitHub},
        token::Token,
    };

    use super::*;

    struct Workspace {
        dir: tempfile::TempDir,
        config: Config,
        run: RunContext,
    }

    impl Workspace {
        fn new(report: &str) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let cache = dir.path().join(".moon/cache");
            std::fs::create_dir_all(cache.join("states/app/build")).unwrap();
            std::fs::write(cache.join("runReport.json"), report).unwrap();
            std::fs::write(cache.join("states/app/build/stderr.log"), "error TS2304\n").unwrap();

            let mut config = Config::default();
            config.report.workspace_root = dir.path().to_string_lossy().into_owned();
            let path = |name: &str| Some(dir.path().join(name).to_string_lossy().into_owned());
            let run = RunContext {
                event_issue: Some(12),
                output_path: path("output"),
                summary_path: path("summary"),
                ..Default::default()
            };
            Self { dir, config, run }
        }

        fn read(&self, name: &str) -> String {
            std::fs::read_to_string(self.dir.path().join(name)).unwrap_or_default()
        }
    }

    fn report(status: &str) -> String {
        format!(
            r#"{{"actions":[{{"status":"{status}","error":"Process exited with code 2","node":{{"action":"run-task","params":{{"target":"app:build"}}}}}}]}}"#
        )
    }

    #[tokio::test]
    async fn test_no_failures_skips_comments() {
        let ws = Workspace::new(&report("passed"));
        let stale = format!("{}\nold", Token::summary("run-report"));
        let api = FakeGitHub::with_comments(&[(1, stale)]);
        report_failures(Some(&api), &ws.config, &ws.run, None).await.unwrap();

        assert!(api.calls().is_empty());
        assert_eq!(api.comments().len(), 1);
        assert!(ws.read("output").starts_with("has-failures=false\ncomment-created=false\n"));
        assert_eq!(ws.read("summary"), "");
    }

    #[tokio::test]
    async fn test_missing_report_skips_comments() {
        let ws = Workspace::new("");
        std::fs::remove_file(ws.dir.path().join(".moon/cache/runReport.json")).unwrap();
        let api = FakeGitHub::default();
        report_failures(Some(&api), &ws.config, &ws.run, None).await.unwrap();

        assert!(api.calls().is_empty());
        assert!(ws.read("output").starts_with("has-failures=false\n"));
    }

    #[tokio::test]
    async fn test_failures_publish_and_write_outputs() {
        let ws = Workspace::new(&report("failed"));
        let api = FakeGitHub::default();
        let markdown_path = ws.dir.path().join("report.md");
        let markdown = Utf8NativePathBuf::from(markdown_path.to_str().unwrap());
        report_failures(Some(&api), &ws.config, &ws.run, Some(&markdown)).await.unwrap();

        assert_eq!(api.calls(), vec![Call::List(12), Call::Create(12)]);
        let comments = api.comments();
        assert_eq!(comments.len(), 1);
        assert!(comments[0].body.contains("app:build"));
        assert!(comments[0].body.contains("error TS2304"));

        let output = ws.read("output");
        assert!(output.starts_with("has-failures=true\ncomment-created=true\nreport<<"));
        assert!(output.contains(&comments[0].body));
        assert_eq!(ws.read("summary"), format!("{}\n", comments[0].body));
        assert_eq!(ws.read("report.md"), comments[0].body);
    }

    #[tokio::test]
    async fn test_failures_without_commenting() {
        let ws = Workspace::new(&report("failed-and-abort"));
        report_failures(None::<&FakeGitHub>, &ws.config, &ws.run, None).await.unwrap();
        assert!(ws.read("output").starts_with("has-failures=true\ncomment-created=false\n"));
        assert!(ws.read("summary").contains("app:build"));
    }

    #[tokio::test]
    async fn test_comment_errors_are_not_fatal() {
        let ws = Workspace::new(&report("failed"));
        let api = FakeGitHub::default();
        api.fail_with("Resource not accessible by integration");
        report_failures(Some(&api), &ws.config, &ws.run, None).await.unwrap();
        assert!(ws.read("output").starts_with("has-failures=true\ncomment-created=false\n"));
    }
}
