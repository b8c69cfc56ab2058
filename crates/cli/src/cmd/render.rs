use anyhow::{Context, Result};
use argp::FromArgs;
use run_report_core::config::CommentMode;
use run_report_github::{
    links::ConsoleLog,
    render::{RenderOptions, render_report},
};
use typed_path::Utf8NativePathBuf;

use crate::{
    cmd::{Overrides, load_config, load_failures},
    util::{comment_mode, console_start_line, native_path},
};

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Render the failure report as markdown without publishing it.
#[argp(subcommand, name = "render")]
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
    /// maximum lines of a log shown inline
    max_log_lines: Option<usize>,
    #[argp(option, short = 'o', from_str_fn(native_path))]
    /// write markdown to output file
    output: Option<Utf8NativePathBuf>,
}

pub async fn run(args: Args) -> Result<()> {
    let config = load_config(Overrides {
        config: args.config,
        report: args.report,
        workspace_root: args.workspace_root,
        mode: args.mode,
        identifier: None,
        max_log_lines: args.max_log_lines,
    })?;
    let failures = load_failures(&config).await?.unwrap_or_default();
    let options = RenderOptions {
        mode: config.comment.mode,
        identifier: &config.comment.identifier,
        max_log_lines: config.comment.max_log_lines,
        ..Default::default()
    };
    let mut console = ConsoleLog::new(console_start_line());
    let rendered = render_report(&failures, &options, &mut console);
    print!("{}", console.as_str());
    let text = rendered.text();
    if let Some(out_path) = &args.output {
        std::fs::write(out_path.with_platform_encoding(), text)
            .with_context(|| format!("Failed to write output file '{}'", out_path))?;
    } else if !text.is_empty() {
        println!("{}", text);
    } else {
        tracing::info!("No failed tasks");
    }
    Ok(())
}
