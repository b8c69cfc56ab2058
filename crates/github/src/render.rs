use std::collections::HashSet;

use run_report_core::{
    config::{CommentMode, DEFAULT_IDENTIFIER, DEFAULT_MAX_LOG_LINES},
    models::FailedTaskInfo,
    truncate::{
        ELLIPSIS, MAX_COMMENT_LENGTH, TRUNCATION_NOTICE, char_len, tail_chars, trimmed_line_count,
        truncate_end,
    },
    util::{code_fence, inline_code, strip_ansi, table_cell},
};

use crate::{
    links::{ConsoleLog, LinkContext},
    token::Token,
};

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions<'a> {
    pub mode: CommentMode,
    pub identifier: &'a str,
    /// Streams with more lines than this are only printed to the console.
    /// `0` never inlines a stream.
    pub max_log_lines: usize,
    pub link: Option<&'a LinkContext>,
    /// Maximum length of a single document, in characters.
    pub max_length: usize,
}

impl Default for RenderOptions<'_> {
    fn default() -> Self {
        Self {
            mode: CommentMode::Aggregate,
            identifier: DEFAULT_IDENTIFIER,
            max_log_lines: DEFAULT_MAX_LOG_LINES,
            link: None,
            max_length: MAX_COMMENT_LENGTH,
        }
    }
}

/// A document to publish, identified across runs by its token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedUnit {
    pub token: Token,
    pub body: String,
}

#[derive(Debug, Clone, Default)]
pub struct RenderedReport {
    pub units: Vec<RenderedUnit>,
}

impl RenderedReport {
    /// All documents joined, for step outputs and the job summary.
    pub fn text(&self) -> String {
        self.units.iter().map(|u| u.body.as_str()).collect::<Vec<_>>().join("\n")
    }
}

/// Render failures according to `options.mode`. No failures produce no units.
pub fn render_report(
    failures: &[FailedTaskInfo],
    options: &RenderOptions,
    console: &mut ConsoleLog,
) -> RenderedReport {
    if failures.is_empty() {
        return RenderedReport::default();
    }
    let units = match options.mode {
        CommentMode::Aggregate => vec![render_aggregate(failures, options, console)],
        CommentMode::PerTask => render_per_task(failures, options),
    };
    RenderedReport { units }
}

fn failed_tasks_heading(count: usize) -> String {
    let plural = if count == 1 { "" } else { "s" };
    format!("### ❌ {count} failed task{plural}\n\n")
}

fn push_code_block(out: &mut String, label: &str, text: &str) {
    let fence = code_fence(text);
    out.push_str(&format!("**{label}**\n\n{fence}\n{text}\n{fence}\n\n"));
}

fn push_details(out: &mut String, summary: &str, text: &str, fence: &str) {
    out.push_str("<details>\n");
    out.push_str(&format!("<summary>{summary}</summary>\n\n"));
    out.push_str(&format!("{fence}\n{text}\n{fence}\n\n"));
    out.push_str("</details>\n\n");
}

fn push_error_and_command(out: &mut String, failure: &FailedTaskInfo) {
    if let Some(error) = failure.error.as_deref().map(strip_ansi) {
        let error = error.trim();
        if !error.is_empty() {
            push_code_block(out, "Error", error);
        }
    }
    if let Some(command) = failure.command.as_deref().map(strip_ansi) {
        let command = command.trim();
        if !command.is_empty() {
            push_code_block(out, "Command", command);
        }
    }
}

/// One document with a section per failing task.
pub fn render_aggregate(
    failures: &[FailedTaskInfo],
    options: &RenderOptions,
    console: &mut ConsoleLog,
) -> RenderedUnit {
    let token = Token::summary(options.identifier);
    let mut out = format!("{token}\n");
    out.push_str(&failed_tasks_heading(failures.len()));

    for (i, failure) in failures.iter().enumerate() {
        if i > 0 {
            out.push_str("---\n\n");
        }
        out.push_str(&format!("#### {}\n\n", inline_code(&failure.target)));
        push_error_and_command(&mut out, failure);
        let target = strip_ansi(&failure.target);
        for (name, stream) in [("stderr", &failure.stderr), ("stdout", &failure.stdout)] {
            push_stream(&mut out, target.trim(), name, stream, options, console);
        }
    }

    let body = truncate_end(out, options.max_length);
    RenderedUnit { token, body }
}

fn push_stream(
    out: &mut String,
    target: &str,
    name: &str,
    stream: &str,
    options: &RenderOptions,
    console: &mut ConsoleLog,
) {
    let stream = strip_ansi(stream);
    let lines = trimmed_line_count(&stream);
    if lines == 0 {
        return;
    }
    if options.max_log_lines > 0 && lines <= options.max_log_lines {
        let text = stream.trim();
        push_details(out, name, text, &code_fence(text));
        return;
    }
    let line = console.group(&format!("Full {name} for {target}"), &stream);
    if let Some(link) = options.link {
        out.push_str(&format!(
            "**{name}**: {lines} lines, [View full log]({})\n\n",
            link.log_url(line)
        ));
    }
}

/// A summary table followed by one document per distinct failing target.
pub fn render_per_task(failures: &[FailedTaskInfo], options: &RenderOptions) -> Vec<RenderedUnit> {
    let mut seen = HashSet::new();
    let unique = failures.iter().filter(|f| seen.insert(f.target.as_str())).collect::<Vec<_>>();

    let mut units = vec![render_summary_table(&unique, options)];
    units.extend(unique.iter().map(|failure| render_task(failure, options)));
    units
}

fn render_summary_table(failures: &[&FailedTaskInfo], options: &RenderOptions) -> RenderedUnit {
    let token = Token::summary(options.identifier);
    let mut out = format!("{token}\n");
    out.push_str(&failed_tasks_heading(failures.len()));
    out.push_str("| Target | Error |\n");
    out.push_str("| - | - |\n");
    for failure in failures {
        let error = failure.error.as_deref().map(strip_ansi).unwrap_or_default();
        let error = table_cell(&error);
        let error = if error.is_empty() { "_No error message_" } else { error.as_str() };
        out.push_str(&format!("| {} | {error} |\n", table_cell(&inline_code(&failure.target))));
    }
    let body = truncate_end(out, options.max_length);
    RenderedUnit { token, body }
}

fn task_document(
    token: &Token,
    failure: &FailedTaskInfo,
    stderr: Option<&str>,
    fence: &str,
) -> String {
    let mut out = format!("{token}\n### ❌ {}\n\n", inline_code(&failure.target));
    push_error_and_command(&mut out, failure);
    if let Some(stderr) = stderr {
        push_details(&mut out, "stderr", stderr, fence);
    }
    out
}

/// A single task's document. When stderr makes it too long, the head of
/// stderr is dropped so the final lines stay visible.
pub fn render_task(failure: &FailedTaskInfo, options: &RenderOptions) -> RenderedUnit {
    let token = Token::task(options.identifier, &failure.target);
    let stderr = strip_ansi(&failure.stderr);
    let stderr = stderr.trim();
    let fence = code_fence(stderr);
    let section = (!stderr.is_empty()).then_some(stderr);

    let full = task_document(&token, failure, section, &fence);
    if char_len(&full) <= options.max_length {
        return RenderedUnit { token, body: full };
    }

    if section.is_some() {
        let overhead = char_len(&task_document(&token, failure, Some(""), &fence));
        let reserved = overhead + char_len(TRUNCATION_NOTICE) + char_len(ELLIPSIS);
        if let Some(budget) = options.max_length.checked_sub(reserved).filter(|b| *b > 0) {
            let tail = format!("{ELLIPSIS}{}", tail_chars(stderr, budget));
            let mut body = task_document(&token, failure, Some(&tail), &fence);
            body.push_str(TRUNCATION_NOTICE);
            return RenderedUnit { token, body };
        }
    }

    RenderedUnit { token, body: truncate_end(full, options.max_length) }
}
