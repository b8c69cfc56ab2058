use std::{fs::OpenOptions, io::Write, path::Path};

use anyhow::{Context, Result};

/// Values exposed to later workflow steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outputs {
    pub has_failures: bool,
    pub comment_created: bool,
    pub report: String,
}

impl Outputs {
    /// Serialize using the `$GITHUB_OUTPUT` file format.
    pub fn to_output_file(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("has-failures={}\n", self.has_failures));
        out.push_str(&format!("comment-created={}\n", self.comment_created));
        let delimiter = delimiter_for(&self.report);
        out.push_str(&format!("report<<{delimiter}\n{}\n{delimiter}\n", self.report));
        out
    }
}

fn delimiter_for(value: &str) -> String {
    loop {
        let delimiter = format!("ghadelimiter_{:016x}", rand::random::<u64>());
        if !value.contains(&delimiter) {
            return delimiter;
        }
    }
}

fn append(path: &Path, text: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    file.write_all(text.as_bytes()).with_context(|| format!("Failed to write {}", path.display()))
}

/// Write outputs to `$GITHUB_OUTPUT`, if running in Actions.
pub fn write_outputs(path: Option<&str>, outputs: &Outputs) -> Result<()> {
    let Some(path) = path else {
        tracing::debug!("GITHUB_OUTPUT not set, skipping outputs");
        return Ok(());
    };
    append(Path::new(path), &outputs.to_output_file())
}

/// Append the report to `$GITHUB_STEP_SUMMARY`, if running in Actions.
pub fn write_summary(path: Option<&str>, report: &str) -> Result<()> {
    match path {
        Some(path) if !report.is_empty() => append(Path::new(path), &format!("{report}\n")),
        _ => Ok(()),
    }
}
