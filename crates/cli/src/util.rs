use std::{
    io::{self, Write},
    sync::atomic::{AtomicUsize, Ordering},
};

use run_report_core::config::CommentMode;
use typed_path::Utf8NativePathBuf;

// For argp::FromArgs
pub fn native_path(value: &str) -> Result<Utf8NativePathBuf, String> {
    Ok(Utf8NativePathBuf::from(value))
}

pub fn comment_mode(value: &str) -> Result<CommentMode, String> { value.parse() }

static LOGGED_LINES: AtomicUsize = AtomicUsize::new(0);

/// Log writer for stderr that counts the lines it emits.
///
/// Actions merges stderr into the step log, so console groups printed
/// afterwards start below these lines.
pub struct CountingStderr;

impl Write for CountingStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = io::stderr().write(buf)?;
        let lines = buf[..written].iter().filter(|&&b| b == b'\n').count();
        LOGGED_LINES.fetch_add(lines, Ordering::Relaxed);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> { io::stderr().flush() }
}

/// Lines written to the step log so far by the logger.
pub fn logged_lines() -> usize { LOGGED_LINES.load(Ordering::Relaxed) }

/// Step log line the next console group will open on.
pub fn console_start_line() -> usize { logged_lines() + 1 }
