use std::io::Write;

use catalog_sync_core::contract::ProgressSink;

/// Streams each progress line to stdout as soon as it is emitted.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutProgress;

impl ProgressSink for StdoutProgress {
    fn line(&self, line: &str) {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        if writeln!(handle, "{line}").and_then(|_| handle.flush()).is_err() {
            tracing::warn!(line, "Failed to write progress line to stdout");
        }
    }
}
