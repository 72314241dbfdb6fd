//! Per-query error status tracking.
//!
//! Library code reports failures through `Result` values; the
//! [`ErrorHandler`] mirrors the most recent outcome as a coarse status plus
//! message so the C ABI and callers polling between points can inspect it.
//! Each query engine owns exactly one handler; handlers are never shared
//! between queries.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

/// Coarse outcome of the most recent operation.
///
/// The discriminants are part of the C ABI: ok=0, warning=1, error=2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum Status {
    #[default]
    Ok = 0,
    Warning = 1,
    Error = 2,
}

/// Status, last message, and optional log sink for one query engine.
#[derive(Debug, Default)]
pub struct ErrorHandler {
    status: Status,
    message: String,
    log: Option<File>,
    log_path: Option<PathBuf>,
}

impl ErrorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `path` (truncating) as the log sink for subsequent messages.
    pub fn set_log_file(&mut self, path: &Path) -> io::Result<()> {
        self.log = Some(File::create(path)?);
        self.log_path = Some(path.to_path_buf());
        Ok(())
    }

    /// Stop logging and release the log file.
    pub fn disable_log(&mut self) {
        self.log = None;
        self.log_path = None;
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Clear the status and message before starting a new operation.
    pub fn reset(&mut self) {
        self.status = Status::Ok;
        self.message.clear();
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.status = Status::Error;
        self.message = message.into();
        self.log_message(&format!("[ERROR] {}", self.message));
    }

    pub fn set_warning(&mut self, message: impl Into<String>) {
        self.status = Status::Warning;
        self.message = message.into();
        self.log_message(&format!("[WARNING] {}", self.message));
    }

    /// Append a line to the log sink, if one is open.
    pub fn log_message(&mut self, message: &str) {
        if let Some(log) = self.log.as_mut() {
            if let Err(err) = writeln!(log, "{message}") {
                debug!(error = %err, "failed to write to query log file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let handler = ErrorHandler::new();
        assert_eq!(handler.status(), Status::Ok);
        assert!(handler.message().is_empty());
        assert!(handler.log_file().is_none());
    }

    #[test]
    fn test_error_then_reset() {
        let mut handler = ErrorHandler::new();
        handler.set_error("model metadata is inconsistent");
        assert_eq!(handler.status(), Status::Error);
        assert_eq!(handler.message(), "model metadata is inconsistent");

        handler.reset();
        assert_eq!(handler.status(), Status::Ok);
        assert!(handler.message().is_empty());
    }

    #[test]
    fn test_warning_overwrites_message() {
        let mut handler = ErrorHandler::new();
        handler.set_warning("first");
        handler.set_warning("second");
        assert_eq!(handler.status(), Status::Warning);
        assert_eq!(handler.message(), "second");
    }

    #[test]
    fn test_log_file_receives_messages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("query.log");

        let mut handler = ErrorHandler::new();
        handler.set_log_file(&path).unwrap();
        handler.set_warning("point outside domain");
        handler.disable_log();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[WARNING] point outside domain"));
    }
}
