//! Exception Log
//!
//! Append-only side channel for errors the engine contains instead of
//! propagating. One timestamped line per event:
//!
//! ```text
//! 2016-10-04T18:22:31.120Z MultipleValueRows record 1042 attribute title: expected at most one value row, found 2
//! ```
//!
//! Every event is mirrored to `tracing` and retained in memory so a run can
//! report how many anomalies it absorbed.

use crate::error::{ApiError, ResolveError};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Kind used for informational phase markers
pub const INFO_KIND: &str = "INFO";

/// One contained error or phase marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExceptionEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    pub message: String,
}

impl ExceptionEvent {
    /// Log line without trailing newline
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.kind,
            self.message
        )
    }
}

struct LogInner {
    sink: Mutex<Option<Box<dyn Write + Send>>>,
    events: Mutex<Vec<ExceptionEvent>>,
}

/// Shared handle to the exception log; clones write to the same sink
#[derive(Clone)]
pub struct ExceptionLog {
    inner: Arc<LogInner>,
}

impl std::fmt::Debug for ExceptionLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExceptionLog")
            .field("events", &self.inner.events.lock().len())
            .finish()
    }
}

impl Default for ExceptionLog {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl ExceptionLog {
    /// Events are kept in memory only
    pub fn in_memory() -> Self {
        Self::from_sink(None)
    }

    /// Write events to `writer` as well as memory
    pub fn with_writer(writer: Box<dyn Write + Send>) -> Self {
        Self::from_sink(Some(writer))
    }

    /// Open (truncate or append to) an exception file
    pub fn to_file(path: &Path, append: bool) -> Result<Self, ApiError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)
            .map_err(|e| {
                ApiError::ConfigError(format!(
                    "Failed to open exceptions file {}: {}",
                    path.display(),
                    e
                ))
            })?;
        Ok(Self::with_writer(Box::new(std::io::LineWriter::new(file))))
    }

    fn from_sink(sink: Option<Box<dyn Write + Send>>) -> Self {
        ExceptionLog {
            inner: Arc::new(LogInner {
                sink: Mutex::new(sink),
                events: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Append one event
    pub fn record(&self, kind: &str, message: impl Into<String>) {
        let message = message.into().replace(['\n', '\r'], " ");
        let event = ExceptionEvent {
            timestamp: Utc::now(),
            kind: kind.to_string(),
            message,
        };

        if kind == INFO_KIND {
            info!(target: "pagediff::exceptions", "{}", event.message);
        } else {
            warn!(target: "pagediff::exceptions", kind = %event.kind, "{}", event.message);
        }

        let line = event.to_line();
        {
            let mut sink = self.inner.sink.lock();
            if let Some(writer) = sink.as_mut() {
                if let Err(e) = writeln!(writer, "{}", line) {
                    error!(error = %e, line = %line, "Exception log write failed");
                }
            }
        }
        self.inner.events.lock().push(event);
    }

    /// Append a contained resolution error
    pub fn record_error(&self, err: &ResolveError) {
        self.record(err.kind(), err.to_string());
    }

    /// Append an informational phase marker
    pub fn note(&self, message: impl Into<String>) {
        self.record(INFO_KIND, message);
    }

    pub fn events(&self) -> Vec<ExceptionEvent> {
        self.inner.events.lock().clone()
    }

    /// Number of events of one kind
    pub fn count(&self, kind: &str) -> usize {
        self.inner
            .events
            .lock()
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }

    /// Number of events that are not phase markers
    pub fn error_count(&self) -> usize {
        self.inner
            .events
            .lock()
            .iter()
            .filter(|e| e.kind != INFO_KIND)
            .count()
    }

    pub fn flush(&self) {
        if let Some(writer) = self.inner.sink.lock().as_mut() {
            if let Err(e) = writer.flush() {
                error!(error = %e, "Exception log flush failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_are_kept_in_order() {
        let log = ExceptionLog::in_memory();
        log.note("store is: source");
        log.record("FetchFailure", "record 3 attribute title: boom");
        log.record_error(&ResolveError::MultipleValueRows {
            record_id: 4,
            attribute: "title".to_string(),
            count: 2,
        });

        let events = log.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].kind, INFO_KIND);
        assert_eq!(events[2].kind, "MultipleValueRows");
        assert_eq!(log.count("FetchFailure"), 1);
        assert_eq!(log.error_count(), 2);
    }

    #[test]
    fn test_file_sink_writes_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("exceptions");

        let log = ExceptionLog::to_file(&path, false).unwrap();
        log.record("CyclicReference", "first\nsecond");
        log.note("done");
        log.flush();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("CyclicReference first second"));
        assert!(lines[1].ends_with("INFO done"));
        assert!(DateTime::parse_from_rfc3339(lines[0].split(' ').next().unwrap()).is_ok());
    }

    #[test]
    fn test_append_mode_keeps_previous_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exceptions");

        let first = ExceptionLog::to_file(&path, false).unwrap();
        first.note("one");
        first.flush();
        drop(first);

        let second = ExceptionLog::to_file(&path, true).unwrap();
        second.note("two");
        second.flush();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);

        let truncated = ExceptionLog::to_file(&path, false).unwrap();
        truncated.flush();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
