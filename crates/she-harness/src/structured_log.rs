//! Structured JSONL logging for SHE dispatch events.
//!
//! Provides [`LogEntry`], [`LogEmitter`] (writes one JSON object per line to
//! a file or buffer), and [`validate_log_line`]/[`validate_log_file`] for
//! checking that a captured trace is well-formed.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// Severity level for log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Canonical structured log entry for one dispatched SHE command.
///
/// Required fields: `timestamp`, `trace_id`, `level`, `event`. The rest
/// describe the dispatch itself and are left unset for entries that are
/// just narration (e.g. "scenario started").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub trace_id: String,
    pub level: LogLevel,
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sb_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl LogEntry {
    #[must_use]
    pub fn new(trace_id: impl Into<String>, level: LogLevel, event: impl Into<String>) -> Self {
        Self {
            timestamp: now_utc(),
            trace_id: trace_id.into(),
            level,
            event: event.into(),
            client_id: None,
            action: None,
            rc: None,
            sb_state: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_client(mut self, client_id: u16) -> Self {
        self.client_id = Some(client_id);
        self
    }

    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    #[must_use]
    pub fn with_rc(mut self, rc: impl Into<String>) -> Self {
        self.rc = Some(rc.into());
        self
    }

    #[must_use]
    pub fn with_sb_state(mut self, sb_state: impl Into<String>) -> Self {
        self.sb_state = Some(sb_state.into());
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Writes structured JSONL log entries to a file or an in-memory buffer.
pub struct LogEmitter {
    writer: Box<dyn Write>,
    seq: u64,
    run_id: String,
}

impl LogEmitter {
    /// Create an emitter that writes to a file, truncating it first.
    pub fn to_file(path: &Path, run_id: &str) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self {
            writer: Box::new(std::io::BufWriter::new(file)),
            seq: 0,
            run_id: run_id.to_string(),
        })
    }

    /// Create an emitter that writes to an in-memory buffer (for tests).
    #[must_use]
    pub fn to_buffer(run_id: &str) -> Self {
        Self {
            writer: Box::new(Vec::new()),
            seq: 0,
            run_id: run_id.to_string(),
        }
    }

    fn next_trace_id(&mut self) -> String {
        self.seq += 1;
        format!("{}::{:04}", self.run_id, self.seq)
    }

    /// Emit a bare log entry with an auto-generated trace id.
    pub fn emit(&mut self, level: LogLevel, event: &str) -> std::io::Result<LogEntry> {
        let trace_id = self.next_trace_id();
        let entry = LogEntry::new(trace_id, level, event);
        self.emit_entry(entry.clone())?;
        Ok(entry)
    }

    /// Emit a fully-populated entry, filling in `trace_id` if it was left empty.
    pub fn emit_entry(&mut self, mut entry: LogEntry) -> std::io::Result<()> {
        if entry.trace_id.is_empty() {
            entry.trace_id = self.next_trace_id();
        }
        let line = serde_json::to_string(&entry).map_err(std::io::Error::other)?;
        writeln!(self.writer, "{line}")
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

#[derive(Debug)]
pub struct LogValidationError {
    pub line_number: usize,
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for LogValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "line {}: field '{}': {}",
            self.line_number, self.field, self.message
        )
    }
}

/// Validate a single JSONL line against the entry schema.
pub fn validate_log_line(
    line: &str,
    line_number: usize,
) -> Result<LogEntry, Vec<LogValidationError>> {
    serde_json::from_str::<LogEntry>(line).map_err(|e| {
        vec![LogValidationError {
            line_number,
            field: "<root>".to_string(),
            message: format!("does not match LogEntry schema: {e}"),
        }]
    })
}

/// Validate an entire JSONL file, returning the count of valid lines and
/// every error encountered along the way.
pub fn validate_log_file(path: &Path) -> Result<(usize, Vec<LogValidationError>), std::io::Error> {
    let content = std::fs::read_to_string(path)?;
    let mut valid = 0;
    let mut errors = Vec::new();
    for (i, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match validate_log_line(line, i + 1) {
            Ok(_) => valid += 1,
            Err(mut errs) => errors.append(&mut errs),
        }
    }
    Ok((valid, errors))
}

fn now_utc() -> String {
    let duration = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:03}Z", duration.as_secs(), duration.subsec_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_round_trips_through_json() {
        let entry = LogEntry::new("t1", LogLevel::Info, "dispatch")
            .with_client(7)
            .with_action("LoadKey")
            .with_rc("Ok");
        let line = serde_json::to_string(&entry).unwrap();
        let parsed = validate_log_line(&line, 1).unwrap();
        assert_eq!(parsed.action.as_deref(), Some("LoadKey"));
    }

    #[test]
    fn rejects_malformed_line() {
        assert!(validate_log_line("not json at all", 1).is_err());
    }

    #[test]
    fn emitter_assigns_sequential_trace_ids() {
        let mut emitter = LogEmitter::to_buffer("run-1");
        let a = emitter.emit(LogLevel::Info, "start").unwrap();
        let b = emitter.emit(LogLevel::Info, "end").unwrap();
        assert_ne!(a.trace_id, b.trace_id);
    }
}
