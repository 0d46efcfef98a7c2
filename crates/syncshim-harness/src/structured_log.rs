//! Structured logging contract for harness runs.
//!
//! Provides:
//! - [`LogEntry`]: canonical JSONL log record with required + optional fields.
//! - [`LogEmitter`]: writes JSONL lines to a file or an in-memory buffer.
//! - [`validate_log_line`]: validates a single JSONL line against the schema.
//! - [`validate_log_file`]: validates an entire JSONL file.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

use syncshim_core::status::{THRD_BUSY, THRD_ERROR, THRD_NOMEM, THRD_SUCCESS, THRD_TIMEDOUT};

// ---------------------------------------------------------------------------
// Log entry
// ---------------------------------------------------------------------------

/// Severity level for log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Scenario outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
    Skip,
}

/// Canonical structured log entry.
///
/// Required fields: `timestamp`, `trace_id`, `level`, `event`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    // Required
    pub timestamp: String,
    pub trace_id: String,
    pub level: LogLevel,
    pub event: String,

    // Optional
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    /// ABI entry point under test (e.g. `shim_mtx_trylock`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    /// Last result code observed from `symbol`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ns: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl LogEntry {
    /// Create a new log entry with required fields only.
    #[must_use]
    pub fn new(trace_id: impl Into<String>, level: LogLevel, event: impl Into<String>) -> Self {
        Self {
            timestamp: now_utc(),
            trace_id: trace_id.into(),
            level,
            event: event.into(),
            scenario: None,
            symbol: None,
            outcome: None,
            result_code: None,
            latency_ns: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_scenario(mut self, scenario: impl Into<String>) -> Self {
        self.scenario = Some(scenario.into());
        self
    }

    #[must_use]
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    #[must_use]
    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    #[must_use]
    pub fn with_result_code(mut self, code: i32) -> Self {
        self.result_code = Some(code);
        self
    }

    /// Set latency in nanoseconds.
    #[must_use]
    pub fn with_latency_ns(mut self, ns: u64) -> Self {
        self.latency_ns = Some(ns);
        self
    }

    /// Set free-form details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Serialize to a single JSONL line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Log emitter
// ---------------------------------------------------------------------------

/// Writes structured JSONL log entries to a file or buffer.
pub struct LogEmitter {
    writer: Box<dyn Write>,
    seq: u64,
    run_id: String,
}

impl LogEmitter {
    /// Create an emitter that writes to a file.
    pub fn to_file(path: &Path, run_id: &str) -> std::io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        Ok(Self::to_writer(std::io::BufWriter::new(file), run_id))
    }

    /// Create an emitter that writes into a discarded Vec<u8> (for testing).
    #[must_use]
    pub fn to_buffer(run_id: &str) -> Self {
        Self::to_writer(Vec::new(), run_id)
    }

    /// Create an emitter over any writer.
    pub fn to_writer(writer: impl Write + 'static, run_id: &str) -> Self {
        Self {
            writer: Box::new(writer),
            seq: 0,
            run_id: run_id.to_string(),
        }
    }

    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Generate the next trace ID.
    fn next_trace_id(&mut self) -> String {
        self.seq += 1;
        format!("{}::{:03}", self.run_id, self.seq)
    }

    /// Emit a log entry with an auto-generated trace_id.
    pub fn emit(&mut self, level: LogLevel, event: &str) -> std::io::Result<LogEntry> {
        let entry = LogEntry::new(self.next_trace_id(), level, event);
        self.write_line(&entry)?;
        Ok(entry)
    }

    /// Emit a fully-populated log entry. An empty `trace_id` is filled in.
    pub fn emit_entry(&mut self, mut entry: LogEntry) -> std::io::Result<LogEntry> {
        if entry.trace_id.is_empty() {
            entry.trace_id = self.next_trace_id();
        }
        self.write_line(&entry)?;
        Ok(entry)
    }

    fn write_line(&mut self, entry: &LogEntry) -> std::io::Result<()> {
        let line = serde_json::to_string(entry).map_err(std::io::Error::other)?;
        writeln!(self.writer, "{line}")
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validation error for a log line.
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

const RESULT_CODES: [i64; 5] = [
    THRD_SUCCESS as i64,
    THRD_ERROR as i64,
    THRD_BUSY as i64,
    THRD_TIMEDOUT as i64,
    THRD_NOMEM as i64,
];

/// Validate a single JSONL line against the schema.
pub fn validate_log_line(
    line: &str,
    line_number: usize,
) -> Result<LogEntry, Vec<LogValidationError>> {
    let mut errors = Vec::new();
    let mut fail = |field: &str, message: String| {
        errors.push(LogValidationError {
            line_number,
            field: field.to_string(),
            message,
        });
    };

    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            fail("<json>", format!("invalid JSON: {e}"));
            return Err(errors);
        }
    };

    let Some(obj) = value.as_object() else {
        fail("<root>", "expected JSON object".to_string());
        return Err(errors);
    };

    for field in ["timestamp", "trace_id", "level", "event"] {
        if !obj.contains_key(field) {
            fail(field, "required field missing".to_string());
        }
    }

    if let Some(level) = obj.get("level").and_then(|v| v.as_str())
        && !["trace", "debug", "info", "warn", "error"].contains(&level)
    {
        fail("level", format!("invalid level: '{level}'"));
    }

    if let Some(outcome) = obj.get("outcome").and_then(|v| v.as_str())
        && !["pass", "fail", "skip"].contains(&outcome)
    {
        fail("outcome", format!("invalid outcome: '{outcome}'"));
    }

    if let Some(code) = obj.get("result_code") {
        match code.as_i64() {
            Some(code) if RESULT_CODES.contains(&code) => {}
            _ => fail("result_code", format!("not a result code: {code}")),
        }
    }

    if let Some(symbol) = obj.get("symbol").and_then(|v| v.as_str())
        && !symbol.starts_with("shim_")
    {
        fail("symbol", format!("not an exported symbol: '{symbol}'"));
    }

    // Outcomes belong to a scenario.
    if obj.contains_key("outcome") && !obj.contains_key("scenario") {
        fail("scenario", "outcome without scenario".to_string());
    }

    if let Some(trace_id) = obj.get("trace_id").and_then(|v| v.as_str()) {
        let well_formed = trace_id
            .rsplit_once("::")
            .is_some_and(|(run, seq)| !run.is_empty() && seq.parse::<u64>().is_ok());
        if !well_formed {
            fail(
                "trace_id",
                format!("trace_id should follow <run_id>::<seq> format, got: '{trace_id}'"),
            );
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    serde_json::from_value::<LogEntry>(value).map_err(|e| {
        vec![LogValidationError {
            line_number,
            field: "<deserialization>".to_string(),
            message: format!("failed to deserialize: {e}"),
        }]
    })
}

/// Validate an entire JSONL file.
///
/// Returns the non-empty line count and any validation errors found.
pub fn validate_log_file(path: &Path) -> Result<(usize, Vec<LogValidationError>), std::io::Error> {
    let content = std::fs::read_to_string(path)?;
    let mut all_errors = Vec::new();
    let mut line_count = 0;

    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        line_count += 1;
        if let Err(errs) = validate_log_line(line, i + 1) {
            all_errors.extend(errs);
        }
    }

    Ok((line_count, all_errors))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Current UTC time as RFC 3339 with millisecond precision.
pub fn now_utc() -> String {
    let duration = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format_utc(duration.as_secs(), duration.subsec_millis())
}

fn format_utc(secs: u64, millis: u32) -> String {
    let (year, month, day) = civil_from_days((secs / 86_400) as i64);
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}.{millis:03}Z",
        (secs % 86_400) / 3600,
        (secs % 3600) / 60,
        secs % 60,
    )
}

/// Days since 1970-01-01 to a proleptic Gregorian date.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_entry_serializes_required_fields() {
        let entry = LogEntry::new("run-1::001", LogLevel::Info, "run_start");
        let json = entry.to_jsonl().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed["timestamp"].is_string());
        assert_eq!(parsed["trace_id"], "run-1::001");
        assert_eq!(parsed["level"], "info");
        assert_eq!(parsed["event"], "run_start");
        assert!(parsed.get("scenario").is_none());
        assert!(parsed.get("result_code").is_none());
    }

    #[test]
    fn log_entry_with_all_optional_fields() {
        let entry = LogEntry::new("run-1::002", LogLevel::Error, "scenario_end")
            .with_scenario("mutex_trylock_busy")
            .with_symbol("shim_mtx_trylock")
            .with_outcome(Outcome::Fail)
            .with_result_code(-2)
            .with_latency_ns(150)
            .with_details(serde_json::json!({"expected": "BUSY"}));

        let json = entry.to_jsonl().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["scenario"], "mutex_trylock_busy");
        assert_eq!(parsed["symbol"], "shim_mtx_trylock");
        assert_eq!(parsed["outcome"], "fail");
        assert_eq!(parsed["result_code"], -2);
        assert_eq!(parsed["latency_ns"], 150);
        assert!(parsed["details"].is_object());
        assert!(validate_log_line(&json, 1).is_ok());
    }

    #[test]
    fn validate_missing_required_field() {
        let json = r#"{"timestamp":"2026-01-01T00:00:00Z","level":"info","event":"test"}"#;
        let errors = validate_log_line(json, 1).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "trace_id"));
    }

    #[test]
    fn validate_invalid_level() {
        let json = r#"{"timestamp":"t","trace_id":"a::1","level":"critical","event":"test"}"#;
        let errors = validate_log_line(json, 1).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "level"));
    }

    #[test]
    fn validate_invalid_json() {
        let errors = validate_log_line("not json at all", 3).unwrap_err();
        assert_eq!(errors[0].field, "<json>");
        assert_eq!(errors[0].line_number, 3);
    }

    #[test]
    fn validate_bad_trace_id_format() {
        for trace_id in ["no-separator", "::7", "run::seq"] {
            let json = format!(
                r#"{{"timestamp":"t","trace_id":"{trace_id}","level":"info","event":"e"}}"#
            );
            let errors = validate_log_line(&json, 1).unwrap_err();
            assert!(errors.iter().any(|e| e.field == "trace_id"), "{trace_id}");
        }
    }

    #[test]
    fn validate_rejects_unknown_result_code() {
        let json = r#"{"timestamp":"t","trace_id":"a::1","level":"info","event":"e","result_code":-9}"#;
        let errors = validate_log_line(json, 1).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "result_code"));
    }

    #[test]
    fn validate_outcome_requires_scenario() {
        let json = r#"{"timestamp":"t","trace_id":"a::1","level":"info","event":"e","outcome":"pass"}"#;
        let errors = validate_log_line(json, 1).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "scenario"));
    }

    #[test]
    fn emitter_generates_sequential_trace_ids() {
        let mut emitter = LogEmitter::to_buffer("run-42");
        let e1 = emitter.emit(LogLevel::Info, "start").unwrap();
        let e2 = emitter.emit(LogLevel::Info, "end").unwrap();
        assert_eq!(e1.trace_id, "run-42::001");
        assert_eq!(e2.trace_id, "run-42::002");
        let e3 = emitter
            .emit_entry(LogEntry::new("", LogLevel::Debug, "filled"))
            .unwrap();
        assert_eq!(e3.trace_id, "run-42::003");
    }

    #[test]
    fn utc_formatting_matches_known_instants() {
        assert_eq!(format_utc(0, 0), "1970-01-01T00:00:00.000Z");
        assert_eq!(format_utc(951_782_400, 5), "2000-02-29T00:00:00.005Z");
        assert_eq!(format_utc(1_767_225_599, 999), "2025-12-31T23:59:59.999Z");
    }
}
