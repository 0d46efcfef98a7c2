//! Harness error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown scenario: {0}")]
    UnknownScenario(String),
    #[error("{failed} of {total} scenarios failed")]
    ScenariosFailed { failed: usize, total: usize },
    #[error("{0} invalid log line(s)")]
    InvalidLog(usize),
}
