//! Error types for the rebate engine
//!
//! Store failures are isolated to the smallest program boundary that raised
//! them; only `FatalSetup` stops a whole run.

use log::warn;
use thiserror::Error;

/// Failures raised by a `SalesStore` read operation
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("query failed: {0}")]
    Query(String),

    #[error("missing data file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid value for {field}: {value}")]
    Parse { field: String, value: String },
}

/// Engine-level failures, one variant per failure class.
///
/// A lookup that finds no row is not a failure; stores return `Ok(None)`.
#[derive(Error, Debug)]
pub enum RebateError {
    /// A calculator name from the assignment feed has no registered calculator
    #[error("no calculator registered under '{name}'")]
    CalculatorResolution { name: String },

    #[error("lookup failed: {0}")]
    TransientQuery(#[from] StoreError),

    #[error("setup failed: {0}")]
    FatalSetup(String),

    #[error("run cancelled")]
    Cancelled,
}

pub type StoreResult<T> = Result<T, StoreError>;
pub type EngineResult<T> = Result<T, RebateError>;

/// Run-level record of every failure that was degraded to zero
#[derive(Debug, Clone, Default)]
pub struct ErrorSummary {
    messages: Vec<String>,
}

impl ErrorSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log a degraded failure and keep it for the run report
    pub fn record(&mut self, customer_id: &str, program: &str, err: impl std::fmt::Display) {
        let message = format!("customer {}: {}: {}", customer_id, program, err);
        warn!("{}", message);
        self.messages.push(message);
    }

    /// Record a run-level message not tied to one customer
    pub fn note(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<String> {
        self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_converts_to_transient() {
        let err: RebateError = StoreError::Query("timeout".into()).into();
        assert!(matches!(err, RebateError::TransientQuery(_)));
        assert_eq!(err.to_string(), "lookup failed: query failed: timeout");
    }

    #[test]
    fn test_summary_accumulates_messages() {
        let mut summary = ErrorSummary::new();
        summary.record("C001", "vendor A", StoreError::Query("down".into()));
        summary.note("run stopped");

        assert_eq!(summary.len(), 2);
        assert_eq!(summary.messages()[0], "customer C001: vendor A: query failed: down");
    }

    #[test]
    fn test_resolution_message_names_calculator() {
        let err = RebateError::CalculatorResolution { name: "q_mystery".into() };
        assert!(err.to_string().contains("q_mystery"));
    }
}
