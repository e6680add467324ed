//! Error and warning sink
//!
//! Recoverable failures (batched capture/release/migrate incompatibilities,
//! contained dispatch errors) and casting warnings are reported here instead
//! of unwinding.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Severity of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Something was coerced or ignored
    Warning,
    /// Something failed but execution continued
    Error,
}

/// One reported problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Severity
    pub severity: Severity,
    /// Human-readable message
    pub message: String,
    /// Agent executing when the problem occurred
    pub agent: Option<String>,
}

/// Receiver of recoverable errors and warnings
pub trait ErrorSink: Send + Sync {
    /// Record a report
    fn report(&self, report: Report);
}

/// Sink forwarding every report to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn report(&self, report: Report) {
        let agent = report.agent.as_deref().unwrap_or("-");
        match report.severity {
            Severity::Warning => tracing::warn!(agent, "{}", report.message),
            Severity::Error => tracing::error!(agent, "{}", report.message),
        }
    }
}

/// Sink that keeps reports in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    reports: Mutex<Vec<Report>>,
}

impl CollectingSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// All reports so far
    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().clone()
    }

    /// Reports of error severity
    pub fn errors(&self) -> Vec<Report> {
        self.filtered(Severity::Error)
    }

    /// Reports of warning severity
    pub fn warnings(&self) -> Vec<Report> {
        self.filtered(Severity::Warning)
    }

    fn filtered(&self, severity: Severity) -> Vec<Report> {
        self.reports
            .lock()
            .iter()
            .filter(|report| report.severity == severity)
            .cloned()
            .collect()
    }
}

impl ErrorSink for CollectingSink {
    fn report(&self, report: Report) {
        self.reports.lock().push(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_sink_filters() {
        let sink = CollectingSink::new();
        sink.report(Report {
            severity: Severity::Warning,
            message: "casted".into(),
            agent: None,
        });
        sink.report(Report {
            severity: Severity::Error,
            message: "failed".into(),
            agent: Some("prey0".into()),
        });
        assert_eq!(sink.reports().len(), 2);
        assert_eq!(sink.errors()[0].agent.as_deref(), Some("prey0"));
        assert_eq!(sink.warnings()[0].message, "casted");
    }
}
