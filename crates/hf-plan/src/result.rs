//! Per-run execution results
//!
//! Constructed by the executor, returned to the caller, then discarded; the
//! engine keeps no persistent history.

use crate::statement::{StatementKind, StrategyPath};
use serde::Serialize;

/// Aggregate outcome of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every statement succeeded
    Success,
    /// A statement failed; the run stopped there
    Error,
    /// The run was cancelled between statements
    Cancelled,
}

/// Outcome of one statement
#[derive(Debug, Clone, Serialize)]
pub struct StatementOutcome {
    /// Statement classification
    pub kind: StatementKind,
    /// The SQL that ran (or failed)
    pub sql: String,
    /// Rows affected on success
    pub rows_affected: Option<u64>,
    /// Wall-clock execution time
    pub duration_secs: f64,
    /// Warehouse error text on failure
    pub error: Option<String>,
}

/// Result of one materialization run
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    /// Unquoted `schema.name`
    pub target: String,
    /// Strategy path that produced the plan
    pub strategy: StrategyPath,
    /// Aggregate status
    pub status: RunStatus,
    /// Per-statement outcomes, in execution order
    pub statements: Vec<StatementOutcome>,
    /// Total run duration
    pub duration_secs: f64,
}

impl ExecutionResult {
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Success
    }

    /// Total rows affected across all successful statements
    pub fn rows_affected(&self) -> u64 {
        self.statements
            .iter()
            .filter_map(|s| s.rows_affected)
            .sum()
    }

    /// First error recorded, if any
    pub fn first_error(&self) -> Option<&str> {
        self.statements
            .iter()
            .find_map(|s| s.error.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(rows: Option<u64>, error: Option<&str>) -> StatementOutcome {
        StatementOutcome {
            kind: StatementKind::DmlInsert,
            sql: "INSERT ...".to_string(),
            rows_affected: rows,
            duration_secs: 0.01,
            error: error.map(String::from),
        }
    }

    #[test]
    fn test_rows_affected_sums_successes() {
        let result = ExecutionResult {
            target: "analytics.orders".to_string(),
            strategy: StrategyPath::DeleteInsert,
            status: RunStatus::Success,
            statements: vec![outcome(Some(3), None), outcome(Some(7), None)],
            duration_secs: 0.1,
        };
        assert!(result.succeeded());
        assert_eq!(result.rows_affected(), 10);
        assert!(result.first_error().is_none());
    }

    #[test]
    fn test_first_error() {
        let result = ExecutionResult {
            target: "analytics.orders".to_string(),
            strategy: StrategyPath::Append,
            status: RunStatus::Error,
            statements: vec![outcome(Some(1), None), outcome(None, Some("boom"))],
            duration_secs: 0.1,
        };
        assert!(!result.succeeded());
        assert_eq!(result.first_error(), Some("boom"));
    }

    #[test]
    fn test_result_serializes() {
        let result = ExecutionResult {
            target: "analytics.orders".to_string(),
            strategy: StrategyPath::Merge,
            status: RunStatus::Success,
            statements: vec![outcome(Some(2), None)],
            duration_secs: 0.2,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["strategy"], "merge");
        assert_eq!(json["status"], "success");
        assert_eq!(json["statements"][0]["kind"], "dml_insert");
    }
}
