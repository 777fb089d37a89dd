//! Execution plan data model
//!
//! An `ExecutionPlan` is an ordered list of statements interleaved with
//! transaction-boundary markers. Each statement carries the flags the
//! executor needs: whether the warehouse requires autocommit semantics for
//! it, and whether a failure may be tolerated.

use serde::Serialize;

/// Statement classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    /// CREATE TABLE / VIEW / DYNAMIC TABLE
    DdlCreate,
    /// ALTER TABLE / ALTER DYNAMIC TABLE
    DdlAlter,
    /// DROP of any relation kind
    DdlDrop,
    /// INSERT
    DmlInsert,
    /// DELETE
    DmlDelete,
    /// Native upsert
    DmlMerge,
    /// BEGIN / COMMIT / ROLLBACK issued by the executor
    Transaction,
}

impl std::fmt::Display for StatementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatementKind::DdlCreate => write!(f, "create"),
            StatementKind::DdlAlter => write!(f, "alter"),
            StatementKind::DdlDrop => write!(f, "drop"),
            StatementKind::DmlInsert => write!(f, "insert"),
            StatementKind::DmlDelete => write!(f, "delete"),
            StatementKind::DmlMerge => write!(f, "merge"),
            StatementKind::Transaction => write!(f, "transaction"),
        }
    }
}

/// One SQL statement with its execution flags
#[derive(Debug, Clone, Serialize)]
pub struct Statement {
    /// Classification
    pub kind: StatementKind,
    /// Rendered SQL
    pub sql: String,
    /// Must run with autocommit semantics, outside any explicit transaction
    /// (warehouse restriction on certain DDL)
    pub autocommit: bool,
    /// Failure is logged but does not abort the run; used only for cleanup
    pub best_effort: bool,
}

impl Statement {
    /// Plain statement, transactional execution allowed
    pub fn new(kind: StatementKind, sql: impl Into<String>) -> Self {
        Self {
            kind,
            sql: sql.into(),
            autocommit: false,
            best_effort: false,
        }
    }

    /// Statement the warehouse refuses inside an explicit transaction
    pub fn autocommit(kind: StatementKind, sql: impl Into<String>) -> Self {
        Self {
            autocommit: true,
            ..Self::new(kind, sql)
        }
    }

    /// Mark the statement best-effort
    pub fn best_effort(mut self) -> Self {
        self.best_effort = true;
        self
    }
}

/// One entry of an execution plan
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanEntry {
    /// Open an explicit transaction
    Begin,
    /// Commit the open transaction
    Commit,
    /// Run one statement
    Statement(Statement),
}

/// The strategy path the planner selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyPath {
    /// First-time (or full-refresh) creation
    Create,
    /// Replace an existing compatible table or view
    Replace,
    /// Incremental insert-only
    Append,
    /// Incremental delete+insert in one transaction
    DeleteInsert,
    /// Incremental native upsert
    Merge,
    /// Windowed delete+insert, one transaction per window
    Microbatch,
    /// Reconcile a live dynamic table's refresh settings
    DynamicTableRefresh,
}

impl std::fmt::Display for StrategyPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyPath::Create => write!(f, "create"),
            StrategyPath::Replace => write!(f, "replace"),
            StrategyPath::Append => write!(f, "append"),
            StrategyPath::DeleteInsert => write!(f, "delete+insert"),
            StrategyPath::Merge => write!(f, "merge"),
            StrategyPath::Microbatch => write!(f, "microbatch"),
            StrategyPath::DynamicTableRefresh => write!(f, "dynamic_table_refresh"),
        }
    }
}

/// Ordered statement sequence for one materialization run.
///
/// Owned by the executor for the duration of one run; carries no state
/// beyond the statements themselves.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionPlan {
    /// Unquoted `schema.name` for logs and results
    pub target: String,
    /// Strategy path that produced this plan
    pub strategy: StrategyPath,
    /// Entries in execution order
    pub entries: Vec<PlanEntry>,
}

impl ExecutionPlan {
    pub fn new(target: impl Into<String>, strategy: StrategyPath, entries: Vec<PlanEntry>) -> Self {
        Self {
            target: target.into(),
            strategy,
            entries,
        }
    }

    /// Iterate over the SQL statements, skipping transaction markers
    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.entries.iter().filter_map(|entry| match entry {
            PlanEntry::Statement(statement) => Some(statement),
            _ => None,
        })
    }

    /// Number of SQL statements in the plan
    pub fn statement_count(&self) -> usize {
        self.statements().count()
    }

    /// True when the plan carries no SQL at all (nothing to do)
    pub fn is_empty(&self) -> bool {
        self.statement_count() == 0
    }

    /// Render the plan as a SQL script for dry-run display
    pub fn sql_script(&self) -> String {
        let mut lines = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            match entry {
                PlanEntry::Begin => lines.push("BEGIN;".to_string()),
                PlanEntry::Commit => lines.push("COMMIT;".to_string()),
                PlanEntry::Statement(statement) => lines.push(format!("{};", statement.sql)),
            }
        }
        lines.join("\n")
    }
}
