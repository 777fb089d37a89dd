//! Plan executor
//!
//! Runs an execution plan statement by statement on one leased connection.
//! Transaction markers drive explicit BEGIN/COMMIT; the first failing
//! statement rolls back the open transaction and aborts the run, while
//! transactions committed earlier in the same run (e.g. prior microbatch
//! windows) stay applied. Cancellation is checked between statements only;
//! an in-flight statement is never interrupted.

use crate::result::{ExecutionResult, RunStatus, StatementOutcome};
use crate::statement::{ExecutionPlan, PlanEntry, Statement, StatementKind};
use hf_db::error::DbResult;
use hf_db::traits::WarehouseClient;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Cooperative cancellation flag shared with the orchestrating caller
pub type CancelFlag = Arc<AtomicBool>;

/// Drives one plan to completion (or first failure)
#[derive(Default)]
pub struct Executor {
    cancel: Option<CancelFlag>,
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor that stops before the next statement once `flag` is set
    pub fn with_cancel(flag: CancelFlag) -> Self {
        Self { cancel: Some(flag) }
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    pub async fn execute(
        &self,
        client: &dyn WarehouseClient,
        plan: &ExecutionPlan,
    ) -> ExecutionResult {
        let run_start = Instant::now();
        let mut statements = Vec::with_capacity(plan.statement_count());
        let mut status = RunStatus::Success;
        let mut in_tx = false;

        for entry in &plan.entries {
            if self.cancelled() {
                log::info!("run against {} cancelled before next statement", plan.target);
                if in_tx {
                    rollback_quietly(client, &plan.target).await;
                }
                status = RunStatus::Cancelled;
                break;
            }

            match entry {
                PlanEntry::Begin => {
                    if let Err(err) = self.boundary(client.begin(), "BEGIN", &mut statements).await
                    {
                        log::warn!("{}: failed to open transaction: {}", plan.target, err);
                        status = RunStatus::Error;
                        break;
                    }
                    in_tx = true;
                }
                PlanEntry::Commit => {
                    if let Err(err) = self
                        .boundary(client.commit(), "COMMIT", &mut statements)
                        .await
                    {
                        log::warn!("{}: commit failed: {}", plan.target, err);
                        rollback_quietly(client, &plan.target).await;
                        status = RunStatus::Error;
                        break;
                    }
                    in_tx = false;
                }
                PlanEntry::Statement(statement) => {
                    let outcome = run_statement(client, statement).await;
                    let failed = outcome.error.is_some();
                    statements.push(outcome);
                    if failed {
                        if statement.best_effort {
                            log::warn!(
                                "{}: best-effort statement failed, continuing",
                                plan.target
                            );
                            continue;
                        }
                        if in_tx {
                            rollback_quietly(client, &plan.target).await;
                            in_tx = false;
                        }
                        status = RunStatus::Error;
                        break;
                    }
                }
            }
        }

        ExecutionResult {
            target: plan.target.clone(),
            strategy: plan.strategy,
            status,
            statements,
            duration_secs: run_start.elapsed().as_secs_f64(),
        }
    }

    /// Run a transaction boundary, recording it as an outcome only on failure
    async fn boundary(
        &self,
        op: impl std::future::Future<Output = DbResult<()>>,
        sql: &str,
        statements: &mut Vec<StatementOutcome>,
    ) -> DbResult<()> {
        let start = Instant::now();
        match op.await {
            Ok(()) => Ok(()),
            Err(err) => {
                statements.push(StatementOutcome {
                    kind: StatementKind::Transaction,
                    sql: sql.to_string(),
                    rows_affected: None,
                    duration_secs: start.elapsed().as_secs_f64(),
                    error: Some(err.to_string()),
                });
                Err(err)
            }
        }
    }
}

async fn run_statement(client: &dyn WarehouseClient, statement: &Statement) -> StatementOutcome {
    let start = Instant::now();
    match client.execute(&statement.sql).await {
        Ok(rows) => StatementOutcome {
            kind: statement.kind,
            sql: statement.sql.clone(),
            rows_affected: Some(rows),
            duration_secs: start.elapsed().as_secs_f64(),
            error: None,
        },
        Err(err) => StatementOutcome {
            kind: statement.kind,
            sql: statement.sql.clone(),
            rows_affected: None,
            duration_secs: start.elapsed().as_secs_f64(),
            error: Some(err.to_string()),
        },
    }
}

/// Best-effort rollback after a failure; the original error wins
async fn rollback_quietly(client: &dyn WarehouseClient, target: &str) {
    if let Err(err) = client.rollback().await {
        log::warn!("{}: rollback failed: {}", target, err);
    }
}

#[cfg(test)]
#[path = "executor_test.rs"]
mod tests;
