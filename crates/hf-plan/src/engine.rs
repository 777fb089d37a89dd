//! Engine: the outward face of the materialization core
//!
//! Wires the relation catalog around the pure planner and hands the
//! resulting plan to the executor on a leased connection. One engine serves
//! many models; callers are responsible for not running two writes against
//! the same (schema, name) target concurrently.

use crate::builder::DialectCapabilities;
use crate::error::PlanResult;
use crate::executor::{CancelFlag, Executor};
use crate::planner::Planner;
use crate::result::ExecutionResult;
use crate::statement::ExecutionPlan;
use hf_core::config::{ConnectionConfig, Materialization};
use hf_core::model::ModelDefinition;
use hf_core::relation::{Column, RelationState};
use hf_db::pool::{ConnectionHandle, ConnectionPool};
use hf_db::catalog;

/// Materialization engine over one connection pool
pub struct Engine {
    pool: ConnectionPool,
    planner: Planner,
}

impl Engine {
    /// Engine with the Hologres capability set
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_capabilities(config, DialectCapabilities::hologres())
    }

    pub fn with_capabilities(config: ConnectionConfig, caps: DialectCapabilities) -> Self {
        Self {
            pool: ConnectionPool::new(config),
            planner: Planner::new(caps),
        }
    }

    /// The underlying connection pool
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Plan one run without mutating the warehouse.
    ///
    /// Reads catalog state over a leased connection, then plans purely;
    /// usable for dry-run / show-SQL tooling.
    pub async fn plan(&self, model: &ModelDefinition) -> PlanResult<ExecutionPlan> {
        model.validate()?;
        let handle = self.pool.acquire().await?;
        let (state, query_columns) = self.inspect(&handle, model).await?;
        self.planner.plan(model, &state, &query_columns)
    }

    /// Plan and execute one run
    pub async fn run(&self, model: &ModelDefinition) -> PlanResult<ExecutionResult> {
        self.run_with(model, Executor::new()).await
    }

    /// Plan and execute one run, stopping before the next statement once
    /// `cancel` is set
    pub async fn run_cancellable(
        &self,
        model: &ModelDefinition,
        cancel: CancelFlag,
    ) -> PlanResult<ExecutionResult> {
        self.run_with(model, Executor::with_cancel(cancel)).await
    }

    async fn run_with(
        &self,
        model: &ModelDefinition,
        executor: Executor,
    ) -> PlanResult<ExecutionResult> {
        model.validate()?;
        let handle = self.pool.acquire().await?;
        let (state, query_columns) = self.inspect(&handle, model).await?;
        let plan = self.planner.plan(model, &state, &query_columns)?;
        log::info!(
            "running {} via {} ({} statements)",
            plan.target,
            plan.strategy,
            plan.statement_count()
        );
        Ok(executor.execute(&handle, &plan).await)
    }

    /// Health check: one connection, one trivial query, released
    pub async fn test_connection(&self) -> PlanResult<()> {
        self.pool.test_connection().await?;
        Ok(())
    }

    /// Discover the relation state plus, when an incremental strategy will
    /// need it, the compiled query's column shape
    async fn inspect(
        &self,
        handle: &ConnectionHandle,
        model: &ModelDefinition,
    ) -> PlanResult<(RelationState, Vec<Column>)> {
        let state = catalog::describe(handle, &model.schema, &model.name).await?;
        let query_columns = if model.materialization == Materialization::Incremental
            && state.exists()
            && !model.full_refresh
        {
            catalog::describe_query(handle, &model.compiled_sql).await?
        } else {
            Vec::new()
        };
        Ok((state, query_columns))
    }
}
