//! hf-plan - Materialization planning for Holoflow
//!
//! This crate turns a resolved model definition and the discovered state of
//! its target relation into an ordered, transaction-aware statement sequence
//! and runs it: the statement builder (pure SQL rendering), the planner
//! state machine, the executor, and the `Engine` facade.

pub mod builder;
pub mod engine;
pub mod error;
pub mod executor;
pub mod planner;
pub mod result;
pub mod statement;

pub use builder::{DialectCapabilities, StatementBuilder};
pub use engine::Engine;
pub use error::{PlanError, PlanResult};
pub use executor::{CancelFlag, Executor};
pub use planner::Planner;
pub use result::{ExecutionResult, RunStatus, StatementOutcome};
pub use statement::{ExecutionPlan, PlanEntry, Statement, StatementKind, StrategyPath};
