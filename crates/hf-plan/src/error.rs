//! Error types for hf-plan

use hf_core::error::CoreError;
use hf_db::error::DbError;
use thiserror::Error;

/// Planning and execution errors
#[derive(Error, Debug)]
pub enum PlanError {
    /// Configuration rejected before any statement reached the warehouse
    #[error(transparent)]
    Config(#[from] CoreError),

    /// Connection or statement failure from the warehouse layer
    #[error(transparent)]
    Db(#[from] DbError),

    /// P001: destructive column change that is never applied automatically
    #[error("[P001] Schema drift on '{target}' requires a full refresh: removed columns [{removed}], changed types [{retyped}]; rerun with full_refresh to rebuild")]
    SchemaDriftRequiresFullRefresh {
        target: String,
        removed: String,
        retyped: String,
    },
}

/// Result type alias for PlanError
pub type PlanResult<T> = Result<T, PlanError>;
