//! Error types for hf-core

use thiserror::Error;

/// Configuration and validation errors for model definitions
#[derive(Error, Debug)]
pub enum CoreError {
    /// C001: Invalid configuration value
    #[error("[C001] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// C002: Storage property exceeds its documented cardinality limit
    #[error("[C002] Storage property '{property}' allows at most {limit} columns, got {actual}")]
    PropertyLimitExceeded {
        property: &'static str,
        limit: usize,
        actual: usize,
    },

    /// C003: Identifier longer than the warehouse allows
    #[error("[C003] Identifier '{identifier}' is longer than {max} characters")]
    IdentifierTooLong { identifier: String, max: usize },

    /// C004: Multi-column distribution keys are rejected until warehouse
    /// row-matching semantics for them are confirmed
    #[error("[C004] distribution_key must name a single column, got [{columns}]")]
    MultiColumnDistributionKey { columns: String },

    /// C005: Strategy requires a unique key
    #[error("[C005] Incremental strategy '{strategy}' requires unique_key to be specified")]
    MissingUniqueKey { strategy: String },

    /// C006: Microbatch requires an event-time column
    #[error("[C006] Model '{name}' uses microbatch but sets no event_time_column")]
    MissingEventTimeColumn { name: String },

    /// C007: Microbatch requires at least one batch window
    #[error("[C007] Model '{name}' uses microbatch but supplies no batch windows")]
    MissingBatchWindows { name: String },

    /// C008: Target relation exists as a different kind than requested
    #[error("[C008] Relation '{name}' exists as a {existing} but the model requests a {requested}; drop it explicitly or request a full refresh")]
    RelationKindMismatch {
        name: String,
        existing: String,
        requested: String,
    },

    /// C009: Incremental auto-refresh requested for a query that does not support it
    #[error("[C009] Model '{name}' requests auto_refresh_mode = 'incremental' but its query is not incrementally refreshable")]
    IncrementalRefreshUnsupported { name: String },

    /// C010: Dynamic table materialization without a dynamic table config
    #[error("[C010] Model '{name}' is materialized as dynamic_table but has no dynamic table config (freshness is required)")]
    MissingDynamicTableConfig { name: String },

    /// C011: Merge strategy on a warehouse without native upsert
    #[error("[C011] Model '{name}' uses the merge strategy but the target warehouse has no native upsert statement")]
    MergeUnsupported { name: String },
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
