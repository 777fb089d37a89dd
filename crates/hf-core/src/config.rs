//! Materialization configuration and warehouse connection settings
//!
//! These types are produced by the project/configuration layer and handed to
//! the planner fully resolved. Validation of the documented Hologres property
//! limits lives here so that no over-limit configuration ever reaches SQL
//! rendering.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// Longest identifier the warehouse accepts for schemas and relations.
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Documented limit on clustering key columns per table.
pub const MAX_CLUSTERING_COLUMNS: usize = 2;

/// Documented limit on bitmap index columns per table.
pub const MAX_BITMAP_COLUMNS: usize = 10;

/// Documented limit on dictionary encoding columns per table.
pub const MAX_DICTIONARY_COLUMNS: usize = 10;

/// Materialization kind for models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Materialization {
    /// Create a view
    #[default]
    View,
    /// Create a table
    Table,
    /// Incremental table (only process new/changed data)
    Incremental,
    /// Warehouse-managed auto-refreshing materialized view
    DynamicTable,
}

impl std::fmt::Display for Materialization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Materialization::View => write!(f, "view"),
            Materialization::Table => write!(f, "table"),
            Materialization::Incremental => write!(f, "incremental"),
            Materialization::DynamicTable => write!(f, "dynamic_table"),
        }
    }
}

/// Incremental strategy for incremental models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IncrementalStrategy {
    /// INSERT new rows only (default)
    #[default]
    Append,
    /// Native upsert based on unique_key
    Merge,
    /// DELETE matching rows then INSERT, in one transaction
    DeleteInsert,
    /// Delete+insert per event-time window, one transaction per window
    Microbatch,
}

impl std::fmt::Display for IncrementalStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IncrementalStrategy::Append => write!(f, "append"),
            IncrementalStrategy::Merge => write!(f, "merge"),
            IncrementalStrategy::DeleteInsert => write!(f, "delete+insert"),
            IncrementalStrategy::Microbatch => write!(f, "microbatch"),
        }
    }
}

/// Physical storage layout of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Column-oriented storage
    Column,
    /// Row-oriented storage
    Row,
    /// Hybrid row/column storage
    RowColumn,
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Orientation::Column => write!(f, "column"),
            Orientation::Row => write!(f, "row"),
            Orientation::RowColumn => write!(f, "row_column"),
        }
    }
}

/// On-disk sort order for a clustering key column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Ascending (default)
    #[default]
    Asc,
    /// Descending
    Desc,
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortOrder::Asc => write!(f, "asc"),
            SortOrder::Desc => write!(f, "desc"),
        }
    }
}

/// One clustering key column with its sort order.
///
/// Configured as `"column"` or `"column:desc"`, matching the warehouse's
/// own `clustering_key` property spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClusteringColumn {
    /// Column name
    pub column: String,
    /// Sort order
    pub order: SortOrder,
}

impl ClusteringColumn {
    /// Ascending clustering column
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: SortOrder::Asc,
        }
    }

    /// Descending clustering column
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: SortOrder::Desc,
        }
    }
}

impl TryFrom<String> for ClusteringColumn {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.split_once(':') {
            None => Ok(Self::asc(value)),
            Some((column, "asc")) => Ok(Self::asc(column)),
            Some((column, "desc")) => Ok(Self::desc(column)),
            Some((_, other)) => Err(CoreError::ConfigInvalid {
                message: format!(
                    "clustering_key order must be 'asc' or 'desc', got '{}' in '{}'",
                    other, value
                ),
            }),
        }
    }
}

impl From<ClusteringColumn> for String {
    fn from(value: ClusteringColumn) -> Self {
        format!("{}:{}", value.column, value.order)
    }
}

/// Hologres storage-tuning properties for table-backed materializations.
///
/// Unset properties are omitted from DDL so the warehouse's own defaults
/// apply. `validate` enforces the documented cardinality limits before any
/// statement is rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StorageProperties {
    /// Physical storage layout
    #[serde(default)]
    pub orientation: Option<Orientation>,

    /// Column(s) sharding rows across compute nodes; at most one column
    /// is accepted (see `validate`)
    #[serde(default)]
    pub distribution_key: Vec<String>,

    /// On-disk sort columns, at most two
    #[serde(default)]
    pub clustering_key: Vec<ClusteringColumn>,

    /// Event-time column for time-windowed pruning; `segment_key` is the
    /// legacy spelling
    #[serde(default, alias = "segment_key")]
    pub event_time_column: Option<String>,

    /// Bitmap-indexed columns, at most ten
    #[serde(default)]
    pub bitmap_columns: Vec<String>,

    /// Dictionary-encoded columns, at most ten
    #[serde(default)]
    pub dictionary_encoding_columns: Vec<String>,

    /// Row TTL in seconds
    #[serde(default)]
    pub time_to_live_in_seconds: Option<u64>,
}

impl StorageProperties {
    /// True when no property is set and the DDL property clause is omitted entirely
    pub fn is_empty(&self) -> bool {
        self.orientation.is_none()
            && self.distribution_key.is_empty()
            && self.clustering_key.is_empty()
            && self.event_time_column.is_none()
            && self.bitmap_columns.is_empty()
            && self.dictionary_encoding_columns.is_empty()
            && self.time_to_live_in_seconds.is_none()
    }

    /// Enforce documented cardinality limits.
    ///
    /// Multi-column distribution keys are rejected outright: the warehouse
    /// accepts them but their row-matching semantics are unconfirmed.
    pub fn validate(&self) -> CoreResult<()> {
        if self.distribution_key.len() > 1 {
            return Err(CoreError::MultiColumnDistributionKey {
                columns: self.distribution_key.join(", "),
            });
        }
        if self.clustering_key.len() > MAX_CLUSTERING_COLUMNS {
            return Err(CoreError::PropertyLimitExceeded {
                property: "clustering_key",
                limit: MAX_CLUSTERING_COLUMNS,
                actual: self.clustering_key.len(),
            });
        }
        if self.bitmap_columns.len() > MAX_BITMAP_COLUMNS {
            return Err(CoreError::PropertyLimitExceeded {
                property: "bitmap_columns",
                limit: MAX_BITMAP_COLUMNS,
                actual: self.bitmap_columns.len(),
            });
        }
        if self.dictionary_encoding_columns.len() > MAX_DICTIONARY_COLUMNS {
            return Err(CoreError::PropertyLimitExceeded {
                property: "dictionary_encoding_columns",
                limit: MAX_DICTIONARY_COLUMNS,
                actual: self.dictionary_encoding_columns.len(),
            });
        }
        Ok(())
    }
}

/// Refresh mode for dynamic tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AutoRefreshMode {
    /// Warehouse picks incremental or full per refresh (default)
    #[default]
    Auto,
    /// Incremental refresh only; requires an incrementally refreshable query
    Incremental,
    /// Full recomputation per refresh
    Full,
}

impl std::fmt::Display for AutoRefreshMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AutoRefreshMode::Auto => write!(f, "auto"),
            AutoRefreshMode::Incremental => write!(f, "incremental"),
            AutoRefreshMode::Full => write!(f, "full"),
        }
    }
}

/// Dynamic table refresh configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicTableConfig {
    /// Target data freshness, e.g. "30 minutes"
    pub freshness: String,

    /// Whether the warehouse refreshes the table on its own schedule
    #[serde(default = "default_true")]
    pub auto_refresh_enable: bool,

    /// Refresh mode
    #[serde(default)]
    pub auto_refresh_mode: AutoRefreshMode,

    /// Compute binding for refreshes
    #[serde(default = "default_computing_resource")]
    pub computing_resource: String,
}

impl DynamicTableConfig {
    /// Minimal config with defaults applied
    pub fn with_freshness(freshness: impl Into<String>) -> Self {
        Self {
            freshness: freshness.into(),
            auto_refresh_enable: true,
            auto_refresh_mode: AutoRefreshMode::default(),
            computing_resource: default_computing_resource(),
        }
    }

    /// Reject configs the warehouse would refuse at CREATE time
    pub fn validate(&self, model_name: &str) -> CoreResult<()> {
        if self.freshness.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: format!("Model '{}': dynamic table freshness cannot be empty", model_name),
            });
        }
        if self.computing_resource.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: format!(
                    "Model '{}': dynamic table computing_resource cannot be empty",
                    model_name
                ),
            });
        }
        Ok(())
    }

    /// The settings this config pins, as (property key, value) pairs in
    /// rendering order. Used both for the CREATE property clause and for
    /// diffing against a live dynamic table's discovered properties.
    pub fn settings(&self) -> Vec<(&'static str, String)> {
        vec![
            ("freshness", self.freshness.clone()),
            ("auto_refresh_enable", self.auto_refresh_enable.to_string()),
            ("auto_refresh_mode", self.auto_refresh_mode.to_string()),
            ("computing_resource", self.computing_resource.clone()),
        ]
    }
}

/// SSL mode for warehouse connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    /// No TLS (default; in-VPC endpoints)
    #[default]
    Disable,
    /// TLS required
    Require,
}

impl std::fmt::Display for SslMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SslMode::Disable => write!(f, "disable"),
            SslMode::Require => write!(f, "require"),
        }
    }
}

/// Warehouse connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Warehouse endpoint host
    pub host: String,

    /// Endpoint port; Hologres endpoints listen on 80, not the usual
    /// PostgreSQL port
    #[serde(default = "default_port")]
    pub port: u16,

    /// User name
    pub user: String,

    /// Password
    pub password: String,

    /// Database name
    pub database: String,

    /// Default schema; empty means no default schema
    #[serde(default)]
    pub schema: String,

    /// Role assumed after connecting
    #[serde(default)]
    pub role: Option<String>,

    /// search_path applied after connecting
    #[serde(default)]
    pub search_path: Option<String>,

    /// Connection pool capacity
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Per-attempt connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// SSL mode
    #[serde(default)]
    pub sslmode: SslMode,

    /// application_name reported to the warehouse
    #[serde(default = "default_application_name")]
    pub application_name: String,

    /// Additional connection-establishment attempts after the first failure.
    /// Query execution is never retried.
    #[serde(default = "default_retries")]
    pub retries: usize,
}

fn default_true() -> bool {
    true
}

fn default_computing_resource() -> String {
    "serverless".to_string()
}

fn default_port() -> u16 {
    80
}

fn default_threads() -> usize {
    1
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_application_name() -> String {
    "holoflow".to_string()
}

fn default_retries() -> usize {
    1
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
