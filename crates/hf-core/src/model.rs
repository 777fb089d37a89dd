//! Resolved model definition
//!
//! The configuration/templating layer hands the engine a fully-resolved
//! `ModelDefinition`: identity, compiled query text, materialization kind and
//! strategy, storage properties, and the flags the planner branches on.

use crate::config::{
    DynamicTableConfig, IncrementalStrategy, Materialization, StorageProperties,
    MAX_IDENTIFIER_LENGTH,
};
use crate::error::{CoreError, CoreResult};
use crate::relation::RelationKind;
use crate::sql_utils::qualified_name;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One half-open microbatch window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchWindow {
    /// Inclusive lower bound
    pub start: DateTime<Utc>,
    /// Exclusive upper bound
    pub end: DateTime<Utc>,
}

/// A fully-resolved model ready for planning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDefinition {
    /// Target schema
    pub schema: String,

    /// Target relation name
    pub name: String,

    /// Compiled query body (templating already expanded)
    pub compiled_sql: String,

    /// Materialization kind
    #[serde(default)]
    pub materialization: Materialization,

    /// Incremental strategy; None falls back to append
    #[serde(default)]
    pub incremental_strategy: Option<IncrementalStrategy>,

    /// Unique key columns for merge / delete+insert
    #[serde(default)]
    pub unique_key: Vec<String>,

    /// Storage-tuning properties
    #[serde(default)]
    pub properties: StorageProperties,

    /// Dynamic table config; required when materialization is dynamic_table
    #[serde(default)]
    pub dynamic_table: Option<DynamicTableConfig>,

    /// Drop and recreate regardless of existing state
    #[serde(default)]
    pub full_refresh: bool,

    /// Capability flag from the query compiler: whether the compiled query
    /// can be refreshed incrementally by the warehouse
    #[serde(default = "default_true")]
    pub incremental_refresh_supported: bool,

    /// Caller-supplied windows for the microbatch strategy
    #[serde(default)]
    pub batch_windows: Vec<BatchWindow>,
}

impl ModelDefinition {
    /// Quoted, schema-qualified target name
    pub fn qualified_name(&self) -> String {
        qualified_name(&self.schema, &self.name)
    }

    /// Unquoted `schema.name` for log and error messages
    pub fn display_name(&self) -> String {
        if self.schema.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.schema, self.name)
        }
    }

    /// Effective incremental strategy
    pub fn strategy(&self) -> IncrementalStrategy {
        self.incremental_strategy.unwrap_or_default()
    }

    /// Whether created tables must declare the unique key as their primary
    /// key. Keyed incremental strategies upsert or delete by it, and the
    /// warehouse rejects `ON CONFLICT` against a relation with no declared
    /// key.
    pub fn requires_primary_key(&self) -> bool {
        self.materialization == Materialization::Incremental
            && matches!(
                self.strategy(),
                IncrementalStrategy::Merge | IncrementalStrategy::DeleteInsert
            )
            && !self.unique_key.is_empty()
    }

    /// The relation kind this model materializes into
    pub fn target_kind(&self) -> RelationKind {
        match self.materialization {
            Materialization::View => RelationKind::View,
            Materialization::Table | Materialization::Incremental => RelationKind::Table,
            Materialization::DynamicTable => RelationKind::DynamicTable,
        }
    }

    /// Validate the definition before any statement is rendered.
    ///
    /// Covers identifier lengths, storage property limits, and the
    /// per-strategy prerequisites. Errors raised here never leave partial
    /// state behind because nothing has reached the warehouse yet.
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "Model name cannot be empty".to_string(),
            });
        }
        if self.compiled_sql.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: format!("Model '{}' has an empty compiled query", self.display_name()),
            });
        }
        for ident in [&self.schema, &self.name] {
            if ident.len() > MAX_IDENTIFIER_LENGTH {
                return Err(CoreError::IdentifierTooLong {
                    identifier: ident.clone(),
                    max: MAX_IDENTIFIER_LENGTH,
                });
            }
        }

        self.properties.validate()?;

        match self.materialization {
            Materialization::DynamicTable => {
                let config = self.dynamic_table.as_ref().ok_or_else(|| {
                    CoreError::MissingDynamicTableConfig {
                        name: self.display_name(),
                    }
                })?;
                config.validate(&self.name)?;
                if config.auto_refresh_mode == crate::config::AutoRefreshMode::Incremental
                    && !self.incremental_refresh_supported
                {
                    return Err(CoreError::IncrementalRefreshUnsupported {
                        name: self.display_name(),
                    });
                }
            }
            Materialization::Incremental => self.validate_strategy()?,
            Materialization::View | Materialization::Table => {}
        }

        Ok(())
    }

    fn validate_strategy(&self) -> CoreResult<()> {
        match self.strategy() {
            IncrementalStrategy::Append => Ok(()),
            IncrementalStrategy::Merge | IncrementalStrategy::DeleteInsert => {
                if self.unique_key.is_empty() {
                    Err(CoreError::MissingUniqueKey {
                        strategy: self.strategy().to_string(),
                    })
                } else {
                    Ok(())
                }
            }
            IncrementalStrategy::Microbatch => {
                if self.properties.event_time_column.is_none() {
                    return Err(CoreError::MissingEventTimeColumn {
                        name: self.display_name(),
                    });
                }
                if self.batch_windows.is_empty() {
                    return Err(CoreError::MissingBatchWindows {
                        name: self.display_name(),
                    });
                }
                Ok(())
            }
        }
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
#[path = "model_test.rs"]
mod tests;
