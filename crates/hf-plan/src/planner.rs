//! Materialization planner
//!
//! The state machine that selects which DDL/DML sequence a run emits, given
//! the requested materialization and the discovered state of the target
//! relation. Pure: the engine wires catalog I/O around it, so the same
//! decisions back both `plan` (dry-run) and `run`.

use crate::builder::{DialectCapabilities, StatementBuilder};
use crate::error::{PlanError, PlanResult};
use crate::statement::{ExecutionPlan, PlanEntry, StrategyPath};
use hf_core::config::{IncrementalStrategy, Materialization};
use hf_core::error::CoreError;
use hf_core::model::ModelDefinition;
use hf_core::relation::{Column, RelationState};

/// Column differences between the compiled query and the live relation
#[derive(Debug, Default)]
struct ColumnDrift {
    /// In the query but not the relation; reconciled additively
    added: Vec<Column>,
    /// In the relation but not the query; never dropped automatically
    removed: Vec<String>,
    /// Present in both with different normalized types
    retyped: Vec<String>,
}

impl ColumnDrift {
    /// Compare by case-folded column name, matching warehouse identifier
    /// folding.
    fn compute(query_columns: &[Column], relation_columns: &[Column]) -> Self {
        let mut drift = Self::default();
        for query_column in query_columns {
            let folded = query_column.name.to_lowercase();
            match relation_columns
                .iter()
                .find(|c| c.name.to_lowercase() == folded)
            {
                None => drift.added.push(query_column.clone()),
                Some(existing) if existing.ty != query_column.ty => {
                    drift.retyped.push(query_column.name.clone());
                }
                Some(_) => {}
            }
        }
        for relation_column in relation_columns {
            let folded = relation_column.name.to_lowercase();
            if !query_columns
                .iter()
                .any(|c| c.name.to_lowercase() == folded)
            {
                drift.removed.push(relation_column.name.clone());
            }
        }
        drift
    }

    /// Anything the planner refuses to reconcile automatically
    fn is_destructive(&self) -> bool {
        !self.removed.is_empty() || !self.retyped.is_empty()
    }
}

/// Selects the strategy path and assembles the execution plan
pub struct Planner {
    builder: StatementBuilder,
}

impl Planner {
    pub fn new(caps: DialectCapabilities) -> Self {
        Self {
            builder: StatementBuilder::new(caps),
        }
    }

    pub fn builder(&self) -> &StatementBuilder {
        &self.builder
    }

    /// Plan one run.
    ///
    /// `query_columns` is the compiled query's discovered output shape; it is
    /// only consulted for incremental strategies against an existing
    /// relation and may be empty otherwise.
    pub fn plan(
        &self,
        model: &ModelDefinition,
        state: &RelationState,
        query_columns: &[Column],
    ) -> PlanResult<ExecutionPlan> {
        model.validate()?;
        if model.materialization == Materialization::Incremental
            && model.strategy() == IncrementalStrategy::Merge
            && !self.builder.capabilities().native_merge
        {
            return Err(CoreError::MergeUnsupported {
                name: model.display_name(),
            }
            .into());
        }

        // A full-refresh request forces the absent path from any state.
        if model.full_refresh {
            return Ok(self.full_refresh_plan(model, state));
        }

        match state {
            RelationState::Absent => Ok(self.create_plan(model)),
            RelationState::Exists {
                kind,
                columns,
                properties,
            } => {
                let expected = model.target_kind();
                if *kind != expected {
                    return Err(CoreError::RelationKindMismatch {
                        name: model.display_name(),
                        existing: kind.to_string(),
                        requested: expected.to_string(),
                    }
                    .into());
                }
                match model.materialization {
                    Materialization::View | Materialization::Table => {
                        Ok(self.replace_plan(model))
                    }
                    Materialization::DynamicTable => Ok(self.dynamic_refresh_plan(model, properties)),
                    Materialization::Incremental => {
                        self.incremental_plan(model, columns, query_columns)
                    }
                }
            }
        }
    }

    /// Drop whatever exists (by its discovered kind) and create fresh
    fn full_refresh_plan(&self, model: &ModelDefinition, state: &RelationState) -> ExecutionPlan {
        let mut entries = Vec::new();
        if let Some(kind) = state.kind() {
            entries.push(PlanEntry::Statement(self.builder.drop_relation(
                kind,
                &model.schema,
                &model.name,
            )));
        }
        let mut plan = self.create_plan(model);
        entries.extend(plan.entries.drain(..));
        ExecutionPlan::new(model.display_name(), StrategyPath::Create, entries)
    }

    /// First-time creation; an incremental model's first run materializes the
    /// full query result as a plain table
    fn create_plan(&self, model: &ModelDefinition) -> ExecutionPlan {
        let statement = match model.materialization {
            Materialization::View => self.builder.create_view(model, false),
            Materialization::Table | Materialization::Incremental => {
                self.builder.create_table(model, false)
            }
            Materialization::DynamicTable => match &model.dynamic_table {
                Some(config) => self.builder.create_dynamic_table(model, config),
                // validate() guarantees the config; render a plain table so
                // this arm stays total
                None => self.builder.create_table(model, false),
            },
        };
        ExecutionPlan::new(
            model.display_name(),
            StrategyPath::Create,
            vec![PlanEntry::Statement(statement)],
        )
    }

    /// Replace an existing compatible table or view: atomic when the dialect
    /// supports it, drop-then-create otherwise
    fn replace_plan(&self, model: &ModelDefinition) -> ExecutionPlan {
        let caps = self.builder.capabilities();
        let entries = match model.materialization {
            Materialization::View if caps.atomic_replace_view => {
                vec![PlanEntry::Statement(self.builder.create_view(model, true))]
            }
            Materialization::View => vec![
                PlanEntry::Statement(self.builder.drop_relation(
                    hf_core::relation::RelationKind::View,
                    &model.schema,
                    &model.name,
                )),
                PlanEntry::Statement(self.builder.create_view(model, false)),
            ],
            _ if caps.atomic_replace_table => {
                vec![PlanEntry::Statement(self.builder.create_table(model, true))]
            }
            _ => vec![
                PlanEntry::Statement(self.builder.drop_relation(
                    hf_core::relation::RelationKind::Table,
                    &model.schema,
                    &model.name,
                )),
                PlanEntry::Statement(self.builder.create_table(model, false)),
            ],
        };
        ExecutionPlan::new(model.display_name(), StrategyPath::Replace, entries)
    }

    /// Reconcile a live dynamic table's refresh settings with the model.
    ///
    /// Only settings the property catalog reports with a differing value are
    /// altered; a silent catalog never triggers blind alters. An empty diff
    /// yields an empty plan, since the warehouse refreshes the table on its
    /// own schedule.
    fn dynamic_refresh_plan(
        &self,
        model: &ModelDefinition,
        properties: &std::collections::BTreeMap<String, String>,
    ) -> ExecutionPlan {
        let mut entries = Vec::new();
        if let Some(config) = &model.dynamic_table {
            for (key, value) in config.settings() {
                match properties.get(key) {
                    Some(existing) if existing != &value => {
                        log::debug!(
                            "{}: dynamic setting {} drifted ({} -> {})",
                            model.display_name(),
                            key,
                            existing,
                            value
                        );
                        entries.push(PlanEntry::Statement(
                            self.builder.alter_dynamic_setting(model, key, &value),
                        ));
                    }
                    _ => {}
                }
            }
        }
        ExecutionPlan::new(
            model.display_name(),
            StrategyPath::DynamicTableRefresh,
            entries,
        )
    }

    /// Dispatch an incremental run against an existing compatible table
    fn incremental_plan(
        &self,
        model: &ModelDefinition,
        relation_columns: &[Column],
        query_columns: &[Column],
    ) -> PlanResult<ExecutionPlan> {
        let strategy = model.strategy();

        // Append never reconciles schema; the other strategies get additive
        // reconciliation and refuse destructive drift.
        let reconcile = if strategy == IncrementalStrategy::Append || query_columns.is_empty() {
            Vec::new()
        } else {
            let drift = ColumnDrift::compute(query_columns, relation_columns);
            if drift.is_destructive() {
                return Err(PlanError::SchemaDriftRequiresFullRefresh {
                    target: model.display_name(),
                    removed: drift.removed.join(", "),
                    retyped: drift.retyped.join(", "),
                });
            }
            self.builder.add_columns(model, &drift.added)
        };

        let mut entries: Vec<PlanEntry> = reconcile.into_iter().map(PlanEntry::Statement).collect();
        let (path, strategy_entries) = match strategy {
            IncrementalStrategy::Append => (
                StrategyPath::Append,
                vec![PlanEntry::Statement(self.builder.insert_append(model))],
            ),
            IncrementalStrategy::DeleteInsert => (
                StrategyPath::DeleteInsert,
                self.builder.delete_insert(model, query_columns),
            ),
            IncrementalStrategy::Merge => {
                if query_columns.is_empty() {
                    return Err(CoreError::ConfigInvalid {
                        message: format!(
                            "Model '{}': merge needs the compiled query's column shape, but none was discovered",
                            model.display_name()
                        ),
                    }
                    .into());
                }
                (
                    StrategyPath::Merge,
                    vec![PlanEntry::Statement(self.builder.merge(model, query_columns))],
                )
            }
            IncrementalStrategy::Microbatch => {
                // validate() guarantees the column is set
                let event_time = model
                    .properties
                    .event_time_column
                    .clone()
                    .unwrap_or_default();
                (
                    StrategyPath::Microbatch,
                    self.builder.microbatch(model, &event_time, query_columns),
                )
            }
        };
        entries.extend(strategy_entries);
        Ok(ExecutionPlan::new(model.display_name(), path, entries))
    }
}

#[cfg(test)]
#[path = "planner_test.rs"]
mod tests;
