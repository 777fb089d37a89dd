//! Statement builder
//!
//! Pure, side-effect-free rendering of dialect-correct, property-aware SQL.
//! The builder never touches the warehouse; it turns a validated model
//! definition (plus discovered column shapes where a strategy needs them)
//! into `Statement` values for the planner to sequence.

use crate::statement::{PlanEntry, Statement, StatementKind};
use chrono::{DateTime, Utc};
use hf_core::config::{DynamicTableConfig, MAX_IDENTIFIER_LENGTH};
use hf_core::model::{BatchWindow, ModelDefinition};
use hf_core::relation::{Column, RelationKind};
use hf_core::sql_utils::{escape_sql_string, qualified_name, quote_ident};
use std::collections::HashSet;

/// Suffix of the staging relation keyed incremental strategies build from
const STAGING_SUFFIX: &str = "__hf_tmp";

/// What the target warehouse can do natively.
///
/// Carried per engine instance rather than hard-coded so the planner can
/// branch on replace/upsert support without warehouse-specific knowledge.
#[derive(Debug, Clone, Copy)]
pub struct DialectCapabilities {
    /// `CREATE OR REPLACE TABLE` is atomic
    pub atomic_replace_table: bool,
    /// `CREATE OR REPLACE VIEW` is atomic
    pub atomic_replace_view: bool,
    /// `INSERT ... ON CONFLICT` upsert is available
    pub native_merge: bool,
}

impl DialectCapabilities {
    /// The Hologres capability set: views replace atomically, tables do not,
    /// and upsert is native.
    pub fn hologres() -> Self {
        Self {
            atomic_replace_table: false,
            atomic_replace_view: true,
            native_merge: true,
        }
    }
}

impl Default for DialectCapabilities {
    fn default() -> Self {
        Self::hologres()
    }
}

/// Renders SQL statements for one model
#[derive(Debug, Clone, Copy)]
pub struct StatementBuilder {
    caps: DialectCapabilities,
}

impl StatementBuilder {
    pub fn new(caps: DialectCapabilities) -> Self {
        Self { caps }
    }

    pub fn capabilities(&self) -> DialectCapabilities {
        self.caps
    }

    /// `CREATE TABLE ... [WITH (properties)] AS query`.
    ///
    /// `or_replace` is only honored when the dialect replaces tables
    /// atomically; callers fall back to drop-then-create otherwise.
    pub fn create_table(&self, model: &ModelDefinition, or_replace: bool) -> Statement {
        let verb = if or_replace && self.caps.atomic_replace_table {
            "CREATE OR REPLACE TABLE"
        } else {
            "CREATE TABLE"
        };
        let mut sql = format!("{} {}", verb, model.qualified_name());
        if let Some(clause) = properties_clause(model) {
            sql.push_str(" WITH (");
            sql.push_str(&clause);
            sql.push(')');
        }
        sql.push_str(" AS ");
        sql.push_str(&model.compiled_sql);
        Statement::new(StatementKind::DdlCreate, sql)
    }

    /// `CREATE [OR REPLACE] VIEW ... AS query`
    pub fn create_view(&self, model: &ModelDefinition, or_replace: bool) -> Statement {
        let verb = if or_replace && self.caps.atomic_replace_view {
            "CREATE OR REPLACE VIEW"
        } else {
            "CREATE VIEW"
        };
        let sql = format!("{} {} AS {}", verb, model.qualified_name(), model.compiled_sql);
        Statement::new(StatementKind::DdlCreate, sql)
    }

    /// `CREATE DYNAMIC TABLE ... WITH (freshness, refresh settings, storage
    /// properties) AS query`. Dynamic-table DDL must run with autocommit
    /// semantics.
    pub fn create_dynamic_table(
        &self,
        model: &ModelDefinition,
        config: &DynamicTableConfig,
    ) -> Statement {
        let mut parts: Vec<String> = config
            .settings()
            .iter()
            .map(|(key, value)| format!("{} = '{}'", key, escape_sql_string(value)))
            .collect();
        if let Some(clause) = properties_clause(model) {
            parts.push(clause);
        }
        let sql = format!(
            "CREATE DYNAMIC TABLE {} WITH ({}) AS {}",
            model.qualified_name(),
            parts.join(", "),
            model.compiled_sql
        );
        Statement::autocommit(StatementKind::DdlCreate, sql)
    }

    /// Kind-correct `DROP ... IF EXISTS`
    pub fn drop_relation(&self, kind: RelationKind, schema: &str, name: &str) -> Statement {
        let noun = match kind {
            RelationKind::Table => "TABLE",
            RelationKind::View => "VIEW",
            RelationKind::DynamicTable => "DYNAMIC TABLE",
        };
        let sql = format!("DROP {} IF EXISTS {}", noun, qualified_name(schema, name));
        if kind == RelationKind::DynamicTable {
            Statement::autocommit(StatementKind::DdlDrop, sql)
        } else {
            Statement::new(StatementKind::DdlDrop, sql)
        }
    }

    /// Append strategy: insert the full query result into the existing
    /// relation. No deduplication; duplicate handling is the caller's
    /// responsibility.
    pub fn insert_append(&self, model: &ModelDefinition) -> Statement {
        let sql = format!(
            "INSERT INTO {} {}",
            model.qualified_name(),
            model.compiled_sql
        );
        Statement::new(StatementKind::DmlInsert, sql)
    }

    /// Delete+insert strategy.
    ///
    /// The compiled query is materialized once into a staging table so the
    /// delete and the insert see the same result set (re-evaluating a
    /// non-deterministic query between them could delete keys that are never
    /// re-inserted). The DML pair shares one transaction so a failure between
    /// them leaves the target unchanged; the trailing staging drop is
    /// best-effort cleanup.
    pub fn delete_insert(
        &self,
        model: &ModelDefinition,
        query_columns: &[Column],
    ) -> Vec<PlanEntry> {
        let staging = staging_qualified(model);
        vec![
            PlanEntry::Statement(self.drop_staging(model, false)),
            PlanEntry::Statement(self.create_staging(model)),
            PlanEntry::Begin,
            PlanEntry::Statement(self.delete_matching_keys(model, &staging)),
            PlanEntry::Statement(self.insert_from_staging(model, &staging, query_columns)),
            PlanEntry::Commit,
            PlanEntry::Statement(self.drop_staging(model, true)),
        ]
    }

    /// Materialize the compiled query into the staging table
    fn create_staging(&self, model: &ModelDefinition) -> Statement {
        let sql = format!(
            "CREATE TABLE {} AS {}",
            staging_qualified(model),
            model.compiled_sql
        );
        Statement::new(StatementKind::DdlCreate, sql)
    }

    /// Drop the staging table; `best_effort` for post-run cleanup, plain for
    /// clearing leftovers of a previously failed run
    fn drop_staging(&self, model: &ModelDefinition, best_effort: bool) -> Statement {
        let sql = format!("DROP TABLE IF EXISTS {}", staging_qualified(model));
        let statement = Statement::new(StatementKind::DdlDrop, sql);
        if best_effort {
            statement.best_effort()
        } else {
            statement
        }
    }

    fn delete_matching_keys(&self, model: &ModelDefinition, staging: &str) -> Statement {
        let keys: Vec<String> = model.unique_key.iter().map(|k| quote_ident(k)).collect();
        let key_expr = if keys.len() == 1 {
            keys[0].clone()
        } else {
            format!("({})", keys.join(", "))
        };
        let sql = format!(
            "DELETE FROM {} WHERE {} IN (SELECT {} FROM {})",
            model.qualified_name(),
            key_expr,
            keys.join(", "),
            staging
        );
        Statement::new(StatementKind::DmlDelete, sql)
    }

    /// Insert the staged result set; an explicit column list when the query
    /// shape is known guards against ordinal mismatches after ADD COLUMN
    fn insert_from_staging(
        &self,
        model: &ModelDefinition,
        staging: &str,
        query_columns: &[Column],
    ) -> Statement {
        let sql = if query_columns.is_empty() {
            format!(
                "INSERT INTO {} SELECT * FROM {}",
                model.qualified_name(),
                staging
            )
        } else {
            let columns: Vec<String> = query_columns
                .iter()
                .map(|c| quote_ident(&c.name))
                .collect();
            format!(
                "INSERT INTO {} ({}) SELECT {} FROM {}",
                model.qualified_name(),
                columns.join(", "),
                columns.join(", "),
                staging
            )
        };
        Statement::new(StatementKind::DmlInsert, sql)
    }

    /// Merge strategy: one native upsert matching on the unique key,
    /// updating non-key columns on match and inserting on no-match.
    ///
    /// `query_columns` is the compiled query's discovered output shape; key
    /// matching against it is case-insensitive like the warehouse's own
    /// identifier folding.
    pub fn merge(&self, model: &ModelDefinition, query_columns: &[Column]) -> Statement {
        let key_set: HashSet<String> = model
            .unique_key
            .iter()
            .map(|k| k.to_lowercase())
            .collect();
        let columns: Vec<String> = query_columns
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect();
        let updates: Vec<String> = query_columns
            .iter()
            .filter(|c| !key_set.contains(&c.name.to_lowercase()))
            .map(|c| {
                let quoted = quote_ident(&c.name);
                format!("{} = excluded.{}", quoted, quoted)
            })
            .collect();
        let conflict: Vec<String> = model.unique_key.iter().map(|k| quote_ident(k)).collect();
        let action = if updates.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", updates.join(", "))
        };
        let sql = format!(
            "INSERT INTO {} ({}) SELECT {} FROM ({}) AS src ON CONFLICT ({}) {}",
            model.qualified_name(),
            columns.join(", "),
            columns.join(", "),
            model.compiled_sql,
            conflict.join(", "),
            action
        );
        Statement::new(StatementKind::DmlMerge, sql)
    }

    /// Microbatch strategy: one delete+insert per event-time window, each in
    /// its own transaction so a mid-run failure leaves only the unfinished
    /// windows un-applied.
    ///
    /// The compiled query is materialized once into a staging table up
    /// front; every window deletes and inserts against that single result
    /// set rather than re-evaluating the query per window.
    pub fn microbatch(
        &self,
        model: &ModelDefinition,
        event_time: &str,
        query_columns: &[Column],
    ) -> Vec<PlanEntry> {
        let staging = staging_qualified(model);
        let mut entries = Vec::with_capacity(model.batch_windows.len() * 4 + 3);
        entries.push(PlanEntry::Statement(self.drop_staging(model, false)));
        entries.push(PlanEntry::Statement(self.create_staging(model)));
        for window in &model.batch_windows {
            entries.push(PlanEntry::Begin);
            entries.push(PlanEntry::Statement(self.delete_window(
                model, event_time, window,
            )));
            entries.push(PlanEntry::Statement(self.insert_window(
                model,
                &staging,
                event_time,
                window,
                query_columns,
            )));
            entries.push(PlanEntry::Commit);
        }
        entries.push(PlanEntry::Statement(self.drop_staging(model, true)));
        entries
    }

    fn delete_window(
        &self,
        model: &ModelDefinition,
        event_time: &str,
        window: &BatchWindow,
    ) -> Statement {
        let sql = format!(
            "DELETE FROM {} WHERE {}",
            model.qualified_name(),
            window_predicate(event_time, window)
        );
        Statement::new(StatementKind::DmlDelete, sql)
    }

    fn insert_window(
        &self,
        model: &ModelDefinition,
        staging: &str,
        event_time: &str,
        window: &BatchWindow,
        query_columns: &[Column],
    ) -> Statement {
        let (insert_columns, select_list) = if query_columns.is_empty() {
            (String::new(), "*".to_string())
        } else {
            let columns: Vec<String> = query_columns
                .iter()
                .map(|c| quote_ident(&c.name))
                .collect();
            (format!(" ({})", columns.join(", ")), columns.join(", "))
        };
        let sql = format!(
            "INSERT INTO {}{} SELECT {} FROM {} WHERE {}",
            model.qualified_name(),
            insert_columns,
            select_list,
            staging,
            window_predicate(event_time, window)
        );
        Statement::new(StatementKind::DmlInsert, sql)
    }

    /// Additive schema reconciliation: one `ADD COLUMN` per missing column.
    /// Alters run with autocommit semantics, before the strategy's own
    /// transaction opens.
    pub fn add_columns(&self, model: &ModelDefinition, added: &[Column]) -> Vec<Statement> {
        added
            .iter()
            .map(|column| {
                let sql = format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    model.qualified_name(),
                    quote_ident(&column.name),
                    column.ty
                );
                Statement::autocommit(StatementKind::DdlAlter, sql)
            })
            .collect()
    }

    /// Reconcile one refresh setting of a live dynamic table
    pub fn alter_dynamic_setting(
        &self,
        model: &ModelDefinition,
        key: &str,
        value: &str,
    ) -> Statement {
        let sql = format!(
            "ALTER DYNAMIC TABLE {} SET ({} = '{}')",
            model.qualified_name(),
            key,
            escape_sql_string(value)
        );
        Statement::autocommit(StatementKind::DdlAlter, sql)
    }
}

/// Half-open window predicate over the event-time column
fn window_predicate(event_time: &str, window: &BatchWindow) -> String {
    let column = quote_ident(event_time);
    format!(
        "{} >= {} AND {} < {}",
        column,
        timestamptz_literal(&window.start),
        column,
        timestamptz_literal(&window.end)
    )
}

fn timestamptz_literal(ts: &DateTime<Utc>) -> String {
    format!("TIMESTAMPTZ '{}'", ts.format("%Y-%m-%d %H:%M:%S%:z"))
}

/// Staging relation name for a model, kept within the identifier limit
fn staging_name(model: &ModelDefinition) -> String {
    let max_base = MAX_IDENTIFIER_LENGTH - STAGING_SUFFIX.len();
    let base: String = model.name.chars().take(max_base).collect();
    format!("{}{}", base, STAGING_SUFFIX)
}

fn staging_qualified(model: &ModelDefinition) -> String {
    qualified_name(&model.schema, &staging_name(model))
}

/// The storage property clause, assembled only from properties that are set.
///
/// Keyed incremental models additionally pin the unique key as the table's
/// primary key; without a declared key the warehouse rejects
/// `ON CONFLICT` upserts outright. Returns None when nothing is set so the
/// warehouse's own defaults apply (an empty `WITH ()` would be a syntax
/// error anyway).
fn properties_clause(model: &ModelDefinition) -> Option<String> {
    let props = &model.properties;
    let mut parts = Vec::new();
    if model.requires_primary_key() {
        parts.push(format!("primary_key = '{}'", model.unique_key.join(",")));
    }
    if let Some(orientation) = props.orientation {
        parts.push(format!("orientation = '{}'", orientation));
    }
    if !props.distribution_key.is_empty() {
        parts.push(format!(
            "distribution_key = '{}'",
            props.distribution_key.join(",")
        ));
    }
    if !props.clustering_key.is_empty() {
        let rendered: Vec<String> = props
            .clustering_key
            .iter()
            .map(|c| format!("{}:{}", c.column, c.order))
            .collect();
        parts.push(format!("clustering_key = '{}'", rendered.join(",")));
    }
    if let Some(column) = &props.event_time_column {
        parts.push(format!("event_time_column = '{}'", column));
    }
    if !props.bitmap_columns.is_empty() {
        parts.push(format!(
            "bitmap_columns = '{}'",
            props.bitmap_columns.join(",")
        ));
    }
    if !props.dictionary_encoding_columns.is_empty() {
        parts.push(format!(
            "dictionary_encoding_columns = '{}'",
            props.dictionary_encoding_columns.join(",")
        ));
    }
    if let Some(ttl) = props.time_to_live_in_seconds {
        parts.push(format!("time_to_live_in_seconds = '{}'", ttl));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

#[cfg(test)]
#[path = "builder_test.rs"]
mod tests;
