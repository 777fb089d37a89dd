use super::*;
use crate::statement::{Statement, StatementKind};
use chrono::{TimeZone, Utc};
use hf_core::config::{DynamicTableConfig, Orientation, StorageProperties};
use hf_core::model::BatchWindow;
use hf_core::relation::{ColumnType, RelationKind};
use std::collections::BTreeMap;

fn planner() -> Planner {
    Planner::new(DialectCapabilities::hologres())
}

fn table_model() -> ModelDefinition {
    ModelDefinition {
        schema: "analytics".to_string(),
        name: "orders".to_string(),
        compiled_sql: "select order_id, amount from raw.orders".to_string(),
        materialization: Materialization::Table,
        incremental_strategy: None,
        unique_key: Vec::new(),
        properties: StorageProperties::default(),
        dynamic_table: None,
        full_refresh: false,
        incremental_refresh_supported: true,
        batch_windows: Vec::new(),
    }
}

fn incremental_model(strategy: IncrementalStrategy) -> ModelDefinition {
    ModelDefinition {
        materialization: Materialization::Incremental,
        incremental_strategy: Some(strategy),
        unique_key: vec!["order_id".to_string()],
        ..table_model()
    }
}

fn order_columns() -> Vec<Column> {
    vec![
        Column::new("order_id", ColumnType::Integer),
        Column::new("amount", ColumnType::Float),
    ]
}

fn exists_table(columns: Vec<Column>) -> RelationState {
    RelationState::Exists {
        kind: RelationKind::Table,
        columns,
        properties: BTreeMap::new(),
    }
}

fn statements(plan: &ExecutionPlan) -> Vec<&Statement> {
    plan.statements().collect()
}

#[test]
fn test_absent_state_yields_exactly_one_create() {
    let plan = planner()
        .plan(&table_model(), &RelationState::Absent, &[])
        .unwrap();
    assert_eq!(plan.strategy, StrategyPath::Create);
    let stmts = statements(&plan);
    assert_eq!(stmts.len(), 1);
    assert_eq!(stmts[0].kind, StatementKind::DdlCreate);
    assert!(!plan
        .statements()
        .any(|s| matches!(s.kind, StatementKind::DmlDelete | StatementKind::DdlAlter)));
}

#[test]
fn test_absent_table_with_properties_scenario() {
    // target absent, kind=table, {orientation: column, distribution_key: [order_id]}
    let model = ModelDefinition {
        properties: StorageProperties {
            orientation: Some(Orientation::Column),
            distribution_key: vec!["order_id".to_string()],
            ..Default::default()
        },
        ..table_model()
    };
    let plan = planner().plan(&model, &RelationState::Absent, &[]).unwrap();
    let stmts = statements(&plan);
    assert_eq!(stmts.len(), 1);
    assert!(stmts[0].sql.starts_with("CREATE TABLE"));
    assert!(stmts[0]
        .sql
        .contains("orientation = 'column', distribution_key = 'order_id'"));
}

#[test]
fn test_absent_incremental_creates_full_table_with_declared_key() {
    let plan = planner()
        .plan(
            &incremental_model(IncrementalStrategy::Merge),
            &RelationState::Absent,
            &[],
        )
        .unwrap();
    assert_eq!(plan.strategy, StrategyPath::Create);
    let stmts = statements(&plan);
    assert_eq!(stmts.len(), 1);
    assert!(stmts[0].sql.starts_with("CREATE TABLE"));
    // the unique key becomes the primary key so later merges can upsert
    assert!(stmts[0].sql.contains("primary_key = 'order_id'"));
}

#[test]
fn test_existing_table_is_replaced_by_drop_and_create() {
    // Hologres lacks atomic table replace, so replace = drop + create
    let plan = planner()
        .plan(&table_model(), &exists_table(order_columns()), &[])
        .unwrap();
    assert_eq!(plan.strategy, StrategyPath::Replace);
    let stmts = statements(&plan);
    assert_eq!(stmts.len(), 2);
    assert_eq!(stmts[0].kind, StatementKind::DdlDrop);
    assert!(stmts[0].sql.starts_with("DROP TABLE IF EXISTS"));
    assert_eq!(stmts[1].kind, StatementKind::DdlCreate);
}

#[test]
fn test_existing_table_replaced_atomically_when_dialect_allows() {
    let caps = DialectCapabilities {
        atomic_replace_table: true,
        ..DialectCapabilities::hologres()
    };
    let plan = Planner::new(caps)
        .plan(&table_model(), &exists_table(order_columns()), &[])
        .unwrap();
    let stmts = statements(&plan);
    assert_eq!(stmts.len(), 1);
    assert!(stmts[0].sql.starts_with("CREATE OR REPLACE TABLE"));
}

#[test]
fn test_existing_view_replaced_atomically() {
    let model = ModelDefinition {
        materialization: Materialization::View,
        ..table_model()
    };
    let state = RelationState::Exists {
        kind: RelationKind::View,
        columns: Vec::new(),
        properties: BTreeMap::new(),
    };
    let plan = planner().plan(&model, &state, &[]).unwrap();
    let stmts = statements(&plan);
    assert_eq!(stmts.len(), 1);
    assert!(stmts[0].sql.starts_with("CREATE OR REPLACE VIEW"));
}

#[test]
fn test_kind_mismatch_fails_fast() {
    // exists as view, model requests table
    let state = RelationState::Exists {
        kind: RelationKind::View,
        columns: Vec::new(),
        properties: BTreeMap::new(),
    };
    let err = planner().plan(&table_model(), &state, &[]).unwrap_err();
    match err {
        PlanError::Config(CoreError::RelationKindMismatch {
            existing, requested, ..
        }) => {
            assert_eq!(existing, "view");
            assert_eq!(requested, "table");
        }
        other => panic!("expected RelationKindMismatch, got {:?}", other),
    }
}

#[test]
fn test_replace_over_dynamic_table_is_rejected() {
    let state = RelationState::Exists {
        kind: RelationKind::DynamicTable,
        columns: Vec::new(),
        properties: BTreeMap::new(),
    };
    assert!(matches!(
        planner().plan(&table_model(), &state, &[]),
        Err(PlanError::Config(CoreError::RelationKindMismatch { .. }))
    ));
}

#[test]
fn test_append_emits_exactly_one_insert_and_no_delete() {
    let plan = planner()
        .plan(
            &incremental_model(IncrementalStrategy::Append),
            &exists_table(order_columns()),
            &order_columns(),
        )
        .unwrap();
    assert_eq!(plan.strategy, StrategyPath::Append);
    let stmts = statements(&plan);
    assert_eq!(stmts.len(), 1);
    assert_eq!(stmts[0].kind, StatementKind::DmlInsert);
    assert!(stmts[0].sql.contains(r#"INSERT INTO "analytics"."orders""#));
}

#[test]
fn test_delete_insert_plan_shape() {
    let plan = planner()
        .plan(
            &incremental_model(IncrementalStrategy::DeleteInsert),
            &exists_table(order_columns()),
            &order_columns(),
        )
        .unwrap();
    assert_eq!(plan.strategy, StrategyPath::DeleteInsert);
    // staging rebuild brackets the transactional DML pair
    assert!(matches!(plan.entries[2], PlanEntry::Begin));
    assert!(matches!(plan.entries[5], PlanEntry::Commit));
    let stmts = statements(&plan);
    assert_eq!(stmts.len(), 5);
    assert_eq!(stmts[0].kind, StatementKind::DdlDrop);
    assert_eq!(stmts[1].kind, StatementKind::DdlCreate);
    assert!(stmts[1].sql.contains(r#""orders__hf_tmp""#));
    assert_eq!(stmts[2].kind, StatementKind::DmlDelete);
    assert!(stmts[2]
        .sql
        .contains(r#""order_id" IN (SELECT "order_id" FROM "analytics"."orders__hf_tmp")"#));
    assert_eq!(stmts[3].kind, StatementKind::DmlInsert);
    assert_eq!(stmts[4].kind, StatementKind::DdlDrop);
    assert!(stmts[4].best_effort);
}

#[test]
fn test_merge_plan_without_drift() {
    let plan = planner()
        .plan(
            &incremental_model(IncrementalStrategy::Merge),
            &exists_table(order_columns()),
            &order_columns(),
        )
        .unwrap();
    assert_eq!(plan.strategy, StrategyPath::Merge);
    let stmts = statements(&plan);
    assert_eq!(stmts.len(), 1);
    assert_eq!(stmts[0].kind, StatementKind::DmlMerge);
    assert!(stmts[0].sql.contains(r#"ON CONFLICT ("order_id")"#));
}

#[test]
fn test_merge_with_added_column_reconciles_additively() {
    let query_columns = vec![
        Column::new("order_id", ColumnType::Integer),
        Column::new("amount", ColumnType::Float),
        Column::new("discount", ColumnType::Float),
    ];
    let plan = planner()
        .plan(
            &incremental_model(IncrementalStrategy::Merge),
            &exists_table(order_columns()),
            &query_columns,
        )
        .unwrap();
    let stmts = statements(&plan);
    assert_eq!(stmts.len(), 2);
    assert_eq!(stmts[0].kind, StatementKind::DdlAlter);
    assert!(stmts[0]
        .sql
        .contains(r#"ADD COLUMN "discount" double precision"#));
    assert!(stmts[0].autocommit);
    assert_eq!(stmts[1].kind, StatementKind::DmlMerge);
}

#[test]
fn test_removed_column_requires_full_refresh() {
    // query no longer selects "amount"
    let query_columns = vec![Column::new("order_id", ColumnType::Integer)];
    let err = planner()
        .plan(
            &incremental_model(IncrementalStrategy::Merge),
            &exists_table(order_columns()),
            &query_columns,
        )
        .unwrap_err();
    match err {
        PlanError::SchemaDriftRequiresFullRefresh { removed, .. } => {
            assert_eq!(removed, "amount");
        }
        other => panic!("expected SchemaDriftRequiresFullRefresh, got {:?}", other),
    }
}

#[test]
fn test_retyped_column_requires_full_refresh() {
    let query_columns = vec![
        Column::new("order_id", ColumnType::Integer),
        Column::new("amount", ColumnType::Text),
    ];
    let err = planner()
        .plan(
            &incremental_model(IncrementalStrategy::DeleteInsert),
            &exists_table(order_columns()),
            &query_columns,
        )
        .unwrap_err();
    match err {
        PlanError::SchemaDriftRequiresFullRefresh { retyped, .. } => {
            assert_eq!(retyped, "amount");
        }
        other => panic!("expected SchemaDriftRequiresFullRefresh, got {:?}", other),
    }
}

#[test]
fn test_no_drop_column_is_ever_planned() {
    // additive drift only; whatever the plan, no statement may drop a column
    let query_columns = vec![
        Column::new("order_id", ColumnType::Integer),
        Column::new("amount", ColumnType::Float),
        Column::new("note", ColumnType::Text),
    ];
    let plan = planner()
        .plan(
            &incremental_model(IncrementalStrategy::Merge),
            &exists_table(order_columns()),
            &query_columns,
        )
        .unwrap();
    assert!(!plan.statements().any(|s| s.sql.contains("DROP COLUMN")));
}

#[test]
fn test_full_refresh_forces_drop_and_create() {
    let model = ModelDefinition {
        full_refresh: true,
        ..incremental_model(IncrementalStrategy::Merge)
    };
    let plan = planner()
        .plan(&model, &exists_table(order_columns()), &[])
        .unwrap();
    assert_eq!(plan.strategy, StrategyPath::Create);
    let stmts = statements(&plan);
    assert_eq!(stmts.len(), 2);
    assert_eq!(stmts[0].kind, StatementKind::DdlDrop);
    assert_eq!(stmts[1].kind, StatementKind::DdlCreate);
}

#[test]
fn test_full_refresh_drops_by_discovered_kind() {
    // target exists as a dynamic table; full refresh of a table model must
    // drop the dynamic table, not guess TABLE
    let model = ModelDefinition {
        full_refresh: true,
        ..table_model()
    };
    let state = RelationState::Exists {
        kind: RelationKind::DynamicTable,
        columns: Vec::new(),
        properties: BTreeMap::new(),
    };
    let plan = planner().plan(&model, &state, &[]).unwrap();
    let stmts = statements(&plan);
    assert!(stmts[0].sql.starts_with("DROP DYNAMIC TABLE IF EXISTS"));
}

#[test]
fn test_full_refresh_on_absent_target_skips_drop() {
    let model = ModelDefinition {
        full_refresh: true,
        ..table_model()
    };
    let plan = planner().plan(&model, &RelationState::Absent, &[]).unwrap();
    let stmts = statements(&plan);
    assert_eq!(stmts.len(), 1);
    assert_eq!(stmts[0].kind, StatementKind::DdlCreate);
}

#[test]
fn test_microbatch_plans_one_transaction_per_window() {
    let model = ModelDefinition {
        properties: StorageProperties {
            event_time_column: Some("created_at".to_string()),
            ..Default::default()
        },
        batch_windows: vec![
            BatchWindow {
                start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            },
            BatchWindow {
                start: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap(),
            },
        ],
        ..incremental_model(IncrementalStrategy::Microbatch)
    };
    let plan = planner()
        .plan(&model, &exists_table(order_columns()), &order_columns())
        .unwrap();
    assert_eq!(plan.strategy, StrategyPath::Microbatch);
    let begins = plan
        .entries
        .iter()
        .filter(|e| matches!(e, PlanEntry::Begin))
        .count();
    let commits = plan
        .entries
        .iter()
        .filter(|e| matches!(e, PlanEntry::Commit))
        .count();
    assert_eq!(begins, 2);
    assert_eq!(commits, 2);
    // per-window delete+insert plus the staging rebuild and cleanup
    assert_eq!(plan.statement_count(), 7);
}

#[test]
fn test_dynamic_table_created_when_absent() {
    let model = ModelDefinition {
        materialization: Materialization::DynamicTable,
        dynamic_table: Some(DynamicTableConfig::with_freshness("30 minutes")),
        ..table_model()
    };
    let plan = planner().plan(&model, &RelationState::Absent, &[]).unwrap();
    let stmts = statements(&plan);
    assert_eq!(stmts.len(), 1);
    assert!(stmts[0].sql.starts_with("CREATE DYNAMIC TABLE"));
    assert!(stmts[0].autocommit);
}

#[test]
fn test_dynamic_table_refresh_alters_only_drifted_settings() {
    let model = ModelDefinition {
        materialization: Materialization::DynamicTable,
        dynamic_table: Some(DynamicTableConfig::with_freshness("30 minutes")),
        ..table_model()
    };
    let state = RelationState::Exists {
        kind: RelationKind::DynamicTable,
        columns: Vec::new(),
        properties: BTreeMap::from([
            ("freshness".to_string(), "1 hours".to_string()),
            ("auto_refresh_mode".to_string(), "auto".to_string()),
        ]),
    };
    let plan = planner().plan(&model, &state, &[]).unwrap();
    assert_eq!(plan.strategy, StrategyPath::DynamicTableRefresh);
    let stmts = statements(&plan);
    assert_eq!(stmts.len(), 1);
    assert!(stmts[0].sql.contains("SET (freshness = '30 minutes')"));
}

#[test]
fn test_dynamic_table_refresh_with_no_drift_is_empty() {
    let model = ModelDefinition {
        materialization: Materialization::DynamicTable,
        dynamic_table: Some(DynamicTableConfig::with_freshness("30 minutes")),
        ..table_model()
    };
    let state = RelationState::Exists {
        kind: RelationKind::DynamicTable,
        columns: Vec::new(),
        properties: BTreeMap::from([
            ("freshness".to_string(), "30 minutes".to_string()),
            ("auto_refresh_enable".to_string(), "true".to_string()),
            ("auto_refresh_mode".to_string(), "auto".to_string()),
            ("computing_resource".to_string(), "serverless".to_string()),
        ]),
    };
    let plan = planner().plan(&model, &state, &[]).unwrap();
    assert!(plan.is_empty());
}

#[test]
fn test_merge_rejected_without_native_upsert() {
    let caps = DialectCapabilities {
        native_merge: false,
        ..DialectCapabilities::hologres()
    };
    let err = Planner::new(caps)
        .plan(
            &incremental_model(IncrementalStrategy::Merge),
            &exists_table(order_columns()),
            &order_columns(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        PlanError::Config(CoreError::MergeUnsupported { .. })
    ));
}

#[test]
fn test_property_violations_stop_before_sql_emission() {
    let model = ModelDefinition {
        properties: StorageProperties {
            bitmap_columns: (0..11).map(|i| format!("c{}", i)).collect(),
            ..Default::default()
        },
        ..table_model()
    };
    assert!(matches!(
        planner().plan(&model, &RelationState::Absent, &[]),
        Err(PlanError::Config(CoreError::PropertyLimitExceeded { .. }))
    ));

    let model = ModelDefinition {
        properties: StorageProperties {
            clustering_key: vec![
                hf_core::config::ClusteringColumn::asc("a"),
                hf_core::config::ClusteringColumn::asc("b"),
                hf_core::config::ClusteringColumn::asc("c"),
            ],
            ..Default::default()
        },
        ..table_model()
    };
    assert!(matches!(
        planner().plan(&model, &RelationState::Absent, &[]),
        Err(PlanError::Config(CoreError::PropertyLimitExceeded { .. }))
    ));
}

#[test]
fn test_missing_unique_key_rejected_before_planning() {
    let model = ModelDefinition {
        unique_key: Vec::new(),
        ..incremental_model(IncrementalStrategy::DeleteInsert)
    };
    assert!(matches!(
        planner().plan(&model, &exists_table(order_columns()), &order_columns()),
        Err(PlanError::Config(CoreError::MissingUniqueKey { .. }))
    ));
}

#[test]
fn test_column_drift_matching_is_case_insensitive() {
    let relation = vec![
        Column::new("ORDER_ID", ColumnType::Integer),
        Column::new("Amount", ColumnType::Float),
    ];
    let plan = planner()
        .plan(
            &incremental_model(IncrementalStrategy::Merge),
            &exists_table(relation),
            &order_columns(),
        )
        .unwrap();
    // identical shapes modulo case: no alters, just the merge
    let stmts = statements(&plan);
    assert_eq!(stmts.len(), 1);
    assert_eq!(stmts[0].kind, StatementKind::DmlMerge);
}
