use super::*;
use crate::config::{AutoRefreshMode, Orientation};
use chrono::TimeZone;

fn base_model() -> ModelDefinition {
    ModelDefinition {
        schema: "analytics".to_string(),
        name: "orders".to_string(),
        compiled_sql: "select * from raw.orders".to_string(),
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

fn window(start_day: u32, end_day: u32) -> BatchWindow {
    BatchWindow {
        start: Utc.with_ymd_and_hms(2024, 1, start_day, 0, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2024, 1, end_day, 0, 0, 0).unwrap(),
    }
}

#[test]
fn test_qualified_name() {
    let model = base_model();
    assert_eq!(model.qualified_name(), r#""analytics"."orders""#);
}

#[test]
fn test_qualified_name_empty_schema() {
    let model = ModelDefinition {
        schema: String::new(),
        ..base_model()
    };
    assert_eq!(model.qualified_name(), r#""orders""#);
    assert_eq!(model.display_name(), "orders");
}

#[test]
fn test_target_kind_mapping() {
    let mut model = base_model();
    assert_eq!(model.target_kind(), RelationKind::Table);
    model.materialization = Materialization::View;
    assert_eq!(model.target_kind(), RelationKind::View);
    model.materialization = Materialization::Incremental;
    assert_eq!(model.target_kind(), RelationKind::Table);
    model.materialization = Materialization::DynamicTable;
    assert_eq!(model.target_kind(), RelationKind::DynamicTable);
}

#[test]
fn test_strategy_defaults_to_append() {
    let model = base_model();
    assert_eq!(model.strategy(), IncrementalStrategy::Append);
}

#[test]
fn test_requires_primary_key_only_for_keyed_incremental() {
    let merge = ModelDefinition {
        materialization: Materialization::Incremental,
        incremental_strategy: Some(IncrementalStrategy::Merge),
        unique_key: vec!["order_id".to_string()],
        ..base_model()
    };
    assert!(merge.requires_primary_key());

    let delete_insert = ModelDefinition {
        incremental_strategy: Some(IncrementalStrategy::DeleteInsert),
        ..merge.clone()
    };
    assert!(delete_insert.requires_primary_key());

    let append = ModelDefinition {
        incremental_strategy: Some(IncrementalStrategy::Append),
        ..merge.clone()
    };
    assert!(!append.requires_primary_key());

    let plain_table = ModelDefinition {
        materialization: Materialization::Table,
        ..merge.clone()
    };
    assert!(!plain_table.requires_primary_key());

    let keyless = ModelDefinition {
        unique_key: Vec::new(),
        ..merge
    };
    assert!(!keyless.requires_primary_key());
}

#[test]
fn test_validate_plain_table() {
    base_model().validate().unwrap();
}

#[test]
fn test_validate_rejects_empty_name() {
    let model = ModelDefinition {
        name: String::new(),
        ..base_model()
    };
    assert!(matches!(
        model.validate(),
        Err(CoreError::ConfigInvalid { .. })
    ));
}

#[test]
fn test_validate_rejects_empty_query() {
    let model = ModelDefinition {
        compiled_sql: "   ".to_string(),
        ..base_model()
    };
    assert!(matches!(
        model.validate(),
        Err(CoreError::ConfigInvalid { .. })
    ));
}

#[test]
fn test_validate_rejects_long_identifier() {
    let model = ModelDefinition {
        name: "a".repeat(64),
        ..base_model()
    };
    assert!(matches!(
        model.validate(),
        Err(CoreError::IdentifierTooLong { max: 63, .. })
    ));
}

#[test]
fn test_validate_accepts_63_char_identifier() {
    let model = ModelDefinition {
        name: "a".repeat(63),
        ..base_model()
    };
    model.validate().unwrap();
}

#[test]
fn test_validate_surfaces_property_violations() {
    let model = ModelDefinition {
        properties: StorageProperties {
            bitmap_columns: (0..11).map(|i| format!("c{}", i)).collect(),
            ..Default::default()
        },
        ..base_model()
    };
    assert!(matches!(
        model.validate(),
        Err(CoreError::PropertyLimitExceeded { .. })
    ));
}

#[test]
fn test_merge_requires_unique_key() {
    let model = ModelDefinition {
        materialization: Materialization::Incremental,
        incremental_strategy: Some(IncrementalStrategy::Merge),
        ..base_model()
    };
    match model.validate() {
        Err(CoreError::MissingUniqueKey { strategy }) => assert_eq!(strategy, "merge"),
        other => panic!("expected MissingUniqueKey, got {:?}", other),
    }
}

#[test]
fn test_delete_insert_requires_unique_key() {
    let model = ModelDefinition {
        materialization: Materialization::Incremental,
        incremental_strategy: Some(IncrementalStrategy::DeleteInsert),
        ..base_model()
    };
    assert!(matches!(
        model.validate(),
        Err(CoreError::MissingUniqueKey { .. })
    ));
}

#[test]
fn test_append_needs_no_unique_key() {
    let model = ModelDefinition {
        materialization: Materialization::Incremental,
        incremental_strategy: Some(IncrementalStrategy::Append),
        ..base_model()
    };
    model.validate().unwrap();
}

#[test]
fn test_microbatch_requires_event_time_column() {
    let model = ModelDefinition {
        materialization: Materialization::Incremental,
        incremental_strategy: Some(IncrementalStrategy::Microbatch),
        batch_windows: vec![window(1, 2)],
        ..base_model()
    };
    assert!(matches!(
        model.validate(),
        Err(CoreError::MissingEventTimeColumn { .. })
    ));
}

#[test]
fn test_microbatch_requires_windows() {
    let model = ModelDefinition {
        materialization: Materialization::Incremental,
        incremental_strategy: Some(IncrementalStrategy::Microbatch),
        properties: StorageProperties {
            event_time_column: Some("created_at".to_string()),
            ..Default::default()
        },
        ..base_model()
    };
    assert!(matches!(
        model.validate(),
        Err(CoreError::MissingBatchWindows { .. })
    ));
}

#[test]
fn test_microbatch_valid() {
    let model = ModelDefinition {
        materialization: Materialization::Incremental,
        incremental_strategy: Some(IncrementalStrategy::Microbatch),
        properties: StorageProperties {
            event_time_column: Some("created_at".to_string()),
            ..Default::default()
        },
        batch_windows: vec![window(1, 2), window(2, 3)],
        ..base_model()
    };
    model.validate().unwrap();
}

#[test]
fn test_dynamic_table_requires_config() {
    let model = ModelDefinition {
        materialization: Materialization::DynamicTable,
        ..base_model()
    };
    assert!(matches!(
        model.validate(),
        Err(CoreError::MissingDynamicTableConfig { .. })
    ));
}

#[test]
fn test_dynamic_table_incremental_refresh_needs_capability() {
    let model = ModelDefinition {
        materialization: Materialization::DynamicTable,
        dynamic_table: Some(DynamicTableConfig {
            auto_refresh_mode: AutoRefreshMode::Incremental,
            ..DynamicTableConfig::with_freshness("30 minutes")
        }),
        incremental_refresh_supported: false,
        ..base_model()
    };
    assert!(matches!(
        model.validate(),
        Err(CoreError::IncrementalRefreshUnsupported { .. })
    ));
}

#[test]
fn test_dynamic_table_incremental_refresh_with_capability() {
    let model = ModelDefinition {
        materialization: Materialization::DynamicTable,
        dynamic_table: Some(DynamicTableConfig {
            auto_refresh_mode: AutoRefreshMode::Incremental,
            ..DynamicTableConfig::with_freshness("30 minutes")
        }),
        incremental_refresh_supported: true,
        ..base_model()
    };
    model.validate().unwrap();
}

#[test]
fn test_model_parses_from_yaml() {
    let yaml = r#"
schema: analytics
name: daily_orders
compiled_sql: "select order_id, amount from raw.orders"
materialization: incremental
incremental_strategy: delete_insert
unique_key: [order_id]
properties:
  orientation: column
  distribution_key: [order_id]
"#;
    let model: ModelDefinition = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(model.materialization, Materialization::Incremental);
    assert_eq!(model.strategy(), IncrementalStrategy::DeleteInsert);
    assert_eq!(model.unique_key, vec!["order_id"]);
    assert_eq!(model.properties.orientation, Some(Orientation::Column));
    assert!(model.incremental_refresh_supported);
    model.validate().unwrap();
}
