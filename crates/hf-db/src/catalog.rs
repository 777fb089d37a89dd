//! Relation catalog
//!
//! Inspects the warehouse for the current state of a target relation.
//! Absence is returned as ordinary data, never as an error, so the planner's
//! state machine can match on it exhaustively.

use crate::error::{DbError, DbResult};
use crate::pool::ConnectionHandle;
use hf_core::relation::{Column, ColumnType, RelationKind, RelationState};
use std::collections::BTreeMap;
use tokio_postgres::types::Type;

const RELKIND_SQL: &str = "select c.relkind::text \
     from pg_catalog.pg_class c \
     join pg_catalog.pg_namespace n on n.oid = c.relnamespace \
     where n.nspname = $1 and c.relname = $2";

// information_schema columns are typed as domains (sql_identifier,
// cardinal_number); the casts let the driver decode them as text/int4.
const COLUMNS_SQL: &str = "select column_name::text, data_type::text, \
     numeric_precision::int4, numeric_scale::int4 \
     from information_schema.columns \
     where table_schema = $1 and table_name = $2 \
     order by ordinal_position";

const PROPERTIES_SQL: &str = "select property_key::text, property_value::text \
     from hologres.hg_table_properties \
     where table_namespace = $1 and table_name = $2";

/// Discover the current state of `schema.name`.
///
/// Distinguishes plain tables, views, and dynamic tables; columns come back
/// normalized through the shared type vocabulary. Storage properties are
/// read best-effort: a warehouse without the property catalog yields an
/// empty map, not a failure.
pub async fn describe(
    handle: &ConnectionHandle,
    schema: &str,
    name: &str,
) -> DbResult<RelationState> {
    let client = handle.pg_client();

    let rows = client
        .query(RELKIND_SQL, &[&schema, &name])
        .await
        .map_err(|e| DbError::execution(RELKIND_SQL, &e))?;
    let relkind: String = match rows.first() {
        Some(row) => row.get(0),
        None => return Ok(RelationState::Absent),
    };
    let kind = relation_kind(&relkind).ok_or_else(|| DbError::Unsupported {
        feature: format!(
            "relation {}.{} has unmanageable pg_class relkind '{}'",
            schema, name, relkind
        ),
    })?;

    let rows = client
        .query(COLUMNS_SQL, &[&schema, &name])
        .await
        .map_err(|e| DbError::execution(COLUMNS_SQL, &e))?;
    let columns = rows
        .iter()
        .map(|row| {
            let name: String = row.get(0);
            let data_type: String = row.get(1);
            let precision: Option<i32> = row.get(2);
            let scale: Option<i32> = row.get(3);
            Column::new(name, ColumnType::from_warehouse(&data_type, precision, scale))
        })
        .collect();

    let properties = match client.query(PROPERTIES_SQL, &[&schema, &name]).await {
        Ok(rows) => rows
            .iter()
            .map(|row| (row.get::<_, String>(0), row.get::<_, String>(1)))
            .collect(),
        Err(err) => {
            log::debug!(
                "storage property catalog unavailable for {}.{}: {}",
                schema,
                name,
                err
            );
            BTreeMap::new()
        }
    };

    log::debug!("described {}.{} as existing {}", schema, name, kind);
    Ok(RelationState::Exists {
        kind,
        columns,
        properties,
    })
}

/// Discover the output columns of a compiled query by preparing it.
///
/// Preparation never executes the query, so this is safe to run during
/// planning.
pub async fn describe_query(handle: &ConnectionHandle, sql: &str) -> DbResult<Vec<Column>> {
    let statement = handle
        .pg_client()
        .prepare(sql)
        .await
        .map_err(|e| DbError::execution(sql, &e))?;
    Ok(statement
        .columns()
        .iter()
        .map(|col| Column::new(col.name(), column_type_from_pg(col.type_())))
        .collect())
}

/// Map a pg_class relkind to the kinds the planner manages
fn relation_kind(relkind: &str) -> Option<RelationKind> {
    match relkind {
        "r" | "p" => Some(RelationKind::Table),
        "v" => Some(RelationKind::View),
        "m" => Some(RelationKind::DynamicTable),
        _ => None,
    }
}

/// Normalize a driver-reported wire type into the shared vocabulary
fn column_type_from_pg(ty: &Type) -> ColumnType {
    if *ty == Type::INT2 || *ty == Type::INT4 || *ty == Type::INT8 {
        ColumnType::Integer
    } else if *ty == Type::FLOAT4 || *ty == Type::FLOAT8 {
        ColumnType::Float
    } else if *ty == Type::NUMERIC {
        ColumnType::Decimal {
            precision: None,
            scale: None,
        }
    } else if *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR {
        ColumnType::Text
    } else if *ty == Type::TIMESTAMP {
        ColumnType::Timestamp { with_tz: false }
    } else if *ty == Type::TIMESTAMPTZ {
        ColumnType::Timestamp { with_tz: true }
    } else if *ty == Type::BOOL {
        ColumnType::Boolean
    } else {
        ColumnType::Other(ty.name().to_string())
    }
}
