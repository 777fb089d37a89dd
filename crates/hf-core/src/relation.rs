//! Discovered state of a target relation
//!
//! The relation catalog produces one `RelationState` snapshot per planning
//! cycle. Absence is ordinary data, not an error, so the planner's branching
//! is an exhaustive match. Warehouse-native column types are normalized into
//! a small vocabulary so schema-drift comparison needs no warehouse-specific
//! type knowledge.

use std::collections::BTreeMap;

/// Normalized column type vocabulary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    /// Any integer width
    Integer,
    /// Any binary float width
    Float,
    /// Fixed-point decimal; precision/scale are unknown when the warehouse
    /// does not report them
    Decimal {
        precision: Option<u16>,
        scale: Option<u16>,
    },
    /// Text, varchar, char
    Text,
    /// Timestamp with or without time zone
    Timestamp { with_tz: bool },
    /// Boolean
    Boolean,
    /// Anything else, carrying the raw warehouse spelling
    Other(String),
}

impl ColumnType {
    /// Normalize a warehouse-reported type name (information_schema spelling)
    /// into the internal vocabulary.
    pub fn from_warehouse(data_type: &str, precision: Option<i32>, scale: Option<i32>) -> Self {
        let lowered = data_type.trim().to_lowercase();
        match lowered.as_str() {
            "smallint" | "int2" | "integer" | "int" | "int4" | "bigint" | "int8" => Self::Integer,
            "real" | "float4" | "double precision" | "float8" => Self::Float,
            "numeric" | "decimal" => Self::Decimal {
                precision: precision.and_then(|p| u16::try_from(p).ok()),
                scale: scale.and_then(|s| u16::try_from(s).ok()),
            },
            "text" | "varchar" | "character varying" | "char" | "character" | "bpchar" => {
                Self::Text
            }
            "timestamp" | "timestamp without time zone" => Self::Timestamp { with_tz: false },
            "timestamptz" | "timestamp with time zone" => Self::Timestamp { with_tz: true },
            "boolean" | "bool" => Self::Boolean,
            _ => Self::Other(lowered),
        }
    }
}

impl std::fmt::Display for ColumnType {
    /// The SQL spelling used when this type appears in generated DDL
    /// (e.g. `ALTER TABLE ... ADD COLUMN`).
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::Integer => write!(f, "bigint"),
            ColumnType::Float => write!(f, "double precision"),
            ColumnType::Decimal {
                precision: Some(p),
                scale: Some(s),
            } => write!(f, "numeric({},{})", p, s),
            ColumnType::Decimal { .. } => write!(f, "numeric"),
            ColumnType::Text => write!(f, "text"),
            ColumnType::Timestamp { with_tz: false } => write!(f, "timestamp"),
            ColumnType::Timestamp { with_tz: true } => write!(f, "timestamptz"),
            ColumnType::Boolean => write!(f, "boolean"),
            ColumnType::Other(raw) => write!(f, "{}", raw),
        }
    }
}

/// One column of a relation or of a compiled query's result shape
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column name as reported by the warehouse
    pub name: String,
    /// Normalized type
    pub ty: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Kind of an existing relation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// Plain table
    Table,
    /// Regular view
    View,
    /// Warehouse-managed auto-refreshing materialized view
    DynamicTable,
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelationKind::Table => write!(f, "table"),
            RelationKind::View => write!(f, "view"),
            RelationKind::DynamicTable => write!(f, "dynamic table"),
        }
    }
}

/// Snapshot of the target relation at planning time.
///
/// Never mutated; the catalog produces a fresh snapshot per planning cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationState {
    /// The relation does not exist
    Absent,
    /// The relation exists
    Exists {
        /// Discovered relation kind
        kind: RelationKind,
        /// Columns in ordinal order with normalized types
        columns: Vec<Column>,
        /// Storage properties reported by the warehouse property catalog;
        /// empty when the catalog is unavailable
        properties: BTreeMap<String, String>,
    },
}

impl RelationState {
    pub fn exists(&self) -> bool {
        matches!(self, RelationState::Exists { .. })
    }

    /// Discovered kind, if the relation exists
    pub fn kind(&self) -> Option<RelationKind> {
        match self {
            RelationState::Absent => None,
            RelationState::Exists { kind, .. } => Some(*kind),
        }
    }

    /// Columns of the existing relation; empty for an absent one
    pub fn columns(&self) -> &[Column] {
        match self {
            RelationState::Absent => &[],
            RelationState::Exists { columns, .. } => columns,
        }
    }

    /// Discovered storage properties; None for an absent relation
    pub fn properties(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            RelationState::Absent => None,
            RelationState::Exists { properties, .. } => Some(properties),
        }
    }
}

#[cfg(test)]
#[path = "relation_test.rs"]
mod tests;
