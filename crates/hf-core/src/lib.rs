//! hf-core - Core library for Holoflow
//!
//! Shared types for the materialization engine: model definitions,
//! materialization and strategy kinds, Hologres storage properties with their
//! documented limits, relation-state snapshots, and SQL quoting helpers.

pub mod config;
pub mod error;
pub mod model;
pub mod relation;
pub mod sql_utils;

pub use config::{
    AutoRefreshMode, ClusteringColumn, ConnectionConfig, DynamicTableConfig, IncrementalStrategy,
    Materialization, Orientation, SortOrder, SslMode, StorageProperties,
};
pub use error::{CoreError, CoreResult};
pub use model::{BatchWindow, ModelDefinition};
pub use relation::{Column, ColumnType, RelationKind, RelationState};
