//! Core types and error taxonomy shared across the SuperSave workspace.
//!
//! This crate has no database dependency: it describes entities, relations,
//! query trees and the error taxonomy that the query builder, the engine
//! repositories and the schema synchronizers all share.

mod entity;
mod error;
mod query;

pub use entity::{BaseEntity, EntityDefinition, FieldKind, Relation};
pub use error::{ConfigError, DataError, Error, HookError, Result, SchemaError};
pub use query::{
    Limit, LogicalGroup, LogicalOperator, Operator, Query, QueryCondition, QueryFilter, QuerySort,
    QueryValue, SortDirection,
};
