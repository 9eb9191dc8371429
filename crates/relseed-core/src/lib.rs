//! Core contracts and helpers for relseed.
//!
//! This crate defines the normalized schema model, the schema source that reads
//! PocketBase collection exports, the dependency orderer, and the record value
//! types shared by the store gateways and the seeding engine.

pub mod error;
pub mod graph;
pub mod record;
pub mod schema;
pub mod source;
pub mod validation;

pub use error::{Error, Result};
pub use graph::{
    CreationOrder, DependencyGraph, DependencyReport, DependencySummary, build_dependency_graph,
    build_dependency_report, creation_order,
};
pub use record::{FieldValue, Record, record_to_json, round2};
pub use schema::{
    Cardinality, EntityDef, EntityKind, FieldDef, FieldKind, NumberBounds, RelationSpec,
    SchemaIssue, SchemaModel, TextFlavor, is_name_like,
};
pub use source::{JsonFileSource, SchemaSource, parse_schema_json};
pub use validation::{detach_unknown_relations, validate_schema};
