//! Schema-driven seeding engine for relseed.
//!
//! This crate takes a normalized schema and a store gateway and fills the
//! store with plausible, relationally consistent records: accounts and daily
//! series first, then every entity in dependency order, then a backfill of
//! optional relations and the domain post-pass.

pub mod backfill;
pub mod bootstrap;
pub mod context;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod faker;
pub mod fallback;
pub mod materializer;
pub mod model;
pub mod pool;
pub mod postpass;
pub mod registry;
pub mod synth;

pub use engine::SeedEngine;
pub use errors::SeedError;
pub use fallback::FallbackTable;
pub use model::{
    BackfillReport, EntityOutcome, EntityReport, NumberRange, RuleReport, SeedIssue, SeedOptions,
    SeedReport,
};
pub use registry::DomainRegistry;
