//! Record store gateways.
//!
//! The seeding engine talks to a store only through [`StoreGateway`]. Two
//! implementations are provided: [`PocketBaseGateway`] for a live PocketBase
//! instance and [`InMemoryStore`] for dry runs and tests.

pub mod error;
pub mod gateway;
pub mod memory;
pub mod pocketbase;

pub use error::StoreError;
pub use gateway::StoreGateway;
pub use memory::InMemoryStore;
pub use pocketbase::{PocketBaseGateway, classify_failure};
