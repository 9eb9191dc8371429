use async_trait::async_trait;

use relseed_core::Record;

use crate::error::StoreError;

/// Trait implemented by record stores the seeder can write to.
#[async_trait]
pub trait StoreGateway: Send + Sync {
    /// Returns the store identifier (e.g. `pocketbase`).
    fn engine(&self) -> &'static str;

    /// Create a record and return its store-assigned id.
    async fn create(&self, entity: &str, fields: &Record) -> Result<String, StoreError>;

    /// Partially update an existing record.
    async fn patch(&self, entity: &str, id: &str, fields: &Record) -> Result<(), StoreError>;

    /// List up to `page_size` existing record ids.
    async fn list_ids(&self, entity: &str, page_size: usize) -> Result<Vec<String>, StoreError>;

    /// Total number of records currently stored for an entity.
    async fn count(&self, entity: &str) -> Result<u64, StoreError>;
}
