use std::time::Duration;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::warn;

use relseed_core::{EntityKind, Record, SchemaModel};
use relseed_store::{StoreError, StoreGateway};

use crate::model::{SeedOptions, SeedReport};
use crate::pool::RecordPools;
use crate::synth::Synthesizer;

/// Mutable state of one seeding run, owned by the engine and lent to every
/// pass. Single writer: passes run sequentially.
pub struct SeedContext<'a> {
    pub schema: &'a SchemaModel,
    pub options: &'a SeedOptions,
    pub store: &'a dyn StoreGateway,
    pub synth: Synthesizer<'a>,
    pub pools: RecordPools,
    pub report: SeedReport,
    throttle: Throttle,
}

impl<'a> SeedContext<'a> {
    pub fn new(
        schema: &'a SchemaModel,
        options: &'a SeedOptions,
        store: &'a dyn StoreGateway,
        synth: Synthesizer<'a>,
        report: SeedReport,
    ) -> Self {
        Self {
            schema,
            options,
            store,
            synth,
            pools: RecordPools::new(),
            report,
            throttle: Throttle::new(options.pause_every, options.pause_ms),
        }
    }

    /// Deterministic RNG for a named step of the run.
    pub fn rng_for(&self, key: &str) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(hash_seed(self.report.seed, key))
    }

    /// Whether an entity exists, is writable and is not excluded.
    pub fn is_seedable(&self, entity: &str) -> bool {
        self.schema
            .entity(entity)
            .is_some_and(|def| def.kind != EntityKind::View)
            && !self.options.is_excluded(entity)
    }

    pub async fn pool(&mut self, entity: &str) -> Vec<String> {
        self.pools
            .resolve(self.store, &mut self.report, entity, self.options.page_size)
            .await
            .to_vec()
    }

    /// Drop fields the entity does not declare.
    pub fn retain_declared(&self, entity: &str, record: &mut Record) {
        if let Some(def) = self.schema.entity(entity) {
            record.retain(|field, _| def.has_field(field));
        }
    }

    pub async fn create(&mut self, entity: &str, record: &Record) -> Result<String, StoreError> {
        let result = self.store.create(entity, record).await;
        self.after_write().await;
        result
    }

    pub async fn patch(
        &mut self,
        entity: &str,
        id: &str,
        record: &Record,
    ) -> Result<(), StoreError> {
        let result = self.store.patch(entity, id, record).await;
        self.after_write().await;
        result
    }

    /// Current store count, zero when the store cannot be queried.
    pub async fn count(&mut self, entity: &str) -> u64 {
        match self.store.count(entity).await {
            Ok(count) => count,
            Err(err) => {
                warn!(code = "count_failed", entity = %entity, error = %err, "count failed");
                self.report
                    .warn("count_failed", entity, None, err.to_string());
                0
            }
        }
    }

    async fn after_write(&mut self) {
        self.report.writes += 1;
        self.throttle.tick().await;
    }
}

/// Fixed pause after every `every` writes.
#[derive(Debug, Clone)]
struct Throttle {
    every: u64,
    pause: Duration,
    writes: u64,
}

impl Throttle {
    fn new(every: u64, pause_ms: u64) -> Self {
        Self {
            every,
            pause: Duration::from_millis(pause_ms),
            writes: 0,
        }
    }

    async fn tick(&mut self) {
        self.writes += 1;
        if self.every > 0 && !self.pause.is_zero() && self.writes % self.every == 0 {
            tokio::time::sleep(self.pause).await;
        }
    }
}

pub(crate) fn hash_seed(seed: u64, key: &str) -> u64 {
    let mut hash = seed ^ 0xcbf29ce484222325;
    for byte in key.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}
