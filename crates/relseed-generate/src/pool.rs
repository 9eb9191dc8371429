use std::collections::BTreeMap;

use rand::{Rng, RngCore};
use tracing::warn;

use relseed_core::{Cardinality, FieldValue};
use relseed_store::StoreGateway;

use crate::model::SeedReport;

/// Per-entity ids known to the run: created during the run, or listed from
/// the store when nothing was created yet. Pools only grow.
#[derive(Debug, Clone, Default)]
pub struct RecordPools {
    pools: BTreeMap<String, Vec<String>>,
}

impl RecordPools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, entity: &str) -> &[String] {
        self.pools.get(entity).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn push(&mut self, entity: &str, id: String) {
        self.pools.entry(entity.to_string()).or_default().push(id);
    }

    /// Add listed ids that are not in the pool yet.
    pub fn extend(&mut self, entity: &str, ids: impl IntoIterator<Item = String>) {
        let pool = self.pools.entry(entity.to_string()).or_default();
        for id in ids {
            if !pool.contains(&id) {
                pool.push(id);
            }
        }
    }

    /// Cached pool, or the ids listed from the store when the cache is empty.
    ///
    /// A failed listing is recorded in `report` and treated as an empty pool;
    /// only non-empty listings are cached.
    pub async fn resolve(
        &mut self,
        store: &dyn StoreGateway,
        report: &mut SeedReport,
        entity: &str,
        page_size: usize,
    ) -> &[String] {
        if self.get(entity).is_empty() {
            match store.list_ids(entity, page_size).await {
                Ok(ids) if !ids.is_empty() => self.extend(entity, ids),
                Ok(_) => {}
                Err(err) => {
                    warn!(
                        code = "pool_list_failed",
                        entity = %entity,
                        error = %err,
                        "listing existing ids failed; treating pool as empty"
                    );
                    report.warn("pool_list_failed", entity, None, err.to_string());
                }
            }
        }
        self.get(entity)
    }
}

/// Relation value drawn at creation time for a required relation.
///
/// Single draws one id; multi draws `max(1, min)` distinct ids capped at the
/// pool size. `None` only for an empty pool.
pub fn draw_required(
    pool: &[String],
    cardinality: Cardinality,
    rng: &mut dyn RngCore,
) -> Option<FieldValue> {
    if pool.is_empty() {
        return None;
    }
    match cardinality {
        Cardinality::Single => Some(FieldValue::Ref(pick(pool, rng))),
        Cardinality::Multi { min, .. } => {
            let amount = (min.max(1) as usize).min(pool.len());
            Some(FieldValue::Refs(sample(pool, amount, rng)))
        }
    }
}

/// Relation value drawn by the backfill pass for an optional relation.
///
/// Multi draws a random count in `[min, min(max, pool size)]`; a zero count
/// yields `None`, as does an empty pool.
pub fn draw_optional(
    pool: &[String],
    cardinality: Cardinality,
    rng: &mut dyn RngCore,
) -> Option<FieldValue> {
    if pool.is_empty() {
        return None;
    }
    match cardinality {
        Cardinality::Single => Some(FieldValue::Ref(pick(pool, rng))),
        Cardinality::Multi { min, max } => {
            let upper = (max as usize).min(pool.len());
            let lower = (min as usize).min(upper);
            let amount = rng.random_range(lower..=upper);
            (amount > 0).then(|| FieldValue::Refs(sample(pool, amount, rng)))
        }
    }
}

pub fn pick(pool: &[String], rng: &mut dyn RngCore) -> String {
    pool[rng.random_range(0..pool.len())].clone()
}

fn sample(pool: &[String], amount: usize, rng: &mut dyn RngCore) -> Vec<String> {
    rand::seq::index::sample(rng, pool.len(), amount)
        .into_iter()
        .map(|index| pool[index].clone())
        .collect()
}

/// Optional relation left unresolved at creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRelation {
    pub field: String,
    pub target: String,
    pub cardinality: Cardinality,
}

/// A created record whose optional relations still need a backfill patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub entity: String,
    pub id: String,
    pub relations: Vec<PendingRelation>,
}
