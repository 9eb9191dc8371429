use std::collections::BTreeMap;

use async_trait::async_trait;
use rand::RngCore;

use relseed_core::Record;

use crate::bootstrap::DailySeries;
use crate::context::SeedContext;
use crate::domain;
use crate::model::RuleReport;
use crate::synth::Synthesizer;

/// Entity-specific adjustment applied after a record's fields are synthesized.
pub trait EntityOverride: Send + Sync {
    fn entity(&self) -> &'static str;

    fn apply(&self, record: &mut Record, synth: &mut Synthesizer<'_>, rng: &mut dyn RngCore);
}

/// Enrichment step that runs after the generic pass and the backfill.
#[async_trait]
pub trait PostPassRule: Send + Sync {
    fn id(&self) -> &'static str;

    /// Entity the rule writes to.
    fn entity(&self) -> &'static str;

    /// Other entities that must be seedable for the rule to run.
    fn requires(&self) -> &'static [&'static str] {
        &[]
    }

    async fn apply(&self, ctx: &mut SeedContext<'_>, report: &mut RuleReport);
}

/// Entity-name keyed registry of domain behavior.
#[derive(Default)]
pub struct DomainRegistry {
    overrides: BTreeMap<&'static str, Box<dyn EntityOverride>>,
    series: Vec<DailySeries>,
    rules: Vec<Box<dyn PostPassRule>>,
}

impl DomainRegistry {
    /// Registry without any domain behavior.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the built-in catalog, sales and ledger rules.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        domain::register(&mut registry);
        registry
    }

    pub fn register_override(&mut self, rule: Box<dyn EntityOverride>) {
        self.overrides.insert(rule.entity(), rule);
    }

    pub fn register_series(&mut self, series: DailySeries) {
        self.series.push(series);
    }

    pub fn register_rule(&mut self, rule: Box<dyn PostPassRule>) {
        self.rules.push(rule);
    }

    pub fn override_for(&self, entity: &str) -> Option<&dyn EntityOverride> {
        self.overrides.get(entity).map(|rule| rule.as_ref())
    }

    pub fn series(&self) -> &[DailySeries] {
        &self.series
    }

    pub fn rules(&self) -> &[Box<dyn PostPassRule>] {
        &self.rules
    }

    pub fn is_series_entity(&self, entity: &str) -> bool {
        self.series.iter().any(|series| series.entity == entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_registry_covers_domain_entities() {
        let registry = DomainRegistry::new();
        for entity in ["categories", "dealers", "products"] {
            assert!(registry.override_for(entity).is_some(), "{entity}");
        }
        assert!(registry.override_for("orders").is_none());
        assert!(registry.is_series_entity("fx_rates"));

        let ids: Vec<&str> = registry.rules().iter().map(|rule| rule.id()).collect();
        assert_eq!(ids.first(), Some(&"orders.patch"));
        assert!(ids.contains(&"order_items.top_up"));
        assert!(ids.contains(&"stock_log.top_up"));

        let empty = DomainRegistry::empty();
        assert!(empty.rules().is_empty());
        assert!(!empty.is_series_entity("fx_rates"));
    }
}
