use crate::bootstrap;
use crate::registry::DomainRegistry;

pub mod catalog;
pub mod ledger;
pub mod sales;

pub fn register(registry: &mut DomainRegistry) {
    registry.register_series(bootstrap::fx_rates());
    catalog::register(registry);
    sales::register(registry);
    ledger::register(registry);
}
