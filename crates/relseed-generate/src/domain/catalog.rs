use rand::{Rng, RngCore};

use relseed_core::{FieldValue, Record, round2};

use crate::faker::{AtomicKind, capitalize};
use crate::registry::{DomainRegistry, EntityOverride};
use crate::synth::Synthesizer;

const DOOR_COLORS: &[&str] = &[
    "White", "Ivory", "Walnut", "Oak", "Graphite", "Black", "Cappuccino", "Wenge", "Grey",
    "Beige",
];

pub fn register(registry: &mut DomainRegistry) {
    registry.register_override(Box::new(CategoryOverride));
    registry.register_override(Box::new(ProductOverride));
}

/// Append a four-digit suffix so repeated runs rarely collide on names.
pub(crate) fn suffixed(base: String, rng: &mut dyn RngCore) -> FieldValue {
    FieldValue::Text(format!("{base} {}", rng.random_range(1000..=9999)))
}

pub(crate) fn text_or_else(
    record: &Record,
    field: &str,
    fallback: impl FnOnce() -> String,
) -> String {
    record
        .get(field)
        .and_then(FieldValue::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(fallback)
}

struct CategoryOverride;

impl EntityOverride for CategoryOverride {
    fn entity(&self) -> &'static str {
        "categories"
    }

    fn apply(&self, record: &mut Record, synth: &mut Synthesizer<'_>, rng: &mut dyn RngCore) {
        let base = text_or_else(record, "name", || {
            capitalize(&synth.atomic(AtomicKind::Word, &mut *rng))
        });
        record.insert("name".to_string(), suffixed(base, rng));
    }
}

struct ProductOverride;

impl EntityOverride for ProductOverride {
    fn entity(&self) -> &'static str {
        "products"
    }

    fn apply(&self, record: &mut Record, _synth: &mut Synthesizer<'_>, rng: &mut dyn RngCore) {
        let base = text_or_else(record, "name", || {
            format!("{} Door", DOOR_COLORS[rng.random_range(0..DOOR_COLORS.len())])
        });
        record.insert("name".to_string(), suffixed(base, rng));
        record.insert("is_active".to_string(), FieldValue::Bool(true));

        let price = round2(rng.random_range(50.0..=500.0));
        record.insert("price_usd".to_string(), FieldValue::Number(price));
        // Cost always follows the price drawn here, never a synthesized value.
        let cost = round2(price * rng.random_range(0.5..=0.9));
        record.insert("cost_price_usd".to_string(), FieldValue::Number(cost));
    }
}
