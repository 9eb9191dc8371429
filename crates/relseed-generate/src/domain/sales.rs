use async_trait::async_trait;
use rand::{Rng, RngCore};
use tracing::warn;

use relseed_core::{FieldKind, FieldValue, Record, round2};

use crate::context::SeedContext;
use crate::domain::catalog::{suffixed, text_or_else};
use crate::faker::AtomicKind;
use crate::model::RuleReport;
use crate::pool::draw_required;
use crate::postpass::{BodyInput, TopUp, TopUpShape};
use crate::registry::{DomainRegistry, EntityOverride, PostPassRule};
use crate::synth::Synthesizer;

/// Discount kinds the order rules know how to price.
const DISCOUNT_TYPES: &[&str] = &["none", "percent", "amount"];

/// Order relations re-drawn from their current pools.
const REDRAWN_RELATIONS: &[&str] = &["manager", "dealer", "region"];

pub fn register(registry: &mut DomainRegistry) {
    registry.register_override(Box::new(DealerOverride));
    registry.register_rule(Box::new(OrderPatch));
    registry.register_rule(Box::new(TopUp {
        id: "order_items.top_up",
        entity: "order_items",
        requires: &["orders"],
        pools: &["products"],
        shape: TopUpShape::Sparse {
            parent: "orders",
            per_parent: 1..=7,
            ratio: 0.6,
        },
        build: order_item,
    }));
    registry.register_rule(Box::new(TopUp {
        id: "payments.top_up",
        entity: "payments",
        requires: &[],
        pools: &["dealers"],
        shape: TopUpShape::Flat,
        build: payment,
    }));
}

struct DealerOverride;

impl EntityOverride for DealerOverride {
    fn entity(&self) -> &'static str {
        "dealers"
    }

    fn apply(&self, record: &mut Record, synth: &mut Synthesizer<'_>, rng: &mut dyn RngCore) {
        let base = text_or_else(record, "name", || {
            format!("{} Diller", synth.atomic(AtomicKind::City, &mut *rng))
        });
        record.insert("name".to_string(), suffixed(base, rng));
        if !record.get("tin").and_then(FieldValue::as_str).is_some_and(is_tin) {
            let tin = rng.random_range(100_000_000..=999_999_999_u32);
            record.insert("tin".to_string(), FieldValue::Text(tin.to_string()));
        }
    }
}

/// Nine ASCII digits.
fn is_tin(value: &str) -> bool {
    value.len() == 9 && value.bytes().all(|byte| byte.is_ascii_digit())
}

/// Makes order status, discount and ownership fields mutually consistent.
struct OrderPatch;

#[async_trait]
impl PostPassRule for OrderPatch {
    fn id(&self) -> &'static str {
        "orders.patch"
    }

    fn entity(&self) -> &'static str {
        "orders"
    }

    async fn apply(&self, ctx: &mut SeedContext<'_>, report: &mut RuleReport) {
        let schema = ctx.schema;
        let Some(orders) = schema.entity("orders") else {
            return;
        };

        let ids = ctx.pool("orders").await;
        report.existing = ids.len() as u64;
        report.target = ids.len() as u64;

        let mut relations = Vec::new();
        for name in REDRAWN_RELATIONS {
            if let Some(FieldKind::Relation(spec)) = orders.field(name).map(|field| &field.kind) {
                let pool = ctx.pool(&spec.target).await;
                if !pool.is_empty() {
                    relations.push((*name, spec.cardinality, pool));
                }
            }
        }

        let enums = ctx.synth.enums();
        let mut rng = ctx.rng_for(self.id());
        for id in &ids {
            let mut patch = Record::new();
            if let Some(status) = enums.pick("orders", "status", &mut rng) {
                patch.insert("status".to_string(), FieldValue::Text(status));
            }
            if let Some(kind) = enums.pick_within("orders", "discount_type", DISCOUNT_TYPES, &mut rng)
            {
                let value = match kind.as_str() {
                    "percent" => round2(rng.random_range(0.0..=10.0)),
                    "amount" => round2(rng.random_range(0.0..=50.0)),
                    _ => 0.0,
                };
                patch.insert("discount_type".to_string(), FieldValue::Text(kind));
                patch.insert("discount_value".to_string(), FieldValue::Number(value));
            }
            for (field, cardinality, pool) in &relations {
                if let Some(value) = draw_required(pool, *cardinality, &mut rng) {
                    patch.insert(field.to_string(), value);
                }
            }

            ctx.retain_declared("orders", &mut patch);
            if patch.is_empty() {
                continue;
            }
            match ctx.patch("orders", id, &patch).await {
                Ok(()) => report.written += 1,
                Err(err) => {
                    report.failures += 1;
                    warn!(code = err.code(), entity = "orders", id = %id, error = %err, "order patch failed");
                }
            }
        }
    }
}

fn order_item(input: &mut BodyInput<'_, '_>) -> Record {
    let mut record = Record::new();
    insert_opt(&mut record, "order", input.parent());
    insert_opt(&mut record, "product", input.pick("products"));
    record.insert("qty".to_string(), input.amount(1.0..=20.0));
    record.insert("unit_price_usd".to_string(), input.amount(50.0..=500.0));
    record
}

fn payment(input: &mut BodyInput<'_, '_>) -> Record {
    let mut record = Record::new();
    insert_opt(&mut record, "dealer", input.pick("dealers"));
    let currency = input.choice("payments", "currency");
    if let Some(method) = input.choice("payments", "method") {
        record.insert("method".to_string(), FieldValue::Text(method));
    }
    record.insert("amount".to_string(), input.amount(50.0..=3000.0));
    record.insert("date".to_string(), input.date());
    if currency.as_deref() == Some("UZS") {
        record.insert("fx_rate".to_string(), input.amount(12_500.0..=14_000.0));
    }
    if let Some(currency) = currency {
        record.insert("currency".to_string(), FieldValue::Text(currency));
    }
    record
}

pub(crate) fn insert_opt(record: &mut Record, field: &str, value: Option<FieldValue>) {
    if let Some(value) = value {
        record.insert(field.to_string(), value);
    }
}
