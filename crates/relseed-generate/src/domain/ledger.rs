use rand::Rng;

use relseed_core::{FieldValue, Record};

use crate::domain::sales::insert_opt;
use crate::postpass::{BodyInput, TopUp, TopUpShape};
use crate::registry::DomainRegistry;

pub fn register(registry: &mut DomainRegistry) {
    registry.register_rule(Box::new(TopUp {
        id: "return_entries.top_up",
        entity: "return_entries",
        requires: &[],
        pools: &["dealers"],
        shape: TopUpShape::Flat,
        build: return_entry,
    }));
    registry.register_rule(Box::new(TopUp {
        id: "return_entry_items.top_up",
        entity: "return_entry_items",
        requires: &["return_entries"],
        pools: &["products"],
        shape: TopUpShape::PerParent {
            parent: "return_entries",
            per_parent: 1..=2,
        },
        build: return_entry_item,
    }));
    registry.register_rule(Box::new(TopUp {
        id: "stock_entries.top_up",
        entity: "stock_entries",
        requires: &[],
        pools: &["suppliers"],
        shape: TopUpShape::Flat,
        build: stock_entry,
    }));
    registry.register_rule(Box::new(TopUp {
        id: "stock_entry_items.top_up",
        entity: "stock_entry_items",
        requires: &["stock_entries"],
        pools: &["products"],
        shape: TopUpShape::PerParent {
            parent: "stock_entries",
            per_parent: 1..=4,
        },
        build: stock_entry_item,
    }));
    registry.register_rule(Box::new(TopUp {
        id: "stock_log.top_up",
        entity: "stock_log",
        requires: &[],
        pools: &["products"],
        shape: TopUpShape::Flat,
        build: stock_movement,
    }));
}

fn return_entry(input: &mut BodyInput<'_, '_>) -> Record {
    let mut record = Record::new();
    insert_opt(&mut record, "dealer", input.pick("dealers"));
    record.insert("date".to_string(), input.date());
    record.insert("note".to_string(), input.sentence());
    record
}

fn return_entry_item(input: &mut BodyInput<'_, '_>) -> Record {
    let mut record = Record::new();
    insert_opt(&mut record, "entry", input.parent());
    insert_opt(&mut record, "product", input.pick("products"));
    record.insert("qty".to_string(), input.amount(1.0..=5.0));
    record.insert("price_usd".to_string(), input.amount(10.0..=180.0));
    record
}

fn stock_entry(input: &mut BodyInput<'_, '_>) -> Record {
    let mut record = Record::new();
    insert_opt(&mut record, "supplier", input.pick("suppliers"));
    record.insert("date".to_string(), input.date());
    record.insert("note".to_string(), input.sentence());
    record
}

fn stock_entry_item(input: &mut BodyInput<'_, '_>) -> Record {
    let mut record = Record::new();
    insert_opt(&mut record, "entry", input.parent());
    insert_opt(&mut record, "product", input.pick("products"));
    record.insert("qty".to_string(), input.amount(1.0..=20.0));
    record.insert("unit_cost_usd".to_string(), input.amount(10.0..=150.0));
    record
}

fn stock_movement(input: &mut BodyInput<'_, '_>) -> Record {
    let mut record = Record::new();
    insert_opt(&mut record, "product", input.pick("products"));
    record.insert(
        "delta".to_string(),
        FieldValue::Int(input.rng.random_range(-10..=10)),
    );
    if let Some(reason) = input.choice("stock_log", "reason") {
        record.insert("reason".to_string(), FieldValue::Text(reason));
    }
    record.insert("date".to_string(), input.date());
    record
}
