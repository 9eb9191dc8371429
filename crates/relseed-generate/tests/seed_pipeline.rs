use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde_json::{Value, json};

use relseed_core::{
    Cardinality, FieldDef, FieldKind, JsonFileSource, RelationSpec, SchemaModel, SchemaSource,
    parse_schema_json,
};
use relseed_generate::{EntityOutcome, SeedEngine, SeedOptions, SeedReport};
use relseed_store::InMemoryStore;

fn options(count: u64) -> SeedOptions {
    SeedOptions {
        default_count: count,
        counts: BTreeMap::new(),
        exclude: BTreeSet::new(),
        seed: Some(7),
        omission_rate: 0.0,
        pause_ms: 0,
        reference_date: NaiveDate::from_ymd_opt(2025, 6, 1),
        domain_rules: false,
        ..SeedOptions::default()
    }
}

fn schema(collections: Value) -> SchemaModel {
    parse_schema_json(&json!({ "collections": collections })).expect("parse schema")
}

fn regions_and_dealers() -> SchemaModel {
    schema(json!([
        {
            "id": "col_regions",
            "name": "regions",
            "type": "base",
            "fields": [
                {"name": "id", "type": "text", "primaryKey": true, "system": true},
                {"name": "name", "type": "text", "required": true}
            ]
        },
        {
            "id": "col_dealers",
            "name": "dealers",
            "type": "base",
            "fields": [
                {"name": "id", "type": "text", "primaryKey": true, "system": true},
                {"name": "name", "type": "text", "required": true},
                {"name": "region", "type": "relation", "collectionId": "col_regions",
                 "maxSelect": 1, "required": true}
            ]
        }
    ]))
}

fn outcome(report: &SeedReport, entity: &str) -> EntityOutcome {
    report
        .entity(entity)
        .unwrap_or_else(|| panic!("{entity} missing from report"))
        .outcome
}

fn ids(records: &[Value]) -> BTreeSet<String> {
    records
        .iter()
        .filter_map(|record| record["id"].as_str().map(str::to_string))
        .collect()
}

#[tokio::test]
async fn dealers_reference_seeded_regions() {
    let schema = regions_and_dealers();
    let store = InMemoryStore::new();
    let report = SeedEngine::new(options(5))
        .run(&schema, &store)
        .await
        .expect("seed run");

    assert_eq!(report.order, vec!["regions", "dealers"]);
    assert_eq!(report.store, "memory");
    assert_eq!(report.seed, 7);

    let regions = store.records("regions");
    let dealers = store.records("dealers");
    assert_eq!(regions.len(), 5);
    assert_eq!(dealers.len(), 5);

    let region_ids = ids(&regions);
    for dealer in &dealers {
        let region = dealer["region"].as_str().expect("dealer region");
        assert!(region_ids.contains(region), "unknown region {region}");
        assert!(!dealer["name"].as_str().unwrap_or_default().is_empty());
    }

    assert_eq!(outcome(&report, "dealers"), EntityOutcome::Completed);
    assert_eq!(report.reconciliation.get("dealers"), Some(&5));
    assert_eq!(report.writes, 10);
}

#[tokio::test]
async fn empty_required_pool_skips_the_entity() {
    let schema = regions_and_dealers();
    let mut opts = options(3);
    opts.exclude.insert("regions".to_string());
    let store = InMemoryStore::new();

    let report = SeedEngine::new(opts)
        .run(&schema, &store)
        .await
        .expect("seed run");

    assert_eq!(outcome(&report, "regions"), EntityOutcome::Excluded);
    assert_eq!(outcome(&report, "dealers"), EntityOutcome::SkippedPoolEmpty);
    assert_eq!(report.warnings_by_code.get("pool_empty"), Some(&1));
    assert_eq!(store.create_calls(), 0);
}

#[tokio::test]
async fn forbidden_entity_stops_and_dependents_skip() {
    let schema = regions_and_dealers();
    let store = InMemoryStore::new().with_forbidden("regions");

    let report = SeedEngine::new(options(4))
        .run(&schema, &store)
        .await
        .expect("forbidden writes do not fail the run");

    let regions = report.entity("regions").expect("regions report");
    assert_eq!(regions.outcome, EntityOutcome::Forbidden);
    assert_eq!(regions.created, 0);
    assert_eq!(outcome(&report, "dealers"), EntityOutcome::SkippedPoolEmpty);
    assert_eq!(report.warnings_by_code.get("forbidden"), Some(&1));
    // One refused attempt, no retries.
    assert_eq!(store.create_calls(), 1);
}

#[tokio::test]
async fn name_conflicts_are_retried_with_a_suffix() {
    let schema = regions_and_dealers();
    let store = InMemoryStore::new().with_unique("regions", "name");

    SeedEngine::new(options(3))
        .run(&schema, &store)
        .await
        .expect("first run");
    // Same seed and a larger target: the first new region name repeats and
    // conflicts.
    let report = SeedEngine::new(options(6))
        .run(&schema, &store)
        .await
        .expect("second run");

    let regions = report.entity("regions").expect("regions report");
    assert_eq!(regions.outcome, EntityOutcome::Completed);
    assert_eq!(regions.existing, 3);
    assert_eq!(regions.created, 3);
    assert!(regions.retries >= 1);

    let names: BTreeSet<String> = store
        .records("regions")
        .iter()
        .filter_map(|record| record["name"].as_str().map(str::to_string))
        .collect();
    assert_eq!(names.len(), 6);
}

#[tokio::test]
async fn schema_values_win_over_fallback_values() {
    let schema = schema(json!([
        {
            "id": "col_orders",
            "name": "orders",
            "type": "base",
            "fields": [
                {"name": "status", "type": "select", "maxSelect": 1, "required": true,
                 "values": ["open", "closed"]},
                {"name": "discount_type", "type": "select", "maxSelect": 1, "required": true,
                 "values": []}
            ]
        }
    ]));
    let store = InMemoryStore::new();

    SeedEngine::new(options(12))
        .run(&schema, &store)
        .await
        .expect("seed run");

    let orders = store.records("orders");
    assert_eq!(orders.len(), 12);
    for order in &orders {
        let status = order["status"].as_str().expect("status");
        assert!(["open", "closed"].contains(&status), "status {status}");
        let discount = order["discount_type"].as_str().expect("discount_type");
        assert!(["none", "percent"].contains(&discount), "discount {discount}");
    }
}

#[tokio::test]
async fn optional_relations_are_backfilled_within_bounds() {
    let schema = schema(json!([
        {
            "id": "col_categories",
            "name": "categories",
            "type": "base",
            "fields": [
                {"name": "name", "type": "text", "required": true},
                {"name": "parent", "type": "relation", "collectionId": "col_categories",
                 "maxSelect": 1, "required": false}
            ]
        },
        {
            "id": "col_products",
            "name": "products",
            "type": "base",
            "fields": [
                {"name": "name", "type": "text", "required": true},
                {"name": "tags", "type": "relation", "collectionId": "col_categories",
                 "minSelect": 1, "maxSelect": 3, "required": false}
            ]
        }
    ]));
    let store = InMemoryStore::new();

    let report = SeedEngine::new(options(6))
        .run(&schema, &store)
        .await
        .expect("seed run");

    assert_eq!(report.backfill.entries, 12);
    assert_eq!(report.backfill.failures, 0);
    assert_eq!(report.backfill.patches + report.backfill.empty, 12);
    assert_eq!(store.patch_calls(), report.backfill.patches);

    let categories = ids(&store.records("categories"));
    for category in store.records("categories") {
        if let Some(parent) = category.get("parent").and_then(Value::as_str) {
            assert!(store.record("categories", parent).is_some(), "parent {parent}");
        }
    }
    for product in store.records("products") {
        let Some(tags) = product.get("tags").and_then(Value::as_array) else {
            continue;
        };
        assert!((1..=3).contains(&tags.len()), "tags {tags:?}");
        for tag in tags {
            assert!(categories.contains(tag.as_str().expect("tag id")));
        }
    }
}

#[tokio::test]
async fn rerun_against_seeded_store_is_tolerated() {
    let schema = JsonFileSource::new(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../relseed-core/tests/fixtures/store_schema.json"
    ))
    .load()
    .expect("load fixture schema");
    let store = InMemoryStore::new()
        .with_unique("users", "email")
        .with_unique("fx_rates", "date");
    let mut opts = options(4);
    opts.domain_rules = true;
    let engine = SeedEngine::new(opts);

    let first = engine.run(&schema, &store).await.expect("first run");
    let second = engine.run(&schema, &store).await.expect("second run");

    assert_eq!(outcome(&first, "users"), EntityOutcome::Bootstrapped);
    assert_eq!(first.reconciliation.get("users"), Some(&5));
    assert_eq!(second.reconciliation.get("users"), Some(&5));
    assert_eq!(second.entity("users").map(|report| report.created), Some(0));

    let rates = first.reconciliation.get("fx_rates").copied().unwrap_or_default();
    assert!(rates > 400);
    assert_eq!(second.reconciliation.get("fx_rates"), Some(&rates));

    assert_eq!(outcome(&second, "dealer_totals"), EntityOutcome::Excluded);
    assert_eq!(first.reconciliation.get("regions"), Some(&4));
    assert_eq!(second.reconciliation.get("regions"), Some(&4));
    let regions = second.entity("regions").expect("regions report");
    assert_eq!(regions.existing, 4);
    assert_eq!(regions.created, 0);
    assert_eq!(regions.outcome, EntityOutcome::Completed);
    for report in &second.entities {
        assert_ne!(report.outcome, EntityOutcome::Aborted, "{}", report.entity);
    }
    assert!(second.post_pass.iter().any(|rule| rule.rule == "orders.patch"));
}

#[tokio::test]
async fn rerun_tops_up_to_the_requested_count() {
    let schema = regions_and_dealers();
    let store = InMemoryStore::new();

    SeedEngine::new(options(2))
        .run(&schema, &store)
        .await
        .expect("first run");
    let report = SeedEngine::new(options(5))
        .run(&schema, &store)
        .await
        .expect("second run");

    for entity in ["regions", "dealers"] {
        let entry = report.entity(entity).expect("entity report");
        assert_eq!(entry.existing, 2, "{entity}");
        assert_eq!(entry.created, 3, "{entity}");
        assert_eq!(report.reconciliation.get(entity), Some(&5));
    }
    assert_eq!(store.create_calls(), 10);
}

#[tokio::test]
async fn relations_to_unknown_entities_are_left_empty() {
    let mut schema = regions_and_dealers();
    let dealers = schema
        .entities
        .iter_mut()
        .find(|entity| entity.name == "dealers")
        .expect("dealers entity");
    dealers.fields.push(FieldDef {
        name: "warehouse".to_string(),
        required: true,
        system: false,
        primary_key: false,
        kind: FieldKind::Relation(RelationSpec {
            target: "warehouses".to_string(),
            cardinality: Cardinality::Single,
        }),
    });
    let store = InMemoryStore::new();

    let report = SeedEngine::new(options(3))
        .run(&schema, &store)
        .await
        .expect("unknown targets do not fail the run");

    assert_eq!(report.warnings_by_code.get("unknown_relation_target"), Some(&1));
    assert!(report.schema_issues.iter().any(|issue| {
        issue.entity == "dealers" && issue.field.as_deref() == Some("warehouse")
    }));
    assert_eq!(outcome(&report, "dealers"), EntityOutcome::Completed);
    let dealers = store.records("dealers");
    assert_eq!(dealers.len(), 3);
    assert!(dealers.iter().all(|dealer| dealer.get("warehouse").is_none()));
}

#[tokio::test]
async fn required_selects_without_values_are_retried_with_none() {
    let schema = schema(json!([
        {
            "id": "col_tickets",
            "name": "tickets",
            "type": "base",
            "fields": [
                {"name": "title", "type": "text", "required": true},
                {"name": "priority", "type": "select", "maxSelect": 1, "required": true,
                 "values": []}
            ]
        }
    ]));
    let store = InMemoryStore::new().with_required("tickets", "priority");

    let report = SeedEngine::new(options(4))
        .run(&schema, &store)
        .await
        .expect("seed run");

    let tickets = report.entity("tickets").expect("tickets report");
    assert_eq!(tickets.outcome, EntityOutcome::Completed);
    assert_eq!(tickets.created, 4);
    assert_eq!(tickets.retries, 4);
    assert_eq!(store.create_calls(), 8);
    for ticket in store.records("tickets") {
        assert_eq!(ticket["priority"], "none");
    }
}

#[tokio::test]
async fn uncorrectable_validation_failures_abort_the_entity() {
    let schema = regions_and_dealers();
    let store = InMemoryStore::new().with_required("regions", "code");

    let report = SeedEngine::new(options(3))
        .run(&schema, &store)
        .await
        .expect("validation failures do not fail the run");

    let regions = report.entity("regions").expect("regions report");
    assert_eq!(regions.outcome, EntityOutcome::Aborted);
    assert_eq!(regions.created, 0);
    assert_eq!(regions.retries, 0);
    assert_eq!(outcome(&report, "dealers"), EntityOutcome::SkippedPoolEmpty);
    assert_eq!(report.warnings_by_code.get("validation_failed"), Some(&1));
    // Nothing to correct, so the record is not resubmitted.
    assert_eq!(store.create_calls(), 1);
}

#[tokio::test]
async fn failed_pool_listing_counts_as_empty() {
    let schema = regions_and_dealers();
    let mut opts = options(3);
    opts.exclude.insert("regions".to_string());
    let store = InMemoryStore::new().with_list_failure("regions");

    let report = SeedEngine::new(opts)
        .run(&schema, &store)
        .await
        .expect("listing failures do not fail the run");

    assert_eq!(outcome(&report, "dealers"), EntityOutcome::SkippedPoolEmpty);
    assert_eq!(report.warnings_by_code.get("pool_list_failed"), Some(&1));
    assert_eq!(report.warnings_by_code.get("pool_empty"), Some(&1));
    assert_eq!(store.create_calls(), 0);
}

#[tokio::test]
async fn required_cycles_are_flagged_and_skipped() {
    let schema = schema(json!([
        {
            "id": "col_a",
            "name": "a",
            "type": "base",
            "fields": [
                {"name": "name", "type": "text", "required": true},
                {"name": "b", "type": "relation", "collectionId": "col_b",
                 "maxSelect": 1, "required": true}
            ]
        },
        {
            "id": "col_b",
            "name": "b",
            "type": "base",
            "fields": [
                {"name": "name", "type": "text", "required": true},
                {"name": "a", "type": "relation", "collectionId": "col_a",
                 "maxSelect": 1, "required": true}
            ]
        }
    ]));
    let store = InMemoryStore::new();

    let report = SeedEngine::new(options(3))
        .run(&schema, &store)
        .await
        .expect("cycles do not fail the run");

    assert_eq!(report.order, vec!["a", "b"]);
    assert_eq!(report.unresolved, vec!["a", "b"]);
    assert_eq!(report.warnings_by_code.get("dependency_cycle"), Some(&1));
    assert_eq!(outcome(&report, "a"), EntityOutcome::SkippedPoolEmpty);
    assert_eq!(outcome(&report, "b"), EntityOutcome::SkippedPoolEmpty);
    assert_eq!(store.create_calls(), 0);
}
