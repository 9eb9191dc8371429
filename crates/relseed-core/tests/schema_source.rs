use std::path::PathBuf;

use relseed_core::{
    Cardinality, EntityKind, FieldKind, JsonFileSource, SchemaSource, TextFlavor,
    build_dependency_report, validate_schema,
};

fn fixture_source() -> JsonFileSource {
    JsonFileSource::new(
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/store_schema.json"),
    )
}

#[test]
fn fixture_loads_and_validates() {
    let schema = fixture_source().load().expect("load fixture schema");
    validate_schema(&schema).expect("fixture schema is consistent");

    assert_eq!(schema.entities.len(), 10);
    assert!(schema.issues.is_empty());
    assert_eq!(schema.entity("users").map(|e| e.kind), Some(EntityKind::Auth));
    assert_eq!(
        schema.entity("dealer_totals").map(|e| e.kind),
        Some(EntityKind::View)
    );

    let products = schema.entity("products").expect("products");
    assert_eq!(products.required_targets(), vec!["categories"]);
    assert_eq!(
        products.field("type").map(|f| &f.kind),
        Some(&FieldKind::Enumerated {
            values: Vec::new(),
            max_select: 1
        })
    );

    let suppliers = schema.entity("suppliers").expect("suppliers");
    assert!(matches!(
        suppliers.field("note").map(|f| &f.kind),
        Some(FieldKind::Text {
            flavor: TextFlavor::Long,
            ..
        })
    ));

    let dealers = schema.entity("dealers").expect("dealers");
    let served = dealers.field("regions_served").expect("regions_served");
    assert!(matches!(
        &served.kind,
        FieldKind::Relation(spec) if spec.cardinality == Cardinality::Multi { min: 1, max: 4 }
    ));

    assert_eq!(
        schema.enum_values("orders", "discount_type"),
        Some(&["none".to_string(), "percent".to_string()][..])
    );
}

#[test]
fn fixture_orders_dependencies_before_dependents() {
    let schema = fixture_source().load().expect("load fixture schema");
    let report = build_dependency_report(&schema);

    assert!(!report.has_cycle());
    assert_eq!(report.order.len(), schema.entities.len());

    let position = |name: &str| {
        report
            .order
            .iter()
            .position(|item| item == name)
            .unwrap_or_else(|| panic!("{name} missing"))
    };

    assert!(position("regions") < position("dealers"));
    assert!(position("dealers") < position("orders"));
    assert!(position("users") < position("orders"));
    assert!(position("categories") < position("products"));
    assert!(position("orders") < position("order_items"));
    assert!(position("products") < position("order_items"));
}

#[test]
fn missing_file_is_an_io_error() {
    let source = JsonFileSource::new("does/not/exist.json");
    assert!(matches!(source.load(), Err(relseed_core::Error::Io(_))));
}
