use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};
use crate::schema::{
    Cardinality, EntityDef, EntityKind, FieldDef, FieldKind, NumberBounds, RelationSpec,
    SchemaIssue, SchemaModel, TextFlavor,
};

/// Anything that can produce a normalized schema.
pub trait SchemaSource {
    fn load(&self) -> Result<SchemaModel>;
}

/// Reads a PocketBase collections export from disk.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SchemaSource for JsonFileSource {
    fn load(&self) -> Result<SchemaModel> {
        let contents = std::fs::read_to_string(&self.path)?;
        let value: Value = serde_json::from_str(&contents)?;
        parse_schema_json(&value)
    }
}

/// Normalize a collections export into a [`SchemaModel`].
///
/// Accepts `{"collections": [...]}` or a bare array. Field attributes are read
/// from the field object first and from a nested `options` object second, so
/// both current and legacy exports load.
pub fn parse_schema_json(value: &Value) -> Result<SchemaModel> {
    let collections = match value {
        Value::Object(map) => map
            .get("collections")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                Error::InvalidSchema("expected a `collections` array".to_string())
            })?,
        Value::Array(items) => items,
        _ => {
            return Err(Error::InvalidSchema(
                "schema export must be an object or an array".to_string(),
            ));
        }
    };

    let mut id_to_name: BTreeMap<String, String> = BTreeMap::new();
    let mut names: BTreeSet<String> = BTreeSet::new();
    for collection in collections {
        let name = collection_name(collection)?;
        if let Some(id) = collection.get("id").and_then(Value::as_str) {
            id_to_name.insert(id.to_string(), name.to_string());
        }
        names.insert(name.to_string());
    }

    let mut model = SchemaModel::default();
    for collection in collections {
        let name = collection_name(collection)?;
        let kind = match collection.get("type").and_then(Value::as_str) {
            Some("auth") => EntityKind::Auth,
            Some("view") => EntityKind::View,
            _ => EntityKind::Base,
        };

        let raw_fields = collection
            .get("fields")
            .or_else(|| collection.get("schema"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let mut fields = Vec::with_capacity(raw_fields.len());
        for raw in raw_fields {
            let field = parse_field(name, raw, &id_to_name, &names, &mut model.issues)?;
            fields.push(field);
        }

        model.entities.push(EntityDef {
            name: name.to_string(),
            kind,
            fields,
        });
    }

    Ok(model)
}

fn collection_name(collection: &Value) -> Result<&str> {
    collection
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidSchema("collection without a name".to_string()))
}

fn parse_field(
    entity: &str,
    raw: &Value,
    id_to_name: &BTreeMap<String, String>,
    names: &BTreeSet<String>,
    issues: &mut Vec<SchemaIssue>,
) -> Result<FieldDef> {
    let name = raw.get("name").and_then(Value::as_str).ok_or_else(|| {
        Error::InvalidSchema(format!("field without a name in '{entity}'"))
    })?;
    let type_name = raw
        .get("type")
        .or_else(|| raw.get("@type"))
        .and_then(Value::as_str)
        .unwrap_or("");

    let kind = match type_name {
        "text" | "url" => FieldKind::Text {
            flavor: TextFlavor::Short,
            max_len: positive_usize(attr(raw, "max")),
        },
        "editor" => FieldKind::Text {
            flavor: TextFlavor::Long,
            max_len: None,
        },
        "json" => FieldKind::Text {
            flavor: TextFlavor::Structured,
            max_len: None,
        },
        "email" => FieldKind::Text {
            flavor: TextFlavor::Email,
            max_len: None,
        },
        "number" => FieldKind::Number(NumberBounds {
            min: attr(raw, "min").and_then(Value::as_f64),
            max: attr(raw, "max").and_then(Value::as_f64),
            only_int: attr(raw, "onlyInt")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }),
        "bool" => FieldKind::Boolean,
        "date" => FieldKind::Date,
        "datetime" => FieldKind::DateTime,
        "select" => FieldKind::Enumerated {
            values: attr(raw, "values")
                .and_then(Value::as_array)
                .map(|values| {
                    values
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            max_select: select_bound(attr(raw, "maxSelect")).unwrap_or(1),
        },
        "relation" => relation_kind(entity, name, raw, id_to_name, names, issues),
        other => FieldKind::Unsupported {
            type_name: other.to_string(),
        },
    };

    Ok(FieldDef {
        name: name.to_string(),
        required: flag(raw, "required"),
        system: flag(raw, "system"),
        primary_key: flag(raw, "primaryKey"),
        kind,
    })
}

fn relation_kind(
    entity: &str,
    field: &str,
    raw: &Value,
    id_to_name: &BTreeMap<String, String>,
    names: &BTreeSet<String>,
    issues: &mut Vec<SchemaIssue>,
) -> FieldKind {
    let reference = attr(raw, "collectionId")
        .or_else(|| attr(raw, "collection"))
        .and_then(Value::as_str);

    let target = reference.and_then(|reference| {
        id_to_name
            .get(reference)
            .cloned()
            .or_else(|| names.contains(reference).then(|| reference.to_string()))
    });

    match target {
        Some(target) => {
            let min = select_bound(attr(raw, "minSelect")).unwrap_or(0);
            let max = select_bound(attr(raw, "maxSelect"));
            FieldKind::Relation(RelationSpec {
                target,
                cardinality: Cardinality::from_bounds(min, max),
            })
        }
        None => {
            let reference = reference.unwrap_or("<missing>");
            warn!(
                code = "unknown_relation_target",
                entity = %entity,
                field = %field,
                target = %reference,
                "relation target not found; field will be left empty"
            );
            issues.push(SchemaIssue {
                code: "unknown_relation_target".to_string(),
                entity: entity.to_string(),
                field: Some(field.to_string()),
                message: format!("relation '{entity}.{field}' targets unknown '{reference}'"),
            });
            FieldKind::Unsupported {
                type_name: "relation".to_string(),
            }
        }
    }
}

fn attr<'a>(raw: &'a Value, key: &str) -> Option<&'a Value> {
    raw.get(key)
        .filter(|value| !value.is_null())
        .or_else(|| raw.get("options").and_then(|options| options.get(key)))
        .filter(|value| !value.is_null())
}

fn flag(raw: &Value, key: &str) -> bool {
    attr(raw, key).and_then(Value::as_bool).unwrap_or(false)
}

fn select_bound(value: Option<&Value>) -> Option<u32> {
    value
        .and_then(Value::as_u64)
        .map(|value| u32::try_from(value).unwrap_or(u32::MAX))
}

fn positive_usize(value: Option<&Value>) -> Option<usize> {
    value
        .and_then(Value::as_u64)
        .filter(|value| *value > 0)
        .and_then(|value| usize::try_from(value).ok())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn resolves_relation_targets_by_id_and_name() {
        let export = json!([
            {"id": "pbc_1", "name": "regions", "type": "base", "fields": []},
            {"id": "pbc_2", "name": "dealers", "type": "base", "fields": [
                {"name": "region", "type": "relation", "required": true,
                 "collectionId": "pbc_1", "maxSelect": 1},
                {"name": "tags", "type": "relation",
                 "options": {"collection": "regions", "minSelect": 1, "maxSelect": 3}}
            ]}
        ]);

        let model = parse_schema_json(&export).expect("parse");
        let dealers = model.entity("dealers").expect("dealers");

        let region = dealers.field("region").expect("region");
        assert!(region.required);
        assert_eq!(
            region.kind,
            FieldKind::Relation(RelationSpec {
                target: "regions".to_string(),
                cardinality: Cardinality::Single,
            })
        );

        let tags = dealers.field("tags").expect("tags");
        assert_eq!(
            tags.kind,
            FieldKind::Relation(RelationSpec {
                target: "regions".to_string(),
                cardinality: Cardinality::Multi { min: 1, max: 3 },
            })
        );
        assert!(model.issues.is_empty());
    }

    #[test]
    fn unknown_relation_target_degrades_to_unsupported() {
        let export = json!({"collections": [
            {"name": "orders", "fields": [
                {"name": "ghost", "type": "relation", "required": true, "collectionId": "nope"}
            ]}
        ]});

        let model = parse_schema_json(&export).expect("parse");
        let ghost = model.entity("orders").and_then(|e| e.field("ghost")).expect("field");
        assert!(matches!(ghost.kind, FieldKind::Unsupported { .. }));
        assert_eq!(model.issues.len(), 1);
        assert_eq!(model.issues[0].code, "unknown_relation_target");
        assert!(model.entity("orders").unwrap().required_targets().is_empty());
    }

    #[test]
    fn rejects_non_collection_payloads() {
        assert!(matches!(
            parse_schema_json(&json!("nope")),
            Err(Error::InvalidSchema(_))
        ));
        assert!(matches!(
            parse_schema_json(&json!({"items": []})),
            Err(Error::InvalidSchema(_))
        ));
    }
}
