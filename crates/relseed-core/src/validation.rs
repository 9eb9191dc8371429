use std::collections::BTreeSet;

use tracing::warn;

use crate::error::{Error, Result};
use crate::schema::{FieldKind, SchemaIssue, SchemaModel};

/// Validate internal consistency of a normalized schema.
///
/// This checks:
/// - duplicate entity names
/// - duplicate field names within an entity
///
/// Relations to unknown entities are not an error; see
/// [`detach_unknown_relations`].
pub fn validate_schema(schema: &SchemaModel) -> Result<()> {
    let mut entities = BTreeSet::new();
    for entity in &schema.entities {
        if !entities.insert(entity.name.as_str()) {
            return Err(Error::InvalidSchema(format!(
                "duplicate entity name: {}",
                entity.name
            )));
        }

        let mut fields = BTreeSet::new();
        for field in &entity.fields {
            if !fields.insert(field.name.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate field name: {}.{}",
                    entity.name, field.name
                )));
            }
        }
    }

    Ok(())
}

/// Degrade relations whose target entity does not exist to unsupported
/// fields, recording one `unknown_relation_target` issue each. Returns the
/// number of fields degraded.
pub fn detach_unknown_relations(schema: &mut SchemaModel) -> usize {
    let names: BTreeSet<String> = schema
        .entities
        .iter()
        .map(|entity| entity.name.clone())
        .collect();

    let mut detached = Vec::new();
    for entity in &mut schema.entities {
        for field in &mut entity.fields {
            let FieldKind::Relation(spec) = &field.kind else {
                continue;
            };
            if names.contains(&spec.target) {
                continue;
            }
            warn!(
                code = "unknown_relation_target",
                entity = %entity.name,
                field = %field.name,
                target = %spec.target,
                "relation target not found; field will be left empty"
            );
            detached.push(SchemaIssue {
                code: "unknown_relation_target".to_string(),
                entity: entity.name.clone(),
                field: Some(field.name.clone()),
                message: format!(
                    "relation '{}.{}' targets unknown '{}'",
                    entity.name, field.name, spec.target
                ),
            });
            field.kind = FieldKind::Unsupported {
                type_name: "relation".to_string(),
            };
        }
    }

    let count = detached.len();
    schema.issues.extend(detached);
    count
}
