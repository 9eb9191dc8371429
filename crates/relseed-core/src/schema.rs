use serde::{Deserialize, Serialize};

/// Normalized schema: the entities of a record store and their fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaModel {
    /// Entities in definition order. Ordering ties are resolved by this order.
    pub entities: Vec<EntityDef>,
    /// Problems found while normalizing the raw schema.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<SchemaIssue>,
}

/// A named category of records with a fixed field list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDef {
    pub name: String,
    pub kind: EntityKind,
    pub fields: Vec<FieldDef>,
}

/// How the store treats an entity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Base,
    /// Account collections; created by the account bootstrap.
    Auth,
    /// Read-only projections; never written.
    View,
}

/// A single field of an entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub required: bool,
    /// Store-managed fields (ids, timestamps, auth internals).
    #[serde(default)]
    pub system: bool,
    #[serde(default)]
    pub primary_key: bool,
    pub kind: FieldKind,
}

/// Closed set of field kinds the synthesizer knows how to handle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Text {
        flavor: TextFlavor,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_len: Option<usize>,
    },
    Number(NumberBounds),
    Boolean,
    Date,
    DateTime,
    Enumerated {
        values: Vec<String>,
        max_select: u32,
    },
    Relation(RelationSpec),
    /// Files, credentials, store-managed dates and anything unrecognized.
    Unsupported { type_name: String },
}

/// Sub-kinds of free-form text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TextFlavor {
    Short,
    Long,
    Structured,
    Email,
}

/// Optional numeric bounds declared by the schema.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct NumberBounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
    #[serde(default)]
    pub only_int: bool,
}

/// Reference to another entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelationSpec {
    pub target: String,
    pub cardinality: Cardinality,
}

/// Number of identifiers a relation field holds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Cardinality {
    Single,
    Multi { min: u32, max: u32 },
}

/// Non-fatal problem detected while normalizing a schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaIssue {
    pub code: String,
    pub entity: String,
    pub field: Option<String>,
    pub message: String,
}

impl SchemaModel {
    pub fn entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.iter().find(|entity| entity.name == name)
    }

    /// Schema-declared allowed values for an enumerated field, if any.
    pub fn enum_values(&self, entity: &str, field: &str) -> Option<&[String]> {
        self.entity(entity)?
            .field(field)
            .and_then(|field| match &field.kind {
                FieldKind::Enumerated { values, .. } => Some(values.as_slice()),
                _ => None,
            })
    }
}

impl EntityDef {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Relation fields paired with their relation spec.
    pub fn relations(&self) -> impl Iterator<Item = (&FieldDef, &RelationSpec)> {
        self.fields.iter().filter_map(|field| match &field.kind {
            FieldKind::Relation(spec) => Some((field, spec)),
            _ => None,
        })
    }

    /// Distinct targets of required relations, in field order.
    pub fn required_targets(&self) -> Vec<&str> {
        let mut targets: Vec<&str> = Vec::new();
        for (field, spec) in self.relations() {
            if field.required && !targets.contains(&spec.target.as_str()) {
                targets.push(spec.target.as_str());
            }
        }
        targets
    }
}

impl FieldDef {
    /// Whether the synthesizer or materializer should produce a value at all.
    pub fn is_generated(&self) -> bool {
        !self.system && !self.primary_key
    }

    pub fn is_relation(&self) -> bool {
        matches!(self.kind, FieldKind::Relation(_))
    }
}

/// Name-like fields are the ones most prone to uniqueness collisions.
pub fn is_name_like(field: &str) -> bool {
    let lower = field.to_lowercase();
    lower.contains("name") || lower.contains("title")
}

impl Cardinality {
    pub fn from_bounds(min_select: u32, max_select: Option<u32>) -> Self {
        match max_select {
            Some(max) if max > 1 => Cardinality::Multi {
                min: min_select.min(max),
                max,
            },
            _ => Cardinality::Single,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cardinality_from_bounds() {
        assert_eq!(Cardinality::from_bounds(0, Some(1)), Cardinality::Single);
        assert_eq!(Cardinality::from_bounds(0, None), Cardinality::Single);
        assert_eq!(
            Cardinality::from_bounds(2, Some(5)),
            Cardinality::Multi { min: 2, max: 5 }
        );
        assert_eq!(
            Cardinality::from_bounds(9, Some(3)),
            Cardinality::Multi { min: 3, max: 3 }
        );
    }

    #[test]
    fn name_like_detection() {
        assert!(is_name_like("name"));
        assert!(is_name_like("display_Name"));
        assert!(is_name_like("title"));
        assert!(!is_name_like("tin"));
    }
}
