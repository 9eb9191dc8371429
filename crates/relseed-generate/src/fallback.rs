use std::collections::BTreeMap;

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use relseed_core::SchemaModel;

/// Static enumerated values keyed by `entity.field`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FallbackTable(BTreeMap<String, Vec<String>>);

impl Default for FallbackTable {
    fn default() -> Self {
        let table: [(&str, &[&str]); 7] = [
            (
                "orders.status",
                &[
                    "created",
                    "edit_requested",
                    "editable",
                    "packed",
                    "shipped",
                    "reserved",
                ],
            ),
            ("orders.discount_type", &["none", "percent"]),
            ("payments.currency", &["USD", "UZS"]),
            ("payments.method", &["cash", "card", "bank"]),
            ("products.type", &["pg", "po"]),
            (
                "users.role",
                &["admin", "accountant", "manager", "warehouseman", "owner"],
            ),
            ("stock_log.reason", &["sale", "adjust", "return", "initial"]),
        ];

        Self(
            table
                .into_iter()
                .map(|(key, values)| {
                    (
                        key.to_string(),
                        values.iter().map(|value| value.to_string()).collect(),
                    )
                })
                .collect(),
        )
    }
}

impl FallbackTable {
    pub fn new(entries: BTreeMap<String, Vec<String>>) -> Self {
        Self(entries)
    }

    pub fn get(&self, entity: &str, field: &str) -> &[String] {
        self.0
            .get(&format!("{entity}.{field}"))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn insert(&mut self, entity: &str, field: &str, values: Vec<String>) {
        self.0.insert(format!("{entity}.{field}"), values);
    }
}

/// Resolves the legal values of an enumerated field: schema-declared values
/// take priority, the fallback table is consulted only when the schema
/// declares none.
#[derive(Debug, Clone, Copy)]
pub struct EnumSource<'a> {
    schema: &'a SchemaModel,
    fallback: &'a FallbackTable,
}

impl<'a> EnumSource<'a> {
    pub fn new(schema: &'a SchemaModel, fallback: &'a FallbackTable) -> Self {
        Self { schema, fallback }
    }

    pub fn values(&self, entity: &str, field: &str) -> &'a [String] {
        match self.schema.enum_values(entity, field) {
            Some(values) if !values.is_empty() => values,
            _ => self.fallback.get(entity, field),
        }
    }

    /// Uniform pick, or `None` when no legal value is known.
    pub fn pick(&self, entity: &str, field: &str, rng: &mut dyn RngCore) -> Option<String> {
        let values = self.values(entity, field);
        if values.is_empty() {
            return None;
        }
        Some(values[rng.random_range(0..values.len())].clone())
    }

    /// Uniform pick restricted to `allowed`.
    pub fn pick_within(
        &self,
        entity: &str,
        field: &str,
        allowed: &[&str],
        rng: &mut dyn RngCore,
    ) -> Option<String> {
        let values: Vec<&String> = self
            .values(entity, field)
            .iter()
            .filter(|value| allowed.contains(&value.as_str()))
            .collect();
        if values.is_empty() {
            return None;
        }
        Some(values[rng.random_range(0..values.len())].clone())
    }
}
