use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Map, Value, json};

/// Field values of one record, keyed by field name.
pub type Record = BTreeMap<String, FieldValue>;

/// Synthesized value for a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Number(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// Single relation id.
    Ref(String),
    /// Multi relation ids.
    Refs(Vec<String>),
    /// Multi-select enumerated values.
    Choices(Vec<String>),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(value) | FieldValue::Ref(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// True for empty text and empty id or value lists.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Text(value) | FieldValue::Ref(value) => value.is_empty(),
            FieldValue::Refs(values) | FieldValue::Choices(values) => values.is_empty(),
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(value) => Some(*value as f64),
            FieldValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Relation ids held by this value.
    pub fn ref_ids(&self) -> Vec<&str> {
        match self {
            FieldValue::Ref(id) => vec![id.as_str()],
            FieldValue::Refs(ids) => ids.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Bool(value) => Value::Bool(*value),
            FieldValue::Int(value) => json!(value),
            FieldValue::Number(value) => json!(round2(*value)),
            FieldValue::Text(value) | FieldValue::Ref(value) => Value::String(value.clone()),
            FieldValue::Date(value) => Value::String(value.format("%Y-%m-%d").to_string()),
            FieldValue::DateTime(value) => {
                Value::String(value.format("%Y-%m-%dT%H:%M:%S").to_string())
            }
            FieldValue::Refs(values) | FieldValue::Choices(values) => {
                Value::Array(values.iter().cloned().map(Value::String).collect())
            }
        }
    }
}

/// Serialize a record into the JSON object submitted to a store.
pub fn record_to_json(record: &Record) -> Value {
    let mut map = Map::new();
    for (key, value) in record {
        map.insert(key.clone(), value.to_json());
    }
    Value::Object(map)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_values_for_the_store() {
        let mut record = Record::new();
        record.insert("price".to_string(), FieldValue::Number(12.3456));
        record.insert(
            "date".to_string(),
            FieldValue::Date(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()),
        );
        record.insert(
            "tags".to_string(),
            FieldValue::Refs(vec!["a".to_string(), "b".to_string()]),
        );

        let json = record_to_json(&record);
        assert_eq!(json["price"], json!(12.35));
        assert_eq!(json["date"], json!("2024-03-09"));
        assert_eq!(json["tags"], json!(["a", "b"]));
    }
}
