use chrono::{Days, Months, NaiveDate, NaiveTime};
use rand::{Rng, RngCore};

use relseed_core::{
    FieldDef, FieldKind, FieldValue, NumberBounds, TextFlavor, is_name_like, round2,
};

use crate::faker::{AtomicKind, AtomicProvider};
use crate::fallback::EnumSource;
use crate::model::{NumberRange, SeedOptions};

/// Turns one field definition into a value, one handler per field kind.
pub struct Synthesizer<'a> {
    enums: EnumSource<'a>,
    provider: Box<dyn AtomicProvider + 'a>,
    omission_rate: f64,
    number_range: NumberRange,
    window_start: NaiveDate,
    window_days: u64,
}

impl<'a> Synthesizer<'a> {
    pub fn new(
        options: &SeedOptions,
        enums: EnumSource<'a>,
        provider: Box<dyn AtomicProvider + 'a>,
    ) -> Self {
        let end = options.reference_date();
        let start = end
            .checked_sub_months(Months::new(options.date_window_months))
            .unwrap_or(end);
        let window_days = (end - start).num_days().max(0) as u64;

        Self {
            enums,
            provider,
            omission_rate: options.omission_rate,
            number_range: options.number_range,
            window_start: start,
            window_days,
        }
    }

    pub fn enums(&self) -> EnumSource<'a> {
        self.enums
    }

    /// Direct access to the atomic provider for entity overrides and domain rules.
    pub fn atomic(&mut self, kind: AtomicKind, rng: &mut dyn RngCore) -> String {
        self.provider.generate(kind, rng)
    }

    /// Value for `entity.field`, or `None` when the field is left empty.
    ///
    /// Relations and unsupported kinds are always `None`. Optional fields are
    /// omitted with the configured probability; required fields never are.
    pub fn synthesize(
        &mut self,
        entity: &str,
        field: &FieldDef,
        rng: &mut dyn RngCore,
    ) -> Option<FieldValue> {
        if !field.is_generated() {
            return None;
        }

        let value = match &field.kind {
            FieldKind::Relation(_) | FieldKind::Unsupported { .. } => return None,
            FieldKind::Enumerated { max_select, .. } => {
                self.enumerated(entity, &field.name, *max_select, rng)
            }
            FieldKind::Text { flavor, max_len } => {
                Some(self.text(&field.name, *flavor, *max_len, rng))
            }
            FieldKind::Number(bounds) => Some(self.number(bounds, rng)),
            FieldKind::Boolean => Some(FieldValue::Bool(rng.random_bool(0.5))),
            FieldKind::Date => Some(FieldValue::Date(self.date(rng))),
            FieldKind::DateTime => {
                let seconds = rng.random_range(0..86_400);
                let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0)
                    .unwrap_or(NaiveTime::MIN);
                Some(FieldValue::DateTime(self.date(rng).and_time(time)))
            }
        };

        if !field.required && self.omission_rate > 0.0 && rng.random_bool(self.omission_rate) {
            return None;
        }
        value
    }

    fn enumerated(
        &self,
        entity: &str,
        field: &str,
        max_select: u32,
        rng: &mut dyn RngCore,
    ) -> Option<FieldValue> {
        if max_select <= 1 {
            return self.enums.pick(entity, field, rng).map(FieldValue::Text);
        }

        let values = self.enums.values(entity, field);
        if values.is_empty() {
            return None;
        }
        let upper = (max_select as usize).min(values.len());
        let amount = rng.random_range(1..=upper);
        let picked = rand::seq::index::sample(rng, values.len(), amount)
            .into_iter()
            .map(|index| values[index].clone())
            .collect();
        Some(FieldValue::Choices(picked))
    }

    fn text(
        &mut self,
        field: &str,
        flavor: TextFlavor,
        max_len: Option<usize>,
        rng: &mut dyn RngCore,
    ) -> FieldValue {
        let lower = field.to_lowercase();
        let value = if flavor == TextFlavor::Email || lower.contains("email") {
            self.provider.generate(AtomicKind::Email, rng)
        } else if is_name_like(field) {
            self.provider.generate(AtomicKind::Label, rng)
        } else if lower.contains("phone") || lower.contains("tel") {
            self.provider.generate(AtomicKind::Phone, rng)
        } else if lower.contains("human_id") {
            format!("ORD-{}", rng.random_range(100_000..=999_999))
        } else if lower.contains("barcode") {
            format!("MD-{}", rng.random_range(1_000_000_000_u64..=9_999_999_999))
        } else if lower.contains("code") || lower.contains("sku") {
            self.provider.generate(AtomicKind::Code, rng)
        } else if lower.contains("note")
            || lower.contains("reason")
            || lower.contains("comment")
            || lower.contains("description")
            || flavor == TextFlavor::Long
        {
            self.provider.generate(AtomicKind::Sentence, rng)
        } else {
            self.provider.generate(AtomicKind::Word, rng)
        };

        FieldValue::Text(truncate(value, max_len))
    }

    fn number(&self, bounds: &NumberBounds, rng: &mut dyn RngCore) -> FieldValue {
        let min = bounds.min.unwrap_or(self.number_range.min);
        let mut max = bounds.max.unwrap_or(self.number_range.max);
        if max < min {
            max = match bounds.max {
                Some(_) => min,
                None => min + (self.number_range.max - self.number_range.min),
            };
        }

        if bounds.only_int {
            let low = min.ceil() as i64;
            let high = max.floor() as i64;
            // No integer inside the bounds; stay in range rather than round out.
            if low > high {
                return FieldValue::Number(round2(min));
            }
            FieldValue::Int(rng.random_range(low..=high))
        } else if max > min {
            FieldValue::Number(round2(rng.random_range(min..=max)))
        } else {
            FieldValue::Number(round2(min))
        }
    }

    /// Uniform day within the trailing window.
    pub fn date(&self, rng: &mut dyn RngCore) -> NaiveDate {
        let offset = rng.random_range(0..=self.window_days);
        self.window_start
            .checked_add_days(Days::new(offset))
            .unwrap_or(self.window_start)
    }
}

fn truncate(value: String, max_len: Option<usize>) -> String {
    match max_len {
        Some(max) if value.chars().count() > max => value.chars().take(max).collect(),
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use relseed_core::{EntityDef, EntityKind, SchemaModel};

    use super::*;
    use crate::faker::FakerProvider;
    use crate::fallback::FallbackTable;

    fn field(name: &str, required: bool, kind: FieldKind) -> FieldDef {
        FieldDef {
            name: name.to_string(),
            required,
            system: false,
            primary_key: false,
            kind,
        }
    }

    fn schema() -> SchemaModel {
        SchemaModel {
            entities: vec![EntityDef {
                name: "orders".to_string(),
                kind: EntityKind::Base,
                fields: vec![
                    field(
                        "status",
                        true,
                        FieldKind::Enumerated {
                            values: vec!["open".to_string()],
                            max_select: 1,
                        },
                    ),
                    field(
                        "tags",
                        false,
                        FieldKind::Enumerated {
                            values: vec!["a".to_string(), "b".to_string(), "c".to_string()],
                            max_select: 2,
                        },
                    ),
                ],
            }],
            issues: Vec::new(),
        }
    }

    fn options() -> SeedOptions {
        SeedOptions {
            reference_date: NaiveDate::from_ymd_opt(2025, 6, 30),
            omission_rate: 0.0,
            ..SeedOptions::default()
        }
    }

    #[test]
    fn enumerated_fields_stay_within_declared_values() {
        let schema = schema();
        let fallback = FallbackTable::default();
        let options = options();
        let mut synth = Synthesizer::new(
            &options,
            EnumSource::new(&schema, &fallback),
            Box::new(FakerProvider::new()),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let orders = schema.entity("orders").expect("orders");

        for _ in 0..50 {
            let status = synth.synthesize("orders", &orders.fields[0], &mut rng);
            assert_eq!(status, Some(FieldValue::Text("open".to_string())));

            match synth.synthesize("orders", &orders.fields[1], &mut rng) {
                Some(FieldValue::Choices(values)) => {
                    assert!((1..=2).contains(&values.len()));
                    assert!(values.iter().all(|v| ["a", "b", "c"].contains(&v.as_str())));
                }
                other => panic!("unexpected value {other:?}"),
            }
        }
    }

    #[test]
    fn numbers_respect_bounds_and_dates_the_window() {
        let schema = schema();
        let fallback = FallbackTable::default();
        let options = options();
        let mut synth = Synthesizer::new(
            &options,
            EnumSource::new(&schema, &fallback),
            Box::new(FakerProvider::new()),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(2);

        let qty = field(
            "qty",
            true,
            FieldKind::Number(NumberBounds {
                min: Some(1.0),
                max: Some(5.0),
                only_int: true,
            }),
        );
        let day = field("date", true, FieldKind::Date);
        let start = NaiveDate::from_ymd_opt(2023, 12, 30).expect("date");
        let end = NaiveDate::from_ymd_opt(2025, 6, 30).expect("date");

        for _ in 0..100 {
            match synth.synthesize("orders", &qty, &mut rng) {
                Some(FieldValue::Int(value)) => assert!((1..=5).contains(&value)),
                other => panic!("unexpected value {other:?}"),
            }
            match synth.synthesize("orders", &day, &mut rng) {
                Some(FieldValue::Date(value)) => assert!(value >= start && value <= end),
                other => panic!("unexpected value {other:?}"),
            }
        }
    }

    #[test]
    fn integer_fields_without_an_integer_in_range_stay_in_bounds() {
        let schema = schema();
        let fallback = FallbackTable::default();
        let options = options();
        let mut synth = Synthesizer::new(
            &options,
            EnumSource::new(&schema, &fallback),
            Box::new(FakerProvider::new()),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let ratio = field(
            "ratio",
            true,
            FieldKind::Number(NumberBounds {
                min: Some(1.5),
                max: Some(1.7),
                only_int: true,
            }),
        );

        for _ in 0..20 {
            let value = synth
                .synthesize("orders", &ratio, &mut rng)
                .and_then(|value| value.as_f64())
                .expect("numeric value");
            assert!((1.5..=1.7).contains(&value), "value {value}");
        }
    }

    #[test]
    fn text_heuristics_and_absent_kinds() {
        let schema = schema();
        let fallback = FallbackTable::default();
        let options = options();
        let mut synth = Synthesizer::new(
            &options,
            EnumSource::new(&schema, &fallback),
            Box::new(FakerProvider::new()),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let short = FieldKind::Text {
            flavor: TextFlavor::Short,
            max_len: None,
        };

        let human_id = synth
            .synthesize("orders", &field("human_id", true, short.clone()), &mut rng)
            .expect("value");
        assert!(human_id.as_str().is_some_and(|v| v.starts_with("ORD-") && v.len() == 10));

        let barcode = synth
            .synthesize("orders", &field("barcode", true, short.clone()), &mut rng)
            .expect("value");
        assert!(barcode.as_str().is_some_and(|v| v.starts_with("MD-")));

        let limited = FieldKind::Text {
            flavor: TextFlavor::Long,
            max_len: Some(5),
        };
        let note = synth
            .synthesize("orders", &field("note", true, limited), &mut rng)
            .expect("value");
        assert!(note.as_str().is_some_and(|v| v.chars().count() <= 5));

        let file = field(
            "avatar",
            true,
            FieldKind::Unsupported {
                type_name: "file".to_string(),
            },
        );
        assert_eq!(synth.synthesize("orders", &file, &mut rng), None);

        let mut system = field("created", true, FieldKind::DateTime);
        system.system = true;
        assert_eq!(synth.synthesize("orders", &system, &mut rng), None);
    }

    #[test]
    fn optional_fields_are_sometimes_omitted() {
        let schema = schema();
        let fallback = FallbackTable::default();
        let options = SeedOptions {
            omission_rate: 0.5,
            ..options()
        };
        let mut synth = Synthesizer::new(
            &options,
            EnumSource::new(&schema, &fallback),
            Box::new(FakerProvider::new()),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let optional = field("flag", false, FieldKind::Boolean);
        let required = field("flag", true, FieldKind::Boolean);

        let omitted = (0..200)
            .filter(|_| synth.synthesize("orders", &optional, &mut rng).is_none())
            .count();
        assert!(omitted > 0 && omitted < 200);
        assert!((0..200).all(|_| synth.synthesize("orders", &required, &mut rng).is_some()));
    }
}
