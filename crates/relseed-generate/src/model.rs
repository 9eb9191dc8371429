use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use relseed_core::SchemaIssue;

use crate::errors::SeedError;
use crate::fallback::FallbackTable;

/// Options for the seeding engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedOptions {
    /// Records per entity when `counts` has no entry.
    pub default_count: u64,
    /// Per-entity target record counts.
    pub counts: BTreeMap<String, u64>,
    /// Entities that are never written.
    pub exclude: BTreeSet<String>,
    /// Enumerated values keyed by `entity.field`, used when the schema declares none.
    pub select_fallback: FallbackTable,
    /// Base RNG seed. A random seed is drawn (and reported) when absent.
    pub seed: Option<u64>,
    /// Probability of leaving an optional non-relation field empty.
    pub omission_rate: f64,
    /// Length of the trailing window random dates are drawn from.
    pub date_window_months: u32,
    /// Range for numbers whose schema declares no bounds.
    pub number_range: NumberRange,
    /// Page size used when listing existing ids.
    pub page_size: usize,
    /// Pause after this many writes (0 disables pausing).
    pub pause_every: u64,
    pub pause_ms: u64,
    /// End of the date window. Defaults to today.
    pub reference_date: Option<NaiveDate>,
    /// Enables bootstrap series, entity overrides and post-pass rules.
    pub domain_rules: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct NumberRange {
    pub min: f64,
    pub max: f64,
}

impl Default for SeedOptions {
    fn default() -> Self {
        let counts = [
            ("users", 8),
            ("regions", 8),
            ("categories", 10),
            ("suppliers", 6),
            ("products", 80),
            ("dealers", 40),
            ("fx_rates", 420),
            ("orders", 140),
            ("order_items", 900),
            ("payments", 200),
            ("return_entries", 30),
            ("return_entry_items", 60),
            ("stock_entries", 30),
            ("stock_entry_items", 90),
            ("stock_log", 30),
            ("dealer_balance_adjustments", 20),
        ]
        .into_iter()
        .map(|(entity, count)| (entity.to_string(), count))
        .collect();

        let exclude = [
            "activity_log",
            "payment_applications",
            "order_edit_requests",
            "dealer_balance_adjustments",
            "_superusers",
            "_authOrigins",
            "_externalAuths",
            "_mfas",
            "_otps",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();

        Self {
            default_count: 30,
            counts,
            exclude,
            select_fallback: FallbackTable::default(),
            seed: None,
            omission_rate: 0.08,
            date_window_months: 18,
            number_range: NumberRange {
                min: 1.0,
                max: 9999.0,
            },
            page_size: 5000,
            pause_every: 60,
            pause_ms: 20,
            reference_date: None,
            domain_rules: true,
        }
    }
}

impl SeedOptions {
    pub fn count_for(&self, entity: &str) -> u64 {
        self.counts
            .get(entity)
            .copied()
            .unwrap_or(self.default_count)
    }

    pub fn is_excluded(&self, entity: &str) -> bool {
        self.exclude.contains(entity)
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    pub fn validate(&self) -> Result<(), SeedError> {
        if !(0.0..=1.0).contains(&self.omission_rate) {
            return Err(SeedError::InvalidOptions(format!(
                "omission_rate must be within 0..=1, got {}",
                self.omission_rate
            )));
        }
        if !self.number_range.min.is_finite()
            || !self.number_range.max.is_finite()
            || self.number_range.min > self.number_range.max
        {
            return Err(SeedError::InvalidOptions(format!(
                "number_range must be finite with min <= max, got {}..{}",
                self.number_range.min, self.number_range.max
            )));
        }
        if self.page_size == 0 {
            return Err(SeedError::InvalidOptions(
                "page_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// How an entity's generic pass ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntityOutcome {
    Completed,
    /// A required relation target had no records.
    SkippedPoolEmpty,
    /// The store refused writes; earlier records were kept.
    Forbidden,
    /// A record failed after its corrective retry.
    Aborted,
    Excluded,
    /// Seeded by a bootstrap step instead of the generic pass.
    Bootstrapped,
}

/// Summary of one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityReport {
    pub entity: String,
    pub requested: u64,
    /// Records already in the store before this run's pass.
    #[serde(default)]
    pub existing: u64,
    pub created: u64,
    pub retries: u64,
    pub outcome: EntityOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl EntityReport {
    pub fn new(entity: &str, requested: u64, outcome: EntityOutcome) -> Self {
        Self {
            entity: entity.to_string(),
            requested,
            existing: 0,
            created: 0,
            retries: 0,
            outcome,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackfillReport {
    /// Pending entries consumed.
    pub entries: u64,
    pub patches: u64,
    /// Entries with nothing to patch.
    pub empty: u64,
    pub failures: u64,
}

/// Summary of one post-pass rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleReport {
    pub rule: String,
    pub entity: String,
    pub existing: u64,
    pub target: u64,
    pub written: u64,
    pub failures: u64,
}

impl RuleReport {
    pub fn new(rule: &str, entity: &str) -> Self {
        Self {
            rule: rule.to_string(),
            entity: entity.to_string(),
            existing: 0,
            target: 0,
            written: 0,
            failures: 0,
        }
    }
}

/// Structured seeding issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedIssue {
    pub level: String,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// Report for a seeding run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedReport {
    pub run_id: String,
    pub store: String,
    pub seed: u64,
    pub order: Vec<String>,
    /// Entities stuck on a required-relation cycle.
    pub unresolved: Vec<String>,
    pub schema_issues: Vec<SchemaIssue>,
    pub entities: Vec<EntityReport>,
    pub backfill: BackfillReport,
    pub post_pass: Vec<RuleReport>,
    /// Record counts re-queried from the store after the run.
    pub reconciliation: BTreeMap<String, u64>,
    pub writes: u64,
    pub duration_ms: u64,
    pub warnings_by_code: BTreeMap<String, u64>,
    pub warnings: Vec<SeedIssue>,
}

impl SeedReport {
    pub fn new(run_id: String, store: &str, seed: u64) -> Self {
        Self {
            run_id,
            store: store.to_string(),
            seed,
            order: Vec::new(),
            unresolved: Vec::new(),
            schema_issues: Vec::new(),
            entities: Vec::new(),
            backfill: BackfillReport::default(),
            post_pass: Vec::new(),
            reconciliation: BTreeMap::new(),
            writes: 0,
            duration_ms: 0,
            warnings_by_code: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    pub fn entity(&self, name: &str) -> Option<&EntityReport> {
        self.entities.iter().find(|report| report.entity == name)
    }

    pub fn record_warning(&mut self, issue: SeedIssue) {
        *self.warnings_by_code.entry(issue.code.clone()).or_insert(0) += 1;
        self.warnings.push(issue);
    }

    /// Shorthand for an entity-scoped warning.
    pub fn warn(&mut self, code: &str, entity: &str, field: Option<&str>, message: String) {
        self.record_warning(SeedIssue {
            level: "warning".to_string(),
            code: code.to_string(),
            message,
            entity: Some(entity.to_string()),
            field: field.map(str::to_string),
        });
    }
}
