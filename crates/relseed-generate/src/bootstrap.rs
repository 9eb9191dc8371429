use chrono::{Days, Months};
use rand::Rng;
use tracing::{debug, info, warn};

use relseed_core::{EntityDef, EntityKind, FieldValue, Record, round2};
use relseed_store::StoreError;

use crate::context::SeedContext;
use crate::faker::capitalize;
use crate::model::{EntityOutcome, EntityReport};

pub const ACCOUNT_PASSWORD: &str = "Test1234!";

/// One record per day over a trailing window, with a numeric value per day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySeries {
    pub entity: &'static str,
    pub date_field: &'static str,
    pub value_field: &'static str,
    pub months: u32,
    pub min: f64,
    pub max: f64,
}

impl DailySeries {
    pub fn applies_to(&self, entity: &EntityDef) -> bool {
        entity.name == self.entity
            && entity.has_field(self.date_field)
            && entity.has_field(self.value_field)
    }
}

/// Create one verified account per role for every seedable auth entity.
///
/// Accounts left over from earlier runs surface as conflicts and are
/// tolerated. The entity's pool is then listed from the store.
pub async fn bootstrap_accounts(ctx: &mut SeedContext<'_>) {
    let schema = ctx.schema;
    for entity in schema
        .entities
        .iter()
        .filter(|entity| entity.kind == EntityKind::Auth)
    {
        if !ctx.is_seedable(&entity.name) {
            continue;
        }
        let report = seed_accounts(ctx, entity).await;
        ctx.report.entities.push(report);
        ctx.pool(&entity.name).await;
    }
}

async fn seed_accounts(ctx: &mut SeedContext<'_>, entity: &EntityDef) -> EntityReport {
    let enums = ctx.synth.enums();
    let mut roles: Vec<String> = if entity.has_field("role") {
        enums.values(&entity.name, "role").to_vec()
    } else {
        Vec::new()
    };
    if roles.is_empty() {
        roles.push("user".to_string());
    }

    let mut rng = ctx.rng_for(&format!("{}.accounts", entity.name));
    let mut report = EntityReport::new(&entity.name, roles.len() as u64, EntityOutcome::Bootstrapped);
    let mut existing = 0_u64;
    info!(entity = %entity.name, accounts = roles.len(), "bootstrapping accounts");

    for role in &roles {
        let mut record = Record::new();
        for field in entity.fields.iter().filter(|field| !field.is_relation()) {
            if let Some(value) = ctx.synth.synthesize(&entity.name, field, &mut rng) {
                record.insert(field.name.clone(), value);
            }
        }
        record.insert(
            "name".to_string(),
            FieldValue::Text(format!("{} User", capitalize(role))),
        );
        record.insert("role".to_string(), FieldValue::Text(role.clone()));
        record.insert("is_active".to_string(), FieldValue::Bool(true));
        ctx.retain_declared(&entity.name, &mut record);

        // Auth fields go out even when the export does not list them.
        record.insert(
            "email".to_string(),
            FieldValue::Text(format!("{role}@example.com")),
        );
        for key in ["password", "passwordConfirm"] {
            record.insert(key.to_string(), FieldValue::Text(ACCOUNT_PASSWORD.to_string()));
        }
        record.insert("emailVisibility".to_string(), FieldValue::Bool(true));
        record.insert("verified".to_string(), FieldValue::Bool(true));

        match ctx.create(&entity.name, &record).await {
            Ok(id) => {
                report.created += 1;
                ctx.pools.push(&entity.name, id);
            }
            Err(StoreError::Conflict { .. }) => {
                existing += 1;
                debug!(entity = %entity.name, role = %role, "account already exists");
            }
            Err(StoreError::Forbidden(message)) => {
                warn!(code = "forbidden", entity = %entity.name, error = %message, "account bootstrap refused");
                ctx.report
                    .warn("forbidden", &entity.name, None, message.clone());
                report.outcome = EntityOutcome::Forbidden;
                report.reason = Some(message);
                break;
            }
            Err(err) => {
                warn!(code = err.code(), entity = %entity.name, role = %role, error = %err, "account create failed");
                ctx.report
                    .warn(err.code(), &entity.name, None, format!("role {role}: {err}"));
            }
        }
    }

    if existing > 0 {
        report.reason = Some(format!("{existing} accounts already existed"));
    }
    report
}

/// Seed every registered daily series whose entity is seedable and declares
/// the series fields.
pub async fn bootstrap_series(ctx: &mut SeedContext<'_>, series: &[DailySeries]) {
    let schema = ctx.schema;
    for rule in series {
        let Some(entity) = schema.entity(rule.entity) else {
            continue;
        };
        if !ctx.is_seedable(rule.entity) || !rule.applies_to(entity) {
            continue;
        }
        let report = seed_series(ctx, rule).await;
        ctx.report.entities.push(report);
    }
}

async fn seed_series(ctx: &mut SeedContext<'_>, rule: &DailySeries) -> EntityReport {
    let end = ctx.options.reference_date();
    let start = end.checked_sub_months(Months::new(rule.months)).unwrap_or(end);
    let days = (end - start).num_days().max(0) as u64;
    let mut rng = ctx.rng_for(rule.entity);
    let mut report = EntityReport::new(rule.entity, days, EntityOutcome::Bootstrapped);
    let mut duplicates = 0_u64;
    info!(entity = %rule.entity, days, "seeding daily series");

    for offset in 0..days {
        let Some(day) = start.checked_add_days(Days::new(offset)) else {
            break;
        };
        let mut record = Record::new();
        record.insert(rule.date_field.to_string(), FieldValue::Date(day));
        record.insert(
            rule.value_field.to_string(),
            FieldValue::Number(round2(rng.random_range(rule.min..=rule.max))),
        );

        match ctx.create(rule.entity, &record).await {
            Ok(id) => {
                report.created += 1;
                ctx.pools.push(rule.entity, id);
            }
            Err(StoreError::Conflict { .. }) => duplicates += 1,
            Err(StoreError::Forbidden(message)) => {
                warn!(code = "forbidden", entity = %rule.entity, error = %message, "series seeding refused");
                ctx.report.warn("forbidden", rule.entity, None, message.clone());
                report.outcome = EntityOutcome::Forbidden;
                report.reason = Some(message);
                break;
            }
            Err(err) => {
                warn!(code = err.code(), entity = %rule.entity, day = %day, error = %err, "series record failed");
                ctx.report.warn(err.code(), rule.entity, None, format!("{day}: {err}"));
            }
        }
    }

    if duplicates > 0 {
        debug!(entity = %rule.entity, duplicates, "series days already present");
        report.reason = Some(format!("{duplicates} days already present"));
    }
    ctx.pool(rule.entity).await;
    info!(entity = %rule.entity, created = report.created, "daily series seeded");
    report
}

/// Daily USD to UZS exchange rates over the last 14 months.
pub fn fx_rates() -> DailySeries {
    DailySeries {
        entity: "fx_rates",
        date_field: "date",
        value_field: "usd_to_uzs",
        months: 14,
        min: 12_500.0,
        max: 14_000.0,
    }
}
