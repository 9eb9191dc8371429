use rand::{Rng, RngCore};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use relseed_core::{EntityDef, FieldKind, FieldValue, Record, is_name_like};
use relseed_store::StoreError;

use crate::context::SeedContext;
use crate::fallback::EnumSource;
use crate::model::{EntityOutcome, EntityReport};
use crate::pool::{PendingEntry, PendingRelation, RecordPools, draw_required};
use crate::registry::{DomainRegistry, EntityOverride};

/// Result of submitting one record, including its corrective retry.
#[derive(Debug)]
enum Submission {
    Created { id: String, retried: bool },
    Forbidden(String),
    Failed { error: StoreError, retried: bool },
}

/// Generic pass for one entity.
///
/// Only the shortfall between the store count and the requested count is
/// created, so a rerun against a seeded store tops up instead of doubling.
/// The entity is skipped when a required relation target has no records.
/// Otherwise every record gets its non-relation fields synthesized, entity
/// overrides applied and required relations drawn from the current pools;
/// optional relations are queued in `pending` for the backfill pass.
pub async fn materialize_entity(
    ctx: &mut SeedContext<'_>,
    registry: &DomainRegistry,
    entity: &EntityDef,
    pending: &mut Vec<PendingEntry>,
) -> EntityReport {
    let name = entity.name.as_str();
    let requested = ctx.options.count_for(name);
    let mut report = EntityReport::new(name, requested, EntityOutcome::Completed);
    report.existing = ctx.count(name).await;
    let to_create = requested.saturating_sub(report.existing);
    if to_create == 0 {
        info!(
            entity = %name,
            existing = report.existing,
            requested,
            "target already met; nothing to create"
        );
        report.reason = Some(format!("{} records already present", report.existing));
        return report;
    }

    for target in entity.required_targets() {
        let pool = ctx
            .pools
            .resolve(ctx.store, &mut ctx.report, target, ctx.options.page_size)
            .await;
        if pool.is_empty() {
            warn!(
                code = "pool_empty",
                entity = %name,
                target = %target,
                "required relation target has no records; entity skipped"
            );
            ctx.report.warn(
                "pool_empty",
                name,
                None,
                format!("required pool '{target}' is empty"),
            );
            report.outcome = EntityOutcome::SkippedPoolEmpty;
            report.reason = Some(format!("required pool '{target}' is empty"));
            return report;
        }
    }

    info!(
        entity = %name,
        records = to_create,
        existing = report.existing,
        "seeding entity"
    );
    let mut rng = ctx.rng_for(name);
    let override_rule = if ctx.options.domain_rules {
        registry.override_for(name)
    } else {
        None
    };

    for index in 0..to_create {
        let mut record = build_fields(ctx, entity, override_rule, &mut rng);
        let optional = resolve_relations(&ctx.pools, entity, &mut record, &mut rng);

        match submit(ctx, entity, &mut record, &mut rng).await {
            Submission::Created { id, retried } => {
                if retried {
                    report.retries += 1;
                }
                report.created += 1;
                debug!(entity = %name, id = %id, index, retried, "record created");
                ctx.pools.push(name, id.clone());
                if !optional.is_empty() {
                    pending.push(PendingEntry {
                        entity: name.to_string(),
                        id,
                        relations: optional,
                    });
                }
            }
            Submission::Forbidden(message) => {
                warn!(
                    code = "forbidden",
                    entity = %name,
                    created = report.created,
                    error = %message,
                    "store refused writes; skipping remaining records"
                );
                ctx.report.warn("forbidden", name, None, message.clone());
                report.outcome = EntityOutcome::Forbidden;
                report.reason = Some(message);
                break;
            }
            Submission::Failed { error, retried } => {
                if retried {
                    report.retries += 1;
                }
                warn!(
                    code = error.code(),
                    entity = %name,
                    index,
                    retried,
                    error = %error,
                    "record rejected; aborting entity"
                );
                ctx.report.warn(
                    error.code(),
                    name,
                    error.fields().first().map(String::as_str),
                    error.to_string(),
                );
                report.outcome = EntityOutcome::Aborted;
                report.reason = Some(error.to_string());
                break;
            }
        }
    }

    info!(
        entity = %name,
        created = report.created,
        retries = report.retries,
        outcome = ?report.outcome,
        "entity seeded"
    );
    report
}

fn build_fields(
    ctx: &mut SeedContext<'_>,
    entity: &EntityDef,
    override_rule: Option<&dyn EntityOverride>,
    rng: &mut ChaCha8Rng,
) -> Record {
    let mut record = Record::new();
    for field in entity.fields.iter().filter(|field| !field.is_relation()) {
        if let Some(value) = ctx.synth.synthesize(&entity.name, field, rng) {
            record.insert(field.name.clone(), value);
        }
    }
    if let Some(rule) = override_rule {
        rule.apply(&mut record, &mut ctx.synth, rng);
    }
    ctx.retain_declared(&entity.name, &mut record);
    record
}

/// Draw required relations into `record`; return the optional ones.
fn resolve_relations(
    pools: &RecordPools,
    entity: &EntityDef,
    record: &mut Record,
    rng: &mut ChaCha8Rng,
) -> Vec<PendingRelation> {
    let mut optional = Vec::new();
    for (field, spec) in entity.relations() {
        if !field.is_generated() {
            continue;
        }
        if field.required {
            if let Some(value) = draw_required(pools.get(&spec.target), spec.cardinality, rng) {
                record.insert(field.name.clone(), value);
            }
        } else {
            optional.push(PendingRelation {
                field: field.name.clone(),
                target: spec.target.clone(),
                cardinality: spec.cardinality,
            });
        }
    }
    optional
}

/// Create the record; on a correctable failure mutate it and retry once.
async fn submit(
    ctx: &mut SeedContext<'_>,
    entity: &EntityDef,
    record: &mut Record,
    rng: &mut ChaCha8Rng,
) -> Submission {
    let error = match ctx.create(&entity.name, record).await {
        Ok(id) => return Submission::Created { id, retried: false },
        Err(StoreError::Forbidden(message)) => return Submission::Forbidden(message),
        Err(error) => error,
    };

    if !apply_corrections(ctx.synth.enums(), entity, record, &error, rng) {
        return Submission::Failed {
            error,
            retried: false,
        };
    }
    debug!(entity = %entity.name, error = %error, "retrying record with corrections");

    match ctx.create(&entity.name, record).await {
        Ok(id) => Submission::Created { id, retried: true },
        Err(StoreError::Forbidden(message)) => Submission::Forbidden(message),
        Err(error) => Submission::Failed {
            error,
            retried: true,
        },
    }
}

/// Mutate a rejected record so a retry can succeed. Returns whether anything
/// changed.
///
/// Required enumerated fields that are empty or named by the failure get a
/// legal value. Name-like fields named by a uniqueness conflict get a random
/// suffix.
pub(crate) fn apply_corrections(
    enums: EnumSource<'_>,
    entity: &EntityDef,
    record: &mut Record,
    error: &StoreError,
    rng: &mut dyn RngCore,
) -> bool {
    let mut changed = false;

    for field in entity
        .fields
        .iter()
        .filter(|field| field.required && field.is_generated())
    {
        let FieldKind::Enumerated { max_select, .. } = &field.kind else {
            continue;
        };
        let missing = record
            .get(&field.name)
            .is_none_or(FieldValue::is_blank);
        if !missing && !error.touches_field(&field.name) {
            continue;
        }
        let value = pick_substantive(enums.values(&entity.name, &field.name), rng);
        let value = if *max_select > 1 {
            FieldValue::Choices(vec![value])
        } else {
            FieldValue::Text(value)
        };
        if record.get(&field.name) != Some(&value) {
            record.insert(field.name.clone(), value);
            changed = true;
        }
    }

    if let StoreError::Conflict { fields } = error {
        for field in fields.iter().filter(|field| is_name_like(field)) {
            if let Some(FieldValue::Text(text)) = record.get_mut(field) {
                text.push_str(&format!(" {}", rng.random_range(10_000..=99_999)));
                changed = true;
            }
        }
    }

    changed
}

/// Random value other than `none`, unless `none` is the only one. With no
/// legal values at all the literal `none` is used.
fn pick_substantive(values: &[String], rng: &mut dyn RngCore) -> String {
    let substantive: Vec<&String> = values.iter().filter(|value| *value != "none").collect();
    let candidates = if substantive.is_empty() {
        values.iter().collect()
    } else {
        substantive
    };
    if candidates.is_empty() {
        return "none".to_string();
    }
    candidates[rng.random_range(0..candidates.len())].clone()
}
