use tracing::{debug, info, warn};

use relseed_core::Record;

use crate::context::SeedContext;
use crate::pool::{PendingEntry, draw_optional};

/// Fill optional relations of records created by the generic pass.
///
/// Each entry is consumed once. Pools are re-resolved per relation, so
/// targets created later in the run are eligible. Failures are recorded and
/// never stop the pass.
pub async fn backfill(ctx: &mut SeedContext<'_>, pending: Vec<PendingEntry>) {
    if pending.is_empty() {
        return;
    }
    info!(entries = pending.len(), "backfilling optional relations");
    let mut rng = ctx.rng_for("backfill");

    for entry in pending {
        ctx.report.backfill.entries += 1;

        let mut patch = Record::new();
        for relation in &entry.relations {
            let pool = ctx
                .pools
                .resolve(ctx.store, &mut ctx.report, &relation.target, ctx.options.page_size)
                .await;
            if let Some(value) = draw_optional(pool, relation.cardinality, &mut rng) {
                patch.insert(relation.field.clone(), value);
            }
        }

        if patch.is_empty() {
            ctx.report.backfill.empty += 1;
            continue;
        }

        match ctx.patch(&entry.entity, &entry.id, &patch).await {
            Ok(()) => {
                ctx.report.backfill.patches += 1;
                debug!(entity = %entry.entity, id = %entry.id, fields = patch.len(), "optional relations patched");
            }
            Err(err) => {
                ctx.report.backfill.failures += 1;
                warn!(
                    code = "backfill_failed",
                    entity = %entry.entity,
                    id = %entry.id,
                    error = %err,
                    "optional relation patch failed"
                );
                ctx.report.warn(
                    "backfill_failed",
                    &entry.entity,
                    None,
                    format!("{}: {err}", entry.id),
                );
            }
        }
    }

    info!(
        entries = ctx.report.backfill.entries,
        patches = ctx.report.backfill.patches,
        failures = ctx.report.backfill.failures,
        "backfill finished"
    );
}
