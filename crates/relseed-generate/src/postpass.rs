use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use async_trait::async_trait;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use relseed_core::{FieldValue, Record, round2};

use crate::context::SeedContext;
use crate::faker::AtomicKind;
use crate::model::RuleReport;
use crate::pool::pick;
use crate::registry::{DomainRegistry, PostPassRule};
use crate::synth::Synthesizer;

/// Run every registered rule whose entities are seedable, in registration order.
pub async fn run_post_pass(ctx: &mut SeedContext<'_>, registry: &DomainRegistry) {
    for rule in registry.rules() {
        let runnable = ctx.is_seedable(rule.entity())
            && rule
                .requires()
                .iter()
                .all(|entity| ctx.is_seedable(entity));
        if !runnable {
            debug!(rule = rule.id(), "post-pass rule skipped");
            continue;
        }

        let mut report = RuleReport::new(rule.id(), rule.entity());
        rule.apply(ctx, &mut report).await;
        info!(
            rule = rule.id(),
            entity = rule.entity(),
            existing = report.existing,
            target = report.target,
            written = report.written,
            failures = report.failures,
            "post-pass rule finished"
        );
        ctx.report.post_pass.push(report);
    }
}

/// Inputs available to a top-up body builder.
pub struct BodyInput<'r, 's> {
    pub synth: &'r mut Synthesizer<'s>,
    pub rng: &'r mut ChaCha8Rng,
    pools: &'r BTreeMap<&'static str, Vec<String>>,
    /// Parent record id for per-parent rules.
    pub parent: Option<&'r str>,
}

impl<'r, 's> BodyInput<'r, 's> {
    pub fn new(
        synth: &'r mut Synthesizer<'s>,
        rng: &'r mut ChaCha8Rng,
        pools: &'r BTreeMap<&'static str, Vec<String>>,
        parent: Option<&'r str>,
    ) -> Self {
        Self {
            synth,
            rng,
            pools,
            parent,
        }
    }

    /// Random id from a pre-resolved pool.
    pub fn pick(&mut self, entity: &str) -> Option<FieldValue> {
        let pool = self.pools.get(entity).filter(|pool| !pool.is_empty())?;
        Some(FieldValue::Ref(pick(pool, self.rng)))
    }

    pub fn parent(&self) -> Option<FieldValue> {
        self.parent.map(|id| FieldValue::Ref(id.to_string()))
    }

    pub fn amount(&mut self, range: RangeInclusive<f64>) -> FieldValue {
        FieldValue::Number(round2(self.rng.random_range(range)))
    }

    pub fn date(&mut self) -> FieldValue {
        FieldValue::Date(self.synth.date(self.rng))
    }

    pub fn choice(&mut self, entity: &str, field: &str) -> Option<String> {
        self.synth.enums().pick(entity, field, self.rng)
    }

    pub fn sentence(&mut self) -> FieldValue {
        FieldValue::Text(self.synth.atomic(AtomicKind::Sentence, self.rng))
    }
}

pub type BodyBuilder = for<'r, 's> fn(&mut BodyInput<'r, 's>) -> Record;

/// How a top-up distributes the records it creates.
#[derive(Debug, Clone, PartialEq)]
pub enum TopUpShape {
    /// Create exactly the deficit.
    Flat,
    /// Cycle through parent records, a random number of children each, until
    /// the deficit is covered.
    PerParent {
        parent: &'static str,
        per_parent: RangeInclusive<u32>,
    },
    /// Give every parent a random number of children, but only while the
    /// entity holds less than `ratio` of its target.
    Sparse {
        parent: &'static str,
        per_parent: RangeInclusive<u32>,
        ratio: f64,
    },
}

/// Post-pass rule that tops an entity up to its target count.
pub struct TopUp {
    pub id: &'static str,
    pub entity: &'static str,
    pub requires: &'static [&'static str],
    /// Entities whose pools the body builder draws from.
    pub pools: &'static [&'static str],
    pub shape: TopUpShape,
    pub build: BodyBuilder,
}

impl TopUp {
    async fn create_one(
        &self,
        ctx: &mut SeedContext<'_>,
        rng: &mut ChaCha8Rng,
        pools: &BTreeMap<&'static str, Vec<String>>,
        parent: Option<&str>,
        report: &mut RuleReport,
    ) -> bool {
        let mut record = {
            let mut input = BodyInput::new(&mut ctx.synth, rng, pools, parent);
            (self.build)(&mut input)
        };
        ctx.retain_declared(self.entity, &mut record);

        match ctx.create(self.entity, &record).await {
            Ok(id) => {
                ctx.pools.push(self.entity, id);
                report.written += 1;
                true
            }
            Err(err) => {
                report.failures += 1;
                debug!(rule = self.id, error = %err, "top-up record rejected");
                false
            }
        }
    }
}

#[async_trait]
impl PostPassRule for TopUp {
    fn id(&self) -> &'static str {
        self.id
    }

    fn entity(&self) -> &'static str {
        self.entity
    }

    fn requires(&self) -> &'static [&'static str] {
        self.requires
    }

    async fn apply(&self, ctx: &mut SeedContext<'_>, report: &mut RuleReport) {
        let mut pools = BTreeMap::new();
        for entity in self.pools {
            let pool = ctx.pool(entity).await;
            pools.insert(*entity, pool);
        }
        let mut rng = ctx.rng_for(self.id);

        report.existing = ctx.count(self.entity).await;
        report.target = ctx.options.count_for(self.entity);
        let deficit = report.target.saturating_sub(report.existing);

        match &self.shape {
            TopUpShape::Flat => {
                for _ in 0..deficit {
                    self.create_one(ctx, &mut rng, &pools, None, report).await;
                }
            }
            TopUpShape::PerParent { parent, per_parent } => {
                let parents = ctx.pool(parent).await;
                if parents.is_empty() && deficit > 0 {
                    warn!(rule = self.id, parent = %parent, "no parent records; top-up skipped");
                    return;
                }

                let mut need = deficit;
                let mut index = 0_usize;
                let mut progressed = false;
                while need > 0 {
                    if index > 0 && index % parents.len() == 0 {
                        // A full round over the parents without a single success.
                        if !progressed {
                            warn!(rule = self.id, "every top-up record failed; giving up");
                            break;
                        }
                        progressed = false;
                    }
                    let parent_id = &parents[index % parents.len()];
                    let children = rng.random_range(per_parent.clone());
                    for _ in 0..children {
                        if self
                            .create_one(ctx, &mut rng, &pools, Some(parent_id), report)
                            .await
                        {
                            progressed = true;
                            need -= 1;
                            if need == 0 {
                                break;
                            }
                        }
                    }
                    index += 1;
                }
            }
            TopUpShape::Sparse {
                parent,
                per_parent,
                ratio,
            } => {
                if report.existing as f64 >= report.target as f64 * ratio {
                    debug!(rule = self.id, existing = report.existing, "enough records already");
                    return;
                }
                let parents = ctx.pool(parent).await;
                for parent_id in &parents {
                    let children = rng.random_range(per_parent.clone());
                    for _ in 0..children {
                        self.create_one(ctx, &mut rng, &pools, Some(parent_id), report)
                            .await;
                    }
                }
            }
        }
    }
}
