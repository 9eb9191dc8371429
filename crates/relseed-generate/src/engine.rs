use std::time::Instant;

use tracing::{info, warn};

use relseed_core::{
    EntityKind, SchemaModel, build_dependency_report, detach_unknown_relations, validate_schema,
};
use relseed_store::StoreGateway;

use crate::backfill::backfill;
use crate::bootstrap::{bootstrap_accounts, bootstrap_series};
use crate::context::SeedContext;
use crate::errors::SeedError;
use crate::faker::FakerProvider;
use crate::fallback::EnumSource;
use crate::materializer::materialize_entity;
use crate::model::{EntityOutcome, EntityReport, SeedIssue, SeedOptions, SeedReport};
use crate::postpass::run_post_pass;
use crate::registry::DomainRegistry;
use crate::synth::Synthesizer;

/// Entry point for seeding a record store from a schema.
pub struct SeedEngine {
    options: SeedOptions,
    registry: DomainRegistry,
    run_id: Option<String>,
}

impl SeedEngine {
    /// Engine with the built-in domain rules when `options.domain_rules` is set.
    pub fn new(options: SeedOptions) -> Self {
        let registry = if options.domain_rules {
            DomainRegistry::new()
        } else {
            DomainRegistry::empty()
        };
        Self {
            options,
            registry,
            run_id: None,
        }
    }

    pub fn with_registry(options: SeedOptions, registry: DomainRegistry) -> Self {
        Self {
            options,
            registry,
            run_id: None,
        }
    }

    /// Use `run_id` in the report instead of a fresh UUID.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn options(&self) -> &SeedOptions {
        &self.options
    }

    /// Run every pass against `store` and return the run report.
    ///
    /// Only invalid options or duplicate entity or field names fail the run.
    /// Relations to unknown entities are left empty and store failures are
    /// recorded in the report.
    pub async fn run(
        &self,
        schema: &SchemaModel,
        store: &dyn StoreGateway,
    ) -> Result<SeedReport, SeedError> {
        let start = Instant::now();
        self.options.validate()?;
        validate_schema(schema)?;
        let mut schema = schema.clone();
        detach_unknown_relations(&mut schema);
        let schema = &schema;

        let seed = self.options.seed.unwrap_or_else(rand::random);
        let run_id = self
            .run_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut report = SeedReport::new(run_id.clone(), store.engine(), seed);

        let dependencies = build_dependency_report(schema);
        report.order = dependencies.order.clone();
        report.unresolved = dependencies.cycle.clone();
        report.schema_issues = schema.issues.clone();
        for issue in &schema.issues {
            report.record_warning(SeedIssue {
                level: "warning".to_string(),
                code: issue.code.clone(),
                message: issue.message.clone(),
                entity: Some(issue.entity.clone()),
                field: issue.field.clone(),
            });
        }
        if dependencies.has_cycle() {
            warn!(
                code = "dependency_cycle",
                entities = ?dependencies.cycle,
                "required relations form a cycle; seeding those entities last"
            );
            report.record_warning(SeedIssue {
                level: "warning".to_string(),
                code: "dependency_cycle".to_string(),
                message: format!("unresolved: {}", dependencies.cycle.join(", ")),
                entity: None,
                field: None,
            });
        }

        info!(
            run_id = %run_id,
            store = store.engine(),
            entities = dependencies.summary.nodes,
            relations = dependencies.summary.edges,
            seed,
            "seeding started"
        );

        let synth = Synthesizer::new(
            &self.options,
            EnumSource::new(schema, &self.options.select_fallback),
            Box::new(FakerProvider::new()),
        );
        let mut ctx = SeedContext::new(schema, &self.options, store, synth, report);

        bootstrap_accounts(&mut ctx).await;
        if self.options.domain_rules {
            bootstrap_series(&mut ctx, self.registry.series()).await;
        }

        let mut pending = Vec::new();
        for name in &dependencies.order {
            let Some(entity) = schema.entity(name) else {
                continue;
            };
            if entity.kind == EntityKind::View {
                ctx.report.entities.push(
                    EntityReport::new(name, 0, EntityOutcome::Excluded)
                        .with_reason("read-only view"),
                );
                continue;
            }
            if self.options.is_excluded(name) {
                ctx.report.entities.push(
                    EntityReport::new(name, 0, EntityOutcome::Excluded)
                        .with_reason("excluded by configuration"),
                );
                continue;
            }
            // Accounts and daily series were handled by the bootstrap passes.
            if (entity.kind == EntityKind::Auth || self.registry.is_series_entity(name))
                && ctx.report.entity(name).is_some()
            {
                continue;
            }

            let entity_report =
                materialize_entity(&mut ctx, &self.registry, entity, &mut pending).await;
            ctx.report.entities.push(entity_report);
        }

        backfill(&mut ctx, pending).await;

        if self.options.domain_rules {
            run_post_pass(&mut ctx, &self.registry).await;
        }

        for name in &dependencies.order {
            if !ctx.is_seedable(name) {
                continue;
            }
            let total = ctx.count(name).await;
            ctx.report.reconciliation.insert(name.clone(), total);
        }

        let mut report = ctx.report;
        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            run_id = %report.run_id,
            writes = report.writes,
            warnings = report.warnings.len(),
            duration_ms = report.duration_ms,
            "seeding finished"
        );
        Ok(report)
    }
}
