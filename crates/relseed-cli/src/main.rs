mod config;
mod registry;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use registry::{RunContext, init_console_logging, init_run_logging, start_run, write_report};
use relseed_core::{
    Error as CoreError, JsonFileSource, SchemaSource, build_dependency_report,
    detach_unknown_relations, validate_schema,
};
use relseed_generate::{EntityOutcome, SeedEngine, SeedError, SeedReport};
use relseed_store::{InMemoryStore, PocketBaseGateway, StoreError};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("seed error: {0}")]
    Seed(#[from] SeedError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "relseed", version, about = "Seed a PocketBase store from its schema")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Seed the store with generated records.
    Seed(SeedArgs),
    /// Print the creation order derived from the schema.
    Order(OrderArgs),
}

#[derive(Args, Debug)]
struct SeedArgs {
    /// Collections export (JSON).
    #[arg(long, env = "PB_SCHEMA", value_name = "PATH")]
    schema: PathBuf,
    /// Store base URL.
    #[arg(long, env = "PB_BASE", default_value = "http://127.0.0.1:8090")]
    base_url: String,
    /// Superuser token used as bearer authentication.
    #[arg(long, env = "PB_TOKEN", hide_env_values = true)]
    token: Option<String>,
    /// TOML file with seeding options.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Output directory for runs.
    #[arg(long, default_value = "runs")]
    run_dir: PathBuf,
    /// RNG seed; overrides the config file.
    #[arg(long)]
    seed: Option<u64>,
    /// Records per entity without an explicit count; overrides the config file.
    #[arg(long)]
    count: Option<u64>,
    /// Entity to leave untouched (repeatable).
    #[arg(long, value_name = "ENTITY")]
    exclude: Vec<String>,
    /// Seed an in-memory store instead of the remote one.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
    /// Disable account/series bootstrap rules, overrides and the post-pass.
    #[arg(long, default_value_t = false)]
    no_domain_rules: bool,
}

#[derive(Args, Debug)]
struct OrderArgs {
    /// Collections export (JSON).
    #[arg(long, env = "PB_SCHEMA", value_name = "PATH")]
    schema: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Seed(args) => run_seed(args).await,
        Command::Order(args) => run_order(args),
    }
}

async fn run_seed(args: SeedArgs) -> Result<(), CliError> {
    let SeedArgs {
        schema: schema_path,
        base_url,
        token,
        config,
        run_dir,
        seed,
        count,
        exclude,
        dry_run,
        no_domain_rules,
    } = args;

    let mut options = config::load_options(config.as_deref())?;
    if seed.is_some() {
        options.seed = seed;
    }
    if let Some(count) = count {
        options.default_count = count;
    }
    options.exclude.extend(exclude);
    if no_domain_rules {
        options.domain_rules = false;
    }
    options.validate()?;

    let schema = JsonFileSource::new(&schema_path).load()?;
    validate_schema(&schema)?;

    let token = token.filter(|token| !token.is_empty());
    let run_id = Uuid::new_v4().to_string();
    let run_ctx = RunContext {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        store: if dry_run { "memory" } else { "pocketbase" }.to_string(),
        base_url: base_url.clone(),
        token_supplied: token.is_some(),
        schema_path,
        run_dir,
        options: options.clone(),
    };

    let run_paths = start_run(&run_ctx)?;
    init_run_logging(&run_paths.logs_path)?;

    tracing::info!(event = "run_started", run_id = %run_id, store = %run_ctx.store, dry_run);

    let engine = SeedEngine::new(options).with_run_id(run_id);
    let report = if dry_run {
        let store = InMemoryStore::new();
        engine.run(&schema, &store).await?
    } else {
        let store = PocketBaseGateway::new(base_url, token.clone())?;
        engine.run(&schema, &store).await?
    };

    write_report(&run_paths, &report)?;
    tracing::info!(
        event = "run_finished",
        report = %run_paths.report_path.display(),
        duration_ms = report.duration_ms
    );

    print_summary(&report);
    println!("run directory: {}", run_paths.root.display());

    if token.is_none() && !dry_run {
        tracing::warn!(
            code = "missing_token",
            "no store token supplied; collections with access rules may have refused writes"
        );
    }

    Ok(())
}

fn run_order(args: OrderArgs) -> Result<(), CliError> {
    init_console_logging();

    let mut schema = JsonFileSource::new(&args.schema).load()?;
    validate_schema(&schema)?;
    detach_unknown_relations(&mut schema);
    for issue in &schema.issues {
        tracing::warn!(code = %issue.code, entity = %issue.entity, "{}", issue.message);
    }

    let report = build_dependency_report(&schema);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_summary(report: &SeedReport) {
    println!("seed {} against {} (seed {})", report.run_id, report.store, report.seed);
    for entity in &report.entities {
        let total = report
            .reconciliation
            .get(&entity.entity)
            .map(|total| total.to_string())
            .unwrap_or_else(|| "-".to_string());
        let outcome = match entity.outcome {
            EntityOutcome::Completed => "completed",
            EntityOutcome::SkippedPoolEmpty => "skipped (empty pool)",
            EntityOutcome::Forbidden => "forbidden",
            EntityOutcome::Aborted => "aborted",
            EntityOutcome::Excluded => "excluded",
            EntityOutcome::Bootstrapped => "bootstrapped",
        };
        println!(
            "  {:<28} {:>6}/{:<6} total {:>6}  {}",
            entity.entity, entity.created, entity.requested, total, outcome
        );
    }
    println!(
        "backfill: {} patched, {} empty, {} failed",
        report.backfill.patches, report.backfill.empty, report.backfill.failures
    );
    for rule in &report.post_pass {
        println!(
            "rule {}: {} written, {} failed",
            rule.rule, rule.written, rule.failures
        );
    }
    if !report.warnings_by_code.is_empty() {
        let counts: Vec<String> = report
            .warnings_by_code
            .iter()
            .map(|(code, count)| format!("{code}={count}"))
            .collect();
        println!("warnings: {}", counts.join(", "));
    }
}
