use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use sqlx::migrate::Migrator;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::telemetry::{self};
use crate::telemetry::ops::init::Phase as InitPhase;

static MIGRATOR: Migrator = sqlx::migrate!();

/// Create the agg schema (plan-only by default; use --apply to migrate)
#[derive(Args)]
pub struct InitCmd {
    #[arg(long, default_value_t = false)]
    pub apply: bool,
}

#[derive(Serialize)]
struct MigrationInfo {
    version: i64,
    description: String,
}

#[derive(Serialize)]
struct InitPlan {
    migrations: Vec<MigrationInfo>,
}

#[derive(Serialize)]
struct InitResult {
    applied: bool,
}

pub async fn connect(dsn: &str) -> Result<PgPool> {
    let log = telemetry::init();
    let _s = log.span(&InitPhase::Connect).entered();
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(dsn)
        .await
        .context("connecting to postgres")?;
    Ok(pool)
}

pub async fn run(pool: &PgPool, args: InitCmd) -> Result<()> {
    let log = telemetry::init();
    let _g = log.root_span_kv([("apply", args.apply.to_string())]).entered();

    if !args.apply {
        let _s = log.span(&InitPhase::Plan).entered();
        let migrations: Vec<MigrationInfo> = MIGRATOR
            .iter()
            .map(|m| MigrationInfo { version: m.version, description: m.description.to_string() })
            .collect();
        log.info(format!("📝 Init plan — {} migration(s) embedded", migrations.len()));
        for m in &migrations { log.info(format!("  {} {}", m.version, m.description)); }
        log.info("   Use --apply to execute.");
        if telemetry::config::json_mode() { log.plan(&InitPlan { migrations })?; }
        return Ok(());
    }

    let _s = log.span(&InitPhase::Migrate).entered();
    // idempotent: already-applied migrations are skipped
    MIGRATOR.run(pool).await.context("running migrations")?;
    log.info("✅ Database initialized");
    if telemetry::config::json_mode() { log.result(&InitResult { applied: true })?; }
    Ok(())
}
