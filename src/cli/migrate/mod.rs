//! Migrate command - manages the PostgreSQL schema

use anyhow::Context;
use clap::Args;
use tracing::info;

use crate::config::AppConfig;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::storage::{
    poi_migrations, revert_latest, run_migrations, PostgresConfig, PostgresMigrator,
};

#[derive(Args, Debug, Default)]
pub struct MigrateArgs {
    /// List applied and pending migrations without changing anything
    #[arg(long, conflicts_with = "revert")]
    pub status: bool,

    /// Revert the most recently applied migration
    #[arg(long)]
    pub revert: bool,
}

/// Run migrations against `store.url` / `DATABASE_URL`
pub async fn run(args: MigrateArgs) -> anyhow::Result<()> {
    let config = AppConfig::load().unwrap_or_default();
    init_logging(&config.logging);

    let url = config
        .store
        .url
        .clone()
        .context("store.url (or DATABASE_URL) is required to run migrations")?;

    let pool = PostgresConfig::new(url)
        .with_max_connections(1)
        .with_min_connections(0)
        .with_acquire_timeout(config.store.acquire_timeout_secs)
        .connect()
        .await?;

    if args.status {
        let applied = PostgresMigrator::new(pool).applied_versions().await?;

        for migration in poi_migrations() {
            let state = if applied.contains(&migration.version) {
                "applied"
            } else {
                "pending"
            };
            println!("{:>4}  {:<8} {}", migration.version, state, migration.description);
        }

        return Ok(());
    }

    if args.revert {
        match revert_latest(&pool).await? {
            Some(version) => info!(version, "Reverted migration"),
            None => info!("No applied migrations to revert"),
        }
        return Ok(());
    }

    run_migrations(&pool).await?;
    info!(count = poi_migrations().len(), "Migrations up to date");

    Ok(())
}
