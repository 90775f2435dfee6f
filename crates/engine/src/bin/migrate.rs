//! Runs the legacy-table hierarchy migration against the configured store.
//!
//! Dry run by default; `--apply` writes. The report is printed to stdout as
//! JSON and the process exits non-zero when it is not clean.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use divemap_domain::MigrationMode;
use divemap_engine::infrastructure::{
    clock::SystemClock,
    config::{load_dotenv_from_repo_root, EngineConfig},
    ports::ClockPort,
    sqlite::SqliteRepositories,
};
use divemap_engine::use_cases::HierarchyMigrator;

const USAGE: &str = "Usage: divemap-migrate [--apply] [--database <url>]\n\n\
Options:\n  --apply            write the migration (default is a dry run)\n  \
--database <url>   override DATABASE_URL\n  --help             show this message";

struct Args {
    mode: MigrationMode,
    database_url: Option<String>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<Option<Args>> {
    let mut parsed = Args {
        mode: MigrationMode::DryRun,
        database_url: None,
    };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--apply" => parsed.mode = MigrationMode::Apply,
            "--dry-run" => parsed.mode = MigrationMode::DryRun,
            "--database" => {
                let url = args.next().context("--database needs a value")?;
                parsed.database_url = Some(url);
            }
            "--help" | "-h" => return Ok(None),
            other => anyhow::bail!("Unknown argument: {other}\n\n{USAGE}"),
        }
    }
    Ok(Some(parsed))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Some(args) = parse_args(std::env::args().skip(1))? else {
        println!("{USAGE}");
        return Ok(());
    };

    load_dotenv_from_repo_root();

    // Logs go to stderr so stdout carries only the report.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "divemap_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = EngineConfig::from_env()?;
    let database_url = args.database_url.unwrap_or(config.database_url);
    let clock: Arc<dyn ClockPort> = Arc::new(SystemClock::new());

    let repos = SqliteRepositories::connect(&database_url, clock.clone())
        .await
        .with_context(|| format!("opening {database_url}"))?;
    let migrator = HierarchyMigrator::new(repos.node.clone(), repos.legacy.clone(), clock);

    let report = migrator.run(args.mode).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.is_clean() {
        tracing::warn!(
            failures = report.failures.len(),
            violations = report.violations.len(),
            "Migration finished with problems"
        );
        std::process::exit(1);
    }
    Ok(())
}
