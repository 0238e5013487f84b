use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use credref_config::MigrationConfig;
use credref_migration::{Direction, MigrationDriver, MigrationReport};
use credref_store::{SqliteStore, Store};

/// credref - rewrite how stored workflows and executions reference credentials
#[derive(Parser)]
#[command(name = "credref")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Database connection URL (sqlite:..., or postgres://... with the `postgres` feature)
  #[arg(long, global = true, default_value = "sqlite://database.sqlite")]
  database_url: String,

  /// Path to a JSON migration config file
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Table name prefix (overrides the config file)
  #[arg(long, global = true)]
  table_prefix: Option<String>,

  /// Schema qualifier for table names (overrides the config file)
  #[arg(long, global = true)]
  schema: Option<String>,

  /// Number of most recent active executions to rewrite
  #[arg(long, global = true)]
  recent_executions: Option<u32>,

  /// Maximum number of record writes in flight
  #[arg(long, global = true)]
  concurrency: Option<usize>,

  /// Deadline for the whole run, in seconds
  #[arg(long, global = true)]
  timeout_secs: Option<u64>,

  /// Rewrite in memory and report without writing anything
  #[arg(long, global = true)]
  dry_run: bool,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Convert name references into {id, name} references
  Up,

  /// Convert {id, name} references back into name references
  Down,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let direction = match cli.command {
    Some(Commands::Up) => Direction::Up,
    Some(Commands::Down) => Direction::Down,
    None => {
      println!("credref - use --help to see available commands");
      return Ok(());
    }
  };

  init_tracing();

  let config = build_config(&cli)?;
  let rt = tokio::runtime::Runtime::new()?;
  let report = rt.block_on(async { run_migration(&cli.database_url, config, direction).await })?;

  println!("{}", serde_json::to_string_pretty(&report)?);

  if !report.is_success() {
    bail!(
      "migration {} incomplete: {} record(s) failed{}",
      report.direction,
      report.failures.len(),
      if report.timed_out { ", deadline reached" } else { "" }
    );
  }

  Ok(())
}

fn init_tracing() {
  let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_writer(std::io::stderr)
    .with_target(false)
    .init();
}

fn build_config(cli: &Cli) -> Result<MigrationConfig> {
  let mut config = match &cli.config {
    Some(path) => MigrationConfig::from_file(path)
      .with_context(|| format!("failed to load config file: {}", path.display()))?,
    None => MigrationConfig::default(),
  };

  if let Some(prefix) = &cli.table_prefix {
    config.tables.prefix = prefix.clone();
  }
  if let Some(schema) = &cli.schema {
    config.tables.schema = Some(schema.clone());
  }
  if let Some(limit) = cli.recent_executions {
    config.recent_execution_limit = limit;
  }
  if let Some(concurrency) = cli.concurrency {
    config.concurrency = concurrency;
  }
  if let Some(timeout_secs) = cli.timeout_secs {
    config.timeout_secs = timeout_secs;
  }
  if cli.dry_run {
    config.dry_run = true;
  }

  config.validate().context("invalid migration config")?;
  Ok(config)
}

async fn run_migration(
  database_url: &str,
  config: MigrationConfig,
  direction: Direction,
) -> Result<MigrationReport> {
  let store = connect(database_url, &config).await?;
  let driver = MigrationDriver::new(store, config).context("failed to create migration driver")?;

  driver
    .run(direction)
    .await
    .with_context(|| format!("migration {} failed", direction))
}

async fn connect(database_url: &str, config: &MigrationConfig) -> Result<Arc<dyn Store>> {
  let tables = config.tables.table_names()?;

  if database_url.starts_with("postgres:") || database_url.starts_with("postgresql:") {
    return connect_postgres(database_url, tables).await;
  }

  let pool = sqlx::SqlitePool::connect(database_url)
    .await
    .with_context(|| format!("failed to connect to {}", database_url))?;

  Ok(Arc::new(SqliteStore::new(pool, tables)))
}

#[cfg(feature = "postgres")]
async fn connect_postgres(
  database_url: &str,
  tables: credref_config::TableNames,
) -> Result<Arc<dyn Store>> {
  let pool = sqlx::PgPool::connect(database_url)
    .await
    .with_context(|| format!("failed to connect to {}", database_url))?;

  Ok(Arc::new(credref_store::PgStore::new(pool, tables)))
}

#[cfg(not(feature = "postgres"))]
async fn connect_postgres(
  _database_url: &str,
  _tables: credref_config::TableNames,
) -> Result<Arc<dyn Store>> {
  bail!("postgres support is not enabled; rebuild with `--features postgres`")
}
