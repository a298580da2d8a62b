//! adt-ingest binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store and consumes the configured message file until it is exhausted.

use std::path::{Path, PathBuf};

use adt_ingest::{Consumer, IngestConfig, JsonLinesSource};
use adt_store_sqlite::SqliteStore;
use anyhow::Context as _;
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "ADT message consumer")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("ADT"))
    .build()
    .context("failed to read config file")?;

  let cfg: IngestConfig = settings
    .try_deserialize()
    .context("failed to deserialise IngestConfig")?;

  let store_path = expand_tilde(&cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let input_path = expand_tilde(&cfg.input_path);
  let source = JsonLinesSource::open(&input_path)
    .await
    .with_context(|| format!("failed to open message file {input_path:?}"))?;

  tracing::info!(store = %store_path.display(), input = %input_path.display(), "consuming messages");
  Consumer::new(store, source)
    .with_retry(cfg.retry_backoff(), cfg.max_retries)
    .run()
    .await
    .context("consumer stopped")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
