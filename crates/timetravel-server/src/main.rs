//! timetravel server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) plus any
//! `TIMETRAVEL_*` environment variables, opens the configured backend and
//! either serves the HTTP API or dumps every stored row as JSON lines.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use timetravel_core::{memory::MemoryBackend, store::HistoryStore};
use timetravel_server::{BackendKind, ServerConfig};
use timetravel_store_sqlite::SqliteBackend;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Versioned record store server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Default)]
enum Command {
  /// Serve the HTTP API (the default).
  #[default]
  Serve,
  /// Print every stored row of the history store to stdout, one JSON
  /// object per line.
  Export,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Logs go to stderr so `export` output stays clean.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("TIMETRAVEL").try_parsing(true))
    .build()
    .context("failed to read config file")?;

  let cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  match (cli.command.unwrap_or_default(), cfg.backend) {
    (Command::Serve, BackendKind::Sqlite) => {
      let backend = open_sqlite(&cfg).await?;
      serve(&cfg, timetravel_server::app(backend)).await
    }
    (Command::Serve, BackendKind::Memory) => {
      tracing::warn!("using the in-memory backend; history is lost on exit");
      serve(&cfg, timetravel_server::app(MemoryBackend::new())).await
    }
    (Command::Export, BackendKind::Sqlite) => {
      let store = HistoryStore::new(open_sqlite(&cfg).await?);
      let rows = timetravel_server::export(&store, std::io::stdout().lock()).await?;
      tracing::info!(rows, "exported");
      Ok(())
    }
    (Command::Export, BackendKind::Memory) => {
      anyhow::bail!("nothing to export: the in-memory backend starts empty")
    }
  }
}

async fn open_sqlite(cfg: &ServerConfig) -> anyhow::Result<SqliteBackend> {
  let path = cfg.resolved_store_path();
  SqliteBackend::open(&path)
    .await
    .with_context(|| format!("failed to open store at {path:?}"))
}

async fn serve(cfg: &ServerConfig, app: axum::Router) -> anyhow::Result<()> {
  let address = cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
