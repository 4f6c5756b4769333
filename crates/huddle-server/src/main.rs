//! huddle server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) plus `HUDDLE__*`
//! environment variables, opens the SQLite store, and serves the JSON API.
//! The maintenance subcommands run one delivery-ledger job and exit.
//!
//! ```
//! huddle serve
//! huddle reprocess --max-age-hours 24
//! huddle add-user --name 教练 --admin
//! ```

mod settings;

use std::{path::PathBuf, sync::Arc, time::Duration as StdDuration};

use anyhow::Context as _;
use axum::Router;
use chrono::Duration;
use clap::{Parser, Subcommand};
use huddle_cascade::{Engine, LogSender};
use huddle_core::{
  clock::{Clock as _, SystemClock},
  store::Directory,
  user::{NewUser, Role},
};
use huddle_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::{ServerConfig, expand_tilde};

type ServerEngine = Engine<SqliteStore, LogSender>;

#[derive(Parser)]
#[command(author, version, about = "Huddle training coordinator")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the JSON API (the default).
  Serve,

  /// Retry recent failed cancellation notices once.
  Reprocess {
    #[arg(long, default_value_t = 24)]
    max_age_hours: i64,
    /// Defaults to the configured retry limit.
    #[arg(long)]
    max_retries:   Option<u32>,
  },

  /// Print delivery statistics as JSON.
  Stats {
    #[arg(long, default_value_t = 7)]
    days: u32,
  },

  /// Print the failed-notice breakdown as JSON.
  Failures,

  /// Delete notification records older than the retention window.
  Cleanup {
    #[arg(long, default_value_t = 30)]
    retention_days: i64,
  },

  /// Add a user and print their id.
  AddUser {
    #[arg(long)]
    name:  String,
    #[arg(long)]
    admin: bool,
  },
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
  let server_cfg = settings::load(&cli.config)?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let engine = Arc::new(Engine::new(
    store,
    LogSender,
    Arc::new(SystemClock),
    server_cfg.engine.clone(),
  ));

  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => serve(engine, &server_cfg).await,
    Command::Reprocess { max_age_hours, max_retries } => {
      anyhow::ensure!(max_age_hours > 0, "--max-age-hours must be positive");
      let max_age = Duration::try_hours(max_age_hours)
        .context("--max-age-hours is out of range")?;
      let max_retries =
        max_retries.unwrap_or(server_cfg.engine.dispatch.retry.max_retries);
      let result = engine
        .delivery()
        .reprocess(max_age, max_retries)
        .await
        .context("reprocessing failed")?;
      print_json(&result)
    }
    Command::Stats { days } => {
      let stats = engine.delivery().stats(days).await.context("stats failed")?;
      print_json(&stats)
    }
    Command::Failures => {
      let analysis = engine
        .delivery()
        .analyze_failures()
        .await
        .context("failure analysis failed")?;
      print_json(&analysis)
    }
    Command::Cleanup { retention_days } => {
      anyhow::ensure!(retention_days > 0, "--retention-days must be positive");
      let retention = Duration::try_days(retention_days)
        .context("--retention-days is out of range")?;
      let removed = engine
        .delivery()
        .cleanup(retention)
        .await
        .context("cleanup failed")?;
      println!("{removed}");
      Ok(())
    }
    Command::AddUser { name, admin } => {
      let user = engine
        .store()
        .add_user(NewUser {
          display_name: Some(name),
          real_name:    None,
          role:         if admin { Role::Admin } else { Role::Member },
          created_at:   SystemClock.now(),
        })
        .await
        .context("failed to add user")?;
      println!("{}", user.user_id);
      Ok(())
    }
  }
}

async fn serve(engine: Arc<ServerEngine>, server_cfg: &ServerConfig) -> anyhow::Result<()> {
  if let Some(secs) = server_cfg.reprocess_interval_secs.filter(|s| *s > 0) {
    tokio::spawn(reprocess_loop(Arc::clone(&engine), StdDuration::from_secs(secs)));
  }

  let app = Router::new()
    .nest("/api", huddle_api::api_router(engine))
    .layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  Ok(())
}

/// Periodic reprocessing of failed notices. Errors are logged and the next
/// tick tries again.
async fn reprocess_loop(engine: Arc<ServerEngine>, period: StdDuration) {
  let max_retries = engine.config().dispatch.retry.max_retries;
  let mut ticker = tokio::time::interval(period);
  ticker.tick().await;
  loop {
    ticker.tick().await;
    if let Err(e) = engine
      .delivery()
      .reprocess(huddle_cascade::delivery::default_reprocess_age(), max_retries)
      .await
    {
      tracing::warn!(error = %e, "scheduled reprocessing failed");
    }
  }
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::warn!(error = %e, "could not listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutting down");
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
