mod app;
mod cache;
mod commands;
mod config;
mod desk;
mod event;
mod logging;
mod rescue;
mod ui;

use cache::{CacheBackend, MemoryStorage, SqliteStorage};
use clap::Parser;
use color_eyre::Result;
use rescue::{RescueClient, SyncCoordinator, SyncOptions};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "pawdesk")]
#[command(about = "A terminal desk for animal rescue requests that keeps working offline")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/pawdesk/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Backend base URL, e.g. http://localhost:8080/api
  #[arg(short, long)]
  api_url: Option<String>,

  /// Start without contacting the backend
  #[arg(long)]
  offline: bool,

  /// Keep the cache in memory only
  #[arg(long)]
  ephemeral: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Keep the guard alive so buffered log lines are flushed on exit
  let _log_guard = logging::init()?;

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;

  // Override backend URL if specified on command line
  if let Some(url) = args.api_url {
    config.api.url = url;
  }

  let client = RescueClient::new(&config.api)?;
  let storage = if args.ephemeral {
    CacheBackend::Memory(MemoryStorage::new())
  } else {
    CacheBackend::Sqlite(SqliteStorage::open(config.cache.path.as_deref())?)
  };
  let options = SyncOptions {
    probe_timeout: config.api.probe_timeout(),
    offline: args.offline,
  };
  info!(api = %config.api.url, offline = args.offline, ephemeral = args.ephemeral, "starting pawdesk");

  let events = event::EventHandler::new(Duration::from_millis(250));
  let desk = desk::Desk::new(
    SyncCoordinator::new(client, storage, options),
    events.sender(),
  );

  // Initialize and run the app
  let mut app = app::App::new(config, desk);
  app.run(events).await?;

  Ok(())
}
