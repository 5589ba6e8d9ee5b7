//! Multiplayer number guessing server.
//!
//! Serves the game API over HTTP, backed by either an in-process store or a
//! shared PostgreSQL database.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Error};
use gg_server::{
    api,
    config::{CliOverrides, ServerConfig, StoreBackend},
    logging, metrics,
};
use guessing_game::{GameService, GameStore, MemoryGameStore, db::Database};
use pico_args::Arguments;
use tracing::info;

const HELP: &str = "\
Run a multiplayer number guessing server

USAGE:
  gg_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:6969]
  --store      BACKEND     memory | postgres           [default: env GAME_STORE or memory]
  --db-url     URL         Database connection string  [default: env DATABASE_URL or postgres://postgres@localhost/guess_db]
  --metrics    IP:PORT     Prometheus scrape address   [default: env METRICS_BIND, disabled if unset]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  GAME_STORE               Store backend
  DATABASE_URL             PostgreSQL connection string
  GUESS_RANGE_MIN          Lowest target value (default: 1)
  GUESS_RANGE_MAX          Highest target value (default: 100)
  SESSION_ID_DIGITS        Session id width (default: 4)
  EVENT_WAIT_TIMEOUT_SECS  Long-poll timeout, 0 waits forever (default: 0)
  RUST_LOG                 Log filter (default: info,sqlx=warn,hyper=warn)
";

fn parse_args() -> Result<CliOverrides, Error> {
    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let overrides = CliOverrides {
        bind: pargs.opt_value_from_str::<_, SocketAddr>("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
        store: pargs.opt_value_from_str::<_, StoreBackend>("--store")?,
        metrics_bind: pargs.opt_value_from_str::<_, SocketAddr>("--metrics")?,
    };

    let remaining = pargs.finish();
    if !remaining.is_empty() {
        anyhow::bail!("Unexpected arguments: {:?}", remaining);
    }

    Ok(overrides)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let overrides = parse_args()?;
    logging::init();

    let config = ServerConfig::from_env(overrides)?;
    config.validate()?;

    info!(
        "Starting guessing game server at {} ({} store, range [{}, {}])",
        config.bind, config.store, config.game.range_min, config.game.range_max
    );

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(|e| anyhow::anyhow!(e))?;
        info!("Prometheus metrics on http://{}/metrics", addr);
    }

    let database = match config.store {
        StoreBackend::Memory => None,
        StoreBackend::Postgres => {
            let db = Database::connect(&config.database)
                .await
                .context("Failed to connect to database")?;
            info!("Database connected successfully");
            Some(db)
        }
    };

    let store: Arc<dyn GameStore> = match &database {
        None => Arc::new(MemoryGameStore::new()),
        Some(db) => {
            let store = db.store();
            store
                .ensure_schema()
                .await
                .context("Failed to apply game schema")?;
            Arc::new(store)
        }
    };

    let state = api::AppState::new(GameService::new(store, config.game.clone()));
    let app = api::create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Pending long-polls would otherwise hold shutdown open
            state.begin_shutdown();
        })
        .await
        .context("Server error")?;

    info!("Shutting down server...");

    if let Some(db) = database {
        db.close().await;
    }

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
}
