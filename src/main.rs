//! Application entry point for the `roomtemp-ingest` service.
//!
//! This binary orchestrates the full startup sequence for the room
//! temperature ingestion endpoint, including:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Establishing a PostgreSQL connection pool
//! - Creating the `rooms` / `tempdata` schema if it does not exist
//! - Preparing the storage statements
//! - Serving the submit-reading route over TLS until Ctrl-C / SIGTERM
//!
//! # Environment Variables
//! See [`config::load_from_env`] for the full list. Logging is controlled by:
//! - `LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! Any failure before the listener is up (bad time zone, unreachable
//! database, schema or statement errors, unreadable certificate) aborts the
//! process.
use std::{env, io::IsTerminal, sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use axum::Router;
use axum_server::{tls_rustls::RustlsConfig, Handle};
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

mod config;
mod error;
mod models;
mod routes;
mod schema;
mod store;

pub use config::IngestSettings;
pub use error::IngestError;

// Re-exported for routes/*.rs, which only know their parent module.
pub use models::{zoned_instant, NewReading};
pub use store::{PgStore, ReadingStore};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install the rustls crypto provider"))?;

    tracing::info!(
        "Attempting to connect to database {} on {}",
        cfg.db_name,
        cfg.db_host
    );

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect_with(cfg.connect_options())
        .await
        .with_context(|| {
            format!(
                "Failed to connect to database '{}' on '{}'",
                cfg.db_name, cfg.db_host
            )
        })?;

    tracing::info!("Successfully connected to database");

    schema::create_schema(&pool)
        .await
        .context("Database schema setup failed")?;
    tracing::info!("Database schema ready");

    let store = PgStore::prepare(pool)
        .await
        .context("Failed to prepare storage statements")?;

    let app: Router = routes::router(Arc::new(store), cfg.ingest_settings());

    let tls = RustlsConfig::from_pem_file(&cfg.tls_cert, &cfg.tls_key)
        .await
        .with_context(|| {
            format!(
                "Failed to load TLS certificate '{}' / key '{}'",
                cfg.tls_cert.display(),
                cfg.tls_key.display()
            )
        })?;

    let handle = Handle::new();
    tokio::spawn(shutdown_signal(handle.clone()));

    tracing::info!("Listening on https://{}", cfg.listen_addr);

    axum_server::bind_rustls(cfg.listen_addr, tls)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

// ---

/// Wait for Ctrl-C or SIGTERM, then let in-flight requests finish.
async fn shutdown_signal(handle: Handle) {
    // ---
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by `RUST_LOG`, falling back to `LOG_LEVEL`
///
/// Called once at startup before any logging macros are invoked.
fn init_tracing() {
    // ---
    let span_events = match env::var("SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
