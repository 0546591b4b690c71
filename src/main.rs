//! Application entry point for the `hydromet-pipeline` service.
//!
//! This binary wires the startup sequence together:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Establishing a PostgreSQL connection pool
//! - Creating the reading tables if requested
//! - Mounting all API routes via the `routes` gateway
//! - Binding the Axum HTTP server and serving requests
//!
//! # Environment Variables
//! - `DATABASE_URL` (**required**) – PostgreSQL connection string
//! - `HYDROMET_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `HYDROMET_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! See [`hydromet_pipeline::config`] for the rest.
use std::env;

use anyhow::{Context, Result};
use axum::Router;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use hydromet_pipeline::config::{self, mask_db_url};
use hydromet_pipeline::{routes, schema};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let masked = mask_db_url(&cfg.db_url);
    tracing::info!("Attempting to connect to database: {}", masked);

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect(&cfg.db_url)
        .await
        .with_context(|| format!("Failed to connect to database '{masked}'"))?;

    tracing::info!("Successfully connected to database");

    if cfg.create_schema {
        schema::create_schema(&pool, &cfg.municipal_table, &cfg.national_table).await?;
    }

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.bind_addr))?;
    tracing::info!("Listening on {}", cfg.bind_addr);

    let app: Router = routes::router(pool, cfg);
    axum::serve(listener, app).await?;

    Ok(())
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// - Color output: `FORCE_COLOR=1|true|yes` forces it on,
///   `FORCE_COLOR=0|false|no` forces it off, otherwise TTY detection.
/// - Span events via `HYDROMET_SPAN_EVENTS`:
///   - `"full"`       : ENTER, EXIT and CLOSE events with timing
///   - `"enter_exit"` : ENTER and EXIT only
///   - unset or other values: CLOSE only (default)
/// - Level via `RUST_LOG`, or `HYDROMET_LOG_LEVEL` when `RUST_LOG` is unset.
///
/// Called once at startup before any tracing macro fires.
fn init_tracing() {
    // ---
    let span_events = match env::var("HYDROMET_SPAN_EVENTS").as_deref() {
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
        let level = match env::var("HYDROMET_LOG_LEVEL").ok().as_deref() {
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
