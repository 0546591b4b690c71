//! HTTP gateway: merges every sub-router and owns the shared state.

use axum::Router;
use chrono::NaiveDateTime;
use sqlx::PgPool;

use crate::error::StoreError;
use crate::store::PgReadingStore;
use crate::Config;

mod dashboard;
mod health;
mod readings;
mod reports;
mod stations;

// ---

pub fn router(pool: PgPool, config: Config) -> Router {
    // ---
    Router::new()
        .merge(dashboard::router())
        .merge(stations::router())
        .merge(reports::router())
        .merge(readings::router())
        .merge(health::router())
        .with_state((pool, config))
}

/// Per-request store over the shared pool.
fn store(pool: &PgPool, config: &Config) -> Result<PgReadingStore, StoreError> {
    PgReadingStore::new(pool.clone(), &config.municipal_table, &config.national_table)
}

/// Station-local wall time; readings are stored the same way.
fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}
