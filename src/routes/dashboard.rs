//! Dashboard snapshots for both networks.
//!
//! These handlers always answer 200. Store failures and empty tables come
//! back as a snapshot whose `status` says so, with empty collections, so the
//! page can render its "no data" placeholders.

use axum::{extract::Query, extract::State, routing::get, Json, Router};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{error, info};

use crate::error::CoreError;
use crate::pipeline::{
    refresh_municipal, refresh_national, MunicipalSnapshot, NationalSnapshot, SnapshotStatus,
};
use crate::Config;

// ---

pub fn router() -> Router<(PgPool, Config)> {
    // ---
    Router::new()
        .route("/api/municipal", get(municipal))
        .route("/api/national", get(national))
}

#[derive(Debug, Deserialize)]
struct StationQuery {
    station: Option<String>,
}

async fn municipal(
    Query(params): Query<StationQuery>,
    State((pool, config)): State<(PgPool, Config)>,
) -> Json<MunicipalSnapshot> {
    // ---
    info!("GET /api/municipal station={:?}", params.station);
    let now = super::now();

    let snapshot = match super::store(&pool, &config) {
        Ok(store) => {
            refresh_municipal(
                &store,
                &config.pipeline,
                &config.gazetteer,
                params.station.as_deref(),
                now,
            )
            .await
        }
        Err(e) => {
            let err = CoreError::from(e);
            error!("municipal store misconfigured: {err}");
            MunicipalSnapshot::empty(SnapshotStatus::from_error(&err), now)
        }
    };
    Json(snapshot)
}

async fn national(
    Query(params): Query<StationQuery>,
    State((pool, config)): State<(PgPool, Config)>,
) -> Json<NationalSnapshot> {
    // ---
    info!("GET /api/national station={:?}", params.station);
    let now = super::now();

    let snapshot = match super::store(&pool, &config) {
        Ok(store) => {
            refresh_national(
                &store,
                &config.pipeline,
                &config.gazetteer,
                params.station.as_deref(),
                now,
            )
            .await
        }
        Err(e) => {
            let err = CoreError::from(e);
            error!("national store misconfigured: {err}");
            NationalSnapshot::empty(SnapshotStatus::from_error(&err), now)
        }
    };
    Json(snapshot)
}
