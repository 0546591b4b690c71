//! Station list for the filter dropdowns.
//!
//! `GET /api/stations?source=municipal|national` answers the canonical
//! names present in the chosen table, deduplicated and sorted. An unknown
//! source is a 400; a store failure is a 200 with an `unavailable` status.

use std::collections::BTreeSet;

use axum::{
    extract::Query, extract::State, http::StatusCode, response::IntoResponse, routing::get, Json,
    Router,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{error, info};

use crate::error::CoreError;
use crate::models::Source;
use crate::normalize::CanonicalStation;
use crate::pipeline::SnapshotStatus;
use crate::store::ReadingStore;
use crate::Config;

// ---

pub fn router() -> Router<(PgPool, Config)> {
    Router::new().route("/api/stations", get(handler))
}

#[derive(Debug, Deserialize)]
struct StationsQuery {
    source: Option<String>,
}

#[derive(Debug, Serialize)]
struct StationsResponse {
    source: Source,
    status: SnapshotStatus,
    stations: Vec<CanonicalStation>,
}

/// `GET /api/stations?source=municipal|national`: sorted canonical names.
async fn handler(
    Query(params): Query<StationsQuery>,
    State((pool, config)): State<(PgPool, Config)>,
) -> impl IntoResponse {
    // ---
    let source: Source = match params.source.as_deref().unwrap_or("municipal").parse() {
        Ok(source) => source,
        Err(msg) => return (StatusCode::BAD_REQUEST, msg).into_response(),
    };
    info!("GET /api/stations source={source}");

    let names = match super::store(&pool, &config) {
        Ok(store) => store.station_names(source).await,
        Err(e) => Err(e),
    };

    let response = match names {
        Ok(raw) => {
            let stations: BTreeSet<CanonicalStation> = raw
                .iter()
                .map(|n| config.pipeline.normalizer.canonical(n))
                .filter(|s| !s.as_str().is_empty())
                .collect();
            StationsResponse {
                source,
                status: if stations.is_empty() {
                    SnapshotStatus::NoData
                } else {
                    SnapshotStatus::Ready
                },
                stations: stations.into_iter().collect(),
            }
        }
        Err(e) => {
            let err = CoreError::from(e);
            error!("station list failed: {err}");
            StationsResponse {
                source,
                status: SnapshotStatus::from_error(&err),
                stations: Vec::new(),
            }
        }
    };
    (StatusCode::OK, Json(response)).into_response()
}
