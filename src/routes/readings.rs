//! Ingestion of reading batches.
//!
//! `POST /api/readings/municipal` and `POST /api/readings/national` take a
//! JSON array of rows. Numeric fields may be numbers, numeric strings or
//! garbage (stored as null). Rows with a blank station name are counted as
//! rejected; a store failure answers 503.

use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router,
};
use serde_json::json;
use sqlx::PgPool;
use tracing::{error, info, warn};

use crate::models::{MunicipalReading, NationalReading};
use crate::store::ReadingStore;
use crate::Config;

// ---

pub fn router() -> Router<(PgPool, Config)> {
    // ---
    Router::new()
        .route("/api/readings/municipal", post(append_municipal))
        .route("/api/readings/national", post(append_national))
}

/// Rows with a blank station name can never be grouped, so they are refused.
fn keep_named<T>(rows: Vec<T>, name: impl Fn(&T) -> &str) -> (Vec<T>, usize) {
    let total = rows.len();
    let kept: Vec<T> = rows.into_iter().filter(|r| !name(r).trim().is_empty()).collect();
    let rejected = total - kept.len();
    (kept, rejected)
}

async fn append_municipal(
    State((pool, config)): State<(PgPool, Config)>,
    Json(rows): Json<Vec<MunicipalReading>>,
) -> impl IntoResponse {
    // ---
    info!("POST /api/readings/municipal - {} rows", rows.len());
    let (rows, rejected) = keep_named(rows, |r| r.station_name.as_str());
    if rejected > 0 {
        warn!(rejected, "municipal rows without station name");
    }

    let result = match super::store(&pool, &config) {
        Ok(store) => store.append_municipal(&rows).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(inserted) => (
            StatusCode::OK,
            Json(json!({ "inserted": inserted, "rejected": rejected })),
        ),
        Err(e) => {
            error!("Failed to store municipal readings: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}

async fn append_national(
    State((pool, config)): State<(PgPool, Config)>,
    Json(rows): Json<Vec<NationalReading>>,
) -> impl IntoResponse {
    // ---
    info!("POST /api/readings/national - {} rows", rows.len());
    let (rows, rejected) = keep_named(rows, |r| r.station_name.as_str());
    if rejected > 0 {
        warn!(rejected, "national rows without station name");
    }

    let result = match super::store(&pool, &config) {
        Ok(store) => store.append_national(&rows).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(inserted) => (
            StatusCode::OK,
            Json(json!({ "inserted": inserted, "rejected": rejected })),
        ),
        Err(e) => {
            error!("Failed to store national readings: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_blank_station_names_are_rejected() {
        // ---
        let rows = vec!["EST_MINDU".to_string(), "  ".to_string(), String::new()];
        let (kept, rejected) = keep_named(rows, |s| s.as_str());
        assert_eq!(kept, vec!["EST_MINDU".to_string()]);
        assert_eq!(rejected, 2);
    }
}
