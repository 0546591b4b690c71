//! Historical reports and their CSV export.
//!
//! Unparseable parameters are the only 4xx answers; a report with nothing
//! in range comes back as 200 with `status: no_data`.

use axum::{
    extract::Query,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{error, info};

use crate::error::CoreError;
use crate::pipeline::SnapshotStatus;
use crate::report::{run_report, to_csv, Granularity, Report, ReportRequest, RequestError};
use crate::Config;

// ---

pub fn router() -> Router<(PgPool, Config)> {
    // ---
    Router::new()
        .route("/api/reports", get(report_json))
        .route("/api/reports/csv", get(report_csv))
}

/// `?source=municipal&stations=A,B&start=2025-03-01&end=2025-03-07&variable=rain&granularity=daily`
#[derive(Debug, Deserialize)]
struct ReportQuery {
    source: String,
    #[serde(default)]
    stations: String,
    start: NaiveDate,
    end: NaiveDate,
    variable: String,
    granularity: Option<String>,
}

impl TryFrom<ReportQuery> for ReportRequest {
    type Error = RequestError;

    fn try_from(q: ReportQuery) -> Result<Self, Self::Error> {
        // ---
        let request = ReportRequest {
            source: q
                .source
                .parse()
                .map_err(|_| RequestError::UnknownSource(q.source.clone()))?,
            stations: q
                .stations
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            start: q.start,
            end: q.end,
            variable: q.variable.parse()?,
            granularity: q
                .granularity
                .as_deref()
                .map_or(Ok(Granularity::Daily), str::parse)?,
        };
        request.validate()?;
        Ok(request)
    }
}

async fn build(pool: &PgPool, config: &Config, request: ReportRequest) -> Report {
    // ---
    match super::store(pool, config) {
        Ok(store) => run_report(&store, request, &config.pipeline).await,
        Err(e) => {
            let err = CoreError::from(e);
            error!("report store misconfigured: {err}");
            Report::empty(SnapshotStatus::from_error(&err), request)
        }
    }
}

async fn report_json(
    Query(params): Query<ReportQuery>,
    State((pool, config)): State<(PgPool, Config)>,
) -> Response {
    // ---
    info!("GET /api/reports {:?}", params);
    let request = match ReportRequest::try_from(params) {
        Ok(r) => r,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };
    Json(build(&pool, &config, request).await).into_response()
}

async fn report_csv(
    Query(params): Query<ReportQuery>,
    State((pool, config)): State<(PgPool, Config)>,
) -> Response {
    // ---
    info!("GET /api/reports/csv {:?}", params);
    let request = match ReportRequest::try_from(params) {
        Ok(r) => r,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };
    let file_name = request.file_name();
    let report = build(&pool, &config, request).await;

    match to_csv(&report) {
        Ok(body) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{file_name}\""),
                ),
            ],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("CSV export failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "CSV export failed").into_response()
        }
    }
}
