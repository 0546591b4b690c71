//! Error taxonomy for the aggregation core and its store adapter.
//!
//! Every variant here is *soft* from the dashboard's point of view: the
//! pipeline converts them into empty or default outputs and logs them. They
//! exist as types so callers can tell "empty because there was no data"
//! apart from "empty because a stage failed".

use thiserror::Error;

use crate::models::Source;

// ---

/// Failures raised inside the aggregation core.
#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    /// The source table was empty, absent, or had nothing in range.
    #[error("no readings available for the {0} network")]
    MissingData(Source),

    /// A field failed numeric coercion.
    #[error("malformed numeric value {value:?}")]
    MalformedValue { value: String },

    /// The heat-index formula is undefined for the given inputs.
    #[error("heat index undefined for t={temp_c} °C, rh={humidity} %")]
    FormulaDomain { temp_c: f64, humidity: f64 },

    /// Retrieval from the reading store failed.
    #[error("reading store unavailable: {0}")]
    UpstreamUnavailable(String),
}

/// Failures raised by a [`crate::store::ReadingStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid table name {0:?}")]
    InvalidTable(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        CoreError::UpstreamUnavailable(err.to_string())
    }
}
