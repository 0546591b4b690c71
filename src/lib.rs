//! Aggregation and derived-metrics core for a municipal hydro-meteorological
//! dashboard, plus the thin store and HTTP layers around it.
//!
//! Raw readings from two station networks go through name normalization,
//! resampling onto a regular grid, rainfall reconstruction from cumulative
//! counters, trailing-window aggregation, heat-index computation and alert
//! classification. Every refresh is a stateless recomputation.

pub mod alert;
pub mod config;
pub mod error;
pub mod gazetteer;
pub mod heat_index;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod rainfall;
pub mod report;
pub mod resample;
pub mod routes;
pub mod schema;
pub mod store;
pub mod unify;
pub mod windows;

pub use alert::{AlertLevel, AlertThresholds};
pub use config::{Config, PipelineConfig, WindowAnchor};
pub use error::{CoreError, StoreError};
pub use gazetteer::{Coordinates, Gazetteer};
pub use models::{MunicipalReading, NationalReading, Source};
pub use normalize::{normalize, CanonicalStation, Normalizer};
pub use pipeline::{MunicipalSnapshot, NationalSnapshot, SnapshotStatus};
pub use resample::{Grid, RegularSeries};
pub use store::{MemoryStore, PgReadingStore, ReadingStore};
