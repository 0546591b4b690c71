//! Configuration loader for the `hydromet-pipeline` service.
//!
//! All runtime settings come from environment variables (with optional
//! `.env` support provided by the caller). The pipeline-facing part lives in
//! [`PipelineConfig`], which is plain data so tests can build one directly
//! without touching the environment.
//!
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::Duration;

use crate::alert::AlertThresholds;
use crate::gazetteer::Gazetteer;
use crate::normalize::Normalizer;
use crate::resample::Grid;

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse an optional boolean environment variable with a default value.
macro_rules! parse_env_bool {
    ($var_name:expr, $default:expr) => {
        match env::var($var_name).ok().as_deref().map(str::trim) {
            None => $default,
            Some("1") | Some("true") | Some("yes") => true,
            Some("0") | Some("false") | Some("no") => false,
            Some(other) => return Err(anyhow!("Invalid {}: {:?}", $var_name, other)),
        }
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Read an optional string environment variable with a default value.
macro_rules! env_or {
    ($var_name:expr, $default:expr) => {
        env::var($var_name).unwrap_or_else(|_| $default.to_string())
    };
}

// ---

/// What rolling windows are anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowAnchor {
    /// The latest observation in the working set. Deterministic.
    #[default]
    Latest,
    /// The caller-supplied current time.
    WallClock,
}

impl FromStr for WindowAnchor {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latest" => Ok(WindowAnchor::Latest),
            "wallclock" | "wall_clock" | "now" => Ok(WindowAnchor::WallClock),
            other => Err(anyhow!("Invalid WINDOW_ANCHOR: {other:?}")),
        }
    }
}

/// Settings the aggregation pipeline needs on every refresh.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Analytical grid for resampling and window aggregation.
    pub grid: Grid,
    /// Chart-only coarsening step.
    pub chart_grid: Grid,
    /// How far before the reference time chart and table payloads reach.
    pub lookback: Duration,
    pub anchor: WindowAnchor,
    pub thresholds: AlertThresholds,
    pub normalizer: Normalizer,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            grid: Grid::default(),
            chart_grid: Grid::minutes(10).unwrap_or_default(),
            lookback: Duration::hours(24),
            anchor: WindowAnchor::Latest,
            thresholds: AlertThresholds::default(),
            normalizer: Normalizer::default(),
        }
    }
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading. The gazetteer is shared behind
/// an `Arc` because every request handler gets its own `Config` clone.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// PostgreSQL connection string.
    pub db_url: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// Listen address for the HTTP server.
    pub bind_addr: String,

    /// Table holding municipal network readings.
    pub municipal_table: String,

    /// Table holding national network readings.
    pub national_table: String,

    /// Whether to create the reading tables on start-up.
    pub create_schema: bool,

    pub pipeline: PipelineConfig,

    pub gazetteer: Arc<Gazetteer>,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `DATABASE_URL` – PostgreSQL connection string
///
/// Optional:
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `BIND_ADDR` – listen address (default: `0.0.0.0:8052`)
/// - `MUNICIPAL_TABLE` / `NATIONAL_TABLE` – reading tables
/// - `RESAMPLE_GRID_MINUTES` (default: 1), `CHART_STEP_MINUTES` (default: 10)
/// - `LOOKBACK_HOURS` (default: 24)
/// - `WINDOW_ANCHOR` – `latest` or `wallclock` (default: `latest`)
/// - `GAZETTEER_PATH` – JSON file replacing the built-in gazetteer
/// - `CREATE_SCHEMA` (default: true)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let db_url = require_env!("DATABASE_URL");
    let db_pool_max = parse_env_u32!("DB_POOL_MAX", 5);
    let bind_addr = env_or!("BIND_ADDR", "0.0.0.0:8052");
    let municipal_table = validate_table_name(&env_or!("MUNICIPAL_TABLE", "municipal_readings"))?;
    let national_table = validate_table_name(&env_or!("NATIONAL_TABLE", "national_readings"))?;
    let create_schema = parse_env_bool!("CREATE_SCHEMA", true);

    let grid_minutes = parse_env_u32!("RESAMPLE_GRID_MINUTES", 1);
    let chart_minutes = parse_env_u32!("CHART_STEP_MINUTES", 10);
    let lookback_hours = parse_env_u32!("LOOKBACK_HOURS", 24);
    let anchor: WindowAnchor = env_or!("WINDOW_ANCHOR", "latest").parse()?;

    let grid = Grid::minutes(i64::from(grid_minutes))
        .ok_or_else(|| anyhow!("Invalid RESAMPLE_GRID_MINUTES: must be at least 1"))?;
    let chart_grid = Grid::minutes(i64::from(chart_minutes))
        .ok_or_else(|| anyhow!("Invalid CHART_STEP_MINUTES: must be at least 1"))?;
    if lookback_hours == 0 {
        return Err(anyhow!("Invalid LOOKBACK_HOURS: must be at least 1"));
    }

    let gazetteer = match env::var("GAZETTEER_PATH") {
        Ok(path) => Gazetteer::from_json_file(Path::new(&path))
            .with_context(|| format!("Invalid GAZETTEER_PATH {path}"))?,
        Err(_) => Gazetteer::builtin(),
    };

    Ok(Config {
        db_url,
        db_pool_max,
        bind_addr,
        municipal_table,
        national_table,
        create_schema,
        pipeline: PipelineConfig {
            grid,
            chart_grid,
            lookback: Duration::hours(i64::from(lookback_hours)),
            anchor,
            ..PipelineConfig::default()
        },
        gazetteer: Arc::new(gazetteer),
    })
}

/// Accept only plain SQL identifiers, since table names are spliced into
/// query text.
pub fn validate_table_name(name: &str) -> Result<String> {
    // ---
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(name.to_string())
    } else {
        Err(anyhow!("Invalid table name {name:?}"))
    }
}

/// Replace the password in a connection string with `****`.
pub fn mask_db_url(db_url: &str) -> String {
    // ---
    if let Some(at_pos) = db_url.rfind('@') {
        if let Some(colon_pos) = db_url[..at_pos].rfind(':') {
            // `postgres://host@...` has its only colon in the scheme
            if !db_url[colon_pos..].starts_with("://") {
                return format!("{}:****{}", &db_url[..colon_pos], &db_url[at_pos..]);
            }
        }
    }
    db_url.to_string()
}

impl Config {
    /// Log the loaded configuration with the database password masked.
    pub fn log_config(&self) {
        // ---
        let p = &self.pipeline;
        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL          : {}", mask_db_url(&self.db_url));
        tracing::info!("  DB_POOL_MAX           : {}", self.db_pool_max);
        tracing::info!("  BIND_ADDR             : {}", self.bind_addr);
        tracing::info!("  MUNICIPAL_TABLE       : {}", self.municipal_table);
        tracing::info!("  NATIONAL_TABLE        : {}", self.national_table);
        tracing::info!("  RESAMPLE_GRID_MINUTES : {}", p.grid.step().num_minutes());
        tracing::info!("  CHART_STEP_MINUTES    : {}", p.chart_grid.step().num_minutes());
        tracing::info!("  LOOKBACK_HOURS        : {}", p.lookback.num_hours());
        tracing::info!("  WINDOW_ANCHOR         : {:?}", p.anchor);
        tracing::info!("  GAZETTEER entries     : {}", self.gazetteer.len());
        tracing::info!("  CREATE_SCHEMA         : {}", self.create_schema);
    }
}
