//! Reading store adapters.
//!
//! [`ReadingStore`] is the only way the pipeline reaches raw readings. The
//! Postgres implementation reads rows column-by-name so partially populated
//! or older tables still load: a missing column is treated as absent (never
//! zero) and text columns are coerced numerically. [`MemoryStore`] backs
//! tests and offline runs and can simulate an unavailable upstream.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info};

use crate::config::validate_table_name;
use crate::error::StoreError;
use crate::models::{coerce_numeric, parse_timestamp, MunicipalReading, NationalReading, Source};

// ---

/// Async access to the two reading tables.
///
/// Ranges are half-open, `[start, end)`.
pub trait ReadingStore: Send + Sync {
    fn fetch_municipal(
        &self,
    ) -> impl Future<Output = Result<Vec<MunicipalReading>, StoreError>> + Send;

    fn fetch_national(&self) -> impl Future<Output = Result<Vec<NationalReading>, StoreError>> + Send;

    fn fetch_municipal_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> impl Future<Output = Result<Vec<MunicipalReading>, StoreError>> + Send;

    fn fetch_national_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> impl Future<Output = Result<Vec<NationalReading>, StoreError>> + Send;

    /// Raw (not normalized) station names present for a source.
    fn station_names(
        &self,
        source: Source,
    ) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;

    fn append_municipal(
        &self,
        rows: &[MunicipalReading],
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    fn append_national(
        &self,
        rows: &[NationalReading],
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;
}

// ---

/// Column names accepted for each field, preferred name first.
const STATION_COLS: &[&str] = &["station_name", "nome_estacao"];
const TIMESTAMP_COLS: &[&str] = &["timestamp", "data_hora"];
const TEMPERATURE_COLS: &[&str] = &["air_temperature", "temp_ar"];
const HUMIDITY_COLS: &[&str] = &["relative_humidity", "umidade"];
const PRESSURE_COLS: &[&str] = &["pressure", "pressao"];
const WIND_SPEED_COLS: &[&str] = &["wind_speed", "vento_vel"];
const WIND_DIR_COLS: &[&str] = &["wind_direction", "vento_dir"];
const RAIN_COUNTER_COLS: &[&str] = &["rain_cumulative", "chuva_mm"];
const RAIN_MM_COLS: &[&str] = &["rain_mm", "chuva_mm"];
const RAIN_1H_COLS: &[&str] = &["rain_1h", "chuva_1h"];
const RAIN_6H_COLS: &[&str] = &["rain_6h", "chuva_6h"];
const RAIN_12H_COLS: &[&str] = &["rain_12h", "chuva_12h"];
const RAIN_24H_COLS: &[&str] = &["rain_24h", "chuva_24h"];

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgReadingStore {
    pool: PgPool,
    municipal_table: String,
    national_table: String,
}

impl PgReadingStore {
    // ---
    pub fn new(
        pool: PgPool,
        municipal_table: &str,
        national_table: &str,
    ) -> Result<Self, StoreError> {
        let checked = |name: &str| {
            validate_table_name(name).map_err(|_| StoreError::InvalidTable(name.to_string()))
        };
        Ok(Self {
            pool,
            municipal_table: checked(municipal_table)?,
            national_table: checked(national_table)?,
        })
    }

    fn table(&self, source: Source) -> &str {
        match source {
            Source::Municipal => &self.municipal_table,
            Source::National => &self.national_table,
        }
    }

    /// The first of `candidates` actually present in a table.
    async fn column(
        &self,
        source: Source,
        candidates: &'static [&'static str],
    ) -> Result<&'static str, StoreError> {
        // ---
        let present: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT column_name::text
              FROM information_schema.columns
             WHERE table_name = $1
            "#,
        )
        .bind(self.table(source))
        .fetch_all(&self.pool)
        .await?;

        Ok(pick_column(candidates, &present))
    }

    async fn fetch_rows(
        &self,
        source: Source,
        range: Option<(NaiveDateTime, NaiveDateTime)>,
    ) -> Result<Vec<PgRow>, StoreError> {
        // ---
        let table = self.table(source);
        let ts_col = self.column(source, TIMESTAMP_COLS).await?;

        // Identifiers are validated at construction; values are bound.
        let rows = match range {
            None => {
                let sql = format!(r#"SELECT * FROM {table} ORDER BY "{ts_col}" ASC"#);
                sqlx::query(&sql).fetch_all(&self.pool).await?
            }
            Some((start, end)) => {
                let sql = format!(
                    r#"SELECT * FROM {table}
                        WHERE "{ts_col}" >= $1 AND "{ts_col}" < $2
                        ORDER BY "{ts_col}" ASC"#
                );
                sqlx::query(&sql)
                    .bind(start)
                    .bind(end)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        debug!(%table, rows = rows.len(), "fetched readings");
        Ok(rows)
    }

    async fn load_municipal(
        &self,
        range: Option<(NaiveDateTime, NaiveDateTime)>,
    ) -> Result<Vec<MunicipalReading>, StoreError> {
        // ---
        let rows = self.fetch_rows(Source::Municipal, range).await?;
        let total = rows.len();
        let readings: Vec<MunicipalReading> = rows.iter().filter_map(municipal_from_row).collect();
        log_skipped(Source::Municipal, total, readings.len());
        Ok(readings)
    }

    async fn load_national(
        &self,
        range: Option<(NaiveDateTime, NaiveDateTime)>,
    ) -> Result<Vec<NationalReading>, StoreError> {
        // ---
        let rows = self.fetch_rows(Source::National, range).await?;
        let total = rows.len();
        let readings: Vec<NationalReading> = rows.iter().filter_map(national_from_row).collect();
        log_skipped(Source::National, total, readings.len());
        Ok(readings)
    }
}

/// Preferred candidate present in the table, or the preferred name when
/// none is (the query then fails with the database's own error).
fn pick_column(candidates: &'static [&'static str], present: &[String]) -> &'static str {
    candidates
        .iter()
        .copied()
        .find(|c| present.iter().any(|p| p == c))
        .unwrap_or(candidates[0])
}

fn log_skipped(source: Source, total: usize, kept: usize) {
    if kept < total {
        debug!(%source, skipped = total - kept, "rows without station or timestamp skipped");
    }
}

/// First readable numeric value among the candidate columns.
///
/// Accepts float, integer, `NUMERIC` and text columns; anything else, or a
/// column that does not exist, reads as `None`.
fn numeric(row: &PgRow, names: &[&str]) -> Option<f64> {
    // ---
    names.iter().find_map(|name| {
        if let Ok(v) = row.try_get::<Option<f64>, _>(*name) {
            return v;
        }
        if let Ok(v) = row.try_get::<Option<f32>, _>(*name) {
            return v.map(f64::from);
        }
        if let Ok(v) = row.try_get::<Option<i64>, _>(*name) {
            return v.map(|i| i as f64);
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(*name) {
            return v.map(f64::from);
        }
        if let Ok(v) = row.try_get::<Option<Decimal>, _>(*name) {
            return v.and_then(decimal_to_f64);
        }
        if let Ok(v) = row.try_get::<Option<String>, _>(*name) {
            return v.and_then(|s| coerce_numeric(&s).ok());
        }
        None
    })
}

fn decimal_to_f64(value: Decimal) -> Option<f64> {
    value.to_f64().filter(|v| v.is_finite())
}

fn text(row: &PgRow, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| row.try_get::<Option<String>, _>(*name).ok().flatten())
        .filter(|s| !s.trim().is_empty())
}

fn timestamp(row: &PgRow, names: &[&str]) -> Option<NaiveDateTime> {
    // ---
    names.iter().find_map(|name| {
        if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(*name) {
            return v;
        }
        if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(*name) {
            return v.map(|dt| dt.naive_utc());
        }
        if let Ok(v) = row.try_get::<Option<String>, _>(*name) {
            return v.and_then(|s| parse_timestamp(&s));
        }
        None
    })
}

fn municipal_from_row(row: &PgRow) -> Option<MunicipalReading> {
    Some(MunicipalReading {
        station_name: text(row, STATION_COLS)?,
        timestamp: timestamp(row, TIMESTAMP_COLS)?,
        air_temperature: numeric(row, TEMPERATURE_COLS),
        relative_humidity: numeric(row, HUMIDITY_COLS),
        pressure: numeric(row, PRESSURE_COLS),
        wind_speed: numeric(row, WIND_SPEED_COLS),
        wind_direction: numeric(row, WIND_DIR_COLS),
        rain_cumulative: numeric(row, RAIN_COUNTER_COLS),
    })
}

fn national_from_row(row: &PgRow) -> Option<NationalReading> {
    Some(NationalReading {
        station_name: text(row, STATION_COLS)?,
        timestamp: timestamp(row, TIMESTAMP_COLS)?,
        rain_mm: numeric(row, RAIN_MM_COLS),
        rain_1h: numeric(row, RAIN_1H_COLS),
        rain_6h: numeric(row, RAIN_6H_COLS),
        rain_12h: numeric(row, RAIN_12H_COLS),
        rain_24h: numeric(row, RAIN_24H_COLS),
    })
}

impl ReadingStore for PgReadingStore {
    // ---
    async fn fetch_municipal(&self) -> Result<Vec<MunicipalReading>, StoreError> {
        self.load_municipal(None).await
    }

    async fn fetch_national(&self) -> Result<Vec<NationalReading>, StoreError> {
        self.load_national(None).await
    }

    async fn fetch_municipal_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<MunicipalReading>, StoreError> {
        self.load_municipal(Some((start, end))).await
    }

    async fn fetch_national_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<NationalReading>, StoreError> {
        self.load_national(Some((start, end))).await
    }

    async fn station_names(&self, source: Source) -> Result<Vec<String>, StoreError> {
        // ---
        let table = self.table(source);
        let col = self.column(source, STATION_COLS).await?;
        let sql = format!(r#"SELECT DISTINCT "{col}"::text FROM {table} ORDER BY 1"#);
        let names: Vec<Option<String>> = sqlx::query_scalar(&sql).fetch_all(&self.pool).await?;
        Ok(names.into_iter().flatten().collect())
    }

    async fn append_municipal(&self, rows: &[MunicipalReading]) -> Result<u64, StoreError> {
        // ---
        let sql = format!(
            r#"
            INSERT INTO {} (
                station_name, "timestamp", air_temperature, relative_humidity,
                pressure, wind_speed, wind_direction, rain_cumulative
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
            self.municipal_table
        );

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for r in rows {
            let result = sqlx::query(&sql)
                .bind(&r.station_name)
                .bind(r.timestamp)
                .bind(r.air_temperature)
                .bind(r.relative_humidity)
                .bind(r.pressure)
                .bind(r.wind_speed)
                .bind(r.wind_direction)
                .bind(r.rain_cumulative)
                .execute(&mut *tx)
                .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;

        info!(table = %self.municipal_table, inserted, "appended municipal readings");
        Ok(inserted)
    }

    async fn append_national(&self, rows: &[NationalReading]) -> Result<u64, StoreError> {
        // ---
        let sql = format!(
            r#"
            INSERT INTO {} (
                station_name, "timestamp", rain_mm, rain_1h, rain_6h, rain_12h, rain_24h
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
            self.national_table
        );

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for r in rows {
            let result = sqlx::query(&sql)
                .bind(&r.station_name)
                .bind(r.timestamp)
                .bind(r.rain_mm)
                .bind(r.rain_1h)
                .bind(r.rain_6h)
                .bind(r.rain_12h)
                .bind(r.rain_24h)
                .execute(&mut *tx)
                .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;

        info!(table = %self.national_table, inserted, "appended national readings");
        Ok(inserted)
    }
}

// ---

#[derive(Debug, Default)]
struct Tables {
    municipal: Vec<MunicipalReading>,
    national: Vec<NationalReading>,
}

/// In-process store. Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStore {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_readings(municipal: Vec<MunicipalReading>, national: Vec<NationalReading>) -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables { municipal, national })),
            unavailable: Arc::default(),
        }
    }

    /// Make every call fail as if the upstream were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn with_tables<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> Result<T, StoreError> {
        // ---
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".to_string()));
        }
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))?;
        Ok(f(&mut tables))
    }
}

fn in_range(ts: NaiveDateTime, start: NaiveDateTime, end: NaiveDateTime) -> bool {
    ts >= start && ts < end
}

impl ReadingStore for MemoryStore {
    // ---
    async fn fetch_municipal(&self) -> Result<Vec<MunicipalReading>, StoreError> {
        self.with_tables(|t| t.municipal.clone())
    }

    async fn fetch_national(&self) -> Result<Vec<NationalReading>, StoreError> {
        self.with_tables(|t| t.national.clone())
    }

    async fn fetch_municipal_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<MunicipalReading>, StoreError> {
        self.with_tables(|t| {
            t.municipal
                .iter()
                .filter(|r| in_range(r.timestamp, start, end))
                .cloned()
                .collect()
        })
    }

    async fn fetch_national_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<NationalReading>, StoreError> {
        self.with_tables(|t| {
            t.national
                .iter()
                .filter(|r| in_range(r.timestamp, start, end))
                .cloned()
                .collect()
        })
    }

    async fn station_names(&self, source: Source) -> Result<Vec<String>, StoreError> {
        // ---
        self.with_tables(|t| {
            let mut names: Vec<String> = match source {
                Source::Municipal => t.municipal.iter().map(|r| r.station_name.clone()).collect(),
                Source::National => t.national.iter().map(|r| r.station_name.clone()).collect(),
            };
            names.sort();
            names.dedup();
            names
        })
    }

    async fn append_municipal(&self, rows: &[MunicipalReading]) -> Result<u64, StoreError> {
        self.with_tables(|t| {
            t.municipal.extend_from_slice(rows);
            rows.len() as u64
        })
    }

    async fn append_national(&self, rows: &[NationalReading]) -> Result<u64, StoreError> {
        self.with_tables(|t| {
            t.national.extend_from_slice(rows);
            rows.len() as u64
        })
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::NaiveDate;

    fn t(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 26)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn gauge(name: &str, ts: NaiveDateTime) -> NationalReading {
        NationalReading {
            station_name: name.to_string(),
            timestamp: ts,
            rain_mm: Some(0.2),
            rain_1h: None,
            rain_6h: None,
            rain_12h: None,
            rain_24h: Some(4.0),
        }
    }

    #[test]
    fn test_memory_store_range_is_half_open() {
        // ---
        let store = MemoryStore::with_readings(
            Vec::new(),
            vec![gauge("A", t(1)), gauge("A", t(2)), gauge("B", t(3))],
        );
        let rows = tokio_test::block_on(store.fetch_national_range(t(1), t(3))).unwrap();
        assert_eq!(rows.len(), 2);
        let names = tokio_test::block_on(store.station_names(Source::National)).unwrap();
        assert_eq!(names, vec!["A".to_string(), "B".to_string()]);
    }

    #[tokio::test]
    async fn test_memory_store_can_be_switched_off() {
        // ---
        let store = MemoryStore::new();
        assert_eq!(store.append_national(&[gauge("A", t(1))]).await.unwrap(), 1);
        store.set_unavailable(true);
        assert!(matches!(
            store.fetch_national().await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_unavailable(false);
        assert_eq!(store.fetch_national().await.unwrap().len(), 1);
    }

    #[test]
    fn test_legacy_column_names_are_resolved() {
        // ---
        let legacy = vec!["id".to_string(), "nome_estacao".to_string(), "data_hora".to_string()];
        assert_eq!(pick_column(STATION_COLS, &legacy), "nome_estacao");
        assert_eq!(pick_column(TIMESTAMP_COLS, &legacy), "data_hora");

        let both = vec!["nome_estacao".to_string(), "station_name".to_string()];
        assert_eq!(pick_column(STATION_COLS, &both), "station_name");
        assert_eq!(pick_column(STATION_COLS, &[]), "station_name");
    }

    #[test]
    fn test_numeric_columns_convert_to_f64() {
        // ---
        assert_eq!(decimal_to_f64(Decimal::new(125, 1)), Some(12.5));
        assert_eq!(decimal_to_f64(Decimal::ZERO), Some(0.0));
        assert_eq!(decimal_to_f64(Decimal::new(-3, 0)), Some(-3.0));
    }

    #[tokio::test]
    async fn test_pg_store_rejects_bad_table_names() {
        // ---
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/hydromet")
            .unwrap();
        let err = PgReadingStore::new(pool, "readings; --", "national_readings").unwrap_err();
        assert!(matches!(err, StoreError::InvalidTable(_)));
    }
}
