//! Database schema management for `hydromet-pipeline`.
//!
//! Ensures the two reading tables and their indexes exist before serving
//! requests. Applied once on startup from `main.rs` when `CREATE_SCHEMA`
//! is enabled.

use anyhow::Result;
use sqlx::PgPool;
use tracing::info;

use crate::config::validate_table_name;

// ---

/// Create the reading tables if they are missing (idempotent).
///
/// Readings are append-only. Duplicate `(station_name, timestamp)` rows are
/// allowed; readers collapse them.
pub async fn create_schema(pool: &PgPool, municipal_table: &str, national_table: &str) -> Result<()> {
    // ---
    let municipal = validate_table_name(municipal_table)?;
    let national = validate_table_name(national_table)?;

    let mut tx = pool.begin().await?;

    // Municipal telemetry: instantaneous fields plus the raw rain counter
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {municipal} (
            id                BIGSERIAL PRIMARY KEY,
            station_name      TEXT             NOT NULL,
            "timestamp"       TIMESTAMP        NOT NULL,
            air_temperature   DOUBLE PRECISION,
            relative_humidity DOUBLE PRECISION,
            pressure          DOUBLE PRECISION,
            wind_speed        DOUBLE PRECISION,
            wind_direction    DOUBLE PRECISION,
            rain_cumulative   DOUBLE PRECISION
        );
        "#
    ))
    .execute(&mut *tx)
    .await?;

    // National rain gauges: interval amount plus upstream rolling sums
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {national} (
            id           BIGSERIAL PRIMARY KEY,
            station_name TEXT             NOT NULL,
            "timestamp"  TIMESTAMP        NOT NULL,
            rain_mm      DOUBLE PRECISION,
            rain_1h      DOUBLE PRECISION,
            rain_6h      DOUBLE PRECISION,
            rain_12h     DOUBLE PRECISION,
            rain_24h     DOUBLE PRECISION
        );
        "#
    ))
    .execute(&mut *tx)
    .await?;

    for table in [&municipal, &national] {
        sqlx::query(&format!(
            r#"
            CREATE INDEX IF NOT EXISTS idx_{table}_timestamp
                ON {table} ("timestamp");
            "#
        ))
        .execute(&mut *tx)
        .await?;

        sqlx::query(&format!(
            r#"
            CREATE INDEX IF NOT EXISTS idx_{table}_station
                ON {table} (station_name, "timestamp");
            "#
        ))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    info!(%municipal, %national, "schema ready");
    Ok(())
}
