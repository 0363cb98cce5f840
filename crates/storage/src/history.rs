//! Durable historical observations, one record per (city, date).

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use tracing::{info, instrument};

use weather_common::{WeatherError, WeatherRecord, WeatherResult};

/// Default table for historical records.
pub const DEFAULT_HISTORY_TABLE: &str = "weather_history";

/// Summary of what the store holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistoryStats {
    pub total_records: u64,
    pub earliest: Option<NaiveDate>,
    pub latest: Option<NaiveDate>,
    pub records_by_city: BTreeMap<String, u64>,
}

/// Storage of historical weather keyed uniquely by (city, date).
///
/// Connectivity failures surface as `StorageUnavailable`, never as a miss.
#[async_trait]
pub trait HistoricalStore: Send + Sync {
    /// Create schema and the unique (city, date) index. Idempotent.
    async fn setup(&self) -> WeatherResult<()>;

    async fn get(&self, city_id: &str, date: NaiveDate) -> WeatherResult<Option<WeatherRecord>>;

    /// Records in `start..=end`, ascending by date.
    async fn get_range(
        &self,
        city_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> WeatherResult<Vec<WeatherRecord>>;

    /// Insert or overwrite the record for its (city, date).
    async fn upsert(&self, record: &WeatherRecord) -> WeatherResult<()>;

    /// Delete every record of a city, returning how many were removed.
    async fn delete_by_city(&self, city_id: &str) -> WeatherResult<u64>;

    async fn stats(&self) -> WeatherResult<HistoryStats>;

    /// Release connections. The store must not be used afterwards.
    async fn close(&self) {}
}

fn db_error(context: &str, err: sqlx::Error) -> WeatherError {
    WeatherError::StorageUnavailable(format!("{}: {}", context, err))
}

/// PostgreSQL-backed historical store.
pub struct PgHistoricalStore {
    pool: PgPool,
    table: String,
}

impl PgHistoricalStore {
    /// Connect and bind to `table`.
    pub async fn connect(database_url: &str, table: &str) -> WeatherResult<Self> {
        validate_table_name(table)?;

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| db_error("Connection failed", e))?;

        info!(table = %table, "Connected to PostgreSQL");
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn schema_sql(&self) -> String {
        let t = &self.table;
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {t} (
                city_id TEXT NOT NULL,
                date DATE NOT NULL,
                observed_at TIMESTAMPTZ,
                temperature_k DOUBLE PRECISION NOT NULL,
                temperature_min_k DOUBLE PRECISION NOT NULL,
                temperature_max_k DOUBLE PRECISION NOT NULL,
                wind_speed_ms DOUBLE PRECISION NOT NULL,
                wind_direction_deg INTEGER NOT NULL,
                humidity_pct DOUBLE PRECISION,
                precipitation_mm DOUBLE PRECISION NOT NULL,
                cloud_cover_pct DOUBLE PRECISION,
                pressure_hpa DOUBLE PRECISION,
                condition_code INTEGER,
                last_updated TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE UNIQUE INDEX IF NOT EXISTS {t}_city_date_idx ON {t} (city_id, date);
            CREATE INDEX IF NOT EXISTS {t}_last_updated_idx ON {t} (last_updated)
            "#
        )
    }

    fn select_columns() -> &'static str {
        "city_id, date, observed_at, temperature_k, temperature_min_k, temperature_max_k, \
         wind_speed_ms, wind_direction_deg, humidity_pct, precipitation_mm, cloud_cover_pct, \
         pressure_hpa, condition_code"
    }
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
fn validate_table_name(table: &str) -> WeatherResult<()> {
    let mut chars = table.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_start && valid_rest && table.len() <= 63 {
        Ok(())
    } else {
        Err(WeatherError::invalid(
            "history_table",
            format!("'{}' is not a valid table name", table),
        ))
    }
}

#[async_trait]
impl HistoricalStore for PgHistoricalStore {
    async fn setup(&self) -> WeatherResult<()> {
        for statement in self.schema_sql().split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| db_error("Migration failed", e))?;
            }
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, city_id: &str, date: NaiveDate) -> WeatherResult<Option<WeatherRecord>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE city_id = $1 AND date = $2",
            Self::select_columns(),
            self.table
        );
        let row = sqlx::query_as::<_, HistoryRow>(&sql)
            .bind(city_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Query failed", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn get_range(
        &self,
        city_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> WeatherResult<Vec<WeatherRecord>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE city_id = $1 AND date BETWEEN $2 AND $3 ORDER BY date ASC",
            Self::select_columns(),
            self.table
        );
        let rows = sqlx::query_as::<_, HistoryRow>(&sql)
            .bind(city_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Query failed", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, record), fields(city = %record.city_id, date = %record.date))]
    async fn upsert(&self, record: &WeatherRecord) -> WeatherResult<()> {
        let sql = format!(
            r#"
            INSERT INTO {} (
                city_id, date, observed_at,
                temperature_k, temperature_min_k, temperature_max_k,
                wind_speed_ms, wind_direction_deg, humidity_pct,
                precipitation_mm, cloud_cover_pct, pressure_hpa,
                condition_code, last_updated
            ) VALUES (
                $1, $2, $3,
                $4, $5, $6,
                $7, $8, $9,
                $10, $11, $12,
                $13, $14
            )
            ON CONFLICT (city_id, date)
            DO UPDATE SET
                observed_at = EXCLUDED.observed_at,
                temperature_k = EXCLUDED.temperature_k,
                temperature_min_k = EXCLUDED.temperature_min_k,
                temperature_max_k = EXCLUDED.temperature_max_k,
                wind_speed_ms = EXCLUDED.wind_speed_ms,
                wind_direction_deg = EXCLUDED.wind_direction_deg,
                humidity_pct = EXCLUDED.humidity_pct,
                precipitation_mm = EXCLUDED.precipitation_mm,
                cloud_cover_pct = EXCLUDED.cloud_cover_pct,
                pressure_hpa = EXCLUDED.pressure_hpa,
                condition_code = EXCLUDED.condition_code,
                last_updated = EXCLUDED.last_updated
            "#,
            self.table
        );

        sqlx::query(&sql)
            .bind(&record.city_id)
            .bind(record.date)
            .bind(record.observed_at)
            .bind(record.temperature_k)
            .bind(record.temperature_min_k)
            .bind(record.temperature_max_k)
            .bind(record.wind_speed_ms)
            .bind(record.wind_direction_deg as i32)
            .bind(record.humidity_pct)
            .bind(record.precipitation_mm)
            .bind(record.cloud_cover_pct)
            .bind(record.pressure_hpa)
            .bind(record.condition_code.map(|c| c as i32))
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Upsert failed", e))?;

        Ok(())
    }

    async fn delete_by_city(&self, city_id: &str) -> WeatherResult<u64> {
        let sql = format!("DELETE FROM {} WHERE city_id = $1", self.table);
        let result = sqlx::query(&sql)
            .bind(city_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Delete failed", e))?;

        Ok(result.rows_affected())
    }

    async fn stats(&self) -> WeatherResult<HistoryStats> {
        let sql = format!(
            "SELECT city_id, COUNT(*), MIN(date), MAX(date) FROM {} GROUP BY city_id ORDER BY city_id",
            self.table
        );
        let rows = sqlx::query_as::<_, (String, i64, NaiveDate, NaiveDate)>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Query failed", e))?;

        let mut stats = HistoryStats::default();
        for (city, count, earliest, latest) in rows {
            stats.total_records += count as u64;
            stats.earliest = Some(stats.earliest.map_or(earliest, |d| d.min(earliest)));
            stats.latest = Some(stats.latest.map_or(latest, |d| d.max(latest)));
            stats.records_by_city.insert(city, count as u64);
        }
        Ok(stats)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[derive(Debug, FromRow)]
struct HistoryRow {
    city_id: String,
    date: NaiveDate,
    observed_at: Option<DateTime<Utc>>,
    temperature_k: f64,
    temperature_min_k: f64,
    temperature_max_k: f64,
    wind_speed_ms: f64,
    wind_direction_deg: i32,
    humidity_pct: Option<f64>,
    precipitation_mm: f64,
    cloud_cover_pct: Option<f64>,
    pressure_hpa: Option<f64>,
    condition_code: Option<i32>,
}

impl From<HistoryRow> for WeatherRecord {
    fn from(row: HistoryRow) -> Self {
        Self {
            city_id: row.city_id,
            date: row.date,
            observed_at: row.observed_at,
            temperature_k: row.temperature_k,
            temperature_min_k: row.temperature_min_k,
            temperature_max_k: row.temperature_max_k,
            wind_speed_ms: row.wind_speed_ms,
            wind_direction_deg: row.wind_direction_deg.rem_euclid(360) as u16,
            humidity_pct: row.humidity_pct,
            precipitation_mm: row.precipitation_mm,
            cloud_cover_pct: row.cloud_cover_pct,
            pressure_hpa: row.pressure_hpa,
            condition_code: row.condition_code.map(|c| c as u16),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_validation() {
        assert!(validate_table_name("weather_history").is_ok());
        assert!(validate_table_name("_h2").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("2history").is_err());
        assert!(validate_table_name("history; DROP TABLE x").is_err());
        assert!(validate_table_name(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_row_conversion() {
        let row = HistoryRow {
            city_id: "paris,fr".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            observed_at: None,
            temperature_k: 280.0,
            temperature_min_k: 275.0,
            temperature_max_k: 285.0,
            wind_speed_ms: 4.0,
            wind_direction_deg: 270,
            humidity_pct: None,
            precipitation_mm: 0.5,
            cloud_cover_pct: None,
            pressure_hpa: None,
            condition_code: Some(61),
        };

        let record = WeatherRecord::from(row);
        assert_eq!(record.wind_direction_deg, 270);
        assert_eq!(record.condition_code, Some(61));
    }
}
