//! SQLite-backed [`VehicleStore`] implementation.
//!
//! Maps each store operation onto the `cars` and `search_history` tables
//! created by [`migrate`](crate::migrate). Uniqueness of
//! (make, model, year, price) is enforced by the table constraint, and an
//! insert that hits it is reported as a duplicate rather than an error.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use car_scout_core::models::{
    AggregateStatistics, IngestionEvent, InsertOutcome, NewVehicle, VehicleRecord,
};
use car_scout_core::store::VehicleStore;

use crate::config::Config;
use crate::{db, migrate};

const CAR_COLUMNS: &str =
    "id, make, model, year, price, url, description, source, image_url, created_at";

/// SQLite implementation of the [`VehicleStore`] trait.
///
/// Wraps a [`SqlitePool`]; cloning the pool is cheap, so handlers can each
/// hold a store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database and make sure the schema exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn row_to_record(row: &SqliteRow) -> VehicleRecord {
    VehicleRecord {
        id: row.get("id"),
        make: row.get("make"),
        model: row.get("model"),
        year: row.get("year"),
        price: row.get("price"),
        url: row.get("url"),
        description: row.get("description"),
        source: row.get("source"),
        image_url: row.get("image_url"),
        created_at: from_millis(row.get("created_at")),
    }
}

#[async_trait]
impl VehicleStore for SqliteStore {
    async fn exists(&self, make: &str, model: &str, year: i64) -> Result<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT id FROM cars WHERE make = ? AND model = ? AND year = ? LIMIT 1")
                .bind(make)
                .bind(model)
                .bind(year)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    async fn insert(&self, vehicle: &NewVehicle) -> Result<InsertOutcome> {
        // created_at never goes below the newest existing row.
        // A conflicting insert returns no row.
        let row = sqlx::query(
            r#"
            INSERT INTO cars (make, model, year, price, url, description, source, image_url, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?,
                    MAX(?, COALESCE((SELECT MAX(created_at) FROM cars), 0)))
            ON CONFLICT(make, model, year, price) DO NOTHING
            RETURNING id, created_at
            "#,
        )
        .bind(&vehicle.make)
        .bind(&vehicle.model)
        .bind(vehicle.year)
        .bind(vehicle.price)
        .bind(&vehicle.url)
        .bind(&vehicle.description)
        .bind(&vehicle.source)
        .bind(&vehicle.image_url)
        .bind(Utc::now().timestamp_millis())
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(row) => InsertOutcome::inserted(row.get("id"), from_millis(row.get("created_at"))),
            None => InsertOutcome::duplicate(),
        })
    }

    async fn all_records(&self) -> Result<Vec<VehicleRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM cars ORDER BY created_at DESC, id DESC",
            CAR_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn find_by_price_window(
        &self,
        target: f64,
        tolerance: f64,
        limit: usize,
    ) -> Result<Vec<VehicleRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM cars
            WHERE price BETWEEN ? AND ?
            ORDER BY ABS(price - ?) ASC, created_at ASC, id ASC
            LIMIT ?
            "#,
            CAR_COLUMNS
        ))
        .bind(target - tolerance)
        .bind(target + tolerance)
        .bind(target)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn log_event(
        &self,
        query: &str,
        results_found: i64,
        new_cars_added: i64,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO search_history (search_query, results_found, new_cars_added, executed_at)
            VALUES (?, ?, ?, MAX(?, COALESCE((SELECT MAX(executed_at) FROM search_history), 0)))
            "#,
        )
        .bind(query)
        .bind(results_found)
        .bind(new_cars_added)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn recent_events(&self, limit: usize) -> Result<Vec<IngestionEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, search_query, results_found, new_cars_added, executed_at
            FROM search_history
            ORDER BY executed_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| IngestionEvent {
                id: row.get("id"),
                query: row.get("search_query"),
                results_found: row.get("results_found"),
                new_cars_added: row.get("new_cars_added"),
                executed_at: from_millis(row.get("executed_at")),
            })
            .collect())
    }

    async fn statistics(&self) -> Result<AggregateStatistics> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total_cars,
                AVG(price) AS avg_price,
                MIN(price) AS min_price,
                MAX(price) AS max_price,
                (SELECT COUNT(*) FROM search_history) AS total_searches
            FROM cars
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(AggregateStatistics {
            total_cars: row.get("total_cars"),
            avg_price: row.get("avg_price"),
            min_price: row.get("min_price"),
            max_price: row.get("max_price"),
            total_searches: row.get("total_searches"),
        })
    }
}
