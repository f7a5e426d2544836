//! Read and single-record admission commands.
//!
//! Each command has a structured function taking a [`VehicleStore`], shared
//! with the HTTP server, and a `run_*` CLI entry point that opens the
//! configured database and prints to stdout.

use anyhow::{bail, Result};
use car_scout_core::candidate::RawCandidate;
use car_scout_core::pipeline::{admit_one, Admission};
use car_scout_core::{AggregateStatistics, IngestionEvent, VehicleRecord, VehicleStore};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::config::{validate_tolerance, Config};
use crate::format::{format_opt_price, format_price, format_ts, format_ts_relative};
use crate::sqlite_store::SqliteStore;

pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// All stored cars, newest first, with the aggregate statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CarListing {
    pub cars: Vec<VehicleRecord>,
    #[serde(rename = "stats")]
    pub statistics: AggregateStatistics,
}

pub async fn list_cars(store: &dyn VehicleStore) -> Result<CarListing> {
    Ok(CarListing {
        cars: store.all_records().await?,
        statistics: store.statistics().await?,
    })
}

pub async fn history(store: &dyn VehicleStore, limit: usize) -> Result<Vec<IngestionEvent>> {
    store.recent_events(limit).await
}

/// Stored cars within `tolerance` of `price`, nearest first.
pub async fn similar_cars(
    store: &dyn VehicleStore,
    price: f64,
    tolerance: f64,
    limit: usize,
) -> Result<Vec<VehicleRecord>> {
    if !price.is_finite() || price <= 0.0 {
        bail!("price must be a number greater than zero, got {}", price);
    }
    validate_tolerance(tolerance)?;
    if limit == 0 {
        bail!("limit must be >= 1");
    }
    store.find_by_price_window(price, tolerance, limit).await
}

/// Fields for `scout add`, mirroring the JSON accepted by `POST /api/cars`.
#[derive(Debug, Clone, Default)]
pub struct AddArgs {
    pub make: String,
    pub model: String,
    pub year: String,
    pub price: String,
    pub url: Option<String>,
    pub description: Option<String>,
    pub source: Option<String>,
    pub image_url: Option<String>,
}

impl AddArgs {
    /// Convert to the loosely-typed candidate shape so CLI and HTTP input
    /// go through the same validation.
    pub fn to_candidate(&self) -> RawCandidate {
        let mut map = Map::new();
        map.insert("make".into(), json!(self.make));
        map.insert("model".into(), json!(self.model));
        map.insert("year".into(), json!(self.year));
        map.insert("price".into(), json!(self.price));
        let optional = [
            ("url", &self.url),
            ("description", &self.description),
            ("source", &self.source),
            ("image_url", &self.image_url),
        ];
        for (key, value) in optional {
            if let Some(v) = value {
                map.insert(key.into(), json!(v));
            }
        }
        RawCandidate::from_value(Value::Object(map))
    }
}

// ============ CLI entry points ============

pub async fn run_list(config: &Config) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let listing = list_cars(&store).await?;
    store.pool().close().await;

    if listing.cars.is_empty() {
        println!("No cars stored.");
    } else {
        println!(
            "  {:>5}  {:<44} {:>14}  {:<12} {}",
            "ID", "CAR", "PRICE", "SOURCE", "ADDED"
        );
        println!("  {}", "-".repeat(96));
        for car in &listing.cars {
            println!(
                "  {:>5}  {:<44} {:>14}  {:<12} {}",
                car.id,
                car.label(),
                format_price(car.price),
                car.source,
                format_ts_relative(&car.created_at)
            );
        }
    }

    println!();
    print_statistics(&listing.statistics);
    Ok(())
}

pub async fn run_history(config: &Config, limit: usize) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let events = history(&store, limit).await?;
    store.pool().close().await;

    if events.is_empty() {
        println!("No searches recorded.");
        return Ok(());
    }

    println!(
        "  {:<17} {:>7} {:>6}   {}",
        "EXECUTED", "FOUND", "ADDED", "QUERY"
    );
    println!("  {}", "-".repeat(64));
    for e in &events {
        println!(
            "  {:<17} {:>7} {:>6}   {}",
            format_ts(&e.executed_at),
            e.results_found,
            e.new_cars_added,
            e.query
        );
    }
    Ok(())
}

pub async fn run_similar(
    config: &Config,
    price: f64,
    tolerance: Option<f64>,
    limit: Option<usize>,
) -> Result<()> {
    let tolerance = tolerance.unwrap_or(config.search.price_tolerance);
    let limit = limit.unwrap_or(config.search.group_limit);

    let store = SqliteStore::open(config).await?;
    let cars = similar_cars(&store, price, tolerance, limit).await?;
    store.pool().close().await;

    println!(
        "Cars within {} of {}:",
        format_price(tolerance),
        format_price(price)
    );
    if cars.is_empty() {
        println!("  (none)");
    }
    for car in &cars {
        println!(
            "  {} - {} ({})",
            car.label(),
            format_price(car.price),
            format_price((car.price - price).abs())
        );
    }
    Ok(())
}

pub async fn run_add(config: &Config, args: AddArgs) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let result = admit_one(&store, &args.to_candidate(), &config.search.manual_source).await;
    store.pool().close().await;

    let admission: Admission = result?;
    if admission.admitted {
        println!(
            "added {} (id {})",
            admission.label,
            admission.id.unwrap_or_default()
        );
    } else {
        println!("duplicate: {} already exists", admission.label);
    }
    Ok(())
}

pub(crate) fn print_statistics(stats: &AggregateStatistics) {
    println!("  total cars: {}", stats.total_cars);
    println!("  average price: {}", format_opt_price(stats.avg_price));
    println!(
        "  price range: {} - {}",
        format_opt_price(stats.min_price),
        format_opt_price(stats.max_price)
    );
    println!("  total searches: {}", stats.total_searches);
}

#[cfg(test)]
mod tests {
    use super::*;
    use car_scout_core::store::memory::InMemoryStore;
    use car_scout_core::NewVehicle;

    fn car(make: &str, price: f64) -> NewVehicle {
        NewVehicle {
            make: make.into(),
            model: "X".into(),
            year: 2024,
            price,
            url: None,
            description: None,
            source: "seed".into(),
            image_url: None,
        }
    }

    #[test]
    fn test_add_args_to_candidate() {
        let args = AddArgs {
            make: "Porsche".into(),
            model: "911 GT3".into(),
            year: "2024".into(),
            price: "$182,900".into(),
            source: None,
            ..AddArgs::default()
        };
        let v = args.to_candidate().validate("manual").unwrap();
        assert_eq!(v.year, 2024);
        assert_eq!(v.price, 182900.0);
        assert_eq!(v.source, "manual");
        assert!(v.url.is_none());
    }

    #[tokio::test]
    async fn test_similar_cars_validates_input() {
        let store = InMemoryStore::new();
        assert!(similar_cars(&store, 0.0, 5000.0, 3).await.is_err());
        assert!(similar_cars(&store, 1000.0, -1.0, 3).await.is_err());
        assert!(similar_cars(&store, 1000.0, 5000.0, 0).await.is_err());
    }

    #[tokio::test]
    async fn test_list_and_similar() {
        let store = InMemoryStore::new();
        store.insert(&car("A", 50000.0)).await.unwrap();
        store.insert(&car("B", 58000.0)).await.unwrap();

        let listing = list_cars(&store).await.unwrap();
        assert_eq!(listing.cars.len(), 2);
        assert_eq!(listing.cars[0].make, "B");
        assert_eq!(listing.statistics.total_cars, 2);

        let near = similar_cars(&store, 51000.0, 5000.0, 3).await.unwrap();
        assert_eq!(near.len(), 1);
        assert_eq!(near[0].make, "A");
    }
}
