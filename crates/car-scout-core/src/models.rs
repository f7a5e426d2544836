//! Core data models for Car Scout.
//!
//! These types flow through the ingestion cycle: a [`NewVehicle`] is the
//! validated form of a candidate, a [`VehicleRecord`] is what the store
//! holds, and [`SimilarityGroup`] / [`AggregateStatistics`] are derived
//! per cycle and never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A validated vehicle listing that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewVehicle {
    pub make: String,
    pub model: String,
    pub year: i64,
    pub price: f64,
    pub url: Option<String>,
    pub description: Option<String>,
    pub source: String,
    pub image_url: Option<String>,
}

impl NewVehicle {
    /// Human-readable label, e.g. `2024 Ferrari 296 GTB`.
    pub fn label(&self) -> String {
        format!("{} {} {}", self.year, self.make, self.model)
    }
}

/// A vehicle row as persisted by a [`VehicleStore`](crate::store::VehicleStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub id: i64,
    pub make: String,
    pub model: String,
    pub year: i64,
    pub price: f64,
    pub url: Option<String>,
    pub description: Option<String>,
    pub source: String,
    pub image_url: Option<String>,
    /// Store-assigned, non-decreasing in insertion order.
    pub created_at: DateTime<Utc>,
}

impl VehicleRecord {
    /// Attach the store-assigned id and timestamp to a validated vehicle.
    pub fn from_new(id: i64, vehicle: &NewVehicle, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            make: vehicle.make.clone(),
            model: vehicle.model.clone(),
            year: vehicle.year,
            price: vehicle.price,
            url: vehicle.url.clone(),
            description: vehicle.description.clone(),
            source: vehicle.source.clone(),
            image_url: vehicle.image_url.clone(),
            created_at,
        }
    }

    pub fn label(&self) -> String {
        format!("{} {} {}", self.year, self.make, self.model)
    }
}

/// Result of a store insert. A full-tuple uniqueness hit is not an error.
///
/// A written row carries its store-assigned id and `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InsertOutcome {
    pub id: Option<i64>,
    pub duplicate: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl InsertOutcome {
    pub fn inserted(id: i64, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Some(id),
            duplicate: false,
            created_at: Some(created_at),
        }
    }

    pub fn duplicate() -> Self {
        Self {
            id: None,
            duplicate: true,
            created_at: None,
        }
    }
}

/// One row of the append-only ingestion log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionEvent {
    pub id: i64,
    pub query: String,
    pub results_found: i64,
    pub new_cars_added: i64,
    pub executed_at: DateTime<Utc>,
}

/// Aggregates recomputed from the store on every call.
///
/// `avg_price`, `min_price` and `max_price` are `None` when the store
/// holds no records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStatistics {
    pub total_cars: i64,
    pub avg_price: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub total_searches: i64,
}

/// Min / max / mean over the records of a [`SimilarityGroup`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl PriceRange {
    /// Compute the range over a set of records; `None` for an empty set.
    pub fn of(records: &[VehicleRecord]) -> Option<Self> {
        if records.is_empty() {
            return None;
        }
        let min = records.iter().map(|r| r.price).fold(f64::INFINITY, f64::min);
        let max = records
            .iter()
            .map(|r| r.price)
            .fold(f64::NEG_INFINITY, f64::max);
        let avg = records.iter().map(|r| r.price).sum::<f64>() / records.len() as f64;
        Some(Self { min, max, avg })
    }
}

/// A newly admitted record and its nearest neighbours by price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityGroup {
    pub new_car: VehicleRecord,
    pub similar_cars: Vec<VehicleRecord>,
    pub price_range: PriceRange,
}
