//! Storage abstraction for Car Scout.
//!
//! The [`VehicleStore`] trait defines every operation the ingestion cycle
//! and the read-only query surface need, so the core logic runs unchanged
//! against SQLite (in the application crate) or the in-memory store.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use std::cmp::Ordering;

use crate::models::{AggregateStatistics, IngestionEvent, InsertOutcome, NewVehicle, VehicleRecord};

/// Abstract record store.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`exists`](VehicleStore::exists) | Identity-key lookup (make, model, year), ignoring price |
/// | [`insert`](VehicleStore::insert) | Atomic insert; full-tuple repeats report `duplicate` |
/// | [`all_records`](VehicleStore::all_records) | Every record, newest first |
/// | [`find_by_price_window`](VehicleStore::find_by_price_window) | Records near a price, closest first |
/// | [`log_event`](VehicleStore::log_event) | Append an ingestion event |
/// | [`recent_events`](VehicleStore::recent_events) | Latest ingestion events |
/// | [`statistics`](VehicleStore::statistics) | Derived aggregates |
#[async_trait]
pub trait VehicleStore: Send + Sync {
    /// True iff a record with exactly this make, model and year exists.
    async fn exists(&self, make: &str, model: &str, year: i64) -> Result<bool>;

    /// Persist a record.
    ///
    /// A record sharing (make, model, year, price) with an existing one is
    /// not written and yields [`InsertOutcome::duplicate`]; that is not an
    /// error. Any other failure is.
    async fn insert(&self, vehicle: &NewVehicle) -> Result<InsertOutcome>;

    /// All records ordered by `created_at` descending, then id descending.
    async fn all_records(&self) -> Result<Vec<VehicleRecord>>;

    /// Records with price in `[target - tolerance, target + tolerance]`,
    /// ordered by distance from `target`, at most `limit` of them.
    ///
    /// Equal distances are ordered by `created_at`, then id, ascending.
    async fn find_by_price_window(
        &self,
        target: f64,
        tolerance: f64,
        limit: usize,
    ) -> Result<Vec<VehicleRecord>>;

    /// Append one ingestion event and return its id.
    async fn log_event(&self, query: &str, results_found: i64, new_cars_added: i64)
        -> Result<i64>;

    /// The `limit` most recent ingestion events, newest first.
    async fn recent_events(&self, limit: usize) -> Result<Vec<IngestionEvent>>;

    /// Aggregates over the current contents of the store.
    async fn statistics(&self) -> Result<AggregateStatistics>;
}

/// True iff `a` and `b` collide on the store's uniqueness constraint.
///
/// This is deliberately wider than the dedup gate's identity key: price
/// participates here.
pub fn is_exact_duplicate(a: &NewVehicle, b: &VehicleRecord) -> bool {
    a.make == b.make && a.model == b.model && a.year == b.year && a.price == b.price
}

/// Ordering used by [`VehicleStore::find_by_price_window`].
pub fn window_order(target: f64, a: &VehicleRecord, b: &VehicleRecord) -> Ordering {
    let da = (a.price - target).abs();
    let db = (b.price - target).abs();
    da.partial_cmp(&db)
        .unwrap_or(Ordering::Equal)
        .then(a.created_at.cmp(&b.created_at))
        .then(a.id.cmp(&b.id))
}
