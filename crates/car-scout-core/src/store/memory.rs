//! In-memory [`VehicleStore`] implementation for tests and embedding.
//!
//! Records and events live in `Vec`s behind a single `std::sync::RwLock`,
//! so every operation observes and mutates one consistent state.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{AggregateStatistics, IngestionEvent, InsertOutcome, NewVehicle, VehicleRecord};

use super::{is_exact_duplicate, window_order, VehicleStore};

#[derive(Default)]
struct State {
    records: Vec<VehicleRecord>,
    events: Vec<IngestionEvent>,
    last_created_at: Option<DateTime<Utc>>,
}

/// In-memory store with the same ordering and uniqueness rules as the
/// SQLite store.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }
}

impl State {
    /// Current time, clamped so timestamps never go backwards.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_created_at {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_created_at = Some(ts);
        ts
    }
}

#[async_trait]
impl VehicleStore for InMemoryStore {
    async fn exists(&self, make: &str, model: &str, year: i64) -> Result<bool> {
        let state = self.read()?;
        Ok(state
            .records
            .iter()
            .any(|r| r.make == make && r.model == model && r.year == year))
    }

    async fn insert(&self, vehicle: &NewVehicle) -> Result<InsertOutcome> {
        let mut state = self.write()?;
        if state.records.iter().any(|r| is_exact_duplicate(vehicle, r)) {
            return Ok(InsertOutcome::duplicate());
        }
        let id = state.records.len() as i64 + 1;
        let created_at = state.next_timestamp();
        state
            .records
            .push(VehicleRecord::from_new(id, vehicle, created_at));
        Ok(InsertOutcome::inserted(id, created_at))
    }

    async fn all_records(&self) -> Result<Vec<VehicleRecord>> {
        let state = self.read()?;
        let mut records = state.records.clone();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    async fn find_by_price_window(
        &self,
        target: f64,
        tolerance: f64,
        limit: usize,
    ) -> Result<Vec<VehicleRecord>> {
        let (lo, hi) = (target - tolerance, target + tolerance);
        let state = self.read()?;
        let mut matches: Vec<VehicleRecord> = state
            .records
            .iter()
            .filter(|r| r.price >= lo && r.price <= hi)
            .cloned()
            .collect();
        matches.sort_by(|a, b| window_order(target, a, b));
        matches.truncate(limit);
        Ok(matches)
    }

    async fn log_event(
        &self,
        query: &str,
        results_found: i64,
        new_cars_added: i64,
    ) -> Result<i64> {
        let mut state = self.write()?;
        let id = state.events.len() as i64 + 1;
        let executed_at = state.next_timestamp();
        state.events.push(IngestionEvent {
            id,
            query: query.to_string(),
            results_found,
            new_cars_added,
            executed_at,
        });
        Ok(id)
    }

    async fn recent_events(&self, limit: usize) -> Result<Vec<IngestionEvent>> {
        let state = self.read()?;
        Ok(state.events.iter().rev().take(limit).cloned().collect())
    }

    async fn statistics(&self) -> Result<AggregateStatistics> {
        let state = self.read()?;
        let prices: Vec<f64> = state.records.iter().map(|r| r.price).collect();
        let (avg, min, max) = if prices.is_empty() {
            (None, None, None)
        } else {
            (
                Some(prices.iter().sum::<f64>() / prices.len() as f64),
                prices.iter().copied().reduce(f64::min),
                prices.iter().copied().reduce(f64::max),
            )
        };
        Ok(AggregateStatistics {
            total_cars: prices.len() as i64,
            avg_price: avg,
            min_price: min,
            max_price: max,
            total_searches: state.events.len() as i64,
        })
    }
}
