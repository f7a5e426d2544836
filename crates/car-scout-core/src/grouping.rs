//! Price-proximity grouping of newly admitted records.
//!
//! For each admitted record, in admission order, the store is asked for the
//! records closest to its price within a tolerance window. A group needs at
//! least [`MIN_GROUP_SIZE`] comparison records; records with fewer
//! neighbours contribute nothing. Groups are never merged.
//!
//! By default a record is not compared with itself. It is already persisted
//! when grouping runs, so the window query would otherwise return it at
//! distance zero; [`GroupingParams::include_self`] restores that behavior.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::models::{PriceRange, SimilarityGroup, VehicleRecord};
use crate::store::VehicleStore;

/// Minimum number of comparison records for a group.
pub const MIN_GROUP_SIZE: usize = 2;

/// Grouping tuning parameters, decoupled from application config.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupingParams {
    /// Half-width of the price window.
    pub tolerance: f64,
    /// Maximum comparison records per group.
    pub limit: usize,
    /// Let a record appear as its own neighbour.
    pub include_self: bool,
}

impl Default for GroupingParams {
    fn default() -> Self {
        Self {
            tolerance: 5000.0,
            limit: 3,
            include_self: false,
        }
    }
}

/// Build similarity groups for `admitted`, in order.
pub async fn group(
    store: &dyn VehicleStore,
    admitted: &[VehicleRecord],
    params: &GroupingParams,
) -> Result<Vec<SimilarityGroup>> {
    let mut groups = Vec::new();

    for record in admitted {
        let similar = neighbours(store, record, params).await?;
        if similar.len() < MIN_GROUP_SIZE {
            continue;
        }
        if let Some(price_range) = PriceRange::of(&similar) {
            groups.push(SimilarityGroup {
                new_car: record.clone(),
                similar_cars: similar,
                price_range,
            });
        }
    }

    Ok(groups)
}

async fn neighbours(
    store: &dyn VehicleStore,
    record: &VehicleRecord,
    params: &GroupingParams,
) -> Result<Vec<VehicleRecord>> {
    if params.include_self {
        return store
            .find_by_price_window(record.price, params.tolerance, params.limit)
            .await;
    }

    // One extra row so dropping the record itself still leaves `limit`.
    let mut found = store
        .find_by_price_window(record.price, params.tolerance, params.limit + 1)
        .await?;
    found.retain(|r| r.id != record.id);
    found.truncate(params.limit);
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewVehicle;
    use crate::store::memory::InMemoryStore;

    fn car(make: &str, price: f64) -> NewVehicle {
        NewVehicle {
            make: make.into(),
            model: "Test".into(),
            year: 2024,
            price,
            url: None,
            description: None,
            source: "manual".into(),
            image_url: None,
        }
    }

    async fn admit(store: &InMemoryStore, make: &str, price: f64) -> VehicleRecord {
        let id = store.insert(&car(make, price)).await.unwrap().id.unwrap();
        store
            .all_records()
            .await
            .unwrap()
            .into_iter()
            .find(|r| r.id == id)
            .unwrap()
    }

    #[tokio::test]
    async fn test_single_neighbour_forms_no_group() {
        let store = InMemoryStore::new();
        admit(&store, "Old", 50000.0).await;
        let new = admit(&store, "New", 51000.0).await;

        let groups = group(&store, &[new], &GroupingParams::default()).await.unwrap();
        assert!(groups.is_empty());
    }

    #[tokio::test]
    async fn test_two_neighbours_form_one_group() {
        let store = InMemoryStore::new();
        admit(&store, "A", 50000.0).await;
        admit(&store, "B", 52000.0).await;
        let new = admit(&store, "New", 51000.0).await;

        let groups = group(&store, &[new.clone()], &GroupingParams::default())
            .await
            .unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].new_car, new);
        assert_eq!(groups[0].similar_cars.len(), 2);
        assert!(groups[0].similar_cars.iter().all(|r| r.id != new.id));
        assert_eq!(groups[0].price_range.avg, 51000.0);
    }

    #[tokio::test]
    async fn test_include_self_counts_the_record() {
        let store = InMemoryStore::new();
        admit(&store, "Old", 50000.0).await;
        let new = admit(&store, "New", 51000.0).await;

        let params = GroupingParams {
            include_self: true,
            ..GroupingParams::default()
        };
        let groups = group(&store, &[new.clone()], &params).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].similar_cars[0].id, new.id);
    }

    #[tokio::test]
    async fn test_limit_and_admission_order() {
        let store = InMemoryStore::new();
        for (i, p) in [10000.0, 10100.0, 10200.0, 10300.0, 10400.0].iter().enumerate() {
            admit(&store, &format!("Seed{}", i), *p).await;
        }
        let first = admit(&store, "First", 10250.0).await;
        let second = admit(&store, "Second", 90000.0).await;
        let third = admit(&store, "Third", 10050.0).await;

        let groups = group(&store, &[first, second, third], &GroupingParams::default())
            .await
            .unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].new_car.make, "First");
        assert_eq!(groups[1].new_car.make, "Third");
        assert!(groups.iter().all(|g| g.similar_cars.len() == 3));
    }
}
