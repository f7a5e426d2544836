//! Dedup gate.
//!
//! Admission is keyed on the identity key (make, model, year) only: a
//! listing whose identity is already stored is rejected whatever its price.
//! The store's own uniqueness constraint is wider (it includes price, see
//! [`is_exact_duplicate`](crate::store::is_exact_duplicate)) and is
//! consulted separately on insert.

use anyhow::Result;

use crate::models::NewVehicle;
use crate::store::VehicleStore;

/// Decide whether a validated candidate may be admitted.
///
/// Performs no writes.
pub async fn should_admit(candidate: &NewVehicle, store: &dyn VehicleStore) -> Result<bool> {
    let exists = store
        .exists(&candidate.make, &candidate.model, candidate.year)
        .await?;
    Ok(!exists)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use crate::store::is_exact_duplicate;

    fn car(price: f64) -> NewVehicle {
        NewVehicle {
            make: "Ferrari".into(),
            model: "296GTB".into(),
            year: 2024,
            price,
            url: None,
            description: None,
            source: "web-search".into(),
            image_url: None,
        }
    }

    #[tokio::test]
    async fn test_gate_ignores_price() {
        let store = InMemoryStore::new();
        assert!(should_admit(&car(300000.0), &store).await.unwrap());
        store.insert(&car(300000.0)).await.unwrap();

        let second = car(310000.0);
        assert!(!should_admit(&second, &store).await.unwrap());

        // The store-level predicate alone would have let it through.
        let stored = store.all_records().await.unwrap();
        assert!(!is_exact_duplicate(&second, &stored[0]));
        assert!(is_exact_duplicate(&car(300000.0), &stored[0]));
    }

    #[tokio::test]
    async fn test_gate_is_case_sensitive() {
        let store = InMemoryStore::new();
        store.insert(&car(300000.0)).await.unwrap();
        let mut lower = car(300000.0);
        lower.make = "ferrari".into();
        assert!(should_admit(&lower, &store).await.unwrap());
    }
}
