//! Ingestion cycle orchestration and single-record admission.
//!
//! A cycle runs: source → extract → validate → dedup gate → insert → log
//! event → group → statistics. Per-candidate problems (invalid fields,
//! duplicates, a failed insert) are counted and skipped. Only an
//! unreachable source or a store failure outside the per-record loop fails
//! the cycle. Nothing is carried between cycles.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::candidate::{extract_candidates, RawCandidate};
use crate::dedup::should_admit;
use crate::error::{AdmitError, CycleError, SourceError};
use crate::grouping::{group, GroupingParams};
use crate::models::{AggregateStatistics, SimilarityGroup, VehicleRecord};
use crate::source::CandidateSource;
use crate::store::VehicleStore;

/// Per-cycle settings, passed explicitly by the caller.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub grouping: GroupingParams,
    /// `source` recorded on candidates that do not name one.
    pub default_source: String,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            grouping: GroupingParams::default(),
            default_source: "web-search".to_string(),
        }
    }
}

/// Everything a cycle produced.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub query: String,
    /// Candidates the source returned (the `results_found` of the event).
    pub candidates_found: usize,
    pub admitted: usize,
    pub duplicates: usize,
    pub invalid: usize,
    /// Candidates whose insert failed for a reason other than uniqueness.
    pub failed: usize,
    pub event_id: i64,
    pub admitted_records: Vec<VehicleRecord>,
    pub groups: Vec<SimilarityGroup>,
    pub statistics: AggregateStatistics,
}

/// Run one ingestion cycle for `query`.
pub async fn run_cycle(
    store: &dyn VehicleStore,
    source: &dyn CandidateSource,
    query: &str,
    settings: &CycleSettings,
) -> Result<CycleReport, CycleError> {
    info!(query, source = source.name(), "starting ingestion cycle");

    let candidates = fetch_candidates(source, query).await?;
    info!(count = candidates.len(), "candidates received");

    let mut duplicates = 0usize;
    let mut invalid = 0usize;
    let mut failed = 0usize;
    let mut admitted_records: Vec<VehicleRecord> = Vec::new();

    for raw in &candidates {
        let vehicle = match raw.validate(&settings.default_source) {
            Ok(v) => v,
            Err(e) => {
                warn!(candidate = %raw.describe(), error = %e, "skipping invalid candidate");
                invalid += 1;
                continue;
            }
        };

        match should_admit(&vehicle, store).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(car = %vehicle.label(), "skipping duplicate");
                duplicates += 1;
                continue;
            }
            Err(e) => {
                warn!(car = %vehicle.label(), error = %format!("{:#}", e), "existence check failed");
                failed += 1;
                continue;
            }
        }

        match store.insert(&vehicle).await {
            Ok(outcome) if outcome.duplicate => {
                debug!(car = %vehicle.label(), "store reported duplicate");
                duplicates += 1;
            }
            Ok(outcome) => {
                // A written row without id or timestamp is a store bug; count it as failed.
                let (Some(id), Some(created_at)) = (outcome.id, outcome.created_at) else {
                    warn!(car = %vehicle.label(), "insert returned no id");
                    failed += 1;
                    continue;
                };
                info!(car = %vehicle.label(), price = vehicle.price, id, "added");
                admitted_records.push(VehicleRecord::from_new(id, &vehicle, created_at));
            }
            Err(e) => {
                warn!(car = %vehicle.label(), error = %format!("{:#}", e), "insert failed");
                failed += 1;
            }
        }
    }

    let event_id = store
        .log_event(
            query,
            candidates.len() as i64,
            admitted_records.len() as i64,
        )
        .await
        .map_err(CycleError::Store)?;

    let groups = group(store, &admitted_records, &settings.grouping)
        .await
        .map_err(CycleError::Store)?;

    let statistics = store.statistics().await.map_err(CycleError::Store)?;

    info!(
        admitted = admitted_records.len(),
        duplicates,
        invalid,
        failed,
        groups = groups.len(),
        "ingestion cycle complete"
    );

    Ok(CycleReport {
        query: query.to_string(),
        candidates_found: candidates.len(),
        admitted: admitted_records.len(),
        duplicates,
        invalid,
        failed,
        event_id,
        admitted_records,
        groups,
        statistics,
    })
}

async fn fetch_candidates(
    source: &dyn CandidateSource,
    query: &str,
) -> Result<Vec<RawCandidate>, CycleError> {
    let text = match source.fetch(query).await {
        Ok(text) => text,
        Err(e @ SourceError::Unreachable(_)) => return Err(CycleError::Source(e)),
        Err(e @ SourceError::BadResponse(_)) => {
            warn!(error = %e, "treating source response as zero candidates");
            return Ok(Vec::new());
        }
    };

    match extract_candidates(&text) {
        Some(candidates) => Ok(candidates),
        None => {
            warn!(
                response = %text.chars().take(200).collect::<String>(),
                "no JSON array in source response; treating as zero candidates"
            );
            Ok(Vec::new())
        }
    }
}

/// Outcome of [`admit_one`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Admission {
    pub admitted: bool,
    pub duplicate: bool,
    pub id: Option<i64>,
    /// The validated listing, for messages.
    pub label: String,
}

/// Admit one caller-submitted listing: validate, gate, insert.
pub async fn admit_one(
    store: &dyn VehicleStore,
    raw: &RawCandidate,
    default_source: &str,
) -> Result<Admission, AdmitError> {
    let vehicle = raw.validate(default_source)?;
    let label = vehicle.label();

    let admit = should_admit(&vehicle, store)
        .await
        .map_err(AdmitError::Store)?;
    if !admit {
        info!(car = %label, "already exists; not admitted");
        return Ok(Admission {
            admitted: false,
            duplicate: true,
            id: None,
            label,
        });
    }

    let outcome = store.insert(&vehicle).await.map_err(AdmitError::Store)?;
    if outcome.duplicate {
        debug!(car = %label, "store reported duplicate");
        return Ok(Admission {
            admitted: false,
            duplicate: true,
            id: None,
            label,
        });
    }

    info!(car = %label, price = vehicle.price, "added via direct admission");
    Ok(Admission {
        admitted: true,
        duplicate: false,
        id: outcome.id,
        label,
    })
}
