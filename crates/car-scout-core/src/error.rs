//! Error taxonomy for admission and ingestion.
//!
//! Duplicates are not represented here: both the dedup gate and the store's
//! uniqueness constraint report them as data ([`InsertOutcome`](crate::models::InsertOutcome),
//! [`Admission`](crate::pipeline::Admission)).

use thiserror::Error;

/// A candidate is missing a required field or carries an unusable value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("invalid value for `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Failure reported by a [`CandidateSource`](crate::source::CandidateSource).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    /// The source could not be reached at all. Fails the cycle.
    #[error("candidate source unreachable: {0}")]
    Unreachable(String),
    /// The source answered, but not with anything usable. The cycle
    /// continues with zero candidates.
    #[error("candidate source returned an unusable response: {0}")]
    BadResponse(String),
}

/// Conditions that fail a whole ingestion cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Source(SourceError),
    #[error("record store failure: {0:#}")]
    Store(anyhow::Error),
}

/// Failure of a single-record admission.
#[derive(Debug, Error)]
pub enum AdmitError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("record store failure: {0:#}")]
    Store(anyhow::Error),
}
