//! # Car Scout Core
//!
//! Runtime-agnostic logic for Car Scout: the vehicle data model, the
//! [`store::VehicleStore`] abstraction, the dedup gate, price-proximity
//! grouping, candidate parsing, and the ingestion cycle.
//!
//! This crate contains no tokio, sqlx, or HTTP dependencies. The
//! application crate supplies a store backend (SQLite) and a candidate
//! source (OpenAI, file) and drives [`pipeline::run_cycle`].
//!
//! ```text
//! CandidateSource ──▶ candidate::extract ──▶ validate ──▶ dedup gate
//!                                                            │
//!        CycleReport ◀── statistics ◀── grouping ◀── VehicleStore::insert
//! ```

pub mod candidate;
pub mod dedup;
pub mod error;
pub mod grouping;
pub mod models;
pub mod pipeline;
pub mod source;
pub mod store;

pub use error::{AdmitError, CycleError, SourceError, ValidationError};
pub use models::{
    AggregateStatistics, IngestionEvent, InsertOutcome, NewVehicle, PriceRange, SimilarityGroup,
    VehicleRecord,
};
pub use source::CandidateSource;
pub use store::VehicleStore;
