//! Candidate source abstraction.
//!
//! A source turns a natural-language query into raw text that should
//! contain a JSON array of listings, possibly wrapped in prose. Parsing is
//! done by [`candidate::extract_candidates`](crate::candidate::extract_candidates),
//! not by the source.

use async_trait::async_trait;

use crate::error::SourceError;

/// Produces raw candidate payloads for an ingestion cycle.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use car_scout_core::{CandidateSource, SourceError};
///
/// struct Canned(String);
///
/// #[async_trait]
/// impl CandidateSource for Canned {
///     fn name(&self) -> &str { "canned" }
///     async fn fetch(&self, _query: &str) -> Result<String, SourceError> {
///         Ok(self.0.clone())
///     }
/// }
/// ```
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Short identifier used in logs (e.g. `"openai"`, `"file"`).
    fn name(&self) -> &str;

    /// Fetch the raw response for `query`.
    async fn fetch(&self, query: &str) -> Result<String, SourceError>;
}
