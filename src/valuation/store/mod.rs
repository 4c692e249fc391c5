//! Storage abstractions so the valuation pipeline can be exercised in
//! isolation. Production deployments implement these traits over the spatial
//! relational store and the regression coefficient tables; tests use the
//! in-memory implementations in [`memory`].

pub mod memory;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::domain::{ParcelId, PropertySnapshot};

/// Geographic search tier, attempted in declaration order by the retriever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchTier {
    /// Candidates sharing the subject's neighborhood code.
    Neighborhood,
    /// Candidates sharing the subject's city district.
    CityDistrict,
    /// Any candidate inside the radius.
    Any,
}

/// One spatially-pruned candidate query. Implementations must additionally
/// enforce: non-null geometry, a dated sale with positive price inside the
/// recency window, and one row per parcel (most recent assessment roll wins).
#[derive(Debug, Clone)]
pub struct CandidateQuery<'a> {
    pub subject: &'a PropertySnapshot,
    pub tier: SearchTier,
    pub radius_meters: f64,
    /// Sales older than this many days before `as_of` are excluded.
    pub max_sale_age_days: i64,
    pub as_of: NaiveDate,
    /// Upper bound on returned rows, nearest-first.
    pub limit: usize,
    /// Parcels to drop: the subject itself, caller exclusions, and parcels
    /// already fetched by an earlier tier.
    pub excluded: &'a [ParcelId],
}

/// Candidate snapshot paired with its distance to the subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub snapshot: PropertySnapshot,
    pub distance_meters: f64,
}

/// Read access to parcel attributes, sale history, and improvement rollups.
pub trait PropertyRecordStore: Send + Sync {
    fn fetch_parcel(&self, id: &ParcelId) -> Result<Option<PropertySnapshot>, StoreError>;

    /// Distance-ordered candidates satisfying the query constraints. An empty
    /// result is a valid outcome, not an error.
    fn find_candidates(&self, query: &CandidateQuery<'_>) -> Result<Vec<CandidateRecord>, StoreError>;
}

/// Opaque identifier for one fitted coefficient set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One fitted regression coefficient row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientRow {
    pub market_segment: String,
    pub term: String,
    pub beta: f64,
    pub standard_error: Option<f64>,
    pub run_id: RunId,
    pub created_at: NaiveDateTime,
}

/// Read access to regression coefficients produced by the offline fitting job.
pub trait CoefficientStore: Send + Sync {
    /// The most-recently-created run id for a segment, if any run exists.
    fn latest_run(&self, market_segment: &str) -> Result<Option<RunId>, StoreError>;

    /// All coefficient rows for (segment, run).
    fn coefficients(
        &self,
        market_segment: &str,
        run_id: &RunId,
    ) -> Result<Vec<CoefficientRow>, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("malformed store data: {0}")]
    Malformed(String),
}
