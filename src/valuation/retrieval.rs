use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{ParcelId, PropertySnapshot};
use super::store::{CandidateQuery, CandidateRecord, PropertyRecordStore, SearchTier, StoreError};

/// Retrieval tuning knobs; immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Sales older than this many days are never candidates.
    pub max_sale_age_days: i64,
    /// Candidates are over-fetched by this factor so enough distinct rows
    /// survive downstream filtering and truncation.
    pub oversample_factor: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_sale_age_days: 540,
            oversample_factor: 2,
        }
    }
}

/// Error raised while assembling the candidate pool.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("subject parcel {0} is not usable: {1}")]
    SubjectNotUsable(ParcelId, String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Spatially-pruned, recency-filtered candidate search with tiered fallback:
/// same neighborhood first, then same city district, then anything in radius.
pub struct CandidateRetriever<'a, S: PropertyRecordStore> {
    store: &'a S,
    config: RetrievalConfig,
}

impl<'a, S: PropertyRecordStore> CandidateRetriever<'a, S> {
    pub fn new(store: &'a S, config: RetrievalConfig) -> Self {
        Self { store, config }
    }

    /// Up to `limit × oversample_factor` distance-ordered candidates. An empty
    /// pool is a valid outcome; a subject without geometry is not.
    pub fn retrieve(
        &self,
        subject: &PropertySnapshot,
        radius_meters: f64,
        max_sale_age_days: Option<i64>,
        limit: usize,
        excluded: &[ParcelId],
        as_of: NaiveDate,
    ) -> Result<Vec<CandidateRecord>, RetrievalError> {
        if subject.location.is_none() {
            return Err(RetrievalError::SubjectNotUsable(
                subject.parcel_id.clone(),
                "no geospatial coordinates".to_string(),
            ));
        }

        let target = limit.saturating_mul(self.config.oversample_factor.max(1));
        let max_age = max_sale_age_days.unwrap_or(self.config.max_sale_age_days);

        let mut pool: Vec<CandidateRecord> = Vec::new();
        let mut fetched: Vec<ParcelId> = excluded.to_vec();

        for tier in [SearchTier::Neighborhood, SearchTier::CityDistrict, SearchTier::Any] {
            if pool.len() >= target {
                break;
            }
            if !tier_applicable(tier, subject) {
                continue;
            }

            let query = CandidateQuery {
                subject,
                tier,
                radius_meters,
                max_sale_age_days: max_age,
                as_of,
                limit: target - pool.len(),
                excluded: &fetched,
            };
            let batch = self.store.find_candidates(&query)?;
            debug!(
                tier = ?tier,
                found = batch.len(),
                pool = pool.len(),
                target,
                "candidate tier fetched"
            );
            for record in batch {
                fetched.push(record.snapshot.parcel_id.clone());
                pool.push(record);
            }
        }

        Ok(pool)
    }
}

/// Tiers keyed on a context field the subject lacks are skipped outright.
fn tier_applicable(tier: SearchTier, subject: &PropertySnapshot) -> bool {
    match tier {
        SearchTier::Neighborhood => subject.context.neighborhood_code.is_some(),
        SearchTier::CityDistrict => subject.context.city_district.is_some(),
        SearchTier::Any => true,
    }
}
