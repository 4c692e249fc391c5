use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::adjustment::{
    AdjustmentConfig, AdjustmentEngine, AdjustmentReport, FeaturePayload,
};
use super::domain::{
    CmaFilters, ComparableResult, ComputationResult, ParcelId, PropertySnapshot, METERS_PER_MILE,
};
use super::ranking::{rank_comparables, SortSpec};
use super::retrieval::{CandidateRetriever, RetrievalConfig, RetrievalError};
use super::scoring::{ScoringConfig, SimilarityScorer};
use super::store::{CoefficientStore, PropertyRecordStore, RunId};
use crate::error::ValuationError;

/// Default number of comparables returned when the caller does not say.
pub const DEFAULT_COMPARABLE_LIMIT: usize = 16;
/// Upper bound on comparables per computation.
pub const MAX_COMPARABLE_LIMIT: usize = 24;

/// Parameters for one retrieve-and-score computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparableRequest {
    pub subject: PropertySnapshot,
    #[serde(default)]
    pub filters: CmaFilters,
    #[serde(default)]
    pub excluded: Vec<ParcelId>,
    #[serde(default)]
    pub sort: SortSpec,
    /// 0 falls back to [`DEFAULT_COMPARABLE_LIMIT`]; values above
    /// [`MAX_COMPARABLE_LIMIT`] are clamped.
    pub limit: usize,
    pub radius_meters: f64,
    /// None falls back to the configured retrieval default (540 days).
    pub max_sale_age_days: Option<i64>,
    /// None anchors recency scoring at today.
    pub valuation_date: Option<NaiveDate>,
}

/// Facade composing the retriever, scorer, ranker, and adjustment engine over
/// the two store collaborators. Each call is an independent, synchronous read
/// pipeline; the service holds no mutable state.
pub struct ValuationService<P, C> {
    properties: Arc<P>,
    coefficients: Arc<C>,
    retrieval: RetrievalConfig,
    scorer: SimilarityScorer,
    adjustment: AdjustmentConfig,
}

impl<P, C> ValuationService<P, C>
where
    P: PropertyRecordStore + 'static,
    C: CoefficientStore + 'static,
{
    pub fn new(properties: Arc<P>, coefficients: Arc<C>) -> Self {
        Self::with_config(
            properties,
            coefficients,
            RetrievalConfig::default(),
            ScoringConfig::default(),
            AdjustmentConfig::default(),
        )
    }

    pub fn with_config(
        properties: Arc<P>,
        coefficients: Arc<C>,
        retrieval: RetrievalConfig,
        scoring: ScoringConfig,
        adjustment: AdjustmentConfig,
    ) -> Self {
        Self {
            properties,
            coefficients,
            retrieval,
            scorer: SimilarityScorer::new(scoring),
            adjustment,
        }
    }

    /// Loads and validates a subject snapshot from the property store. A
    /// parcel without geospatial coordinates can never anchor a comparable
    /// search, so it is rejected here rather than deep in retrieval.
    pub fn load_subject(&self, parcel_id: &ParcelId) -> Result<PropertySnapshot, ValuationError> {
        let snapshot = self
            .properties
            .fetch_parcel(parcel_id)?
            .ok_or_else(|| ValuationError::ParcelNotFound(parcel_id.clone()))?;
        if snapshot.location.is_none() {
            return Err(RetrievalError::SubjectNotUsable(
                parcel_id.clone(),
                "no geospatial coordinates".to_string(),
            )
            .into());
        }
        Ok(snapshot)
    }

    /// Finds, scores, and ranks comparable sales for the subject.
    pub fn retrieve_and_score(
        &self,
        request: &ComparableRequest,
    ) -> Result<ComputationResult, ValuationError> {
        let limit = match request.limit {
            0 => DEFAULT_COMPARABLE_LIMIT,
            n => n.min(MAX_COMPARABLE_LIMIT),
        };
        let valuation_date = request
            .valuation_date
            .unwrap_or_else(|| chrono::Utc::now().date_naive());

        let retriever = CandidateRetriever::new(self.properties.as_ref(), self.retrieval);
        let pool = retriever.retrieve(
            &request.subject,
            request.radius_meters,
            request.max_sale_age_days,
            limit,
            &request.excluded,
            valuation_date,
        )?;

        let mut comparables: Vec<ComparableResult> = Vec::with_capacity(pool.len());
        for candidate in pool {
            if !request.filters.matches(&candidate.snapshot) {
                continue;
            }
            // Retrieval guarantees a dated, positively-priced sale.
            let Some(sale_price) = candidate.snapshot.sale_price.filter(|p| *p > 0.0) else {
                continue;
            };
            let score = self.scorer.score(
                &request.subject,
                &candidate.snapshot,
                Some(candidate.distance_meters),
                request.radius_meters,
                valuation_date,
            );
            let difference_flags = self
                .scorer
                .difference_flags(&request.subject, &candidate.snapshot);

            comparables.push(ComparableResult {
                sale_price,
                sale_date: candidate.snapshot.sale_date,
                assessed_value: candidate.snapshot.assessed_value,
                distance_meters: Some(candidate.distance_meters),
                distance_miles: Some(candidate.distance_meters / METERS_PER_MILE),
                difference_flags,
                inclusion_rank: 0,
                score,
                snapshot: candidate.snapshot,
            });
        }

        rank_comparables(&mut comparables, request.sort, limit);
        info!(
            subject = %request.subject.parcel_id,
            comparables = comparables.len(),
            radius_meters = request.radius_meters,
            "comparable computation finished"
        );

        Ok(ComputationResult {
            subject: request.subject.clone(),
            comparables,
            filters: request.filters.clone(),
            sort: request.sort,
        })
    }

    /// Regression-adjusted indicated values for a set of comparables.
    pub fn compute_adjustments(
        &self,
        subject: &FeaturePayload,
        comparables: &[FeaturePayload],
        subject_predicted_price: f64,
        market_segment: Option<&str>,
        run_id: Option<&RunId>,
    ) -> Result<AdjustmentReport, ValuationError> {
        let engine = AdjustmentEngine::new(self.coefficients.as_ref(), self.adjustment);
        let report = engine.compute(
            subject,
            comparables,
            subject_predicted_price,
            market_segment,
            run_id,
        )?;
        Ok(report)
    }

    /// Hedonic price prediction over the segment's full coefficient set.
    pub fn predict_price(
        &self,
        payload: &FeaturePayload,
        market_segment: &str,
        run_id: Option<&RunId>,
    ) -> Result<Option<f64>, ValuationError> {
        let predicted = super::adjustment::prediction::predict_price(
            self.coefficients.as_ref(),
            payload,
            market_segment,
            run_id,
            &self.adjustment,
        )
        .map_err(super::adjustment::AdjustmentError::from)?;
        Ok(predicted)
    }
}
