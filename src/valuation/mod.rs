//! Valuation core: comparable candidate retrieval, similarity scoring,
//! ranking, and regression-based adjustment.

pub mod adjustment;
pub mod domain;
pub mod ranking;
pub mod retrieval;
pub mod scoring;
pub mod service;
pub mod store;

pub use adjustment::{
    AdjustmentConfig, AdjustmentEngine, AdjustmentFactor, AdjustmentReport, ComparableAdjustment,
    FeaturePayload,
};
pub use domain::{
    CmaFilters, ComparableResult, ComparableScore, ComputationResult, ParcelId, PropertySnapshot,
};
pub use ranking::{SortDirection, SortField, SortSpec};
pub use retrieval::{CandidateRetriever, RetrievalConfig};
pub use scoring::{ScoringConfig, SimilarityScorer};
pub use service::{ComparableRequest, ValuationService};
