use crate::valuation::adjustment::{AdjustmentError, FeaturePayloadError};
use crate::valuation::domain::ParcelId;
use crate::valuation::retrieval::RetrievalError;
use crate::valuation::store::StoreError;

/// Crate-level error surfaced by the [`crate::valuation::ValuationService`]
/// facade.
///
/// Taxonomy: invalid input and missing-coefficient failures arrive through
/// [`AdjustmentError`]; unusable subjects and unknown parcels are
/// not-found-class; store failures pass through untouched. Nothing here is
/// retried internally.
#[derive(Debug, thiserror::Error)]
pub enum ValuationError {
    #[error("parcel {0} could not be located")]
    ParcelNotFound(ParcelId),
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    #[error(transparent)]
    Adjustment(#[from] AdjustmentError),
    #[error(transparent)]
    Payload(#[from] FeaturePayloadError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
