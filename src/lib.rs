//! Valuation core for a property-assessment platform.
//!
//! Given a subject parcel, this crate finds comparable recently-sold parcels
//! under spatial, recency, and land-use constraints; scores each candidate's
//! similarity across location, recency, and physical characteristics; and
//! converts raw comparable sale prices into regression-adjusted indicated
//! values using market-segment hedonic coefficients.
//!
//! Everything is a synchronous, request-scoped read pipeline over two store
//! collaborators ([`valuation::store::PropertyRecordStore`] and
//! [`valuation::store::CoefficientStore`]); the crate persists nothing and
//! shares no mutable state between computations.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod valuation;

pub use config::EngineConfig;
pub use error::ValuationError;
