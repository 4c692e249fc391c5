//! Coefficient resolution and validation.
//!
//! Terms coming out of the fitting job are strings; they are classified once
//! into [`CoefficientRole`]s so downstream code matches on roles exhaustively
//! instead of sniffing string prefixes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::valuation::store::{CoefficientStore, RunId, StoreError};

/// The eight structural factors carrying per-feature dollar adjustments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StructuralTerm {
    LogArea,
    LogLot,
    LogAge,
    QualityScore,
    ConditionScore,
    HasGarage,
    HasBasement,
    IsView,
}

impl StructuralTerm {
    pub const ALL: [StructuralTerm; 8] = [
        StructuralTerm::LogArea,
        StructuralTerm::LogLot,
        StructuralTerm::LogAge,
        StructuralTerm::QualityScore,
        StructuralTerm::ConditionScore,
        StructuralTerm::HasGarage,
        StructuralTerm::HasBasement,
        StructuralTerm::IsView,
    ];

    pub fn term_name(self) -> &'static str {
        match self {
            StructuralTerm::LogArea => "log_area",
            StructuralTerm::LogLot => "log_lot",
            StructuralTerm::LogAge => "log_age",
            StructuralTerm::QualityScore => "quality_score",
            StructuralTerm::ConditionScore => "condition_score",
            StructuralTerm::HasGarage => "has_garage",
            StructuralTerm::HasBasement => "has_basement",
            StructuralTerm::IsView => "is_view",
        }
    }

    fn parse(term: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.term_name() == term)
    }
}

/// Role a fitted term plays in the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoefficientRole {
    /// Model intercept (`const`); prediction only.
    Intercept,
    /// Linear time-index term (`t`).
    Time,
    /// Area × time interaction (`area_time`).
    AreaTimeInteraction,
    /// Indicator substituted when quality is unreported; prediction only.
    MissingQuality,
    /// Indicator substituted when condition is unreported; prediction only.
    MissingCondition,
    /// Property-type dummy (`pt_<code>`); prediction only.
    PropertyTypeDummy(String),
    /// One of the eight structural factors.
    Structural(StructuralTerm),
    /// Fitted term this engine does not consume; kept for run parity.
    Other(String),
}

impl CoefficientRole {
    pub fn classify(term: &str) -> Self {
        if term == "const" {
            return Self::Intercept;
        }
        if term == "t" {
            return Self::Time;
        }
        if term == "area_time" {
            return Self::AreaTimeInteraction;
        }
        if term == "missing_quality" {
            return Self::MissingQuality;
        }
        if term == "missing_condition" {
            return Self::MissingCondition;
        }
        if let Some(code) = term.strip_prefix("pt_") {
            return Self::PropertyTypeDummy(code.to_string());
        }
        if let Some(structural) = StructuralTerm::parse(term) {
            return Self::Structural(structural);
        }
        Self::Other(term.to_string())
    }

    /// Terms excluded from adjustment computation (but kept for prediction).
    pub fn ignored_for_adjustments(&self) -> bool {
        matches!(
            self,
            Self::Intercept
                | Self::MissingQuality
                | Self::MissingCondition
                | Self::PropertyTypeDummy(_)
        )
    }
}

/// Coefficient resolution failures surfaced to callers verbatim.
#[derive(Debug, thiserror::Error)]
pub enum CoefficientError {
    #[error("no adjustment coefficients found for market_segment={market_segment}")]
    NoRuns { market_segment: String },
    #[error(
        "missing coefficient(s) [{}] for market_segment={market_segment} (run_id={run_id})",
        missing_terms.join(", ")
    )]
    MissingTerms {
        /// Sorted term names absent from the resolved run.
        missing_terms: Vec<String>,
        market_segment: String,
        run_id: RunId,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One resolved coefficient set for (segment, run).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientSet {
    pub market_segment: String,
    pub run_id: RunId,
    betas: BTreeMap<String, f64>,
}

impl CoefficientSet {
    /// Resolves the explicit run id, or the most-recently-created run for the
    /// segment. A segment with no runs at all is an error.
    pub fn resolve<C: CoefficientStore + ?Sized>(
        store: &C,
        market_segment: &str,
        run_id: Option<&RunId>,
    ) -> Result<Self, CoefficientError> {
        let resolved = match run_id {
            Some(id) => id.clone(),
            None => store
                .latest_run(market_segment)?
                .ok_or_else(|| CoefficientError::NoRuns {
                    market_segment: market_segment.to_string(),
                })?,
        };

        let mut betas = BTreeMap::new();
        for row in store.coefficients(market_segment, &resolved)? {
            betas.insert(row.term, row.beta);
        }

        Ok(Self {
            market_segment: market_segment.to_string(),
            run_id: resolved,
            betas,
        })
    }

    /// All nine required terms must be present to compute adjustments; the
    /// error names every missing term, sorted.
    pub fn validate_complete(&self) -> Result<(), CoefficientError> {
        let mut missing: Vec<String> = StructuralTerm::ALL
            .into_iter()
            .map(|term| term.term_name().to_string())
            .chain(std::iter::once("t".to_string()))
            .filter(|term| !self.betas.contains_key(term))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        missing.sort();
        Err(CoefficientError::MissingTerms {
            missing_terms: missing,
            market_segment: self.market_segment.clone(),
            run_id: self.run_id.clone(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.betas.is_empty()
    }

    pub fn structural(&self, term: StructuralTerm) -> Option<f64> {
        self.beta(term.term_name())
    }

    pub fn intercept(&self) -> f64 {
        self.beta("const").unwrap_or(0.0)
    }

    pub fn time(&self) -> Option<f64> {
        self.beta("t")
    }

    pub fn area_time_interaction(&self) -> Option<f64> {
        self.beta("area_time")
    }

    pub fn missing_quality(&self) -> Option<f64> {
        self.beta("missing_quality")
    }

    pub fn missing_condition(&self) -> Option<f64> {
        self.beta("missing_condition")
    }

    /// Beta for a property-type dummy term such as `pt_11.0`, if the run
    /// defines one.
    pub fn property_type_dummy(&self, term: &str) -> Option<f64> {
        if !term.starts_with("pt_") {
            return None;
        }
        self.beta(term)
    }

    fn beta(&self, term: &str) -> Option<f64> {
        self.betas.get(term).copied()
    }
}
