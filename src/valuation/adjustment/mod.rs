//! Regression-based adjustment engine.
//!
//! Converts subject-vs-comparable feature deltas into dollar adjustments per
//! factor using a market segment's fitted hedonic coefficients, plus an
//! IAAO-style time adjustment trending each comparable's own sale price to
//! the valuation date.

mod coefficients;
mod features;
pub mod prediction;

pub use coefficients::{CoefficientError, CoefficientRole, CoefficientSet, StructuralTerm};
pub use features::{FeaturePayload, FeaturePayloadError, FeatureSnapshot};

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::round_currency;
use super::store::{CoefficientStore, RunId};

/// Adjustment tuning knobs; immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentConfig {
    /// Origin of the regression time index.
    pub anchor_date: NaiveDate,
    /// Hard cap, in months, on time-trending extrapolation.
    pub months_cap: f64,
    /// Global damping multiplier on the effective time beta (1.0 = none).
    pub time_shrink: f64,
}

impl Default for AdjustmentConfig {
    fn default() -> Self {
        Self {
            anchor_date: NaiveDate::from_ymd_opt(2015, 1, 1).expect("fixed anchor date"),
            months_cap: 60.0,
            time_shrink: 1.0,
        }
    }
}

const DAYS_PER_MONTH: f64 = 30.4375;

/// The nine adjustment factors reported per comparable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentFactor {
    Area,
    Lot,
    Age,
    Quality,
    Condition,
    Garage,
    Basement,
    View,
    Time,
}

impl AdjustmentFactor {
    fn structural(term: StructuralTerm) -> Self {
        match term {
            StructuralTerm::LogArea => Self::Area,
            StructuralTerm::LogLot => Self::Lot,
            StructuralTerm::LogAge => Self::Age,
            StructuralTerm::QualityScore => Self::Quality,
            StructuralTerm::ConditionScore => Self::Condition,
            StructuralTerm::HasGarage => Self::Garage,
            StructuralTerm::HasBasement => Self::Basement,
            StructuralTerm::IsView => Self::View,
        }
    }
}

/// Raw inputs behind one factor adjustment, for audit display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorDetail {
    pub subject_value: Option<f64>,
    pub comparable_value: Option<f64>,
    /// `subject − comparable` on the coefficient's own scale; for the time
    /// factor, the capped month difference.
    pub delta: Option<f64>,
}

/// Adjusted indication for one comparable sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparableAdjustment {
    pub comp_id: String,
    pub base_sale_price: f64,
    pub adjustments: BTreeMap<AdjustmentFactor, f64>,
    pub adjustment_details: BTreeMap<AdjustmentFactor, FactorDetail>,
    pub total_adjustment: f64,
    pub adjusted_value: f64,
}

/// Output of [`AdjustmentEngine::compute`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentReport {
    pub subject_predicted_price: f64,
    pub market_segment: String,
    pub run_id: RunId,
    pub comparables: Vec<ComparableAdjustment>,
}

/// Error raised by the adjustment engine.
#[derive(Debug, thiserror::Error)]
pub enum AdjustmentError {
    /// Client-input-class failure: bad predicted price or unresolvable
    /// market segment.
    #[error("{0}")]
    InvalidInput(String),
    #[error(transparent)]
    Coefficient(#[from] CoefficientError),
}

/// Stateless engine bound to a coefficient store.
pub struct AdjustmentEngine<'a, C: CoefficientStore + ?Sized> {
    store: &'a C,
    config: AdjustmentConfig,
}

impl<'a, C: CoefficientStore + ?Sized> AdjustmentEngine<'a, C> {
    pub fn new(store: &'a C, config: AdjustmentConfig) -> Self {
        Self { store, config }
    }

    /// Applies regression-derived adjustments to each comparable so its sale
    /// price reflects the subject as if they shared the same characteristics.
    ///
    /// Comparables with a missing or non-positive sale price are skipped
    /// silently; upstream retrieval is expected to have filtered them.
    pub fn compute(
        &self,
        subject: &FeaturePayload,
        comparables: &[FeaturePayload],
        subject_predicted_price: f64,
        market_segment: Option<&str>,
        run_id: Option<&RunId>,
    ) -> Result<AdjustmentReport, AdjustmentError> {
        if !subject_predicted_price.is_finite() || subject_predicted_price <= 0.0 {
            return Err(AdjustmentError::InvalidInput(
                "subject predicted price must be a positive number".to_string(),
            ));
        }
        let segment = market_segment
            .map(str::to_string)
            .or_else(|| subject.market_segment.clone())
            .ok_or_else(|| {
                AdjustmentError::InvalidInput(
                    "market segment is required for the subject".to_string(),
                )
            })?;

        let set = CoefficientSet::resolve(self.store, &segment, run_id)?;
        set.validate_complete()?;

        let subject_features = FeatureSnapshot::from_payload(subject);
        let mut payloads = Vec::with_capacity(comparables.len());

        for (index, comparable) in comparables.iter().enumerate() {
            let comp_id = comparable
                .comp_id
                .clone()
                .unwrap_or_else(|| format!("comp_{}", index + 1));
            let Some(base_price) = comparable.sale_price.filter(|price| *price > 0.0) else {
                debug!(comp_id, "skipping comparable without a positive sale price");
                continue;
            };

            let comp_features = FeatureSnapshot::from_payload(comparable);
            let mut adjustments = BTreeMap::new();
            let mut details = BTreeMap::new();

            for term in StructuralTerm::ALL {
                let factor = AdjustmentFactor::structural(term);
                let (subject_value, comp_value) =
                    structural_inputs(term, &subject_features, &comp_features);
                let delta = match (subject_value, comp_value) {
                    (Some(s), Some(c)) => Some(s - c),
                    _ => None,
                };
                let amount = match (set.structural(term), delta) {
                    (Some(beta), Some(delta)) if delta != 0.0 => {
                        subject_predicted_price * ((beta * delta).exp() - 1.0)
                    }
                    _ => 0.0,
                };
                adjustments.insert(factor, amount);
                details.insert(
                    factor,
                    FactorDetail {
                        subject_value,
                        comparable_value: comp_value,
                        delta,
                    },
                );
            }

            let (time_amount, time_detail) =
                self.time_adjustment(&set, &subject_features, &comp_features, base_price);
            adjustments.insert(AdjustmentFactor::Time, time_amount);
            details.insert(AdjustmentFactor::Time, time_detail);

            let total: f64 = adjustments.values().sum();
            payloads.push(ComparableAdjustment {
                comp_id,
                base_sale_price: round_currency(base_price),
                adjustments: adjustments
                    .into_iter()
                    .map(|(factor, amount)| (factor, round_currency(amount)))
                    .collect(),
                adjustment_details: details,
                total_adjustment: round_currency(total),
                adjusted_value: round_currency(base_price + total),
            });
        }

        Ok(AdjustmentReport {
            subject_predicted_price: round_currency(subject_predicted_price),
            market_segment: set.market_segment.clone(),
            run_id: set.run_id.clone(),
            comparables: payloads,
        })
    }

    /// IAAO-style time trending applied to the comparable's own sale price.
    /// `months = valuation_index − comp_index`, capped; the effective beta
    /// folds in the area×time interaction when the model fits one.
    fn time_adjustment(
        &self,
        set: &CoefficientSet,
        subject: &FeatureSnapshot,
        comparable: &FeatureSnapshot,
        base_price: f64,
    ) -> (f64, FactorDetail) {
        let valuation_index = self.time_index(subject.sale_date);
        let comp_index = self.time_index(comparable.sale_date);
        let months = match (valuation_index, comp_index) {
            (Some(v), Some(c)) => Some((v - c).clamp(-self.config.months_cap, self.config.months_cap)),
            _ => None,
        };

        let detail = FactorDetail {
            subject_value: valuation_index,
            comparable_value: comp_index,
            delta: months,
        };

        let amount = match (set.time(), months) {
            (Some(beta_t), Some(months)) if months != 0.0 => {
                let interaction = match (set.area_time_interaction(), comparable.log_area) {
                    (Some(beta_at), Some(log_area)) => beta_at * log_area,
                    _ => 0.0,
                };
                let effective_beta = (beta_t + interaction) * self.config.time_shrink;
                base_price * ((effective_beta * months).exp() - 1.0)
            }
            _ => 0.0,
        };

        (amount, detail)
    }

    /// Months since the regression anchor date.
    fn time_index(&self, date: Option<NaiveDate>) -> Option<f64> {
        let date = date?;
        Some((date - self.config.anchor_date).num_days() as f64 / DAYS_PER_MONTH)
    }
}

fn structural_inputs(
    term: StructuralTerm,
    subject: &FeatureSnapshot,
    comparable: &FeatureSnapshot,
) -> (Option<f64>, Option<f64>) {
    match term {
        StructuralTerm::LogArea => (subject.log_area, comparable.log_area),
        StructuralTerm::LogLot => (subject.log_lot, comparable.log_lot),
        StructuralTerm::LogAge => (subject.log_age, comparable.log_age),
        StructuralTerm::QualityScore => (subject.quality_score, comparable.quality_score),
        StructuralTerm::ConditionScore => (subject.condition_score, comparable.condition_score),
        StructuralTerm::HasGarage => (subject.has_garage, comparable.has_garage),
        StructuralTerm::HasBasement => (subject.has_basement, comparable.has_basement),
        StructuralTerm::IsView => (subject.is_view, comparable.is_view),
    }
}
