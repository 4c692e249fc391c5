//! Standalone hedonic price prediction over the full coefficient set.

use chrono::NaiveDate;

use super::coefficients::{CoefficientError, CoefficientSet, StructuralTerm};
use super::features::{FeaturePayload, FeatureSnapshot};
use super::AdjustmentConfig;
use crate::valuation::store::{CoefficientStore, RunId};

const DAYS_PER_MONTH: f64 = 30.4375;

/// Accumulates `log_price = const + Σ(beta × feature)` over every term the
/// segment's model defines and returns `exp(log_price)`.
///
/// Returns `Ok(None)` when the resolved run has no coefficients at all or the
/// exponentiation is not finite. Unreported quality/condition substitute the
/// model's `missing_quality`/`missing_condition` indicator terms.
pub fn predict_price<C: CoefficientStore + ?Sized>(
    store: &C,
    payload: &FeaturePayload,
    market_segment: &str,
    run_id: Option<&RunId>,
    config: &AdjustmentConfig,
) -> Result<Option<f64>, CoefficientError> {
    let set = CoefficientSet::resolve(store, market_segment, run_id)?;
    if set.is_empty() {
        return Ok(None);
    }

    let features = FeatureSnapshot::from_payload(payload);
    let mut log_price = set.intercept();
    let mut accumulate = |beta: Option<f64>, value: Option<f64>| {
        if let (Some(beta), Some(value)) = (beta, value) {
            log_price += beta * value;
        }
    };

    accumulate(set.structural(StructuralTerm::LogArea), features.log_area);
    accumulate(set.structural(StructuralTerm::LogLot), features.log_lot);
    accumulate(set.structural(StructuralTerm::LogAge), features.log_age);

    match features.quality_score {
        Some(score) => accumulate(set.structural(StructuralTerm::QualityScore), Some(score)),
        None => accumulate(set.missing_quality(), Some(1.0)),
    }
    match features.condition_score {
        Some(score) => accumulate(set.structural(StructuralTerm::ConditionScore), Some(score)),
        None => accumulate(set.missing_condition(), Some(1.0)),
    }

    accumulate(set.structural(StructuralTerm::HasGarage), features.has_garage);
    accumulate(
        set.structural(StructuralTerm::HasBasement),
        features.has_basement,
    );
    accumulate(set.structural(StructuralTerm::IsView), features.is_view);

    let time_index = regression_time_index(features.sale_date, config.anchor_date);
    accumulate(set.time(), time_index);
    if let (Some(beta), Some(t), Some(log_area)) =
        (set.area_time_interaction(), time_index, features.log_area)
    {
        log_price += beta * log_area * t;
    }

    if let Some(term) = property_type_term(payload.property_type.as_deref()) {
        if let Some(beta) = set.property_type_dummy(&term) {
            log_price += beta;
        }
    }

    let price = log_price.exp();
    if price.is_finite() {
        Ok(Some(price))
    } else {
        Ok(None)
    }
}

fn regression_time_index(date: Option<NaiveDate>, anchor: NaiveDate) -> Option<f64> {
    let date = date?;
    Some((date - anchor).num_days() as f64 / DAYS_PER_MONTH)
}

/// Dummy-term name for a property-type code. The fitting job labels integer
/// codes with a trailing `.0` (`pt_11.0`), so integer-valued inputs format
/// the same way.
fn property_type_term(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
        return None;
    }
    let numeric: f64 = trimmed.parse().ok()?;
    if numeric.fract() == 0.0 {
        Some(format!("pt_{}.0", numeric as i64))
    } else {
        Some(format!("pt_{numeric}"))
    }
}
