use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::config::ScoringConfig;
use crate::valuation::domain::PropertySnapshot;

const DAYS_PER_MONTH: f64 = 30.4375;

/// Location sub-score in [0, 1].
///
/// Distance decays linearly to zero at the radius; an unknown distance takes
/// the neutral baseline. Shared neighborhood or district earns a bonus. When
/// both sides carry a known market segment and the segments differ the score
/// is forced to zero: cross-segment comparables are never geographically
/// valid, whatever the raw distance.
pub(crate) fn location_score(
    subject: &PropertySnapshot,
    candidate: &PropertySnapshot,
    distance_meters: Option<f64>,
    radius_meters: f64,
    config: &ScoringConfig,
) -> f64 {
    if let (Some(subject_segment), Some(candidate_segment)) = (
        subject.context.market_segment.as_deref(),
        candidate.context.market_segment.as_deref(),
    ) {
        if subject_segment != candidate_segment {
            return 0.0;
        }
    }

    let mut score = match distance_meters {
        Some(distance) if radius_meters > 0.0 => {
            (1.0 - distance.min(radius_meters) / radius_meters).clamp(0.0, 1.0)
        }
        _ => config.neutral_location_score,
    };

    let same_neighborhood = matches!(
        (
            subject.context.neighborhood_code.as_deref(),
            candidate.context.neighborhood_code.as_deref(),
        ),
        (Some(a), Some(b)) if a == b
    );
    let same_district = matches!(
        (
            subject.context.city_district.as_deref(),
            candidate.context.city_district.as_deref(),
        ),
        (Some(a), Some(b)) if a == b
    );

    if same_neighborhood {
        score += config.same_neighborhood_bonus;
    } else if same_district {
        score += config.same_district_bonus;
    }

    score.clamp(0.0, 1.0)
}

/// Recency sub-score: a step function of absolute months between the
/// candidate's sale date and the valuation date. Missing either date scores 0.
pub(crate) fn time_score(sale_date: Option<NaiveDate>, valuation_date: Option<NaiveDate>) -> f64 {
    let (Some(sale), Some(valuation)) = (sale_date, valuation_date) else {
        return 0.0;
    };
    let months = ((valuation - sale).num_days() as f64 / DAYS_PER_MONTH).abs();

    if months <= 3.0 {
        1.0
    } else if months <= 6.0 {
        0.9
    } else if months <= 12.0 {
        0.7
    } else if months <= 18.0 {
        0.5
    } else if months <= 24.0 {
        0.3
    } else {
        0.0
    }
}

/// Physical sub-score: weighted average of per-feature similarities over the
/// features present on both sides. No comparable pair scores 0.
pub(crate) fn physical_score(
    subject: &PropertySnapshot,
    candidate: &PropertySnapshot,
    config: &ScoringConfig,
) -> f64 {
    let mut weighted = 0.0;
    let mut applied_weight = 0.0;
    let mut apply = |weight: f64, similarity: Option<f64>| {
        if let Some(similarity) = similarity {
            weighted += weight * similarity;
            applied_weight += weight;
        }
    };

    apply(
        config.living_area_weight,
        decay(subject.living_area, candidate.living_area, |s| {
            (s * config.living_area_scale_fraction).max(config.living_area_scale_floor)
        }),
    );
    apply(
        config.bathroom_weight,
        decay(subject.bathrooms, candidate.bathrooms, |_| {
            config.bathroom_scale
        }),
    );
    apply(
        config.bedroom_weight,
        decay(subject.bedrooms, candidate.bedrooms, |_| config.bedroom_scale),
    );
    apply(
        config.lot_weight,
        decay(subject.lot_acres, candidate.lot_acres, |s| {
            (s * config.lot_scale_fraction).max(config.lot_scale_floor)
        }),
    );
    apply(
        config.age_weight,
        decay(subject.context.age, candidate.context.age, |_| {
            config.age_scale
        }),
    );
    apply(
        config.garage_weight,
        flag_match(
            subject.context.has_garage,
            candidate.context.has_garage,
            config.garage_mismatch_score,
        ),
    );
    apply(
        config.basement_weight,
        flag_match(
            subject.context.has_basement,
            candidate.context.has_basement,
            config.basement_mismatch_score,
        ),
    );
    apply(
        config.quality_weight,
        exact_match(
            subject.context.quality_score,
            candidate.context.quality_score,
            config.quality_mismatch_score,
        ),
    );
    apply(
        config.condition_weight,
        exact_match(
            subject.context.condition_score,
            candidate.context.condition_score,
            config.condition_mismatch_score,
        ),
    );

    if applied_weight > 0.0 {
        (weighted / applied_weight).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Informational "notable difference" flags keyed by attribute name.
pub(crate) fn difference_flags(
    subject: &PropertySnapshot,
    candidate: &PropertySnapshot,
    config: &ScoringConfig,
) -> BTreeMap<String, bool> {
    let alerts = &config.difference_alerts;
    let mut flags = BTreeMap::new();
    let mut check = |key: &str, subject_value: Option<f64>, candidate_value: Option<f64>, threshold: f64| {
        if let (Some(s), Some(c)) = (subject_value, candidate_value) {
            flags.insert(key.to_string(), (s - c).abs() >= threshold);
        }
    };

    check(
        "living_area",
        subject.living_area,
        candidate.living_area,
        alerts.living_area_sqft,
    );
    check("bedrooms", subject.bedrooms, candidate.bedrooms, alerts.bedrooms);
    check(
        "bathrooms",
        subject.bathrooms,
        candidate.bathrooms,
        alerts.bathrooms,
    );
    check(
        "garage_sqft",
        subject.garage_sqft,
        candidate.garage_sqft,
        alerts.garage_sqft,
    );
    check("acres", subject.lot_acres, candidate.lot_acres, alerts.lot_acres);
    check(
        "year_built",
        subject.year_built.map(f64::from),
        candidate.year_built.map(f64::from),
        alerts.year_built,
    );

    flags
}

fn decay(
    subject: Option<f64>,
    candidate: Option<f64>,
    scale_of_subject: impl Fn(f64) -> f64,
) -> Option<f64> {
    let (s, c) = (subject?, candidate?);
    let scale = scale_of_subject(s);
    if scale <= 0.0 {
        return None;
    }
    Some((-(s - c).abs() / scale).exp())
}

fn flag_match(subject: Option<bool>, candidate: Option<bool>, mismatch: f64) -> Option<f64> {
    let (s, c) = (subject?, candidate?);
    Some(if s == c { 1.0 } else { mismatch })
}

fn exact_match(subject: Option<f64>, candidate: Option<f64>, mismatch: f64) -> Option<f64> {
    let (s, c) = (subject?, candidate?);
    Some(if s == c { 1.0 } else { mismatch })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valuation::domain::{ParcelContext, ParcelId};

    fn base(parcel: &str) -> PropertySnapshot {
        PropertySnapshot {
            parcel_id: ParcelId(parcel.to_string()),
            address: "1 Hill Rd".to_string(),
            sale_price: Some(420_000.0),
            sale_date: NaiveDate::from_ymd_opt(2024, 8, 1),
            property_type: Some("R".to_string()),
            living_area: Some(2000.0),
            lot_acres: Some(0.3),
            bedrooms: Some(3.0),
            bathrooms: Some(2.0),
            year_built: Some(1998),
            effective_year_built: None,
            garage_sqft: Some(440.0),
            assessed_value: None,
            location: None,
            context: ParcelContext {
                neighborhood_code: Some("NH7".to_string()),
                city_district: Some("ANACORTES CITY".to_string()),
                age: Some(26.0),
                has_garage: Some(true),
                has_basement: Some(false),
                quality_score: Some(4.0),
                condition_score: Some(3.0),
                ..ParcelContext::default()
            },
        }
    }

    #[test]
    fn same_neighborhood_bonus_clamps_at_one() {
        let subject = base("S");
        let candidate = base("C");
        let config = ScoringConfig::default();
        // 1 - 500/3000 = 0.8333, +0.2 neighborhood bonus, clamped.
        let score = location_score(&subject, &candidate, Some(500.0), 3000.0, &config);
        assert_eq!(score, 1.0);
    }

    #[test]
    fn district_bonus_applies_without_shared_neighborhood() {
        let subject = base("S");
        let mut candidate = base("C");
        candidate.context.neighborhood_code = Some("NH9".to_string());
        let config = ScoringConfig::default();
        let score = location_score(&subject, &candidate, Some(1500.0), 3000.0, &config);
        assert!((score - 0.55).abs() < 1e-12);
    }

    #[test]
    fn unknown_distance_uses_neutral_baseline() {
        let subject = base("S");
        let mut candidate = base("C");
        candidate.context.neighborhood_code = None;
        candidate.context.city_district = None;
        let config = ScoringConfig::default();
        let score = location_score(&subject, &candidate, None, 3000.0, &config);
        assert_eq!(score, 0.8);
    }

    #[test]
    fn cross_segment_veto_overrides_distance() {
        let mut subject = base("S");
        let mut candidate = base("C");
        subject.context.market_segment = Some("ANACORTES".to_string());
        candidate.context.market_segment = Some("BURLINGTON".to_string());
        let config = ScoringConfig::default();
        assert_eq!(
            location_score(&subject, &candidate, Some(10.0), 3000.0, &config),
            0.0
        );

        // Unknown segment on either side disables the veto.
        candidate.context.market_segment = None;
        assert!(location_score(&subject, &candidate, Some(10.0), 3000.0, &config) > 0.9);
    }

    #[test]
    fn time_score_steps() {
        let valuation = NaiveDate::from_ymd_opt(2025, 1, 1);
        // Whole days only: round down so "n months" never lands past an
        // inclusive step boundary (24 × 30.4375 = 730.5 days).
        let at_months = |months: i64| {
            let days = (months as f64 * DAYS_PER_MONTH).floor() as i64;
            valuation.map(|d| d - chrono::Duration::days(days))
        };
        assert_eq!(time_score(at_months(2), valuation), 1.0);
        assert_eq!(time_score(at_months(5), valuation), 0.9);
        assert_eq!(time_score(at_months(9), valuation), 0.7);
        assert_eq!(time_score(at_months(15), valuation), 0.5);
        assert_eq!(time_score(at_months(24), valuation), 0.3);
        assert_eq!(time_score(at_months(30), valuation), 0.0);
        assert_eq!(time_score(None, valuation), 0.0);
        assert_eq!(time_score(at_months(2), None), 0.0);
    }

    #[test]
    fn physical_identical_property_scores_one() {
        let subject = base("S");
        let candidate = base("C");
        let config = ScoringConfig::default();
        let score = physical_score(&subject, &candidate, &config);
        assert!((score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn physical_averages_only_available_evidence() {
        let subject = base("S");
        let mut candidate = base("C");
        // Strip everything except bathrooms: one mismatched pair remains.
        candidate.living_area = None;
        candidate.bedrooms = None;
        candidate.lot_acres = None;
        candidate.context.age = None;
        candidate.context.has_garage = None;
        candidate.context.has_basement = None;
        candidate.context.quality_score = None;
        candidate.context.condition_score = None;
        candidate.bathrooms = Some(2.75);
        let config = ScoringConfig::default();
        let expected = (-(0.75_f64) / 0.75).exp();
        let score = physical_score(&subject, &candidate, &config);
        assert!((score - expected).abs() < 1e-12);
    }

    #[test]
    fn physical_with_no_shared_features_is_zero() {
        let subject = base("S");
        let mut candidate = base("C");
        candidate.living_area = None;
        candidate.bedrooms = None;
        candidate.bathrooms = None;
        candidate.lot_acres = None;
        candidate.context = ParcelContext::default();
        let config = ScoringConfig::default();
        assert_eq!(physical_score(&subject, &candidate, &config), 0.0);
    }

    #[test]
    fn difference_flags_use_alert_thresholds() {
        let subject = base("S");
        let mut candidate = base("C");
        candidate.living_area = Some(1820.0); // delta 180 >= 150
        candidate.bedrooms = Some(3.0); // delta 0
        candidate.garage_sqft = None; // pair incomparable, no entry
        let config = ScoringConfig::default();
        let flags = difference_flags(&subject, &candidate, &config);
        assert_eq!(flags.get("living_area"), Some(&true));
        assert_eq!(flags.get("bedrooms"), Some(&false));
        assert!(!flags.contains_key("garage_sqft"));
    }
}
