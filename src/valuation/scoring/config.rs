use serde::{Deserialize, Serialize};

/// Tuning constants for the similarity model.
///
/// Immutable once constructed; tests override individual fields through
/// struct-update syntax instead of mutating shared state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Location score used when distance to the subject is unknown.
    pub neutral_location_score: f64,
    /// Bonus when subject and candidate share a neighborhood code.
    pub same_neighborhood_bonus: f64,
    /// Bonus when they share a city district (applied only without the
    /// neighborhood bonus).
    pub same_district_bonus: f64,

    pub living_area_weight: f64,
    /// Decay scale = max(fraction of subject area, floor sqft).
    pub living_area_scale_fraction: f64,
    pub living_area_scale_floor: f64,

    pub bathroom_weight: f64,
    pub bathroom_scale: f64,

    pub bedroom_weight: f64,
    pub bedroom_scale: f64,

    pub lot_weight: f64,
    /// Decay scale = max(fraction of subject lot, floor acres).
    pub lot_scale_fraction: f64,
    pub lot_scale_floor: f64,

    pub age_weight: f64,
    pub age_scale: f64,

    pub garage_weight: f64,
    pub garage_mismatch_score: f64,

    pub basement_weight: f64,
    pub basement_mismatch_score: f64,

    pub quality_weight: f64,
    pub quality_mismatch_score: f64,

    pub condition_weight: f64,
    pub condition_mismatch_score: f64,

    /// Attribute deltas at or above these thresholds raise an informational
    /// difference flag on the comparable.
    pub difference_alerts: DifferenceAlerts,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            neutral_location_score: 0.8,
            same_neighborhood_bonus: 0.2,
            same_district_bonus: 0.05,

            living_area_weight: 0.25,
            living_area_scale_fraction: 0.20,
            living_area_scale_floor: 300.0,

            bathroom_weight: 0.15,
            bathroom_scale: 0.75,

            bedroom_weight: 0.10,
            bedroom_scale: 1.0,

            lot_weight: 0.15,
            lot_scale_fraction: 0.25,
            lot_scale_floor: 0.1,

            age_weight: 0.10,
            age_scale: 10.0,

            garage_weight: 0.05,
            garage_mismatch_score: 0.5,

            basement_weight: 0.05,
            basement_mismatch_score: 0.6,

            quality_weight: 0.075,
            quality_mismatch_score: 0.6,

            condition_weight: 0.075,
            condition_mismatch_score: 0.6,

            difference_alerts: DifferenceAlerts::default(),
        }
    }
}

/// Thresholds for the "notable difference" flags (informational only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifferenceAlerts {
    pub living_area_sqft: f64,
    pub bedrooms: f64,
    pub bathrooms: f64,
    pub garage_sqft: f64,
    pub lot_acres: f64,
    pub year_built: f64,
}

impl Default for DifferenceAlerts {
    fn default() -> Self {
        Self {
            living_area_sqft: 150.0,
            bedrooms: 1.0,
            bathrooms: 1.0,
            garage_sqft: 50.0,
            lot_acres: 0.1,
            year_built: 10.0,
        }
    }
}
