mod config;
mod rules;

pub use config::{DifferenceAlerts, ScoringConfig};

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::domain::{ComparableScore, PropertySnapshot};

/// Stateless scorer applying the similarity model to one candidate at a time.
pub struct SimilarityScorer {
    config: ScoringConfig,
}

impl SimilarityScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Scores a candidate against the subject. `radius_meters` is the search
    /// radius the candidate was retrieved under; `valuation_date` anchors the
    /// recency score.
    pub fn score(
        &self,
        subject: &PropertySnapshot,
        candidate: &PropertySnapshot,
        distance_meters: Option<f64>,
        radius_meters: f64,
        valuation_date: NaiveDate,
    ) -> ComparableScore {
        let location = rules::location_score(
            subject,
            candidate,
            distance_meters,
            radius_meters,
            &self.config,
        );
        let time = rules::time_score(candidate.sale_date, Some(valuation_date));
        let physical = rules::physical_score(subject, candidate, &self.config);
        ComparableScore::new(location, time, physical)
    }

    /// Informational difference flags for a scored candidate.
    pub fn difference_flags(
        &self,
        subject: &PropertySnapshot,
        candidate: &PropertySnapshot,
    ) -> BTreeMap<String, bool> {
        rules::difference_flags(subject, candidate, &self.config)
    }
}
