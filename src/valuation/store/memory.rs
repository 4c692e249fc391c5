//! In-memory store implementations backing tests, demos, and small imports.
//!
//! The property store applies the same constraints the production spatial
//! query does (radius, recency, land-use match, roll-year de-duplication) so
//! the retriever behaves identically against either backend. The coefficient
//! store can be populated directly or from the CSV export of the offline
//! regression job.

use std::collections::HashMap;
use std::io::Read;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Deserialize;

use super::{
    CandidateQuery, CandidateRecord, CoefficientRow, CoefficientStore, PropertyRecordStore, RunId,
    SearchTier, StoreError,
};
use crate::valuation::domain::{GeoPoint, ParcelId, PropertySnapshot};

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance between two points, in meters.
pub fn haversine_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}

/// Property record store over an owned vector of snapshots.
#[derive(Debug, Default)]
pub struct InMemoryPropertyStore {
    rows: Vec<PropertySnapshot>,
}

impl InMemoryPropertyStore {
    pub fn new(rows: Vec<PropertySnapshot>) -> Self {
        Self { rows }
    }

    pub fn insert(&mut self, snapshot: PropertySnapshot) {
        self.rows.push(snapshot);
    }

    fn tier_matches(query: &CandidateQuery<'_>, candidate: &PropertySnapshot) -> bool {
        let subject = &query.subject.context;
        let ctx = &candidate.context;
        match query.tier {
            SearchTier::Neighborhood => match (&subject.neighborhood_code, &ctx.neighborhood_code)
            {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
            SearchTier::CityDistrict => match (&subject.city_district, &ctx.city_district) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
            SearchTier::Any => true,
        }
    }
}

impl PropertyRecordStore for InMemoryPropertyStore {
    fn fetch_parcel(&self, id: &ParcelId) -> Result<Option<PropertySnapshot>, StoreError> {
        // Most recent assessment roll wins when a parcel appears on several.
        let found = self
            .rows
            .iter()
            .filter(|row| &row.parcel_id == id)
            .max_by_key(|row| row.context.roll_year.unwrap_or(i32::MIN));
        Ok(found.cloned())
    }

    fn find_candidates(
        &self,
        query: &CandidateQuery<'_>,
    ) -> Result<Vec<CandidateRecord>, StoreError> {
        let Some(origin) = query.subject.location else {
            return Ok(Vec::new());
        };
        let sale_floor = query.as_of - Duration::days(query.max_sale_age_days);

        let mut best: HashMap<ParcelId, (i32, CandidateRecord)> = HashMap::new();
        for row in &self.rows {
            if row.parcel_id == query.subject.parcel_id
                || query.excluded.contains(&row.parcel_id)
            {
                continue;
            }
            let Some(point) = row.location else { continue };
            match (&query.subject.property_type, &row.property_type) {
                (Some(expected), Some(actual)) if actual.eq_ignore_ascii_case(expected) => {}
                (None, _) => {}
                _ => continue,
            }
            if let Some(land_use) = &query.subject.context.land_use_code {
                if row.context.land_use_code.as_deref() != Some(land_use.as_str()) {
                    continue;
                }
            }
            let (Some(price), Some(sale_date)) = (row.sale_price, row.sale_date) else {
                continue;
            };
            if price <= 0.0 || sale_date < sale_floor || sale_date > query.as_of {
                continue;
            }
            if !Self::tier_matches(query, row) {
                continue;
            }
            let distance = haversine_meters(origin, point);
            if distance > query.radius_meters {
                continue;
            }

            let roll = row.context.roll_year.unwrap_or(i32::MIN);
            let record = CandidateRecord {
                snapshot: row.clone(),
                distance_meters: distance,
            };
            match best.get(&row.parcel_id) {
                Some((existing_roll, _)) if *existing_roll >= roll => {}
                _ => {
                    best.insert(row.parcel_id.clone(), (roll, record));
                }
            }
        }

        let mut records: Vec<CandidateRecord> =
            best.into_values().map(|(_, record)| record).collect();
        records.sort_by(|a, b| {
            a.distance_meters
                .total_cmp(&b.distance_meters)
                .then_with(|| a.snapshot.parcel_id.cmp(&b.snapshot.parcel_id))
        });
        records.truncate(query.limit);
        Ok(records)
    }
}

/// Coefficient store over an owned vector of rows.
#[derive(Debug, Default)]
pub struct InMemoryCoefficientStore {
    rows: Vec<CoefficientRow>,
}

impl InMemoryCoefficientStore {
    pub fn new(rows: Vec<CoefficientRow>) -> Self {
        Self { rows }
    }

    pub fn insert(&mut self, row: CoefficientRow) {
        self.rows.push(row);
    }

    /// Loads rows from the regression job's CSV export. Expected header:
    /// `market_segment,term,beta,standard_error,run_id,created_at` where
    /// `standard_error` may be blank and `created_at` is RFC3339 or
    /// `YYYY-MM-DD`.
    pub fn from_csv<R: Read>(reader: R) -> Result<Self, StoreError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut rows = Vec::new();

        for record in csv_reader.deserialize::<CoefficientCsvRow>() {
            let row = record.map_err(|err| StoreError::Malformed(err.to_string()))?;
            let created_at = parse_created_at(&row.created_at).ok_or_else(|| {
                StoreError::Malformed(format!("unparsable created_at '{}'", row.created_at))
            })?;
            rows.push(CoefficientRow {
                market_segment: row.market_segment,
                term: row.term,
                beta: row.beta,
                standard_error: row.standard_error,
                run_id: RunId(row.run_id),
                created_at,
            });
        }

        Ok(Self { rows })
    }
}

impl CoefficientStore for InMemoryCoefficientStore {
    fn latest_run(&self, market_segment: &str) -> Result<Option<RunId>, StoreError> {
        let latest = self
            .rows
            .iter()
            .filter(|row| row.market_segment == market_segment)
            .max_by_key(|row| row.created_at)
            .map(|row| row.run_id.clone());
        Ok(latest)
    }

    fn coefficients(
        &self,
        market_segment: &str,
        run_id: &RunId,
    ) -> Result<Vec<CoefficientRow>, StoreError> {
        Ok(self
            .rows
            .iter()
            .filter(|row| row.market_segment == market_segment && &row.run_id == run_id)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct CoefficientCsvRow {
    market_segment: String,
    term: String,
    beta: f64,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    standard_error: Option<f64>,
    run_id: String,
    created_at: String,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

fn parse_created_at(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    None
}
