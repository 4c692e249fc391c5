use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for assessor parcels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParcelId(pub String);

impl ParcelId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ParcelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// WGS84 point; the core never geocodes, it only carries coordinates through.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Neighborhood/segment context attached to a parcel at load time.
///
/// All fields are optional: candidate records frequently arrive with partial
/// context, and every consumer treats an absent field as "unknown" rather than
/// as a default value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParcelContext {
    pub neighborhood_code: Option<String>,
    pub city_district: Option<String>,
    pub market_segment: Option<String>,
    pub land_use_code: Option<String>,
    pub roll_year: Option<i32>,
    pub quality_score: Option<f64>,
    pub condition_score: Option<f64>,
    pub has_garage: Option<bool>,
    pub has_basement: Option<bool>,
    pub is_view: Option<bool>,
    pub age: Option<f64>,
}

/// One property (subject or candidate) frozen at computation time.
///
/// Built fresh per request from the property record store, immutable once
/// constructed, never persisted by this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySnapshot {
    pub parcel_id: ParcelId,
    pub address: String,
    pub sale_price: Option<f64>,
    pub sale_date: Option<NaiveDate>,
    pub property_type: Option<String>,
    pub living_area: Option<f64>,
    pub lot_acres: Option<f64>,
    pub bedrooms: Option<f64>,
    pub bathrooms: Option<f64>,
    pub year_built: Option<i32>,
    pub effective_year_built: Option<i32>,
    pub garage_sqft: Option<f64>,
    pub assessed_value: Option<f64>,
    pub location: Option<GeoPoint>,
    pub context: ParcelContext,
}

/// Axis-aligned bounding box in lon/lat order (minx, miny, maxx, maxy).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn contains(&self, point: GeoPoint) -> bool {
        point.lon >= self.min_lon
            && point.lon <= self.max_lon
            && point.lat >= self.min_lat
            && point.lat <= self.max_lat
    }

    /// Parses a "minx,miny,maxx,maxy" string; malformed input yields None.
    pub fn parse(value: &str) -> Option<Self> {
        let coords: Vec<f64> = value
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .ok()?;
        if coords.len() != 4 {
            return None;
        }
        Some(Self {
            min_lon: coords[0],
            min_lat: coords[1],
            max_lon: coords[2],
            max_lat: coords[3],
        })
    }
}

/// Caller-supplied constraints; every populated field is AND-combined.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CmaFilters {
    pub sale_date_min: Option<NaiveDate>,
    pub sale_date_max: Option<NaiveDate>,
    pub property_type: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub bbox: Option<BoundingBox>,
}

impl CmaFilters {
    /// True when the candidate satisfies every populated constraint.
    pub fn matches(&self, candidate: &PropertySnapshot) -> bool {
        if let Some(required) = &self.property_type {
            match &candidate.property_type {
                Some(actual) if actual.eq_ignore_ascii_case(required) => {}
                _ => return false,
            }
        }
        if let Some(min) = self.sale_date_min {
            match candidate.sale_date {
                Some(date) if date >= min => {}
                _ => return false,
            }
        }
        if let Some(max) = self.sale_date_max {
            match candidate.sale_date {
                Some(date) if date <= max => {}
                _ => return false,
            }
        }
        if let Some(min) = self.min_price {
            match candidate.sale_price {
                Some(price) if price >= min => {}
                _ => return false,
            }
        }
        if let Some(max) = self.max_price {
            match candidate.sale_price {
                Some(price) if price <= max => {}
                _ => return false,
            }
        }
        if let Some(min_beds) = self.bedrooms {
            match candidate.bedrooms {
                Some(beds) if beds >= f64::from(min_beds) => {}
                _ => return false,
            }
        }
        if let Some(min_baths) = self.bathrooms {
            match candidate.bathrooms {
                Some(baths) if baths >= f64::from(min_baths) => {}
                _ => return false,
            }
        }
        if let Some(bbox) = self.bbox {
            match candidate.location {
                Some(point) if bbox.contains(point) => {}
                _ => return false,
            }
        }
        true
    }

    /// Lenient construction from a loosely-typed JSON payload: unparsable
    /// fields degrade to None, a non-object payload yields default filters.
    pub fn from_value(payload: &serde_json::Value) -> Self {
        let Some(map) = payload.as_object() else {
            return Self::default();
        };

        let date = |key: &str| {
            map.get(key)
                .and_then(|v| v.as_str())
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        };
        let number = |key: &str| {
            map.get(key).and_then(|v| match v {
                serde_json::Value::Number(n) => n.as_f64(),
                serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            })
        };

        Self {
            sale_date_min: date("sale_date_min"),
            sale_date_max: date("sale_date_max"),
            property_type: map
                .get("property_type")
                .and_then(|v| v.as_str())
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string),
            min_price: number("min_price"),
            max_price: number("max_price"),
            bedrooms: number("bedrooms").map(|n| n as u32),
            bathrooms: number("bathrooms").map(|n| n as u32),
            bbox: map
                .get("bbox")
                .and_then(|v| v.as_str())
                .and_then(BoundingBox::parse),
        }
    }
}

/// Weight applied to the location sub-score in the composite.
pub const LOCATION_WEIGHT: f64 = 0.40;
/// Weight applied to the recency sub-score in the composite.
pub const TIME_WEIGHT: f64 = 0.30;
/// Weight applied to the physical sub-score in the composite.
pub const PHYSICAL_WEIGHT: f64 = 0.30;

/// Location/time/physical sub-scores plus their weighted composite.
///
/// All four values lie in [0, 1]; the constructor clamps each sub-score before
/// combining, so the invariant holds for any inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparableScore {
    location: f64,
    time: f64,
    physical: f64,
    total: f64,
}

impl ComparableScore {
    pub fn new(location: f64, time: f64, physical: f64) -> Self {
        let location = location.clamp(0.0, 1.0);
        let time = time.clamp(0.0, 1.0);
        let physical = physical.clamp(0.0, 1.0);
        let total = LOCATION_WEIGHT * location + TIME_WEIGHT * time + PHYSICAL_WEIGHT * physical;
        Self {
            location,
            time,
            physical,
            total,
        }
    }

    pub fn location(&self) -> f64 {
        self.location
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn physical(&self) -> f64 {
        self.physical
    }

    pub fn total(&self) -> f64 {
        self.total
    }
}

pub const METERS_PER_MILE: f64 = 1609.344;

/// One scored comparable wrapped with its sale evidence and rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparableResult {
    pub snapshot: PropertySnapshot,
    pub sale_price: f64,
    pub sale_date: Option<NaiveDate>,
    pub assessed_value: Option<f64>,
    pub distance_meters: Option<f64>,
    pub distance_miles: Option<f64>,
    /// Informational "notable difference" alerts; never consulted by scoring.
    pub difference_flags: BTreeMap<String, bool>,
    /// 1-based rank, dense and consistent with the current sort order.
    pub inclusion_rank: u32,
    pub score: ComparableScore,
}

/// Summary statistics over the comparable sale prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesSummary {
    pub count: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub low: Option<f64>,
    pub high: Option<f64>,
}

/// Subject + ordered comparables + the parameters that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputationResult {
    pub subject: PropertySnapshot,
    pub comparables: Vec<ComparableResult>,
    pub filters: CmaFilters,
    pub sort: crate::valuation::ranking::SortSpec,
}

impl ComputationResult {
    /// Count/mean/median/low/high of comparable sale prices. The median of an
    /// even-count set is the mean of the two middle values.
    pub fn summary(&self) -> SalesSummary {
        let mut prices: Vec<f64> = self.comparables.iter().map(|comp| comp.sale_price).collect();
        if prices.is_empty() {
            return SalesSummary {
                count: 0,
                mean: None,
                median: None,
                low: None,
                high: None,
            };
        }
        prices.sort_by(f64::total_cmp);

        let count = prices.len();
        let mean = prices.iter().sum::<f64>() / count as f64;
        let median = if count % 2 == 1 {
            prices[count / 2]
        } else {
            (prices[count / 2 - 1] + prices[count / 2]) / 2.0
        };

        SalesSummary {
            count,
            mean: Some(round_currency(mean)),
            median: Some(round_currency(median)),
            low: prices.first().copied(),
            high: prices.last().copied(),
        }
    }
}

/// Rounds to 2 decimal places, half away from zero. Applied at output
/// boundaries only; internal arithmetic stays full precision.
pub fn round_currency(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
