//! Typed feature boundary for the adjustment engine.
//!
//! Raw subject/comparable records arrive as loosely-typed JSON. They are
//! coerced once, at this boundary, into a [`FeaturePayload`] with documented
//! rules; the engine itself never touches untyped data.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::valuation::domain::PropertySnapshot;

/// Typed raw-feature record for one property.
///
/// Coercion rules applied by [`FeaturePayload::from_value`]:
/// - numeric strings coerce to numbers; blank, `"null"`, and JSON null
///   coerce to absent
/// - booleans coerce to 1/0 for indicator fields; numeric indicators are 1
///   when >= 1, else 0
/// - dates accept `YYYY-MM-DD` or RFC3339 datetimes
/// - a sale price that fails to coerce is treated as absent (the engine
///   skips such rows by policy rather than failing the computation)
/// - any other recognized field that fails to coerce rejects the payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeaturePayload {
    pub comp_id: Option<String>,
    pub living_area: Option<f64>,
    pub lot_acres: Option<f64>,
    pub age: Option<f64>,
    pub quality_score: Option<f64>,
    pub condition_score: Option<f64>,
    pub has_garage: Option<bool>,
    pub has_basement: Option<bool>,
    pub is_view: Option<bool>,
    pub sale_date: Option<NaiveDate>,
    pub sale_price: Option<f64>,
    pub property_type: Option<String>,
    pub market_segment: Option<String>,
}

/// Rejection raised at the payload boundary.
#[derive(Debug, thiserror::Error)]
pub enum FeaturePayloadError {
    #[error("feature payload must be a JSON object")]
    NotAnObject,
    #[error("field '{field}' has unusable value: {value}")]
    Unusable { field: String, value: String },
}

impl FeaturePayload {
    pub fn from_value(payload: &Value) -> Result<Self, FeaturePayloadError> {
        let Some(map) = payload.as_object() else {
            return Err(FeaturePayloadError::NotAnObject);
        };

        let first = |keys: &[&str]| keys.iter().find_map(|key| map.get(*key)).cloned();

        Ok(Self {
            comp_id: first(&["comp_id", "parcel_number", "id"])
                .as_ref()
                .and_then(coerce_string),
            living_area: coerce_number(map, &["living_area", "gla", "GLA"])?,
            lot_acres: coerce_number(map, &["lot_acres"])?,
            age: coerce_number(map, &["age"])?,
            quality_score: coerce_number(map, &["quality_score"])?,
            condition_score: coerce_number(map, &["condition_score"])?,
            has_garage: coerce_flag(map, "has_garage")?,
            has_basement: coerce_flag(map, "has_basement")?,
            is_view: coerce_flag(map, "is_view")?,
            sale_date: coerce_date(map, &["sale_date", "effective_date"])?,
            // Unparsable prices degrade to None by policy; the engine skips
            // the row instead of failing the whole computation.
            sale_price: first(&["sale_price"]).as_ref().and_then(lenient_number),
            property_type: first(&["property_type"]).as_ref().and_then(coerce_string),
            market_segment: first(&["market_segment", "valuation_area"])
                .as_ref()
                .and_then(coerce_string),
        })
    }

    /// Builds a payload from a snapshot already normalized by the record
    /// store, so pipeline output can feed the adjustment engine directly.
    pub fn from_snapshot(snapshot: &PropertySnapshot) -> Self {
        Self {
            comp_id: Some(snapshot.parcel_id.0.clone()),
            living_area: snapshot.living_area,
            lot_acres: snapshot.lot_acres,
            age: snapshot.context.age,
            quality_score: snapshot.context.quality_score,
            condition_score: snapshot.context.condition_score,
            has_garage: snapshot.context.has_garage,
            has_basement: snapshot.context.has_basement,
            is_view: snapshot.context.is_view,
            sale_date: snapshot.sale_date,
            sale_price: snapshot.sale_price,
            property_type: snapshot.property_type.clone(),
            market_segment: snapshot.context.market_segment.clone(),
        }
    }
}

/// Normalized numeric features with their log transforms, derived on the fly
/// for one property; never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FeatureSnapshot {
    pub gla: Option<f64>,
    pub log_area: Option<f64>,
    pub lot_acres: Option<f64>,
    pub log_lot: Option<f64>,
    pub age: Option<f64>,
    pub log_age: Option<f64>,
    pub quality_score: Option<f64>,
    pub condition_score: Option<f64>,
    pub has_garage: Option<f64>,
    pub has_basement: Option<f64>,
    pub is_view: Option<f64>,
    pub sale_date: Option<NaiveDate>,
}

impl FeatureSnapshot {
    /// Non-positive living area and negative lot/age are unusable and treated
    /// as absent rather than producing undefined log transforms.
    pub fn from_payload(payload: &FeaturePayload) -> Self {
        let gla = payload.living_area.filter(|v| *v > 0.0);
        let lot_acres = payload.lot_acres.filter(|v| *v >= 0.0);
        let age = payload.age.filter(|v| *v >= 0.0);

        Self {
            gla,
            log_area: gla.map(f64::ln),
            lot_acres,
            log_lot: lot_acres.map(f64::ln_1p),
            age,
            log_age: age.map(f64::ln_1p),
            quality_score: payload.quality_score,
            condition_score: payload.condition_score,
            has_garage: payload.has_garage.map(indicator),
            has_basement: payload.has_basement.map(indicator),
            is_view: payload.is_view.map(indicator),
            sale_date: payload.sale_date,
        }
    }
}

fn indicator(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}

fn blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null")
        }
        _ => false,
    }
}

fn lenient_number(value: &Value) -> Option<f64> {
    if blank(value) {
        return None;
    }
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(indicator(*b)),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn coerce_string(value: &Value) -> Option<String> {
    if blank(value) {
        return None;
    }
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn coerce_number(
    map: &serde_json::Map<String, Value>,
    keys: &[&str],
) -> Result<Option<f64>, FeaturePayloadError> {
    for key in keys {
        let Some(value) = map.get(*key) else { continue };
        if blank(value) {
            continue;
        }
        return lenient_number(value)
            .map(Some)
            .ok_or_else(|| FeaturePayloadError::Unusable {
                field: (*key).to_string(),
                value: value.to_string(),
            });
    }
    Ok(None)
}

fn coerce_flag(
    map: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<Option<bool>, FeaturePayloadError> {
    let Some(value) = map.get(key) else {
        return Ok(None);
    };
    if blank(value) {
        return Ok(None);
    }
    match value {
        Value::Bool(b) => Ok(Some(*b)),
        _ => lenient_number(value)
            .map(|n| Some(n >= 1.0))
            .ok_or_else(|| FeaturePayloadError::Unusable {
                field: key.to_string(),
                value: value.to_string(),
            }),
    }
}

fn coerce_date(
    map: &serde_json::Map<String, Value>,
    keys: &[&str],
) -> Result<Option<NaiveDate>, FeaturePayloadError> {
    for key in keys {
        let Some(value) = map.get(*key) else { continue };
        if blank(value) {
            continue;
        }
        let Value::String(text) = value else {
            return Err(FeaturePayloadError::Unusable {
                field: (*key).to_string(),
                value: value.to_string(),
            });
        };
        let trimmed = text.trim();
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return Ok(Some(date));
        }
        if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Some(dt.date_naive()));
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
            return Ok(Some(dt.date()));
        }
        return Err(FeaturePayloadError::Unusable {
            field: (*key).to_string(),
            value: value.to_string(),
        });
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerces_strings_blanks_and_booleans() {
        let payload = FeaturePayload::from_value(&json!({
            "comp_id": "P4711",
            "living_area": "1850",
            "lot_acres": "",
            "age": null,
            "quality_score": 4,
            "has_garage": true,
            "has_basement": "0",
            "is_view": 2,
            "sale_date": "2024-03-15",
            "sale_price": "not-a-price",
            "market_segment": "ANACORTES",
        }))
        .expect("payload coerces");

        assert_eq!(payload.living_area, Some(1850.0));
        assert_eq!(payload.lot_acres, None);
        assert_eq!(payload.age, None);
        assert_eq!(payload.has_garage, Some(true));
        assert_eq!(payload.has_basement, Some(false));
        assert_eq!(payload.is_view, Some(true));
        assert_eq!(payload.sale_date, NaiveDate::from_ymd_opt(2024, 3, 15));
        // Unparsable sale price degrades to None (row-skip policy).
        assert_eq!(payload.sale_price, None);
        assert_eq!(payload.market_segment.as_deref(), Some("ANACORTES"));
    }

    #[test]
    fn rejects_unrecognized_shapes() {
        assert!(matches!(
            FeaturePayload::from_value(&json!([1, 2, 3])),
            Err(FeaturePayloadError::NotAnObject)
        ));
        assert!(matches!(
            FeaturePayload::from_value(&json!({"living_area": {"sqft": 1800}})),
            Err(FeaturePayloadError::Unusable { .. })
        ));
        assert!(matches!(
            FeaturePayload::from_value(&json!({"sale_date": "15/03/2024"})),
            Err(FeaturePayloadError::Unusable { .. })
        ));
    }

    #[test]
    fn snapshot_derives_log_transforms() {
        let payload = FeaturePayload {
            living_area: Some(2000.0),
            lot_acres: Some(0.25),
            age: Some(30.0),
            ..FeaturePayload::default()
        };
        let features = FeatureSnapshot::from_payload(&payload);
        assert!((features.log_area.unwrap() - 2000f64.ln()).abs() < 1e-12);
        assert!((features.log_lot.unwrap() - 0.25f64.ln_1p()).abs() < 1e-12);
        assert!((features.log_age.unwrap() - 30f64.ln_1p()).abs() < 1e-12);
    }

    #[test]
    fn unusable_magnitudes_become_absent() {
        let payload = FeaturePayload {
            living_area: Some(0.0),
            lot_acres: Some(-1.0),
            age: Some(-4.0),
            ..FeaturePayload::default()
        };
        let features = FeatureSnapshot::from_payload(&payload);
        assert_eq!(features.gla, None);
        assert_eq!(features.log_area, None);
        assert_eq!(features.log_lot, None);
        assert_eq!(features.log_age, None);
    }

    #[test]
    fn zero_lot_and_age_are_usable() {
        let payload = FeaturePayload {
            lot_acres: Some(0.0),
            age: Some(0.0),
            ..FeaturePayload::default()
        };
        let features = FeatureSnapshot::from_payload(&payload);
        assert_eq!(features.log_lot, Some(0.0));
        assert_eq!(features.log_age, Some(0.0));
    }
}
