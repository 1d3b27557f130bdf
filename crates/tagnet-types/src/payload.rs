//! Typed-field extraction from raw telemetry payloads.
//!
//! The feed is loose about field names: battery level may arrive as
//! `percentage`, `batteryPercentage` or `battery`, temperature as
//! `temperature` or `temp`, and so on. Extraction tries each known spelling
//! in order and maps a missing field to `None`, never to zero or an empty
//! string, so that legitimate zero readings (e.g. `distance: 0`) stay
//! distinguishable from absent ones.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Typed fields pulled out of a raw payload.
///
/// These are a derived index over the payload; the verbatim payload itself
/// remains the recoverable source of truth in storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFields {
    /// Signal strength in dBm.
    pub rssi: Option<i64>,
    /// Temperature in Celsius.
    pub temperature: Option<f64>,
    /// Battery charge, 0-100. Out-of-range values are dropped.
    pub battery_percentage: Option<u8>,
    /// Measured distance to an anchor, in meters.
    pub distance: Option<f64>,
    /// Measured weight, in kilograms.
    pub weight: Option<f64>,
    /// Reading timestamp as unix seconds, if the payload carries one.
    pub timestamp: Option<i64>,
}

impl ExtractedFields {
    /// Extract every recognized field from a payload.
    ///
    /// Fields the payload does not carry come back as `None`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagnet_types::ExtractedFields;
    ///
    /// let payload = serde_json::json!({ "temp": 21.5, "distance": 0.0 });
    /// let fields = ExtractedFields::from_payload(&payload);
    /// assert_eq!(fields.temperature, Some(21.5));
    /// assert_eq!(fields.distance, Some(0.0));
    /// assert_eq!(fields.rssi, None);
    /// ```
    #[must_use]
    pub fn from_payload(payload: &Value) -> Self {
        Self {
            rssi: int_field(payload, &["rssi"]),
            temperature: float_field(payload, &["temperature", "temp"]),
            battery_percentage: int_field(payload, &["percentage", "batteryPercentage", "battery"])
                .and_then(|v| u8::try_from(v).ok())
                .filter(|v| *v <= 100),
            distance: float_field(payload, &["distance", "dist"]),
            weight: float_field(payload, &["weight"]),
            timestamp: int_field(payload, &["timestamp", "time"]),
        }
    }
}

/// Look up the first present field among `names` as an integer.
fn int_field(payload: &Value, names: &[&str]) -> Option<i64> {
    names.iter().find_map(|n| payload.get(n)).and_then(Value::as_i64)
}

/// Look up the first present field among `names` as a float.
///
/// Integer JSON values are accepted too (`"temp": 21` reads as 21.0).
fn float_field(payload: &Value, names: &[&str]) -> Option<f64> {
    names.iter().find_map(|n| payload.get(n)).and_then(Value::as_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_all_fields_present() {
        let payload = json!({
            "rssi": -72,
            "temperature": 36.4,
            "percentage": 88,
            "distance": 4.25,
            "weight": 512.0,
            "timestamp": 1700000000,
        });

        let fields = ExtractedFields::from_payload(&payload);
        assert_eq!(fields.rssi, Some(-72));
        assert_eq!(fields.temperature, Some(36.4));
        assert_eq!(fields.battery_percentage, Some(88));
        assert_eq!(fields.distance, Some(4.25));
        assert_eq!(fields.weight, Some(512.0));
        assert_eq!(fields.timestamp, Some(1_700_000_000));
    }

    #[test]
    fn test_extract_empty_payload() {
        let fields = ExtractedFields::from_payload(&json!({}));
        assert_eq!(fields, ExtractedFields::default());
    }

    #[test]
    fn test_battery_fallback_names() {
        for name in ["percentage", "batteryPercentage", "battery"] {
            let fields = ExtractedFields::from_payload(&json!({ name: 15 }));
            assert_eq!(fields.battery_percentage, Some(15), "field {name}");
        }
    }

    #[test]
    fn test_battery_fallback_prefers_first_spelling() {
        let fields = ExtractedFields::from_payload(&json!({
            "percentage": 40,
            "battery": 90,
        }));
        assert_eq!(fields.battery_percentage, Some(40));
    }

    #[test]
    fn test_battery_out_of_range_is_dropped() {
        let fields = ExtractedFields::from_payload(&json!({ "percentage": 150 }));
        assert_eq!(fields.battery_percentage, None);

        let fields = ExtractedFields::from_payload(&json!({ "percentage": -5 }));
        assert_eq!(fields.battery_percentage, None);
    }

    #[test]
    fn test_temperature_short_form() {
        let fields = ExtractedFields::from_payload(&json!({ "temp": 19 }));
        assert_eq!(fields.temperature, Some(19.0));
    }

    #[test]
    fn test_zero_distance_is_present_not_absent() {
        let fields = ExtractedFields::from_payload(&json!({ "distance": 0 }));
        assert_eq!(fields.distance, Some(0.0));
    }

    #[test]
    fn test_non_numeric_field_is_absent() {
        let fields = ExtractedFields::from_payload(&json!({ "temperature": "warm" }));
        assert_eq!(fields.temperature, None);
    }
}
