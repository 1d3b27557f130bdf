//! Record kind for tag telemetry messages.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Category of a telemetry record.
///
/// Every message delivered by the feed carries exactly one of these kinds.
/// `Sensor`, `Battery` and `Position` records belong to a tag (keyed by its
/// hardware address); `Environment` records are site-wide and have no owning
/// tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Periodic sensor reading (temperature, weight, signal strength).
    Sensor,
    /// Battery level report.
    Battery,
    /// Ranging result against an anchor.
    Position,
    /// Site-wide environment reading, not owned by any tag.
    Environment,
}

impl RecordKind {
    /// Stable lowercase name, matching the wire representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Sensor => "sensor",
            RecordKind::Battery => "battery",
            RecordKind::Position => "position",
            RecordKind::Environment => "environment",
        }
    }

    /// All kinds, in declaration order.
    #[must_use]
    pub fn all() -> [RecordKind; 4] {
        [
            RecordKind::Sensor,
            RecordKind::Battery,
            RecordKind::Position,
            RecordKind::Environment,
        ]
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = ParseError;

    /// Parse a kind from its wire name (case-insensitive).
    ///
    /// # Examples
    ///
    /// ```
    /// use tagnet_types::RecordKind;
    ///
    /// assert_eq!("sensor".parse::<RecordKind>().unwrap(), RecordKind::Sensor);
    /// assert_eq!("Battery".parse::<RecordKind>().unwrap(), RecordKind::Battery);
    /// assert!("co2".parse::<RecordKind>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sensor" => Ok(RecordKind::Sensor),
            "battery" => Ok(RecordKind::Battery),
            "position" => Ok(RecordKind::Position),
            "environment" => Ok(RecordKind::Environment),
            _ => Err(ParseError::UnknownKind(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_str_round_trips() {
        for kind in RecordKind::all() {
            assert_eq!(kind.as_str().parse::<RecordKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(
            "POSITION".parse::<RecordKind>().unwrap(),
            RecordKind::Position
        );
        assert_eq!(
            "Environment".parse::<RecordKind>().unwrap(),
            RecordKind::Environment
        );
    }

    #[test]
    fn test_parse_unknown_kind() {
        let err = "humidity".parse::<RecordKind>().unwrap_err();
        assert!(err.to_string().contains("humidity"));
    }

    #[test]
    fn test_serde_uses_wire_names() {
        assert_eq!(
            serde_json::to_string(&RecordKind::Battery).unwrap(),
            "\"battery\""
        );
        let kind: RecordKind = serde_json::from_str("\"position\"").unwrap();
        assert_eq!(kind, RecordKind::Position);
    }

    #[test]
    fn test_display_matches_as_str() {
        assert_eq!(RecordKind::Sensor.to_string(), "sensor");
        assert_eq!(RecordKind::Environment.to_string(), "environment");
    }
}
