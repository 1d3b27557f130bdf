//! Data models for stored telemetry.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use tagnet_types::RecordKind;

/// One persisted telemetry record.
///
/// The typed fields are a derived index over `raw_payload`, which holds the
/// original payload verbatim for lossless replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Database row ID.
    pub id: i64,
    /// Record category.
    pub kind: RecordKind,
    /// Owning tag key. `None` for environment records.
    pub key: Option<String>,
    /// Reading timestamp (payload-supplied, or write time).
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Signal strength in dBm.
    pub rssi: Option<i64>,
    /// Temperature in Celsius.
    pub temperature: Option<f64>,
    /// Battery charge, 0-100.
    pub battery_percentage: Option<u8>,
    /// Anchor address for ranging records.
    pub peer_key: Option<String>,
    /// Distance to the anchor, in meters.
    pub distance: Option<f64>,
    /// Weight, in kilograms.
    pub weight: Option<f64>,
    /// The original payload, verbatim.
    pub raw_payload: Value,
    /// Insertion time, immutable.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Cached bookkeeping for one record table.
///
/// Exists if and only if the table exists; refreshed on every write and
/// cleanup that touches the table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMetadata {
    /// Sanitized table name.
    pub table_name: String,
    /// Owning tag key. `None` for the shared environment table.
    pub key: Option<String>,
    /// Cached row count.
    pub row_count: u64,
    /// Kinds ever stored in this table.
    pub kinds_seen: BTreeSet<RecordKind>,
    /// When the table was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the table was last written to or cleaned up.
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated_at: OffsetDateTime,
}

/// Live aggregate for one table, computed by scanning it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableStats {
    /// Owning tag key.
    pub key: String,
    /// Number of live rows.
    pub row_count: u64,
    /// Number of distinct kinds present.
    pub kind_count: u64,
    /// Earliest reading timestamp, if any rows exist.
    #[serde(with = "time::serde::rfc3339::option")]
    pub earliest: Option<OffsetDateTime>,
    /// Latest reading timestamp, if any rows exist.
    #[serde(with = "time::serde::rfc3339::option")]
    pub latest: Option<OffsetDateTime>,
}

/// Filters for an export run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Export a single tag's table. When unset, every known table.
    pub key: Option<String>,
    /// Restrict to one kind.
    pub kind: Option<RecordKind>,
    /// Include only records at or after this time.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub since: Option<OffsetDateTime>,
    /// Include only records at or before this time.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub until: Option<OffsetDateTime>,
}

/// The single structured document written by a JSON export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDocument {
    /// When the export ran.
    #[serde(with = "time::serde::rfc3339")]
    pub exported_at: OffsetDateTime,
    /// The filters the export ran with.
    pub options: ExportOptions,
    /// Number of records in `records`.
    pub record_count: usize,
    /// The exported records, newest first.
    pub records: Vec<StoredRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stored_record_serialization_round_trip() {
        let record = StoredRecord {
            id: 7,
            kind: RecordKind::Position,
            key: Some("aa:bb:cc:dd:ee:ff".to_string()),
            timestamp: OffsetDateTime::UNIX_EPOCH,
            rssi: Some(-70),
            temperature: None,
            battery_percentage: None,
            peer_key: Some("11:22:33:44:55:66".to_string()),
            distance: Some(0.0),
            weight: None,
            raw_payload: json!({ "distance": 0.0 }),
            created_at: OffsetDateTime::UNIX_EPOCH,
        };

        let text = serde_json::to_string(&record).unwrap();
        let back: StoredRecord = serde_json::from_str(&text).unwrap();

        assert_eq!(back.kind, RecordKind::Position);
        assert_eq!(back.distance, Some(0.0));
        assert_eq!(back.raw_payload, record.raw_payload);
    }

    #[test]
    fn test_export_options_default_is_unfiltered() {
        let options = ExportOptions::default();
        assert!(options.key.is_none());
        assert!(options.kind.is_none());
        assert!(options.since.is_none());
        assert!(options.until.is_none());
    }
}
