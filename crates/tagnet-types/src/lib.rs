//! Platform-agnostic types for tagnet tag telemetry.
//!
//! This crate provides shared types used by the storage engine and any
//! transport or shell layered on top of it.
//!
//! # Features
//!
//! - [`RecordKind`] categories for incoming telemetry messages
//! - Tolerant typed-field extraction from raw JSON payloads
//! - Error types for message parsing
//!
//! # Example
//!
//! ```
//! use tagnet_types::{ExtractedFields, RecordKind};
//!
//! let payload = serde_json::json!({ "percentage": 15, "rssi": -60 });
//! let fields = ExtractedFields::from_payload(&payload);
//! assert_eq!(fields.battery_percentage, Some(15));
//! assert_eq!(fields.rssi, Some(-60));
//! assert_eq!("battery".parse::<RecordKind>().unwrap(), RecordKind::Battery);
//! ```

pub mod error;
pub mod kind;
pub mod payload;

pub use error::{ParseError, ParseResult};
pub use kind::RecordKind;
pub use payload::ExtractedFields;
