//! Per-tag persistence for tagnet telemetry.
//!
//! This crate provides SQLite-based storage that lazily creates one table
//! per tag (keyed by its hardware address) plus one shared table for
//! site-wide environment readings, tracking per-table metadata alongside.
//!
//! # Features
//!
//! - Lazy table creation on first write per tag
//! - Typed columns plus the verbatim payload for lossless replay
//! - Filtered per-tag and cross-table queries
//! - Retention cleanup with calendar-day cutoffs
//! - Cached per-table statistics and JSON/CSV export
//!
//! # Example
//!
//! ```no_run
//! use tagnet_store::{RecordQuery, Store};
//! use tagnet_types::RecordKind;
//!
//! let store = Store::open_default()?;
//!
//! let payload = serde_json::json!({ "percentage": 15 });
//! store.store(RecordKind::Battery, "AA:BB:CC:DD:EE:FF", &payload, None, None)?;
//!
//! let query = RecordQuery::new().kind(RecordKind::Battery).limit(10);
//! let records = store.query("AA:BB:CC:DD:EE:FF", &query)?;
//! # Ok::<(), tagnet_store::Error>(())
//! ```

mod config;
mod error;
mod events;
mod ident;
mod models;
mod queries;
mod schema;
mod store;

pub use config::{ConfigError, StoreConfig, ValidationError};
pub use error::{Error, Result};
pub use events::{EventDispatcher, EventReceiver, EventSender, StoreEvent};
pub use ident::{table_name_for, ENVIRONMENT_TABLE};
pub use models::{ExportDocument, ExportOptions, StoredRecord, TableMetadata, TableStats};
pub use queries::RecordQuery;
pub use store::Store;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/tagnet/telemetry.db`
/// - macOS: `~/Library/Application Support/tagnet/telemetry.db`
/// - Windows: `C:\Users\<user>\AppData\Local\tagnet\telemetry.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("tagnet")
        .join("telemetry.db")
}
