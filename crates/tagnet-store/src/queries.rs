//! Query builder for stored records.
//!
//! [`RecordQuery`] follows the builder pattern for ergonomic query
//! construction. Results are always ordered by `timestamp` descending
//! (newest first); time bounds are inclusive.
//!
//! # Example
//!
//! ```
//! use tagnet_store::{RecordQuery, Store};
//! use tagnet_types::RecordKind;
//! use time::{Duration, OffsetDateTime};
//!
//! let store = Store::open_in_memory()?;
//! let yesterday = OffsetDateTime::now_utc() - Duration::hours(24);
//!
//! let query = RecordQuery::new()
//!     .kind(RecordKind::Sensor)
//!     .since(yesterday)
//!     .limit(50);
//!
//! let records = store.query("AA:BB:CC:DD:EE:FF", &query)?;
//! # Ok::<(), tagnet_store::Error>(())
//! ```

use time::OffsetDateTime;

use tagnet_types::RecordKind;

/// Default result cap for a per-tag query.
pub(crate) const DEFAULT_QUERY_LIMIT: u32 = 100;

/// Default result cap for a cross-table query.
pub(crate) const DEFAULT_QUERY_ALL_LIMIT: u32 = 1000;

/// Fluent query builder for stored records.
///
/// All filter methods are optional and can be chained in any order.
/// When no limit is set, [`Store::query`](crate::Store::query) caps results
/// at 100 and [`Store::query_all`](crate::Store::query_all) at 1000.
#[derive(Debug, Default, Clone)]
pub struct RecordQuery {
    /// Filter by record kind (exact match).
    pub kind: Option<RecordKind>,
    /// Include only records at or after this time.
    pub since: Option<OffsetDateTime>,
    /// Include only records at or before this time.
    pub until: Option<OffsetDateTime>,
    /// Maximum number of results.
    pub limit: Option<u32>,
}

impl RecordQuery {
    /// Create a new query with no filters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict results to one kind.
    pub fn kind(mut self, kind: RecordKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Filter to records with a timestamp at or after this time.
    pub fn since(mut self, time: OffsetDateTime) -> Self {
        self.since = Some(time);
        self
    }

    /// Filter to records with a timestamp at or before this time.
    pub fn until(mut self, time: OffsetDateTime) -> Self {
        self.until = Some(time);
        self
    }

    /// Limit the maximum number of results returned.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Build the SQL WHERE clause and parameters.
    pub(crate) fn build_where(&self) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(kind) = self.kind {
            conditions.push("kind = ?");
            params.push(Box::new(kind.as_str()));
        }

        if let Some(since) = self.since {
            conditions.push("timestamp >= ?");
            params.push(Box::new(since.unix_timestamp()));
        }

        if let Some(until) = self.until {
            conditions.push("timestamp <= ?");
            params.push(Box::new(until.unix_timestamp()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    /// Effective limit given a per-operation default.
    pub(crate) fn effective_limit(&self, default: u32) -> u32 {
        self.limit.unwrap_or(default)
    }
}
