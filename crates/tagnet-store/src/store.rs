//! Main store implementation.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::{Date, Duration, OffsetDateTime};
use tracing::{debug, info, warn};

use tagnet_types::{ExtractedFields, RecordKind};

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::events::{EventDispatcher, EventReceiver, StoreEvent};
use crate::ident::{table_name_for, ENVIRONMENT_TABLE};
use crate::models::{ExportDocument, ExportOptions, StoredRecord, TableMetadata, TableStats};
use crate::queries::{RecordQuery, DEFAULT_QUERY_ALL_LIMIT, DEFAULT_QUERY_LIMIT};
use crate::schema;

/// SQLite-based store with one lazily created table per tag.
///
/// All operations go through a single connection guarded by a mutex, so the
/// store can be shared across threads; "check known, create table, mark
/// known" runs as one critical section, which makes concurrent first writes
/// for the same tag safe.
pub struct Store {
    inner: Mutex<Inner>,
    config: StoreConfig,
    events: EventDispatcher,
}

struct Inner {
    /// `None` after `close()`.
    conn: Option<Connection>,
    /// Table names known to exist, loaded from metadata at open.
    known_tables: HashSet<String>,
}

impl Inner {
    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(Error::NotConnected)
    }

    fn conn_mut(&mut self) -> Result<&mut Connection> {
        self.conn.as_mut().ok_or(Error::NotConnected)
    }
}

impl Store {
    /// Open or create the database described by `config`.
    ///
    /// Creates the containing directory if missing and initializes the
    /// bookkeeping schema. Opening an already-initialized database is a
    /// no-op beyond establishing the connection.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let path = &config.storage_path;

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;

        // WAL mode for better concurrent read performance
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        Self::finish_open(conn, config)
    }

    /// Open the default database location with default options.
    pub fn open_default() -> Result<Self> {
        Self::open(StoreConfig::default())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_with(StoreConfig::default())
    }

    /// Open an in-memory database with explicit options (for testing).
    pub fn open_in_memory_with(config: StoreConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::finish_open(conn, config)
    }

    fn finish_open(conn: Connection, config: StoreConfig) -> Result<Self> {
        schema::initialize(&conn)?;

        // Metadata is the source of truth for which record tables exist
        let known_tables: HashSet<String> = conn
            .prepare("SELECT table_name FROM table_metadata")?
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<HashSet<_>, _>>()?;

        Ok(Self {
            inner: Mutex::new(Inner {
                conn: Some(conn),
                known_tables,
            }),
            config,
            events: EventDispatcher::default(),
        })
    }

    /// Release the connection. Subsequent operations fail with
    /// [`Error::NotConnected`]. Safe to call more than once.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.lock();
        if let Some(conn) = inner.conn.take() {
            drop(conn);
            info!("Store closed");
        }
        Ok(())
    }

    /// Subscribe to store events.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// The configuration this store was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve the table for a write, creating it if allowed and needed.
    ///
    /// Table creation and the metadata insert commit together; a table is
    /// only marked known after both succeed.
    fn ensure_table(&self, inner: &mut Inner, kind: RecordKind, key: &str) -> Result<String> {
        let (table, meta_key) = if kind == RecordKind::Environment {
            (ENVIRONMENT_TABLE.to_string(), None)
        } else {
            (table_name_for(key), Some(key.to_string()))
        };

        if inner.known_tables.contains(&table) {
            return Ok(table);
        }

        if !self.config.auto_create_tables {
            return Err(Error::TableNotFound(
                meta_key.unwrap_or_else(|| ENVIRONMENT_TABLE.to_string()),
            ));
        }

        let conn = inner.conn_mut()?;
        let tx = conn.transaction()?;
        if table == ENVIRONMENT_TABLE {
            schema::create_environment_table(&tx)?;
        } else {
            schema::create_record_table(&tx, &table)?;
        }

        let now = OffsetDateTime::now_utc().unix_timestamp();
        tx.execute(
            "INSERT OR IGNORE INTO table_metadata
             (table_name, tag_key, row_count, kinds_seen, created_at, last_updated_at)
             VALUES (?1, ?2, 0, '[]', ?3, ?3)",
            rusqlite::params![table, meta_key, now],
        )?;
        tx.commit()?;

        inner.known_tables.insert(table.clone());
        info!("Created record table {}", table);
        Ok(table)
    }
}

// Write path
impl Store {
    /// Persist one record.
    ///
    /// The table for `key` is created lazily on first write; environment
    /// records always go to the shared table and `key` is ignored for them.
    /// The row insert and the metadata refresh commit as one transaction.
    /// Returns the new row ID.
    pub fn store(
        &self,
        kind: RecordKind,
        key: &str,
        payload: &Value,
        peer_key: Option<&str>,
        distance: Option<f64>,
    ) -> Result<i64> {
        let mut inner = self.lock();
        let table = self.ensure_table(&mut inner, kind, key)?;

        let fields = ExtractedFields::from_payload(payload);
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let timestamp = fields.timestamp.unwrap_or(now);
        let distance = distance.or(fields.distance);
        let raw = serde_json::to_string(payload)?;

        let result = write_record(
            &mut inner, &table, kind, key, timestamp, &fields, peer_key, distance, &raw, now,
        );

        match result {
            Ok(id) => {
                if self.config.logging_enabled {
                    debug!("Stored {} record {} in {}", kind, id, table);
                }
                self.check_advisory_cap(&inner, &table);
                self.events.send(StoreEvent::Stored {
                    kind,
                    key: (kind != RecordKind::Environment).then(|| key.to_string()),
                });
                Ok(id)
            }
            Err(e) => {
                self.events.send(StoreEvent::Error {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Warn when a table grows past the advisory cap. Nothing is enforced.
    fn check_advisory_cap(&self, inner: &Inner, table: &str) {
        if let Some(cap) = self.config.max_table_size
            && let Ok(conn) = inner.conn()
            && let Ok(count) = conn.query_row(
                "SELECT row_count FROM table_metadata WHERE table_name = ?",
                [table],
                |row| row.get::<_, i64>(0),
            )
            && count as u64 > cap
        {
            warn!("Table {} has {} rows, above advisory cap {}", table, count, cap);
        }
    }
}

/// Insert one row and refresh the table's metadata in one transaction.
#[allow(clippy::too_many_arguments)]
fn write_record(
    inner: &mut Inner,
    table: &str,
    kind: RecordKind,
    key: &str,
    timestamp: i64,
    fields: &ExtractedFields,
    peer_key: Option<&str>,
    distance: Option<f64>,
    raw: &str,
    now: i64,
) -> Result<i64> {
    let write_err = |e: rusqlite::Error| Error::Write {
        kind,
        key: key.to_string(),
        source: e,
    };

    let conn = inner.conn_mut()?;
    let tx = conn.transaction().map_err(write_err)?;

    if table == ENVIRONMENT_TABLE {
        tx.execute(
            &format!(
                "INSERT INTO {ENVIRONMENT_TABLE}
                 (kind, timestamp, temperature, raw_payload, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)"
            ),
            rusqlite::params![kind.as_str(), timestamp, fields.temperature, raw, now],
        )
        .map_err(write_err)?;
    } else {
        tx.execute(
            &format!(
                "INSERT INTO {table}
                 (kind, tag_key, timestamp, rssi, temperature, battery_percentage,
                  peer_key, distance, weight, raw_payload, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ),
            rusqlite::params![
                kind.as_str(),
                key,
                timestamp,
                fields.rssi,
                fields.temperature,
                fields.battery_percentage,
                peer_key,
                distance,
                fields.weight,
                raw,
                now,
            ],
        )
        .map_err(write_err)?;
    }

    let id = tx.last_insert_rowid();

    // Refresh the metadata row: count cache, kinds-seen set, update time
    let kinds_text: String = tx
        .query_row(
            "SELECT kinds_seen FROM table_metadata WHERE table_name = ?",
            [table],
            |row| row.get(0),
        )
        .map_err(write_err)?;
    let mut kinds: BTreeSet<RecordKind> = serde_json::from_str(&kinds_text).unwrap_or_default();
    kinds.insert(kind);
    let kinds_text = serde_json::to_string(&kinds)?;

    tx.execute(
        "UPDATE table_metadata
         SET row_count = row_count + 1, kinds_seen = ?1, last_updated_at = ?2
         WHERE table_name = ?3",
        rusqlite::params![kinds_text, now, table],
    )
    .map_err(write_err)?;

    tx.commit().map_err(write_err)?;
    Ok(id)
}

// Query path
impl Store {
    /// Query one tag's records, newest first.
    ///
    /// A key with no table returns an empty Vec, never an error. Results
    /// are capped at the query's limit (default 100).
    pub fn query(&self, key: &str, query: &RecordQuery) -> Result<Vec<StoredRecord>> {
        let inner = self.lock();
        let conn = inner.conn()?;

        let table = table_name_for(key);
        if !inner.known_tables.contains(&table) {
            return Ok(Vec::new());
        }

        let limit = query.effective_limit(DEFAULT_QUERY_LIMIT);
        self.query_table(conn, &table, query, limit)
    }

    /// Query the shared environment table, newest first.
    pub fn query_environment(&self, query: &RecordQuery) -> Result<Vec<StoredRecord>> {
        let inner = self.lock();
        let conn = inner.conn()?;

        if !inner.known_tables.contains(ENVIRONMENT_TABLE) {
            return Ok(Vec::new());
        }

        let limit = query.effective_limit(DEFAULT_QUERY_LIMIT);
        self.query_table(conn, ENVIRONMENT_TABLE, query, limit)
    }

    /// Query every known table, merged and globally re-sorted newest first.
    ///
    /// Linear in total matching rows; meant for diagnostics and export, not
    /// the hot path. Results are capped at the query's limit (default 1000).
    pub fn query_all(&self, query: &RecordQuery) -> Result<Vec<StoredRecord>> {
        let inner = self.lock();
        let conn = inner.conn()?;
        let limit = query.effective_limit(DEFAULT_QUERY_ALL_LIMIT);

        let tables: Vec<String> = conn
            .prepare("SELECT table_name FROM table_metadata")?
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut records = Vec::new();
        for table in &tables {
            records.extend(self.query_table(conn, table, query, limit)?);
        }

        records.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then(b.created_at.cmp(&a.created_at))
        });
        records.truncate(limit as usize);
        Ok(records)
    }

    /// The `n` most recent records of one kind for a tag.
    pub fn recent(&self, key: &str, kind: RecordKind, n: u32) -> Result<Vec<StoredRecord>> {
        self.query(key, &RecordQuery::new().kind(kind).limit(n))
    }

    fn query_table(
        &self,
        conn: &Connection,
        table: &str,
        query: &RecordQuery,
        limit: u32,
    ) -> Result<Vec<StoredRecord>> {
        let (where_clause, params) = query.build_where();

        let columns = if table == ENVIRONMENT_TABLE {
            "id, kind, timestamp, temperature, raw_payload, created_at"
        } else {
            "id, kind, tag_key, timestamp, rssi, temperature, battery_percentage, \
             peer_key, distance, weight, raw_payload, created_at"
        };
        let sql = format!(
            "SELECT {columns} FROM {table} {where_clause} ORDER BY timestamp DESC LIMIT {limit}"
        );

        if self.config.logging_enabled {
            debug!("Executing query: {}", sql);
        }

        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let records = if table == ENVIRONMENT_TABLE {
            stmt.query_map(params_ref.as_slice(), map_environment_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        } else {
            stmt.query_map(params_ref.as_slice(), map_record_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        };

        Ok(records)
    }
}

fn from_unix(ts: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(ts).unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

fn parse_kind(s: &str, fallback: RecordKind) -> RecordKind {
    s.parse().unwrap_or(fallback)
}

fn map_record_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredRecord> {
    let raw: String = row.get(10)?;
    Ok(StoredRecord {
        id: row.get(0)?,
        kind: parse_kind(&row.get::<_, String>(1)?, RecordKind::Sensor),
        key: Some(row.get(2)?),
        timestamp: from_unix(row.get(3)?),
        rssi: row.get(4)?,
        temperature: row.get(5)?,
        battery_percentage: row.get::<_, Option<i64>>(6)?.map(|v| v as u8),
        peer_key: row.get(7)?,
        distance: row.get(8)?,
        weight: row.get(9)?,
        raw_payload: serde_json::from_str(&raw).unwrap_or(Value::Null),
        created_at: from_unix(row.get(11)?),
    })
}

fn map_environment_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredRecord> {
    let raw: String = row.get(4)?;
    Ok(StoredRecord {
        id: row.get(0)?,
        kind: parse_kind(&row.get::<_, String>(1)?, RecordKind::Environment),
        key: None,
        timestamp: from_unix(row.get(2)?),
        rssi: None,
        temperature: row.get(3)?,
        battery_percentage: None,
        peer_key: None,
        distance: None,
        weight: None,
        raw_payload: serde_json::from_str(&raw).unwrap_or(Value::Null),
        created_at: from_unix(row.get(5)?),
    })
}

// Retention and cleanup
impl Store {
    /// Delete records created before the retention cutoff.
    ///
    /// With a key, cleans that tag's table (erroring if it does not exist);
    /// without one, cleans every known table. `older_than_days` falls back
    /// to the configured retention; day zero means "everything created
    /// before this instant". Returns the number of rows deleted.
    pub fn cleanup(&self, key: Option<&str>, older_than_days: Option<u32>) -> Result<u64> {
        let mut inner = self.lock();
        let days = older_than_days.unwrap_or(self.config.retention_days);
        let cutoff = calendar_cutoff(OffsetDateTime::now_utc(), days);

        match key {
            Some(key) => {
                let table = table_name_for(key);
                if !inner.known_tables.contains(&table) {
                    return Err(Error::TableNotFound(key.to_string()));
                }
                self.cleanup_table(&mut inner, &table, cutoff)
            }
            None => {
                let tables: Vec<String> = inner
                    .conn()?
                    .prepare("SELECT table_name FROM table_metadata")?
                    .query_map([], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;

                let mut deleted = 0;
                for table in &tables {
                    deleted += self.cleanup_table(&mut inner, table, cutoff)?;
                }
                Ok(deleted)
            }
        }
    }

    /// Delete old rows from one table and refresh its metadata row.
    fn cleanup_table(
        &self,
        inner: &mut Inner,
        table: &str,
        cutoff: OffsetDateTime,
    ) -> Result<u64> {
        let conn = inner.conn_mut()?;
        let tx = conn.transaction()?;

        let deleted = tx.execute(
            &format!("DELETE FROM {table} WHERE created_at < ?"),
            [cutoff.unix_timestamp()],
        )?;

        // Row count is recomputed rather than decremented, so the cache
        // self-heals if it ever drifted
        let now = OffsetDateTime::now_utc().unix_timestamp();
        tx.execute(
            &format!(
                "UPDATE table_metadata
                 SET row_count = (SELECT COUNT(*) FROM {table}), last_updated_at = ?1
                 WHERE table_name = ?2"
            ),
            rusqlite::params![now, table],
        )?;
        tx.commit()?;

        if deleted > 0 {
            info!("Deleted {} records from {}", deleted, table);
        }
        Ok(deleted as u64)
    }
}

/// Cutoff for retention: calendar-day subtraction from the current instant,
/// not a fixed multiple of 24 hours.
fn calendar_cutoff(now: OffsetDateTime, days: u32) -> OffsetDateTime {
    let date = now
        .date()
        .checked_sub(Duration::days(i64::from(days)))
        .unwrap_or(Date::MIN);
    now.replace_date(date)
}

// Statistics
impl Store {
    /// Live aggregate for one tag's table, computed by scanning it.
    pub fn table_stats(&self, key: &str) -> Result<TableStats> {
        let inner = self.lock();
        let conn = inner.conn()?;

        let table = table_name_for(key);
        if !inner.known_tables.contains(&table) {
            return Err(Error::TableNotFound(key.to_string()));
        }

        let (count, kinds, earliest, latest) = conn.query_row(
            &format!(
                "SELECT COUNT(*), COUNT(DISTINCT kind), MIN(timestamp), MAX(timestamp) FROM {table}"
            ),
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                ))
            },
        )?;

        Ok(TableStats {
            key: key.to_string(),
            row_count: count as u64,
            kind_count: kinds as u64,
            earliest: earliest.map(from_unix),
            latest: latest.map(from_unix),
        })
    }

    /// All table metadata, from the cache. No record table is scanned.
    pub fn metadata(&self) -> Result<Vec<TableMetadata>> {
        let inner = self.lock();
        let conn = inner.conn()?;

        let mut stmt = conn.prepare(
            "SELECT table_name, tag_key, row_count, kinds_seen, created_at, last_updated_at
             FROM table_metadata ORDER BY last_updated_at DESC",
        )?;

        let entries = stmt
            .query_map([], |row| {
                Ok(TableMetadata {
                    table_name: row.get(0)?,
                    key: row.get(1)?,
                    row_count: row.get::<_, i64>(2)? as u64,
                    kinds_seen: serde_json::from_str(&row.get::<_, String>(3)?)
                        .unwrap_or_default(),
                    created_at: from_unix(row.get(4)?),
                    last_updated_at: from_unix(row.get(5)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Live record count, for one tag or across every known table.
    ///
    /// An unknown key counts as zero.
    pub fn count_records(&self, key: Option<&str>) -> Result<u64> {
        let inner = self.lock();
        let conn = inner.conn()?;

        let tables: Vec<String> = match key {
            Some(key) => {
                let table = table_name_for(key);
                if !inner.known_tables.contains(&table) {
                    return Ok(0);
                }
                vec![table]
            }
            None => inner.known_tables.iter().cloned().collect(),
        };

        let mut total: i64 = 0;
        for table in &tables {
            total += conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get::<_, i64>(0)
            })?;
        }
        Ok(total as u64)
    }
}

// Export
impl Store {
    /// Export matching records as a single JSON document.
    ///
    /// The document is buffered fully, written to a temporary sibling file
    /// and atomically renamed into place, so the destination is never left
    /// partially written. Returns the number of records exported.
    pub fn export_json<P: AsRef<Path>>(&self, path: P, options: &ExportOptions) -> Result<usize> {
        let records = self.export_records(options)?;
        let count = records.len();

        let document = ExportDocument {
            exported_at: OffsetDateTime::now_utc(),
            options: options.clone(),
            record_count: count,
            records,
        };
        let data = serde_json::to_vec_pretty(&document)?;
        self.write_atomic(path.as_ref(), &data)?;

        info!("Exported {} records to {}", count, path.as_ref().display());
        Ok(count)
    }

    /// Export matching records as CSV, one row per record.
    ///
    /// Same atomicity guarantee as [`Store::export_json`].
    pub fn export_csv<P: AsRef<Path>>(&self, path: P, options: &ExportOptions) -> Result<usize> {
        let records = self.export_records(options)?;
        let count = records.len();

        let csv_err = |e: csv::Error| Error::Export {
            path: path.as_ref().to_path_buf(),
            source: std::io::Error::other(e),
        };

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record([
                "id",
                "kind",
                "key",
                "timestamp",
                "rssi",
                "temperature",
                "battery_percentage",
                "peer_key",
                "distance",
                "weight",
                "created_at",
                "raw_payload",
            ])
            .map_err(csv_err)?;

        for r in &records {
            writer
                .write_record([
                    r.id.to_string(),
                    r.kind.to_string(),
                    r.key.clone().unwrap_or_default(),
                    r.timestamp.format(&Rfc3339).unwrap_or_default(),
                    r.rssi.map(|v| v.to_string()).unwrap_or_default(),
                    r.temperature.map(|v| v.to_string()).unwrap_or_default(),
                    r.battery_percentage
                        .map(|v| v.to_string())
                        .unwrap_or_default(),
                    r.peer_key.clone().unwrap_or_default(),
                    r.distance.map(|v| v.to_string()).unwrap_or_default(),
                    r.weight.map(|v| v.to_string()).unwrap_or_default(),
                    r.created_at.format(&Rfc3339).unwrap_or_default(),
                    r.raw_payload.to_string(),
                ])
                .map_err(csv_err)?;
        }

        let data = writer.into_inner().map_err(|e| Error::Export {
            path: path.as_ref().to_path_buf(),
            source: std::io::Error::other(e),
        })?;
        self.write_atomic(path.as_ref(), &data)?;

        info!("Exported {} records to {}", count, path.as_ref().display());
        Ok(count)
    }

    /// Gather the records for an export with an effectively unbounded limit.
    fn export_records(&self, options: &ExportOptions) -> Result<Vec<StoredRecord>> {
        let mut query = RecordQuery::new().limit(u32::MAX);
        if let Some(kind) = options.kind {
            query = query.kind(kind);
        }
        if let Some(since) = options.since {
            query = query.since(since);
        }
        if let Some(until) = options.until {
            query = query.until(until);
        }

        match &options.key {
            Some(key) => self.query(key, &query),
            None => self.query_all(&query),
        }
    }

    fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<()> {
        let export_err = |source: std::io::Error| Error::Export {
            path: path.to_path_buf(),
            source,
        };

        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, data).map_err(export_err)?;
        std::fs::rename(&tmp, path).map_err(export_err)?;
        Ok(())
    }
}
