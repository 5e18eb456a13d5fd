use std::collections::BTreeMap;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::{Type, Value};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use super::domain::{Booking, BookingCandidate, BookingError, BookingId, BookingStatus};

/// Durable record of bookings and their submission status.
///
/// Implementations must treat `platform_id` as a unique key and never let a
/// `SUBMITTED` row change status again.
pub trait BookingStore {
    /// Insert-if-absent keyed on `platform_id`; a duplicate is not an error.
    fn insert(&self, candidate: &BookingCandidate) -> Result<InsertOutcome, StoreError>;
    /// Snapshot of the bookings currently in `status`, in insertion order.
    fn list_by_status(&self, status: BookingStatus) -> Result<Vec<Booking>, StoreError>;
    /// Touches only `status` and the evidence reference of one row.
    fn update_status(
        &self,
        id: BookingId,
        status: BookingStatus,
        evidence_path: Option<&str>,
    ) -> Result<(), StoreError>;
    fn fetch(&self, id: BookingId) -> Result<Option<Booking>, StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(BookingId),
    Duplicate,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("booking store failure: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("candidate {platform_id} rejected: {source}")]
    InvalidCandidate {
        platform_id: String,
        #[source]
        source: BookingError,
    },
    #[error("booking {0} not found")]
    NotFound(BookingId),
    #[error("booking {0} is already SUBMITTED; its status is final")]
    SubmittedImmutable(BookingId),
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS bookings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    guest_name TEXT NOT NULL,
    check_in TEXT NOT NULL,
    check_out TEXT NOT NULL,
    total_payout REAL NOT NULL,
    platform_id TEXT UNIQUE NOT NULL,
    status TEXT DEFAULT 'PENDING',
    audit_screenshot_path TEXT,
    is_cancelled INTEGER DEFAULT 0,
    cancellation_date TEXT,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);";

/// Columns added after the first release; older databases gain them on open.
const ADDITIVE_COLUMNS: [(&str, &str); 3] = [
    ("audit_screenshot_path", "TEXT"),
    ("is_cancelled", "INTEGER DEFAULT 0"),
    ("cancellation_date", "TEXT"),
];

const SELECT_COLUMNS: &str = "id, guest_name, check_in, check_out, total_payout, platform_id, \
     status, audit_screenshot_path, is_cancelled, cancellation_date, created_at";

pub struct SqliteBookingStore {
    conn: Connection,
}

impl std::fmt::Debug for SqliteBookingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBookingStore").finish_non_exhaustive()
    }
}

impl SqliteBookingStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Wraps an existing connection, creating or migrating the schema.
    pub fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        let store = Self { conn };
        store.migrate_schema()?;
        Ok(store)
    }

    fn migrate_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(SCHEMA)?;

        let existing = self.column_names()?;
        for (column, definition) in ADDITIVE_COLUMNS {
            if !existing.iter().any(|name| name == column) {
                self.conn.execute_batch(&format!(
                    "ALTER TABLE bookings ADD COLUMN {column} {definition};"
                ))?;
                info!(column, "added missing bookings column");
            }
        }

        debug!("booking schema ready");
        Ok(())
    }

    fn column_names(&self) -> Result<Vec<String>, StoreError> {
        let mut statement = self.conn.prepare("PRAGMA table_info(bookings)")?;
        let names = statement
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    pub fn find_by_platform_id(&self, platform_id: &str) -> Result<Option<Booking>, StoreError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM bookings WHERE platform_id = ?1");
        let booking = self
            .conn
            .query_row(&sql, params![platform_id.trim()], booking_from_row)
            .optional()?;
        Ok(booking)
    }

    /// Every booking in insertion order, whatever its status.
    pub fn all(&self) -> Result<Vec<Booking>, StoreError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM bookings ORDER BY id");
        let mut statement = self.conn.prepare(&sql)?;
        let bookings = statement
            .query_map([], booking_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(bookings)
    }

    pub fn status_counts(&self) -> Result<BTreeMap<String, usize>, StoreError> {
        let mut statement = self
            .conn
            .prepare("SELECT COALESCE(status, 'PENDING'), COUNT(*) FROM bookings GROUP BY 1")?;
        let counts = statement
            .query_map([], |row| {
                let count: i64 = row.get(1)?;
                Ok((row.get::<_, String>(0)?, count as usize))
            })?
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(counts)
    }

    fn current_status(&self, id: BookingId) -> Result<Option<String>, StoreError> {
        let status = self
            .conn
            .query_row(
                "SELECT COALESCE(status, 'PENDING') FROM bookings WHERE id = ?1",
                params![id.0],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(status)
    }
}

impl BookingStore for SqliteBookingStore {
    fn insert(&self, candidate: &BookingCandidate) -> Result<InsertOutcome, StoreError> {
        candidate
            .validate()
            .map_err(|source| StoreError::InvalidCandidate {
                platform_id: candidate.platform_id.clone(),
                source,
            })?;

        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO bookings
             (guest_name, check_in, check_out, total_payout, platform_id, is_cancelled, cancellation_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                candidate.guest_name.trim(),
                candidate.check_in.format("%Y-%m-%d").to_string(),
                candidate.check_out.format("%Y-%m-%d").to_string(),
                candidate.total_payout,
                candidate.platform_id.trim(),
                candidate.is_cancelled,
                candidate
                    .cancellation_date
                    .map(|date| date.format("%Y-%m-%d").to_string()),
            ],
        )?;

        if changed == 0 {
            debug!(platform_id = %candidate.platform_id, "duplicate booking ignored");
            return Ok(InsertOutcome::Duplicate);
        }

        let id = BookingId(self.conn.last_insert_rowid());
        debug!(platform_id = %candidate.platform_id, booking_id = %id, "booking queued");
        Ok(InsertOutcome::Inserted(id))
    }

    fn list_by_status(&self, status: BookingStatus) -> Result<Vec<Booking>, StoreError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM bookings
             WHERE COALESCE(status, 'PENDING') = ?1 ORDER BY id"
        );
        let mut statement = self.conn.prepare(&sql)?;
        let bookings = statement
            .query_map(params![status.as_str()], booking_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(bookings)
    }

    fn update_status(
        &self,
        id: BookingId,
        status: BookingStatus,
        evidence_path: Option<&str>,
    ) -> Result<(), StoreError> {
        // A missing evidence path keeps the reference from an earlier attempt.
        let changed = self.conn.execute(
            "UPDATE bookings
             SET status = ?1, audit_screenshot_path = COALESCE(?2, audit_screenshot_path)
             WHERE id = ?3 AND COALESCE(status, 'PENDING') != 'SUBMITTED'",
            params![status.as_str(), evidence_path, id.0],
        )?;

        if changed == 1 {
            return Ok(());
        }

        match self.current_status(id)? {
            None => Err(StoreError::NotFound(id)),
            Some(_) => Err(StoreError::SubmittedImmutable(id)),
        }
    }

    fn fetch(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM bookings WHERE id = ?1");
        let booking = self
            .conn
            .query_row(&sql, params![id.0], booking_from_row)
            .optional()?;
        Ok(booking)
    }
}

fn booking_from_row(row: &Row<'_>) -> rusqlite::Result<Booking> {
    let status_raw: Option<String> = row.get(6)?;
    let status = match status_raw {
        None => BookingStatus::Pending,
        Some(raw) => raw
            .parse::<BookingStatus>()
            .map_err(|err| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(err)))?,
    };

    let cancellation_raw: Option<String> = row.get(9)?;
    let cancellation_date = match cancellation_raw.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(date_column(9, raw)?),
    };

    let created_raw: Option<String> = row.get(10)?;

    Ok(Booking {
        id: BookingId(row.get(0)?),
        guest_name: row.get(1)?,
        check_in: date_column(2, &row.get::<_, String>(2)?)?,
        check_out: date_column(3, &row.get::<_, String>(3)?)?,
        total_payout: payout_column(row.get(4)?),
        platform_id: row.get(5)?,
        status,
        audit_evidence_path: row.get(7)?,
        is_cancelled: row.get::<_, Option<i64>>(8)?.unwrap_or(0) != 0,
        cancellation_date,
        created_at: created_raw
            .and_then(|raw| NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S").ok()),
    })
}

fn date_column(index: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err)))
}

/// Anything that is not a number decodes as NaN so filing validation rejects it.
fn payout_column(value: Value) -> f64 {
    match value {
        Value::Real(amount) => amount,
        Value::Integer(amount) => amount as f64,
        Value::Text(raw) => raw.trim().parse::<f64>().unwrap_or(f64::NAN),
        Value::Null | Value::Blob(_) => f64::NAN,
    }
}
