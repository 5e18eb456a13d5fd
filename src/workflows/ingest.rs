use crate::workflows::bookings::{BookingCandidate, BookingStore, InsertOutcome, StoreError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum IngestError {
    Io(std::io::Error),
    Csv(csv::Error),
    Store(StoreError),
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::Io(err) => write!(f, "failed to read reservation export: {}", err),
            IngestError::Csv(err) => write!(f, "invalid reservation CSV data: {}", err),
            IngestError::Store(err) => write!(f, "could not store reservations: {}", err),
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IngestError::Io(err) => Some(err),
            IngestError::Csv(err) => Some(err),
            IngestError::Store(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for IngestError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<StoreError> for IngestError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

/// Row counts of one import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub inserted: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub invalid: usize,
}

#[derive(Debug, Deserialize)]
struct ReservationRow {
    #[serde(alias = "guestName")]
    guest_name: String,
    #[serde(alias = "checkIn")]
    check_in: String,
    #[serde(alias = "checkOut")]
    check_out: String,
    #[serde(alias = "totalPayout")]
    total_payout: String,
    #[serde(
        alias = "platformId",
        alias = "confirmation_code",
        alias = "confirmationCode"
    )]
    platform_id: String,
    #[serde(
        alias = "isCancelled",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    is_cancelled: Option<String>,
    #[serde(
        alias = "cancellationDate",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    cancellation_date: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    status: Option<String>,
}

impl ReservationRow {
    /// Confirmed or completed stays need a declaration, and so does every
    /// cancellation, whatever status the export gives it.
    fn is_declarable(&self) -> bool {
        if self.is_cancellation() {
            return true;
        }
        match self.status.as_deref() {
            Some(status) => matches!(
                status.trim().to_ascii_lowercase().as_str(),
                "confirmed" | "completed"
            ),
            None => true,
        }
    }

    /// An explicit cancellation flag, or a `cancelled` status that comes with
    /// a cancellation date.
    fn is_cancellation(&self) -> bool {
        if self.is_cancelled.as_deref().is_some_and(parse_flag) {
            return true;
        }
        let cancelled_status = self.status.as_deref().is_some_and(|status| {
            matches!(
                status.trim().to_ascii_lowercase().as_str(),
                "cancelled" | "canceled"
            )
        });
        cancelled_status && self.cancellation_date.is_some()
    }

    fn into_candidate(self) -> Result<BookingCandidate, String> {
        let is_cancelled = self.is_cancellation();
        let check_in = parse_date(&self.check_in)
            .ok_or_else(|| format!("unreadable check-in date '{}'", self.check_in))?;
        let check_out = parse_date(&self.check_out)
            .ok_or_else(|| format!("unreadable check-out date '{}'", self.check_out))?;
        let total_payout = parse_amount(&self.total_payout)
            .ok_or_else(|| format!("unreadable payout '{}'", self.total_payout))?;
        let cancellation_date = match self.cancellation_date.as_deref() {
            Some(raw) => {
                Some(parse_date(raw).ok_or_else(|| format!("unreadable cancellation date '{raw}'"))?)
            }
            None => None,
        };

        Ok(BookingCandidate {
            guest_name: self.guest_name.trim().to_string(),
            check_in,
            check_out,
            total_payout,
            platform_id: self.platform_id.trim().to_string(),
            is_cancelled,
            cancellation_date,
        })
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

/// ISO dates, or the listing site's "Jan 15, 2025" display format.
fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    ["%Y-%m-%d", "%b %d, %Y", "%B %d, %Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
}

fn parse_amount(value: &str) -> Option<f64> {
    let cleaned: String = value
        .chars()
        .filter(|c| !matches!(c, '€' | '$' | ',' | ' '))
        .collect();
    cleaned.parse::<f64>().ok()
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "cancelled" | "canceled"
    )
}

/// Loads a reservation export into the booking store, idempotently.
pub struct BookingImporter;

impl BookingImporter {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        store: &dyn BookingStore,
    ) -> Result<IngestReport, IngestError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, store)
    }

    pub fn from_reader<R: Read>(
        reader: R,
        store: &dyn BookingStore,
    ) -> Result<IngestReport, IngestError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut report = IngestReport::default();

        for (line, record) in csv_reader.deserialize::<ReservationRow>().enumerate() {
            let row = match record {
                Ok(row) => row,
                Err(err) if err.is_io_error() => return Err(err.into()),
                Err(err) => {
                    warn!(row = line + 1, error = %err, "skipping malformed reservation row");
                    report.invalid += 1;
                    continue;
                }
            };

            if !row.is_declarable() {
                debug!(row = line + 1, status = ?row.status, "reservation not declarable");
                report.skipped += 1;
                continue;
            }

            let candidate = match row.into_candidate() {
                Ok(candidate) => candidate,
                Err(reason) => {
                    warn!(row = line + 1, %reason, "skipping invalid reservation");
                    report.invalid += 1;
                    continue;
                }
            };

            match store.insert(&candidate) {
                Ok(InsertOutcome::Inserted(id)) => {
                    debug!(booking_id = %id, platform_id = %candidate.platform_id, "booking stored");
                    report.inserted += 1;
                }
                Ok(InsertOutcome::Duplicate) => report.duplicates += 1,
                Err(StoreError::InvalidCandidate { platform_id, source }) => {
                    warn!(%platform_id, error = %source, "reservation failed validation");
                    report.invalid += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }

        info!(
            inserted = report.inserted,
            duplicates = report.duplicates,
            skipped = report.skipped,
            invalid = report.invalid,
            "reservation import finished"
        );
        Ok(report)
    }
}
