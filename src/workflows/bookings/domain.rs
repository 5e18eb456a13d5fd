use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier assigned by the store on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(pub i64);

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Submitted,
    DryRunVerified,
    Error,
    RetryLater,
    NeedsProperty,
    Cancelled,
}

impl BookingStatus {
    pub const fn ordered() -> [Self; 7] {
        [
            Self::Pending,
            Self::Submitted,
            Self::DryRunVerified,
            Self::Error,
            Self::RetryLater,
            Self::NeedsProperty,
            Self::Cancelled,
        ]
    }

    /// Value persisted in the `status` column.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Submitted => "SUBMITTED",
            Self::DryRunVerified => "DRY_RUN_VERIFIED",
            Self::Error => "ERROR",
            Self::RetryLater => "RETRY_LATER",
            Self::NeedsProperty => "NEEDS_PROPERTY",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Submitted => "Submitted",
            Self::DryRunVerified => "Dry-run verified",
            Self::Error => "Error",
            Self::RetryLater => "Retry later",
            Self::NeedsProperty => "Needs property",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = BookingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        Self::ordered()
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| BookingError::UnknownStatus(value.to_string()))
    }
}

/// Candidate record handed over by the ingestion boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingCandidate {
    pub guest_name: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub total_payout: f64,
    pub platform_id: String,
    #[serde(default)]
    pub is_cancelled: bool,
    #[serde(default)]
    pub cancellation_date: Option<NaiveDate>,
}

impl BookingCandidate {
    pub fn validate(&self) -> Result<(), BookingError> {
        if self.platform_id.trim().is_empty() {
            return Err(BookingError::MissingPlatformId);
        }
        validate_fields(
            &self.guest_name,
            self.check_in,
            self.check_out,
            self.total_payout,
            self.is_cancelled,
            self.cancellation_date,
        )
    }
}

/// A stored reservation awaiting, or carrying the result of, a declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Booking {
    pub id: BookingId,
    pub guest_name: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub total_payout: f64,
    pub platform_id: String,
    pub is_cancelled: bool,
    pub cancellation_date: Option<NaiveDate>,
    pub status: BookingStatus,
    pub audit_evidence_path: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl Booking {
    /// Re-checks the fiscal invariants right before any portal interaction.
    pub fn validate_for_filing(&self) -> Result<(), BookingError> {
        validate_fields(
            &self.guest_name,
            self.check_in,
            self.check_out,
            self.total_payout,
            self.is_cancelled,
            self.cancellation_date,
        )
    }

    /// Payout rendered the way the declaration form expects it.
    pub fn payout_text(&self) -> String {
        format!("{:.2}", self.total_payout)
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }
}

fn validate_fields(
    guest_name: &str,
    check_in: NaiveDate,
    check_out: NaiveDate,
    total_payout: f64,
    is_cancelled: bool,
    cancellation_date: Option<NaiveDate>,
) -> Result<(), BookingError> {
    if guest_name.trim().is_empty() {
        return Err(BookingError::MissingGuestName);
    }
    if check_in >= check_out {
        return Err(BookingError::InvertedStay {
            check_in,
            check_out,
        });
    }
    if !total_payout.is_finite() || total_payout <= 0.0 {
        return Err(BookingError::InvalidPayout(total_payout));
    }
    if is_cancelled && cancellation_date.is_none() {
        return Err(BookingError::MissingCancellationDate);
    }
    if !is_cancelled && cancellation_date.is_some() {
        return Err(BookingError::UnexpectedCancellationDate);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BookingError {
    #[error("guest name is empty")]
    MissingGuestName,
    #[error("platform reservation code is empty")]
    MissingPlatformId,
    #[error("check-in {check_in} is not before check-out {check_out}")]
    InvertedStay {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },
    #[error("payout {0} is not a positive amount")]
    InvalidPayout(f64),
    #[error("cancelled booking has no cancellation date")]
    MissingCancellationDate,
    #[error("cancellation date given for a booking that is not cancelled")]
    UnexpectedCancellationDate,
    #[error("unknown booking status '{0}'")]
    UnknownStatus(String),
}
