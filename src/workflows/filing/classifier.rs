use std::fmt;

use serde::Serialize;

use crate::workflows::bookings::BookingStatus;
use crate::workflows::portal::PageSignals;

/// Lower-cased phrases the portal and its gateway use for planned or
/// temporary outages.
const TRANSIENT_PHRASES: [&str; 7] = [
    "maintenance",
    "temporarily unavailable",
    "service unavailable",
    "try again later",
    "συντήρηση",
    "προσωρινά μη διαθέσιμ",
    "δοκιμάστε αργότερα",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureClass {
    RetryLater,
    Permanent,
}

impl FailureClass {
    pub const fn status(self) -> BookingStatus {
        match self {
            Self::RetryLater => BookingStatus::RetryLater,
            Self::Permanent => BookingStatus::Error,
        }
    }
}

/// Splits booking failures into "try again on a later run" and "needs a
/// human". Anything not recognised as an outage is permanent.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn classify(&self, error: &dyn fmt::Display, signals: PageSignals) -> FailureClass {
        if signals.maintenance_notice || is_transient_message(&error.to_string()) {
            FailureClass::RetryLater
        } else {
            FailureClass::Permanent
        }
    }
}

fn is_transient_message(message: &str) -> bool {
    let lowered = message.to_lowercase();
    TRANSIENT_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
}
