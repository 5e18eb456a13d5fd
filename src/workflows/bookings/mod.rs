mod domain;
mod store;

pub use domain::{Booking, BookingCandidate, BookingError, BookingId, BookingStatus};
pub use store::{BookingStore, InsertOutcome, SqliteBookingStore, StoreError};
