pub mod bookings;
pub mod filing;
pub mod ingest;
pub mod portal;
