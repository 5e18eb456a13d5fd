use aade_filer::workflows::bookings::BookingStatus;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "aade-filer",
    about = "Queue short-term-rental bookings and file their AADE declarations",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load a reservation CSV export into the booking store
    Ingest(IngestArgs),
    /// List stored bookings and their filing status
    Bookings(BookingsArgs),
    /// Run the declaration pipeline against the simulated portal
    Simulate(SimulateArgs),
}

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Path to the reservation export
    #[arg(long)]
    pub csv: PathBuf,
}

#[derive(Args, Debug, Default)]
pub struct BookingsArgs {
    /// Only show bookings in this status (e.g. PENDING, retry-later)
    #[arg(long, value_parser = parse_status)]
    pub status: Option<BookingStatus>,
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Press the final submit button instead of backing out (overrides DRY_RUN)
    #[arg(long)]
    pub production: bool,
    /// Also pick up bookings previously marked RETRY_LATER
    #[arg(long)]
    pub include_retry: bool,
    /// Portal behaviour to simulate
    #[arg(long, default_value = "ready")]
    pub scenario: String,
    /// Insert the sample reservations before running
    #[arg(long)]
    pub seed: bool,
    /// Honour the configured settle and action delays
    #[arg(long)]
    pub paced: bool,
}

fn parse_status(raw: &str) -> Result<BookingStatus, String> {
    raw.parse::<BookingStatus>().map_err(|err| err.to_string())
}
