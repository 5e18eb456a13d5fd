mod cli;
mod demo;

use aade_filer::config::AppConfig;
use aade_filer::error::AppError;
use aade_filer::telemetry;
use aade_filer::workflows::bookings::{Booking, BookingStore, SqliteBookingStore};
use aade_filer::workflows::ingest::BookingImporter;
use clap::Parser;
use cli::{BookingsArgs, Cli, Command, IngestArgs};
use tracing::info;

fn main() {
    if let Err(err) = run_cli() {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    info!(?config.environment, database = %config.store.database_path.display(), "aade-filer starting");

    match cli.command {
        Command::Ingest(args) => run_ingest(&config, args),
        Command::Bookings(args) => run_bookings(&config, args),
        Command::Simulate(args) => demo::run_simulation(&config, args),
    }
}

fn run_ingest(config: &AppConfig, args: IngestArgs) -> Result<(), AppError> {
    let store = SqliteBookingStore::open(&config.store.database_path)?;
    let report = BookingImporter::from_path(&args.csv, &store)?;

    println!("Imported {}", args.csv.display());
    println!("- inserted: {}", report.inserted);
    println!("- already stored: {}", report.duplicates);
    println!("- not declarable: {}", report.skipped);
    println!("- invalid: {}", report.invalid);
    Ok(())
}

fn run_bookings(config: &AppConfig, args: BookingsArgs) -> Result<(), AppError> {
    let store = SqliteBookingStore::open(&config.store.database_path)?;
    let bookings = match args.status {
        Some(status) => store.list_by_status(status)?,
        None => store.all()?,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&bookings)?);
        return Ok(());
    }

    render_bookings(&bookings);
    if args.status.is_none() {
        println!("\nBy status");
        for (status, count) in store.status_counts()? {
            println!("- {status}: {count}");
        }
    }
    Ok(())
}

fn render_bookings(bookings: &[Booking]) {
    if bookings.is_empty() {
        println!("No bookings stored.");
        return;
    }

    for booking in bookings {
        let cancelled = match booking.cancellation_date {
            Some(date) if booking.is_cancelled => format!(" | cancelled {date}"),
            _ => String::new(),
        };
        let evidence = booking
            .audit_evidence_path
            .as_deref()
            .map(|path| format!(" | evidence {path}"))
            .unwrap_or_default();
        println!(
            "#{} {} | {} | {} -> {} ({} nights) | EUR {} | {}{}{}",
            booking.id,
            booking.platform_id,
            booking.guest_name,
            booking.check_in,
            booking.check_out,
            booking.nights(),
            booking.payout_text(),
            booking.status.label(),
            cancelled,
            evidence
        );
    }
}
