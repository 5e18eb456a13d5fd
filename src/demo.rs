use crate::cli::SimulateArgs;
use aade_filer::config::AppConfig;
use aade_filer::error::AppError;
use aade_filer::workflows::bookings::{BookingCandidate, BookingStore, InsertOutcome, SqliteBookingStore};
use aade_filer::workflows::filing::{AuditRecorder, DeclarationSubmissionPipeline, RunSummary};
use aade_filer::workflows::portal::{
    NoDelay, Pacer, PortalDriver, PortalScenario, SimulatedPortal, ThreadPacer, UnavailableIntents,
};
use chrono::NaiveDate;
use tracing::info;

/// Wires store, recorder and pipeline exactly as a browser-backed run would,
/// with the simulated portal standing in for the browser session.
pub fn run_simulation(config: &AppConfig, args: SimulateArgs) -> Result<(), AppError> {
    let mut filing = config.filing.clone();
    if args.production {
        filing.dry_run = false;
    }
    if args.include_retry {
        filing.include_retry_later = true;
    }

    let scenario = PortalScenario::named(&args.scenario).ok_or_else(|| {
        AppError::Usage(format!(
            "unknown scenario '{}'; expected one of: {}",
            args.scenario,
            PortalScenario::NAMES.join(", ")
        ))
    })?;

    let store = SqliteBookingStore::open(&config.store.database_path)?;
    if args.seed {
        let inserted = seed(&store)?;
        info!(inserted, "sample reservations seeded");
    }

    let recorder = AuditRecorder::for_declarations(&filing.audit_evidence_dir).with_extension("txt");
    let pipeline = DeclarationSubmissionPipeline::from_config(&filing, recorder);

    let mut portal = SimulatedPortal::new(PortalScenario {
        entry_url: filing.entry_url.clone(),
        ..scenario
    });
    let mut intents = UnavailableIntents;
    let pacer: &dyn Pacer = if args.paced { &ThreadPacer } else { &NoDelay };
    let mut driver = PortalDriver::new(&mut portal, &mut intents, pacer);

    let summary = pipeline.run(&store, &mut driver)?;
    render_summary(&args.scenario, pipeline.settings().dry_run, &summary);
    Ok(())
}

fn seed(store: &dyn BookingStore) -> Result<usize, AppError> {
    let samples = sample_reservations()
        .ok_or_else(|| AppError::Usage("built-in sample reservations carry an invalid date".to_string()))?;
    let mut inserted = 0;
    for candidate in samples {
        if let InsertOutcome::Inserted(_) = store.insert(&candidate)? {
            inserted += 1;
        }
    }
    Ok(inserted)
}

fn date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Confirmed and completed stays from the demo listing account, plus one
/// cancellation.
fn sample_reservations() -> Option<Vec<BookingCandidate>> {
    let stay = |platform_id: &str, guest_name: &str, check_in, check_out, total_payout| {
        BookingCandidate {
            guest_name: guest_name.to_string(),
            check_in,
            check_out,
            total_payout,
            platform_id: platform_id.to_string(),
            is_cancelled: false,
            cancellation_date: None,
        }
    };

    let mut cancelled = stay(
        "HMXYZ99881",
        "Elena Rossi",
        date(2025, 3, 3)?,
        date(2025, 3, 6)?,
        120.0,
    );
    cancelled.is_cancelled = true;
    cancelled.cancellation_date = Some(date(2025, 2, 20)?);

    Some(vec![
        stay("HMXYZ12345", "John Smith", date(2025, 1, 15)?, date(2025, 1, 20)?, 450.0),
        stay("HMXYZ11223", "Klaus Mueller", date(2025, 1, 10)?, date(2025, 1, 14)?, 680.0),
        stay("HMXYZ33445", "Sophie Dupont", date(2025, 2, 1)?, date(2025, 2, 7)?, 540.0),
        cancelled,
    ])
}

fn render_summary(scenario: &str, dry_run: bool, summary: &RunSummary) {
    println!("Declaration run against simulated portal ({scenario})");
    println!("Mode: {}", if dry_run { "dry run" } else { "production" });
    println!("Selected bookings: {}", summary.selected);
    println!("- submitted: {}", summary.submitted);
    println!("- dry-run verified: {}", summary.dry_run_verified);
    println!("- retry later: {}", summary.retry_later);
    println!("- error: {}", summary.errors);
    println!("- needs property: {}", summary.needs_property);
    println!("Evidence artifacts: {}", summary.evidence_captured);
    if summary.halted_early {
        println!("Run stopped early: register a property in the portal, then run again.");
    }
}
