#![allow(dead_code)]

use std::cell::RefCell;
use std::path::Path;
use std::time::Duration;

use aade_filer::config::FilingConfig;
use aade_filer::workflows::bookings::{BookingCandidate, BookingStatus, BookingStore, SqliteBookingStore};
use aade_filer::workflows::filing::{
    AuditRecorder, DeclarationSubmissionPipeline, FilingError, RunSummary,
};
use aade_filer::workflows::portal::{
    IntentError, IntentExecutor, NoDelay, Pacer, PortalDriver, SimulatedPortal,
};
use chrono::NaiveDate;
use serde_json::Value;

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub fn stay(platform_id: &str, guest_name: &str) -> BookingCandidate {
    BookingCandidate {
        guest_name: guest_name.to_string(),
        check_in: date(2025, 1, 15),
        check_out: date(2025, 1, 20),
        total_payout: 450.0,
        platform_id: platform_id.to_string(),
        is_cancelled: false,
        cancellation_date: None,
    }
}

pub fn cancelled_stay(platform_id: &str, guest_name: &str) -> BookingCandidate {
    BookingCandidate {
        total_payout: 120.0,
        is_cancelled: true,
        cancellation_date: Some(date(2025, 1, 5)),
        ..stay(platform_id, guest_name)
    }
}

pub fn store_with(candidates: &[BookingCandidate]) -> SqliteBookingStore {
    let store = SqliteBookingStore::open_in_memory().expect("in-memory store");
    for candidate in candidates {
        store.insert(candidate).expect("insert candidate");
    }
    store
}

pub fn status_of(store: &SqliteBookingStore, platform_id: &str) -> BookingStatus {
    store
        .find_by_platform_id(platform_id)
        .expect("lookup")
        .expect("booking stored")
        .status
}

pub fn evidence_of(store: &SqliteBookingStore, platform_id: &str) -> Option<String> {
    store
        .find_by_platform_id(platform_id)
        .expect("lookup")
        .expect("booking stored")
        .audit_evidence_path
}

/// Filing settings with no real waiting; only the login budget matters.
pub fn filing_config(audit_dir: &Path, dry_run: bool) -> FilingConfig {
    FilingConfig {
        dry_run,
        max_login_wait: Duration::from_secs(30),
        poll_interval: Duration::from_secs(2),
        settle_delay: Duration::ZERO,
        action_delay: Duration::ZERO,
        audit_evidence_dir: audit_dir.to_path_buf(),
        ..FilingConfig::default()
    }
}

pub fn pipeline(config: &FilingConfig) -> DeclarationSubmissionPipeline {
    let recorder = AuditRecorder::for_declarations(&config.audit_evidence_dir).with_extension("txt");
    DeclarationSubmissionPipeline::from_config(config, recorder)
}

/// Intent executor that records every instruction and never succeeds, so a
/// test notices whenever direct addressing was not enough.
#[derive(Debug, Default)]
pub struct RecordingIntents {
    pub instructions: Vec<String>,
}

impl IntentExecutor for RecordingIntents {
    fn perform_action(&mut self, instruction: &str) -> Result<(), IntentError> {
        self.instructions.push(instruction.to_string());
        Err(IntentError::Unavailable("recording only".to_string()))
    }

    fn extract_structured(&mut self, instruction: &str, _shape: &Value) -> Result<Value, IntentError> {
        self.instructions.push(instruction.to_string());
        Err(IntentError::Unavailable("recording only".to_string()))
    }
}

/// Pacer that only remembers what it was asked to wait for.
#[derive(Debug, Default)]
pub struct RecordingPacer {
    pub pauses: RefCell<Vec<Duration>>,
}

impl Pacer for RecordingPacer {
    fn pause(&self, duration: Duration) {
        self.pauses.borrow_mut().push(duration);
    }
}

pub fn run_pipeline(
    pipeline: &DeclarationSubmissionPipeline,
    store: &dyn BookingStore,
    portal: &mut SimulatedPortal,
) -> (Result<RunSummary, FilingError>, RecordingIntents) {
    let mut intents = RecordingIntents::default();
    let result = {
        let mut driver = PortalDriver::new(portal, &mut intents, &NoDelay);
        pipeline.run(store, &mut driver)
    };
    (result, intents)
}

/// Runs with the portal's own simulated intent executor, so fallbacks act on
/// the page instead of failing.
pub fn run_with_portal_intents(
    pipeline: &DeclarationSubmissionPipeline,
    store: &dyn BookingStore,
    portal: &mut SimulatedPortal,
) -> Result<RunSummary, FilingError> {
    let mut intents = portal.intents();
    let mut driver = PortalDriver::new(portal, &mut intents, &NoDelay);
    pipeline.run(store, &mut driver)
}
