mod common;

use std::path::Path;

use aade_filer::workflows::bookings::{BookingStatus, BookingStore, SqliteBookingStore};
use aade_filer::workflows::filing::FilingError;
use aade_filer::workflows::portal::vocabulary::{Bilingual, FormField, ELECTRONIC_PLATFORM_PAYMENT};
use aade_filer::workflows::portal::{
    DeclarationForm, Interaction, PortalError, PortalScenario, SimulatedPortal, SubmitOutcome,
};
use common::{
    cancelled_stay, evidence_of, filing_config, pipeline, run_pipeline, run_with_portal_intents,
    stay, status_of, store_with,
};
use tempfile::TempDir;

fn portal(name: &str) -> SimulatedPortal {
    SimulatedPortal::new(PortalScenario::named(name).expect("known scenario"))
}

#[test]
fn dry_run_fills_every_form_and_backs_out() {
    let dir = TempDir::new().expect("temp dir");
    let store = store_with(&[stay("HM-A", "John Smith"), stay("HM-B", "Klaus Mueller")]);
    let pipeline = pipeline(&filing_config(dir.path(), true));
    let mut portal = portal("ready");

    let (result, intents) = run_pipeline(&pipeline, &store, &mut portal);
    let summary = result.expect("run completes");

    assert_eq!(summary.selected, 2);
    assert_eq!(summary.dry_run_verified, 2);
    assert_eq!(summary.submitted, 0);
    assert_eq!(summary.evidence_captured, 2);
    assert_eq!(status_of(&store, "HM-A"), BookingStatus::DryRunVerified);
    assert_eq!(status_of(&store, "HM-B"), BookingStatus::DryRunVerified);

    assert_eq!(portal.submitted_forms().len(), 0);
    assert_eq!(portal.forms().len(), 2);
    let forms = portal.forms();
    let first = &forms[0].fields;
    assert_eq!(first.get("Arrival Date").map(String::as_str), Some("2025-01-15"));
    assert_eq!(first.get("Departure Date").map(String::as_str), Some("2025-01-20"));
    assert_eq!(first.get("Total Rent").map(String::as_str), Some("450.00"));
    assert_eq!(first.get("Platform").map(String::as_str), Some("Airbnb"));
    assert!(first.contains_key("Payment Method"));

    for platform_id in ["HM-A", "HM-B"] {
        let evidence = evidence_of(&store, platform_id).expect("evidence recorded");
        assert!(Path::new(&evidence).exists(), "{evidence}");
        assert!(Path::new(&format!("{evidence}.sha256")).exists());
    }
    assert!(intents.instructions.is_empty(), "{:?}", intents.instructions);
}

#[test]
fn production_run_submits_and_marks_bookings_submitted() {
    let dir = TempDir::new().expect("temp dir");
    let store = store_with(&[stay("HM-A", "John Smith"), stay("HM-B", "Klaus Mueller")]);
    let pipeline = pipeline(&filing_config(dir.path(), false));
    let mut portal = portal("ready");

    let (result, _) = run_pipeline(&pipeline, &store, &mut portal);
    let summary = result.expect("run completes");

    assert_eq!(summary.submitted, 2);
    assert_eq!(summary.dry_run_verified, 0);
    assert_eq!(portal.submitted_forms().len(), 2);
    assert_eq!(status_of(&store, "HM-A"), BookingStatus::Submitted);
    assert_eq!(status_of(&store, "HM-B"), BookingStatus::Submitted);
    assert!(evidence_of(&store, "HM-A").is_some());
}

#[test]
fn submitted_bookings_are_never_selected_again() {
    let dir = TempDir::new().expect("temp dir");
    let store = store_with(&[stay("HM-A", "John Smith")]);
    let mut config = filing_config(dir.path(), false);
    config.include_retry_later = true;
    let pipeline = pipeline(&config);

    let mut first = portal("ready");
    run_pipeline(&pipeline, &store, &mut first).0.expect("first run");
    assert_eq!(status_of(&store, "HM-A"), BookingStatus::Submitted);

    let mut second = portal("ready");
    let summary = run_pipeline(&pipeline, &store, &mut second)
        .0
        .expect("second run");
    assert_eq!(summary.selected, 0);
    assert!(second.interactions().is_empty());
    assert_eq!(status_of(&store, "HM-A"), BookingStatus::Submitted);
}

#[test]
fn dry_run_never_produces_submitted() {
    let dir = TempDir::new().expect("temp dir");
    let store = store_with(&[
        stay("HM-A", "John Smith"),
        cancelled_stay("HM-B", "Elena Rossi"),
    ]);
    let pipeline = pipeline(&filing_config(dir.path(), true));
    let mut portal = portal("ready");

    run_pipeline(&pipeline, &store, &mut portal).0.expect("run completes");

    assert_eq!(store.list_by_status(BookingStatus::Submitted).expect("list").len(), 0);
    assert!(portal
        .interactions()
        .iter()
        .all(|interaction| !matches!(interaction, Interaction::Click(selector) if selector.contains("Υποβολή"))));
}

#[test]
fn missing_property_stops_the_run_and_marks_everything_remaining() {
    let dir = TempDir::new().expect("temp dir");
    let store = store_with(&[
        stay("HM-A", "John Smith"),
        stay("HM-B", "Klaus Mueller"),
        stay("HM-C", "Sophie Dupont"),
    ]);
    let pipeline = pipeline(&filing_config(dir.path(), false));
    let mut portal = portal("no-properties");

    let summary = run_pipeline(&pipeline, &store, &mut portal)
        .0
        .expect("run completes");

    assert!(summary.halted_early);
    assert_eq!(summary.needs_property, 3);
    for platform_id in ["HM-A", "HM-B", "HM-C"] {
        assert_eq!(status_of(&store, platform_id), BookingStatus::NeedsProperty);
        assert_eq!(evidence_of(&store, platform_id), None);
    }
    // Only the session's opening navigation ever reached the portal.
    assert_eq!(
        portal.interactions(),
        vec![Interaction::Navigate(portal.scenario().entry_url)]
    );
}

#[test]
fn cancellations_fill_cancellation_fields_instead_of_rent() {
    let dir = TempDir::new().expect("temp dir");
    let store = store_with(&[
        cancelled_stay("HM-A", "Elena Rossi"),
        stay("HM-B", "John Smith"),
    ]);
    let pipeline = pipeline(&filing_config(dir.path(), false));
    let mut portal = portal("ready");

    run_pipeline(&pipeline, &store, &mut portal).0.expect("run completes");

    let forms = portal.submitted_forms();
    assert_eq!(forms.len(), 2);

    let cancelled = &forms[0].fields;
    assert_eq!(cancelled.get("Cancellation Amount").map(String::as_str), Some("120.00"));
    assert_eq!(cancelled.get("Cancellation Date").map(String::as_str), Some("2025-01-05"));
    assert!(!cancelled.contains_key("Total Rent"));

    let regular = &forms[1].fields;
    assert_eq!(regular.get("Total Rent").map(String::as_str), Some("450.00"));
    assert!(!regular.contains_key("Cancellation Amount"));
    assert!(!regular.contains_key("Cancellation Date"));

    assert_eq!(status_of(&store, "HM-A"), BookingStatus::Submitted);
    assert_eq!(status_of(&store, "HM-B"), BookingStatus::Submitted);
}

#[test]
fn cancellation_without_cancellation_fields_is_an_error() {
    let dir = TempDir::new().expect("temp dir");
    let store = store_with(&[
        cancelled_stay("HM-A", "Elena Rossi"),
        stay("HM-B", "John Smith"),
    ]);
    let form = DeclarationForm {
        cancellation_amount: None,
        cancellation_date: None,
        ..DeclarationForm::standard()
    };
    let pipeline = pipeline(&filing_config(dir.path(), true)).with_form(form.clone());
    let mut portal = SimulatedPortal::new(PortalScenario {
        form,
        ..PortalScenario::ready()
    });

    let summary = run_pipeline(&pipeline, &store, &mut portal)
        .0
        .expect("run completes");

    assert_eq!(summary.errors, 1);
    assert_eq!(status_of(&store, "HM-A"), BookingStatus::Error);
    assert_eq!(status_of(&store, "HM-B"), BookingStatus::DryRunVerified);
}

#[test]
fn maintenance_defers_bookings_until_a_retry_run() {
    let dir = TempDir::new().expect("temp dir");
    let store = store_with(&[stay("HM-A", "John Smith"), stay("HM-B", "Klaus Mueller")]);
    let mut config = filing_config(dir.path(), true);

    let mut down = portal("maintenance");
    let summary = run_pipeline(&pipeline(&config), &store, &mut down)
        .0
        .expect("run completes");
    assert_eq!(summary.retry_later, 2);
    assert_eq!(status_of(&store, "HM-A"), BookingStatus::RetryLater);
    assert_eq!(status_of(&store, "HM-B"), BookingStatus::RetryLater);

    // Without the flag nothing is picked up.
    let mut idle = portal("ready");
    let summary = run_pipeline(&pipeline(&config), &store, &mut idle)
        .0
        .expect("run completes");
    assert_eq!(summary.selected, 0);

    config.include_retry_later = true;
    let mut back = portal("ready");
    let summary = run_pipeline(&pipeline(&config), &store, &mut back)
        .0
        .expect("run completes");
    assert_eq!(summary.selected, 2);
    assert_eq!(summary.dry_run_verified, 2);
    assert_eq!(status_of(&store, "HM-A"), BookingStatus::DryRunVerified);
}

#[test]
fn rejected_submission_is_an_error_and_the_run_moves_on() {
    let dir = TempDir::new().expect("temp dir");
    let store = store_with(&[stay("HM-A", "John Smith"), stay("HM-B", "Klaus Mueller")]);
    let pipeline = pipeline(&filing_config(dir.path(), false));
    let mut portal = portal("rejected");

    let summary = run_pipeline(&pipeline, &store, &mut portal)
        .0
        .expect("run completes");

    assert_eq!(summary.errors, 1);
    assert_eq!(summary.submitted, 1);
    assert_eq!(status_of(&store, "HM-A"), BookingStatus::Error);
    // Evidence is taken before the submit click, so the rejected attempt keeps it.
    assert!(evidence_of(&store, "HM-A").is_some());
    assert_eq!(status_of(&store, "HM-B"), BookingStatus::Submitted);
}

#[test]
fn maintenance_after_submit_is_retried_later() {
    let dir = TempDir::new().expect("temp dir");
    let store = store_with(&[stay("HM-A", "John Smith")]);
    let pipeline = pipeline(&filing_config(dir.path(), false));
    let mut portal = SimulatedPortal::new(
        PortalScenario::ready().with_submit_outcomes(vec![SubmitOutcome::Maintenance]),
    );

    run_pipeline(&pipeline, &store, &mut portal).0.expect("run completes");

    assert_eq!(status_of(&store, "HM-A"), BookingStatus::RetryLater);
}

#[test]
fn unconfirmed_submission_is_an_error() {
    let dir = TempDir::new().expect("temp dir");
    let store = store_with(&[stay("HM-A", "John Smith")]);
    let pipeline = pipeline(&filing_config(dir.path(), false));
    let mut portal = SimulatedPortal::new(
        PortalScenario::ready().with_submit_outcomes(vec![SubmitOutcome::Unconfirmed]),
    );

    run_pipeline(&pipeline, &store, &mut portal).0.expect("run completes");

    assert_eq!(status_of(&store, "HM-A"), BookingStatus::Error);
}

#[test]
fn return_to_list_after_submit_counts_as_submitted() {
    let dir = TempDir::new().expect("temp dir");
    let store = store_with(&[stay("HM-A", "John Smith")]);
    let pipeline = pipeline(&filing_config(dir.path(), false));
    let mut portal = SimulatedPortal::new(
        PortalScenario::ready().with_submit_outcomes(vec![SubmitOutcome::ReturnToList]),
    );

    run_pipeline(&pipeline, &store, &mut portal).0.expect("run completes");

    assert_eq!(status_of(&store, "HM-A"), BookingStatus::Submitted);
}

#[test]
fn stuck_navigation_marks_each_booking_error() {
    let dir = TempDir::new().expect("temp dir");
    let store = store_with(&[stay("HM-A", "John Smith"), stay("HM-B", "Klaus Mueller")]);
    let pipeline = pipeline(&filing_config(dir.path(), true));
    let mut portal = portal("stuck");

    let summary = run_pipeline(&pipeline, &store, &mut portal)
        .0
        .expect("run completes");

    assert_eq!(summary.errors, 2);
    assert_eq!(status_of(&store, "HM-A"), BookingStatus::Error);
    assert_eq!(status_of(&store, "HM-B"), BookingStatus::Error);
    assert!(portal.forms().is_empty());
}

#[test]
fn login_timeout_halts_and_leaves_bookings_pending() {
    let dir = TempDir::new().expect("temp dir");
    let store = store_with(&[stay("HM-A", "John Smith"), stay("HM-B", "Klaus Mueller")]);
    let pipeline = pipeline(&filing_config(dir.path(), false));
    let mut portal = portal("login-timeout");

    let err = run_pipeline(&pipeline, &store, &mut portal)
        .0
        .expect_err("login never completes");

    match err {
        FilingError::Halted { source, summary } => {
            assert!(matches!(source, PortalError::LoginTimeout { .. }), "{source:?}");
            assert_eq!(summary.processed(), 0);
        }
        other => panic!("expected Halted, got {other:?}"),
    }
    assert_eq!(status_of(&store, "HM-A"), BookingStatus::Pending);
    assert_eq!(status_of(&store, "HM-B"), BookingStatus::Pending);
}

#[test]
fn unreachable_portal_halts_the_run() {
    let dir = TempDir::new().expect("temp dir");
    let store = store_with(&[stay("HM-A", "John Smith")]);
    let pipeline = pipeline(&filing_config(dir.path(), true));
    let mut portal = portal("unreachable");

    let err = run_pipeline(&pipeline, &store, &mut portal)
        .0
        .expect_err("portal down");

    assert!(matches!(
        err,
        FilingError::Halted {
            source: PortalError::PortalUnreachable { .. },
            ..
        }
    ));
    assert_eq!(status_of(&store, "HM-A"), BookingStatus::Pending);
}

#[test]
fn first_visit_goes_through_login_and_contact_form_once() {
    let dir = TempDir::new().expect("temp dir");
    let store = store_with(&[stay("HM-A", "John Smith"), stay("HM-B", "Klaus Mueller")]);
    let pipeline = pipeline(&filing_config(dir.path(), true));
    let mut portal = portal("first-visit");

    let summary = run_pipeline(&pipeline, &store, &mut portal)
        .0
        .expect("run completes");

    assert_eq!(summary.dry_run_verified, 2);
    assert_eq!(portal.contact_details().len(), 3);
}

#[test]
fn unreadable_stored_payout_is_an_error_without_portal_work() {
    let dir = TempDir::new().expect("temp dir");
    let db_path = dir.path().join("bookings.db");
    let store = SqliteBookingStore::open(&db_path).expect("store");
    store.insert(&stay("HM-A", "John Smith")).expect("insert");
    store.insert(&stay("HM-B", "Klaus Mueller")).expect("insert");

    let raw = rusqlite::Connection::open(&db_path).expect("raw connection");
    raw.execute(
        "UPDATE bookings SET total_payout = 'n/a' WHERE platform_id = 'HM-A'",
        [],
    )
    .expect("corrupt payout");
    drop(raw);

    let pipeline = pipeline(&filing_config(&dir.path().join("audit"), false));
    let mut portal = portal("ready");
    let summary = run_pipeline(&pipeline, &store, &mut portal)
        .0
        .expect("run completes");

    assert_eq!(summary.errors, 1);
    assert_eq!(summary.submitted, 1);
    assert_eq!(status_of(&store, "HM-A"), BookingStatus::Error);
    assert_eq!(evidence_of(&store, "HM-A"), None);
    assert_eq!(status_of(&store, "HM-B"), BookingStatus::Submitted);
    assert_eq!(portal.forms().len(), 1);
}

#[test]
fn unaddressable_registry_rows_are_read_and_opened_through_intents() {
    let dir = TempDir::new().expect("temp dir");
    let store = store_with(&[stay("HM-A", "John Smith")]);
    let pipeline = pipeline(&filing_config(dir.path(), false));
    let mut portal = portal("unaddressable-registry");

    let summary = run_with_portal_intents(&pipeline, &store, &mut portal).expect("run completes");

    assert_eq!(summary.submitted, 1);
    assert_eq!(status_of(&store, "HM-A"), BookingStatus::Submitted);
    assert_eq!(
        portal.instructions(),
        vec![
            "List the registered properties in the property table".to_string(),
            "In the property table, click the 'Δηλώσεις' link in the Actions column for property row 1"
                .to_string(),
        ]
    );
    assert_eq!(portal.submitted_forms().len(), 1);
}

#[test]
fn fields_missing_under_their_greek_label_are_entered_through_intents() {
    let dir = TempDir::new().expect("temp dir");
    let store = store_with(&[stay("HM-A", "John Smith")]);
    let standard = DeclarationForm::standard();
    let form = DeclarationForm {
        total_rent: FormField {
            label: Bilingual::new("Μίσθωμα Διαμονής", standard.total_rent.label.english),
            ..standard.total_rent.clone()
        },
        payment_method: FormField {
            label: Bilingual::new("Μέθοδος Πληρωμής", standard.payment_method.label.english),
            ..standard.payment_method.clone()
        },
        ..standard
    };
    let pipeline = pipeline(&filing_config(dir.path(), false)).with_form(form.clone());
    let mut portal = portal("ready");

    let summary = run_with_portal_intents(&pipeline, &store, &mut portal).expect("run completes");

    assert_eq!(summary.submitted, 1);
    assert_eq!(status_of(&store, "HM-A"), BookingStatus::Submitted);
    assert_eq!(
        portal.instructions(),
        vec![
            form.total_rent.fill_instruction("450.00"),
            form.payment_method
                .select_instruction(ELECTRONIC_PLATFORM_PAYMENT.greek),
        ]
    );
    let forms = portal.submitted_forms();
    let fields = &forms[0].fields;
    assert_eq!(fields.get("Total Rent").map(String::as_str), Some("450.00"));
    assert_eq!(
        fields.get("Payment Method").map(String::as_str),
        Some(ELECTRONIC_PLATFORM_PAYMENT.greek)
    );
    assert_eq!(fields.get("Platform").map(String::as_str), Some("Airbnb"));
}

#[test]
fn failing_intents_leave_unaddressable_bookings_for_a_later_run() {
    let dir = TempDir::new().expect("temp dir");
    let store = store_with(&[stay("HM-A", "John Smith")]);
    let pipeline = pipeline(&filing_config(dir.path(), false));
    let mut portal = portal("unaddressable-registry");

    let (result, intents) = run_pipeline(&pipeline, &store, &mut portal);
    result.expect("run completes");

    assert_eq!(
        intents.instructions,
        vec!["List the registered properties in the property table".to_string()]
    );
    assert_ne!(status_of(&store, "HM-A"), BookingStatus::Submitted);
    assert!(portal.submitted_forms().is_empty());
}
