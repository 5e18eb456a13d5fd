use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};

use super::audit::AuditRecorder;
use super::classifier::ErrorClassifier;
use crate::config::FilingConfig;
use crate::workflows::bookings::{Booking, BookingError, BookingStatus, BookingStore, StoreError};
use crate::workflows::portal::vocabulary::{
    FieldKind, FormField, AIRBNB_PLATFORM, BACK_BUTTON, ELECTRONIC_PLATFORM_PAYMENT, SUBMIT_BUTTON,
};
use crate::workflows::portal::{
    DeclarationForm, IntentError, MachineSettings, PageStateDetector, PortalDriver, PortalError,
    PortalState, PortalStateMachine, SessionError,
};

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub dry_run: bool,
    pub include_retry_later: bool,
    pub action_delay: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &FilingConfig) -> Self {
        Self {
            dry_run: config.dry_run,
            include_retry_later: config.include_retry_later,
            action_delay: config.action_delay,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&FilingConfig::default())
    }
}

/// Outcome counts of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub selected: usize,
    pub submitted: usize,
    pub dry_run_verified: usize,
    pub retry_later: usize,
    pub errors: usize,
    pub needs_property: usize,
    pub evidence_captured: usize,
    pub halted_early: bool,
}

impl RunSummary {
    fn record(&mut self, status: BookingStatus) {
        match status {
            BookingStatus::Submitted => self.submitted += 1,
            BookingStatus::DryRunVerified => self.dry_run_verified += 1,
            BookingStatus::RetryLater => self.retry_later += 1,
            BookingStatus::Error => self.errors += 1,
            BookingStatus::NeedsProperty => self.needs_property += 1,
            BookingStatus::Pending | BookingStatus::Cancelled => {}
        }
    }

    pub fn processed(&self) -> usize {
        self.submitted + self.dry_run_verified + self.retry_later + self.errors + self.needs_property
    }
}

/// Whole-run failures. Statuses written before the failure stay persisted.
#[derive(Debug, thiserror::Error)]
pub enum FilingError {
    #[error("run halted: {source}")]
    Halted {
        #[source]
        source: PortalError,
        summary: RunSummary,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why one booking's attempt stopped short of a written outcome.
#[derive(Debug, thiserror::Error)]
enum AttemptError {
    #[error(transparent)]
    Portal(#[from] PortalError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Intent(#[from] IntentError),
    #[error(transparent)]
    Invalid(#[from] BookingError),
    #[error("declaration form has no cancellation fields")]
    CancellationUnsupported,
    #[error("portal reported an error after submit")]
    Rejected,
    #[error("submission could not be confirmed (page state {state})")]
    Unconfirmed { state: PortalState },
}

enum BookingOutcome {
    Completed {
        status: BookingStatus,
        evidence: Option<PathBuf>,
    },
    Failed {
        status: BookingStatus,
        evidence: Option<PathBuf>,
        reason: String,
        needs_reset: bool,
    },
    NeedsProperty,
    Fatal(PortalError),
}

/// Files every selected booking through one portal session, one at a time.
#[derive(Debug)]
pub struct DeclarationSubmissionPipeline {
    machine: PortalStateMachine,
    classifier: ErrorClassifier,
    recorder: AuditRecorder,
    form: DeclarationForm,
    settings: PipelineSettings,
}

impl DeclarationSubmissionPipeline {
    pub fn new(machine: PortalStateMachine, recorder: AuditRecorder, settings: PipelineSettings) -> Self {
        Self {
            machine,
            classifier: ErrorClassifier,
            recorder,
            form: DeclarationForm::standard(),
            settings,
        }
    }

    pub fn from_config(config: &FilingConfig, recorder: AuditRecorder) -> Self {
        let machine = PortalStateMachine::new(
            PageStateDetector::standard(),
            MachineSettings::from_config(config),
        );
        Self::new(machine, recorder, PipelineSettings::from_config(config))
    }

    /// Replaces the declaration form layout the pipeline fills.
    pub fn with_form(mut self, form: DeclarationForm) -> Self {
        self.form = form;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// `PENDING` bookings, plus `RETRY_LATER` ones when enabled, by id.
    pub fn select(&self, store: &dyn BookingStore) -> Result<Vec<Booking>, StoreError> {
        let mut bookings = store.list_by_status(BookingStatus::Pending)?;
        if self.settings.include_retry_later {
            bookings.extend(store.list_by_status(BookingStatus::RetryLater)?);
            bookings.sort_by_key(|booking| booking.id);
        }
        Ok(bookings)
    }

    pub fn run(
        &self,
        store: &dyn BookingStore,
        driver: &mut PortalDriver<'_>,
    ) -> Result<RunSummary, FilingError> {
        let bookings = self.select(store)?;
        let mut summary = RunSummary {
            selected: bookings.len(),
            ..RunSummary::default()
        };
        if bookings.is_empty() {
            info!("no bookings awaiting declaration");
            return Ok(summary);
        }

        info!(
            bookings = bookings.len(),
            dry_run = self.settings.dry_run,
            "starting declaration run"
        );
        if let Err(err) = self.machine.establish_session(driver) {
            if err.is_fatal() {
                error!(error = %err, "could not establish a portal session");
                return Err(FilingError::Halted {
                    source: err,
                    summary,
                });
            }
            warn!(error = %err, "session setup incomplete; continuing per booking");
        }

        for (position, booking) in bookings.iter().enumerate() {
            info!(
                booking_id = %booking.id,
                platform_id = %booking.platform_id,
                guest = %booking.guest_name,
                cancelled = booking.is_cancelled,
                "processing booking"
            );

            match self.process(booking, driver) {
                BookingOutcome::Completed { status, evidence } => {
                    self.write(store, booking, status, evidence.as_ref(), &mut summary)?;
                }
                BookingOutcome::Failed {
                    status,
                    evidence,
                    reason,
                    needs_reset,
                } => {
                    warn!(
                        booking_id = %booking.id,
                        platform_id = %booking.platform_id,
                        %status,
                        reason = %reason,
                        "booking not filed"
                    );
                    self.write(store, booking, status, evidence.as_ref(), &mut summary)?;
                    if needs_reset {
                        if let Err(err) = self.machine.navigate_to_entry(driver) {
                            error!(error = %err, "could not reset the portal session");
                            return Err(FilingError::Halted {
                                source: err,
                                summary,
                            });
                        }
                    }
                }
                BookingOutcome::NeedsProperty => {
                    warn!(
                        remaining = bookings.len() - position,
                        "no registered property; marking remaining bookings NEEDS_PROPERTY"
                    );
                    for pending in &bookings[position..] {
                        self.write(store, pending, BookingStatus::NeedsProperty, None, &mut summary)?;
                    }
                    summary.halted_early = true;
                    break;
                }
                BookingOutcome::Fatal(err) => {
                    error!(
                        booking_id = %booking.id,
                        error = %err,
                        "portal session lost; stopping run"
                    );
                    return Err(FilingError::Halted {
                        source: err,
                        summary,
                    });
                }
            }
        }

        info!(
            submitted = summary.submitted,
            dry_run_verified = summary.dry_run_verified,
            retry_later = summary.retry_later,
            errors = summary.errors,
            needs_property = summary.needs_property,
            evidence = summary.evidence_captured,
            audit_dir = %self.recorder.dir().display(),
            "declaration run finished"
        );
        Ok(summary)
    }

    fn write(
        &self,
        store: &dyn BookingStore,
        booking: &Booking,
        status: BookingStatus,
        evidence: Option<&PathBuf>,
        summary: &mut RunSummary,
    ) -> Result<(), StoreError> {
        let evidence = evidence.map(|path| path.to_string_lossy().into_owned());
        store.update_status(booking.id, status, evidence.as_deref())?;
        summary.record(status);
        if evidence.is_some() {
            summary.evidence_captured += 1;
        }
        info!(booking_id = %booking.id, platform_id = %booking.platform_id, %status, "status recorded");
        Ok(())
    }

    fn process(&self, booking: &Booking, driver: &mut PortalDriver<'_>) -> BookingOutcome {
        if let Err(err) = booking.validate_for_filing() {
            return BookingOutcome::Failed {
                status: BookingStatus::Error,
                evidence: None,
                reason: err.to_string(),
                needs_reset: false,
            };
        }

        let mut evidence = None;
        match self.attempt(booking, driver, &mut evidence) {
            Ok(status) => BookingOutcome::Completed { status, evidence },
            Err(AttemptError::Portal(err)) if err.is_fatal() => BookingOutcome::Fatal(err),
            Err(AttemptError::Portal(PortalError::NoPropertiesRegistered)) => {
                BookingOutcome::NeedsProperty
            }
            Err(err @ AttemptError::Unconfirmed { .. }) => BookingOutcome::Failed {
                status: BookingStatus::Error,
                evidence,
                reason: err.to_string(),
                needs_reset: true,
            },
            Err(err) => {
                let signals = self.machine.detector().signals(&*driver.session);
                let class = self.classifier.classify(&err, signals);
                BookingOutcome::Failed {
                    status: class.status(),
                    evidence,
                    reason: err.to_string(),
                    needs_reset: true,
                }
            }
        }
    }

    fn attempt(
        &self,
        booking: &Booking,
        driver: &mut PortalDriver<'_>,
        evidence: &mut Option<PathBuf>,
    ) -> Result<BookingStatus, AttemptError> {
        self.machine.ensure_at_entry(driver)?;
        self.machine.drive_to_new_declaration(driver)?;
        self.fill_declaration(booking, driver)?;

        *evidence = self.recorder.capture(&mut *driver.session, &booking.platform_id);

        if self.settings.dry_run {
            driver.click_control(&BACK_BUTTON)?;
            self.machine.settle(driver)?;
            info!(platform_id = %booking.platform_id, "dry run: declaration filled, not submitted");
            return Ok(BookingStatus::DryRunVerified);
        }

        driver.click_control(&SUBMIT_BUTTON)?;
        self.machine.settle(driver)?;

        let detector = self.machine.detector();
        if detector.has_error_banner(&*driver.session) {
            return Err(AttemptError::Rejected);
        }
        let state = detector.detect(&*driver.session);
        if state.confirms_submission() {
            info!(platform_id = %booking.platform_id, %state, "declaration submitted");
            Ok(BookingStatus::Submitted)
        } else {
            Err(AttemptError::Unconfirmed { state })
        }
    }

    fn fill_declaration(&self, booking: &Booking, driver: &mut PortalDriver<'_>) -> Result<(), AttemptError> {
        let form = &self.form;
        self.enter(driver, &form.arrival_date, &booking.check_in.to_string())?;
        self.enter(driver, &form.departure_date, &booking.check_out.to_string())?;

        if booking.is_cancelled {
            let (amount, date) = form
                .cancellation_fields()
                .ok_or(AttemptError::CancellationUnsupported)?;
            let cancelled_on = booking
                .cancellation_date
                .ok_or(BookingError::MissingCancellationDate)?;
            self.enter(driver, amount, &booking.payout_text())?;
            self.enter(driver, date, &cancelled_on.to_string())?;
        } else {
            self.enter(driver, &form.total_rent, &booking.payout_text())?;
        }

        self.enter(driver, &form.payment_method, ELECTRONIC_PLATFORM_PAYMENT.greek)?;
        self.enter(driver, &form.platform, AIRBNB_PLATFORM.greek)?;
        Ok(())
    }

    /// Types or picks `value` in `field`, falling back to the intent executor
    /// when the portal does not expose the field under its Greek label.
    fn enter(&self, driver: &mut PortalDriver<'_>, field: &FormField, value: &str) -> Result<(), IntentError> {
        let direct = match field.kind {
            FieldKind::Select => driver.session.select_labeled(field.label.greek, value),
            FieldKind::Date | FieldKind::Number => driver.session.fill_labeled(field.label.greek, value),
        };
        if let Err(err) = direct {
            warn!(field = field.name, error = %err, "direct entry failed; using intent executor");
            driver.intents.perform_action(&field.instruction(value))?;
        }
        driver.pause(self.settings.action_delay);
        Ok(())
    }
}
