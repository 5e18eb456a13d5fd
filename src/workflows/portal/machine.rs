use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::detector::PageStateDetector;
use super::session::{IntentError, PortalDriver, SessionError};
use super::state::PortalState;
use super::vocabulary::{
    control_selector, CONTINUE_BUTTON, DECLARATIONS_LINK, NEW_DECLARATION_BUTTON,
    PROPERTY_ROW_SELECTOR, SAVE_BUTTON, TEXT_INPUT_SELECTOR,
};
use crate::config::{ContactDetails, FilingConfig};

pub const DEFAULT_MAX_TRANSITIONS: usize = 5;

const LOGIN_PROGRESS_EVERY: Duration = Duration::from_secs(10);

/// Timing and identity inputs of the state machine.
#[derive(Debug, Clone)]
pub struct MachineSettings {
    pub max_transitions: usize,
    pub max_login_wait: Duration,
    pub poll_interval: Duration,
    pub settle_delay: Duration,
    pub action_delay: Duration,
    pub entry_url: String,
    pub contact: ContactDetails,
}

impl MachineSettings {
    pub fn from_config(config: &FilingConfig) -> Self {
        Self {
            max_transitions: DEFAULT_MAX_TRANSITIONS,
            max_login_wait: config.max_login_wait,
            poll_interval: config.poll_interval,
            settle_delay: config.settle_delay,
            action_delay: config.action_delay,
            entry_url: config.entry_url.clone(),
            contact: config.contact.clone(),
        }
    }
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self::from_config(&FilingConfig::default())
    }
}

/// A row of the property registry the session can declare against.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredProperty {
    pub index: usize,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub has_declarations: bool,
}

#[derive(Debug, Deserialize)]
struct PropertyListing {
    #[serde(default)]
    properties: Vec<RegisteredProperty>,
}

#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("login was not observed within {}s", .waited.as_secs())]
    LoginTimeout { waited: Duration },
    #[error("portal entry {url} is unreachable: {source}")]
    PortalUnreachable {
        url: String,
        #[source]
        source: SessionError,
    },
    #[error("portal session has expired")]
    SessionExpired,
    #[error("no properties are registered for short-term letting")]
    NoPropertiesRegistered,
    #[error("property registry shows no selectable rows")]
    PropertiesNotFound,
    #[error("portal is showing a maintenance notice")]
    MaintenanceNotice,
    #[error("could not reach the declaration form (stuck at {state} after {transitions} transitions)")]
    Stuck {
        state: PortalState,
        transitions: usize,
    },
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Intent(#[from] IntentError),
}

impl PortalError {
    /// Failures that leave no usable session for the rest of the run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::LoginTimeout { .. } | Self::PortalUnreachable { .. } | Self::SessionExpired
        )
    }
}

/// Walks the portal from wherever the session is to a blank declaration form.
#[derive(Debug, Clone, Default)]
pub struct PortalStateMachine {
    detector: PageStateDetector,
    settings: MachineSettings,
}

impl PortalStateMachine {
    pub fn new(detector: PageStateDetector, settings: MachineSettings) -> Self {
        Self { detector, settings }
    }

    pub fn detector(&self) -> &PageStateDetector {
        &self.detector
    }

    pub fn current_state(&self, driver: &PortalDriver<'_>) -> PortalState {
        self.detector.detect(&*driver.session)
    }

    /// Opens the entry page and gets past login and the contact form.
    pub fn establish_session(&self, driver: &mut PortalDriver<'_>) -> Result<(), PortalError> {
        self.navigate_to_entry(driver)?;

        if self.current_state(driver) == PortalState::Login {
            self.wait_for_login(driver)?;
        }
        if self.current_state(driver) == PortalState::UserInfo {
            self.fill_contact_details(driver)?;
        }
        if self.detector.has_session_expired(&*driver.session) {
            return Err(PortalError::SessionExpired);
        }

        info!(state = %self.current_state(driver), "portal session established");
        Ok(())
    }

    /// Navigates to the entry page unless the session is already there.
    pub fn ensure_at_entry(&self, driver: &mut PortalDriver<'_>) -> Result<(), PortalError> {
        let current = driver.session.current_url();
        if same_page(&current, &self.settings.entry_url) {
            return Ok(());
        }
        self.navigate_to_entry(driver)
    }

    pub fn navigate_to_entry(&self, driver: &mut PortalDriver<'_>) -> Result<(), PortalError> {
        let url = self.settings.entry_url.as_str();
        debug!(url, "navigating to portal entry");
        driver
            .session
            .navigate(url)
            .map_err(|source| PortalError::PortalUnreachable {
                url: url.to_string(),
                source,
            })?;
        self.settle(driver)
    }

    /// Runs per-state handlers until the new declaration form is showing.
    pub fn drive_to_new_declaration(&self, driver: &mut PortalDriver<'_>) -> Result<(), PortalError> {
        let mut state = self.current_state(driver);
        let mut transitions = 0;

        while state != PortalState::NewDeclaration {
            if transitions >= self.settings.max_transitions {
                return Err(PortalError::Stuck { state, transitions });
            }
            debug!(%state, description = state.description(), transitions, "handling portal state");
            self.handle(state, driver)?;
            transitions += 1;
            state = self.current_state(driver);
        }

        debug!(transitions, "declaration form ready");
        Ok(())
    }

    fn handle(&self, state: PortalState, driver: &mut PortalDriver<'_>) -> Result<(), PortalError> {
        match state {
            PortalState::Login => self.wait_for_login(driver),
            PortalState::UserInfo => self.fill_contact_details(driver),
            PortalState::PropertyRegistry => self.open_property_declarations(driver),
            PortalState::DeclarationsList => self.start_new_declaration(driver),
            PortalState::NewDeclaration => Ok(()),
            PortalState::DeclarationSaved | PortalState::Unknown => self.recover(driver),
        }
    }

    /// Polls for a human-completed login; the only way out is success or the
    /// configured deadline.
    pub fn wait_for_login(&self, driver: &mut PortalDriver<'_>) -> Result<(), PortalError> {
        let max_wait = self.settings.max_login_wait;
        let interval = self.settings.poll_interval.max(Duration::from_millis(1));
        info!(
            max_wait_secs = max_wait.as_secs(),
            "manual login required; complete the TaxisNet login in the browser"
        );

        let mut waited = Duration::ZERO;
        let mut next_progress = LOGIN_PROGRESS_EVERY;
        while waited < max_wait {
            driver.pause(interval);
            waited += interval;

            if self.detector.is_logged_in(&*driver.session) {
                info!(waited_secs = waited.as_secs(), "login detected");
                return self.settle(driver);
            }
            if waited >= next_progress {
                info!(waited_secs = waited.as_secs(), "still waiting for login");
                next_progress += LOGIN_PROGRESS_EVERY;
            }
        }

        Err(PortalError::LoginTimeout { waited })
    }

    fn fill_contact_details(&self, driver: &mut PortalDriver<'_>) -> Result<(), PortalError> {
        let contact = &self.settings.contact;
        let values = [
            ("Telephone", contact.phone.as_str()),
            ("Mobile", contact.mobile.as_str()),
            ("Email", contact.email.as_str()),
        ];

        let filled_directly = driver.session.count(TEXT_INPUT_SELECTOR) >= values.len()
            && match self.fill_contact_inputs(driver, &values) {
                Ok(()) => true,
                Err(err) => {
                    warn!(error = %err, "direct contact entry failed; using intent executor");
                    false
                }
            };
        if !filled_directly {
            for (field, value) in values {
                driver
                    .intents
                    .perform_action(&format!("Type {value} in the {field} field"))?;
                driver.pause(self.settings.action_delay);
            }
        }

        driver.click_control(&SAVE_BUTTON)?;
        self.settle(driver)?;

        let continue_selector = control_selector(&CONTINUE_BUTTON);
        if driver.session.element_visible(&continue_selector) {
            debug!("advancing past contact confirmation");
            driver.session.click(&continue_selector)?;
            self.settle(driver)?;
        }

        info!("contact details saved");
        Ok(())
    }

    fn fill_contact_inputs(
        &self,
        driver: &mut PortalDriver<'_>,
        values: &[(&str, &str)],
    ) -> Result<(), SessionError> {
        for (index, (_, value)) in values.iter().enumerate() {
            driver.session.fill_nth(TEXT_INPUT_SELECTOR, index, value)?;
            driver.pause(self.settings.action_delay);
        }
        Ok(())
    }

    fn open_property_declarations(&self, driver: &mut PortalDriver<'_>) -> Result<(), PortalError> {
        if self.detector.has_no_registered_properties(&*driver.session) {
            warn!("no properties registered; register one in the portal before filing");
            return Err(PortalError::NoPropertiesRegistered);
        }

        let properties = self.discover_properties(driver);
        let Some(selected) = select_property(&properties) else {
            return Err(PortalError::PropertiesNotFound);
        };
        info!(
            found = properties.len(),
            row = selected.index + 1,
            "selecting registered property"
        );

        let link = control_selector(&DECLARATIONS_LINK);
        if driver.session.element_visible(&link) {
            driver.session.click(&link)?;
        } else {
            driver.intents.perform_action(&format!(
                "In the property table, click the '{}' link in the Actions column for property row {}",
                DECLARATIONS_LINK.greek,
                selected.index + 1
            ))?;
        }
        self.settle(driver)
    }

    /// Visible registry rows, or the intent executor's reading of the table
    /// when no row can be addressed directly.
    pub fn discover_properties(&self, driver: &mut PortalDriver<'_>) -> Vec<RegisteredProperty> {
        let rows = driver.session.visible_texts(PROPERTY_ROW_SELECTOR);
        if !rows.is_empty() {
            return rows
                .into_iter()
                .enumerate()
                .map(|(index, text)| RegisteredProperty {
                    index,
                    has_declarations: text.contains(DECLARATIONS_LINK.greek),
                    label: text.trim().to_string(),
                })
                .collect();
        }

        let shape = json!({
            "properties": [{ "index": "number", "label": "string", "hasDeclarations": "boolean" }]
        });
        let extracted = driver
            .intents
            .extract_structured("List the registered properties in the property table", &shape)
            .and_then(|value| {
                serde_json::from_value::<PropertyListing>(value)
                    .map_err(|err| IntentError::Shape(err.to_string()))
            });
        match extracted {
            Ok(listing) => listing.properties,
            Err(err) => {
                warn!(error = %err, "could not read the property registry");
                Vec::new()
            }
        }
    }

    fn start_new_declaration(&self, driver: &mut PortalDriver<'_>) -> Result<(), PortalError> {
        driver.click_control(&NEW_DECLARATION_BUTTON)?;
        self.settle(driver)
    }

    fn recover(&self, driver: &mut PortalDriver<'_>) -> Result<(), PortalError> {
        let page = &*driver.session;
        if self.detector.has_session_expired(page) {
            return Err(PortalError::SessionExpired);
        }
        if self.detector.has_maintenance_notice(page) {
            return Err(PortalError::MaintenanceNotice);
        }
        debug!(url = %page.current_url(), "unrecognised page; returning to entry");
        self.navigate_to_entry(driver)
    }

    /// Waits for the page to load, then holds for the configured settle delay.
    pub fn settle(&self, driver: &mut PortalDriver<'_>) -> Result<(), PortalError> {
        driver.session.wait_until_settled()?;
        driver.pause(self.settings.settle_delay);
        Ok(())
    }
}

/// First property that already offers a declarations link, else the first row.
fn select_property(properties: &[RegisteredProperty]) -> Option<&RegisteredProperty> {
    properties
        .iter()
        .find(|property| property.has_declarations)
        .or_else(|| properties.first())
}

fn same_page(current: &str, target: &str) -> bool {
    current.trim_end_matches('/') == target.trim_end_matches('/')
}
