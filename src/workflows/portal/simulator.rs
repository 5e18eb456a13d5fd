//! Scripted stand-in for the declaration portal.
//!
//! Serves the same URLs, labels and selectors as the live site so the state
//! machine and pipeline run unchanged against it. Every interaction is
//! recorded for inspection. [`SimulatedIntents`] acts on the same page the
//! way a natural-language executor would.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::{json, Value};

use super::session::{IntentError, IntentExecutor, PageInspector, PortalSession, SessionError};
use super::vocabulary::{
    control_selector, Bilingual, DeclarationForm, ADD_PROPERTY_LINK, BACK_BUTTON, CONTINUE_BUTTON,
    DECLARATIONS_LINK, ERROR_BANNER_SELECTOR, MAINTENANCE, NEW_DECLARATION_BUTTON, NO_RESULTS,
    PROPERTY_ROW_SELECTOR, PROPERTY_TABLE_SELECTOR, SAVE_BUTTON, SESSION_EXPIRED, SUBMIT_BUTTON,
    SUCCESSFUL_SUBMISSION, TEXT_INPUT_SELECTOR,
};
use crate::config::DEFAULT_ENTRY_URL;

const LOGIN_URL: &str = "https://login.gsis.gr/oauth2server/oauth/authorize?client_id=taxisnet";
const USER_INFO_URL: &str = "https://www1.gsis.gr/taxisnet/mytaxisnet/userInfo";
const EXPIRED_URL: &str = "https://www1.gsis.gr/taxisnet/osso_logout";
const CONTACT_INPUTS: usize = 3;
const CONTACT_FIELDS: [&str; CONTACT_INPUTS] = ["Telephone", "Mobile", "Email"];
const CONTROLS: [Bilingual; 6] = [
    SAVE_BUTTON,
    CONTINUE_BUTTON,
    DECLARATIONS_LINK,
    NEW_DECLARATION_BUTTON,
    SUBMIT_BUTTON,
    BACK_BUTTON,
];

/// What the portal does when the final submit button is pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Confirmation page with the success message.
    Saved,
    /// Straight back to the property's declarations list.
    ReturnToList,
    /// Form stays open with an error banner.
    Rejected,
    /// Maintenance notice replaces the form.
    Maintenance,
    /// A blank page with neither confirmation nor error.
    Unconfirmed,
}

#[derive(Debug, Clone)]
pub struct PortalScenario {
    pub entry_url: String,
    pub already_logged_in: bool,
    /// Number of page checks after which the human completes login; `None`
    /// means never.
    pub login_after_checks: Option<usize>,
    pub contact_form_pending: bool,
    pub contact_confirmation: bool,
    /// Whether the contact inputs match the generic text-input selector.
    pub contact_inputs_addressable: bool,
    pub registered_properties: usize,
    /// Whether registry rows and their links match the known selectors.
    pub registry_addressable: bool,
    pub form: DeclarationForm,
    pub maintenance: bool,
    pub unreachable: bool,
    pub stuck_on_unknown: bool,
    pub session_expired: bool,
    pub snapshot_fails: bool,
    /// Consumed in order, one per submit; `Saved` once exhausted.
    pub submit_outcomes: Vec<SubmitOutcome>,
}

impl PortalScenario {
    /// Logged in, contact details on file, one registered property.
    pub fn ready() -> Self {
        Self {
            entry_url: DEFAULT_ENTRY_URL.to_string(),
            already_logged_in: true,
            login_after_checks: Some(0),
            contact_form_pending: false,
            contact_confirmation: false,
            contact_inputs_addressable: true,
            registered_properties: 1,
            registry_addressable: true,
            form: DeclarationForm::standard(),
            maintenance: false,
            unreachable: false,
            stuck_on_unknown: false,
            session_expired: false,
            snapshot_fails: false,
            submit_outcomes: Vec::new(),
        }
    }
    /// Manual login followed by the mandatory contact form.
    pub fn first_visit() -> Self {
        Self {
            already_logged_in: false,
            login_after_checks: Some(3),
            contact_form_pending: true,
            contact_confirmation: true,
            ..Self::ready()
        }
    }

    pub fn named(name: &str) -> Option<Self> {
        let scenario = match name {
            "ready" => Self::ready(),
            "first-visit" => Self::first_visit(),
            "no-properties" => Self {
                registered_properties: 0,
                ..Self::ready()
            },
            "maintenance" => Self {
                maintenance: true,
                ..Self::ready()
            },
            "login-timeout" => Self {
                login_after_checks: None,
                ..Self::first_visit()
            },
            "unreachable" => Self {
                unreachable: true,
                ..Self::ready()
            },
            "expired" => Self {
                session_expired: true,
                ..Self::ready()
            },
            "stuck" => Self {
                stuck_on_unknown: true,
                ..Self::ready()
            },
            "rejected" => Self::ready().with_submit_outcomes(vec![SubmitOutcome::Rejected]),
            "unaddressable-registry" => Self {
                registry_addressable: false,
                ..Self::ready()
            },
            _ => return None,
        };
        Some(scenario)
    }

    pub const NAMES: [&'static str; 10] = [
        "ready",
        "first-visit",
        "no-properties",
        "maintenance",
        "login-timeout",
        "unreachable",
        "expired",
        "stuck",
        "rejected",
        "unaddressable-registry",
    ];

    pub fn with_submit_outcomes(mut self, outcomes: Vec<SubmitOutcome>) -> Self {
        self.submit_outcomes = outcomes;
        self
    }
}

impl Default for PortalScenario {
    fn default() -> Self {
        Self::ready()
    }
}

/// One recorded call against the simulated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    Navigate(String),
    Click(String),
    Fill { target: String, value: String },
    Select { label: String, option: String },
    Snapshot,
    /// A natural-language instruction handed to the intent executor.
    Instruction(String),
}

/// A declaration form as it stood when submit or back was pressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormRecord {
    pub fields: BTreeMap<String, String>,
    pub submitted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Page {
    Login,
    UserInfo { saved: bool },
    Registry,
    Maintenance,
    Expired,
    Declarations,
    NewDeclaration { rejected: bool },
    Saved,
    Blank,
    Lost(usize),
}

/// The portal as both the session and the intent executor see it.
#[derive(Debug)]
struct World {
    scenario: PortalScenario,
    page: Page,
    logged_in: bool,
    login_checks: usize,
    contact_pending: bool,
    contact_inputs: [Option<String>; CONTACT_INPUTS],
    draft: BTreeMap<String, String>,
    submits: usize,
    lost_pages: usize,
    interactions: Vec<Interaction>,
    forms: Vec<FormRecord>,
}

impl World {
    fn new(scenario: PortalScenario) -> Self {
        Self {
            page: Page::Blank,
            logged_in: scenario.already_logged_in,
            login_checks: 0,
            contact_pending: scenario.contact_form_pending,
            contact_inputs: Default::default(),
            draft: BTreeMap::new(),
            submits: 0,
            lost_pages: 0,
            interactions: Vec::new(),
            forms: Vec::new(),
            scenario,
        }
    }

    fn entry_landing(&self) -> Page {
        if self.scenario.session_expired {
            Page::Expired
        } else if !self.logged_in {
            Page::Login
        } else if self.contact_pending {
            Page::UserInfo { saved: false }
        } else if self.scenario.maintenance {
            Page::Maintenance
        } else {
            Page::Registry
        }
    }

    /// The login page completes itself once the scripted number of checks
    /// has passed.
    fn observe(&mut self) -> String {
        if self.page == Page::Login {
            if let Some(after) = self.scenario.login_after_checks {
                self.login_checks += 1;
                if self.login_checks > after {
                    self.logged_in = true;
                    self.page = self.entry_landing();
                }
            }
        }
        self.url_of(self.page)
    }

    fn declarations_url(&self) -> String {
        format!("{}dilosi/1", base(&self.scenario.entry_url))
    }

    fn url_of(&self, page: Page) -> String {
        let base = base(&self.scenario.entry_url);
        match page {
            Page::Login => LOGIN_URL.to_string(),
            Page::UserInfo { .. } => USER_INFO_URL.to_string(),
            Page::Registry | Page::Maintenance => self.scenario.entry_url.clone(),
            Page::Expired => EXPIRED_URL.to_string(),
            Page::Declarations => self.declarations_url(),
            Page::NewDeclaration { .. } => format!("{base}nea-dilosi"),
            Page::Saved => format!("{base}views/result.xhtml"),
            Page::Blank => "about:blank".to_string(),
            Page::Lost(id) => format!("https://www1.gsis.gr/taxisnet/error?ref={id}"),
        }
    }

    fn texts(&self) -> Vec<String> {
        match self.page {
            Page::Login => vec!["TaxisNet".to_string(), "Σύνδεση".to_string()],
            Page::UserInfo { .. } => vec!["Στοιχεία Επικοινωνίας".to_string()],
            Page::Registry if self.scenario.registered_properties == 0 => {
                vec![NO_RESULTS.greek.to_string(), ADD_PROPERTY_LINK.greek.to_string()]
            }
            Page::Registry => self.property_rows(),
            Page::Maintenance => vec![format!(
                "{} συστήματος / System {}",
                MAINTENANCE.greek,
                MAINTENANCE.english.to_lowercase()
            )],
            Page::Expired => vec![SESSION_EXPIRED.greek.to_string()],
            Page::Declarations => vec![NEW_DECLARATION_BUTTON.greek.to_string()],
            Page::NewDeclaration { rejected } => {
                let mut texts = vec![NEW_DECLARATION_BUTTON.greek.to_string()];
                if rejected {
                    texts.push("Σφάλμα: μη έγκυρα στοιχεία δήλωσης".to_string());
                }
                texts
            }
            Page::Saved => vec![SUCCESSFUL_SUBMISSION.greek.to_string()],
            Page::Blank | Page::Lost(_) => Vec::new(),
        }
    }

    fn property_rows(&self) -> Vec<String> {
        (0..self.scenario.registered_properties)
            .map(|index| {
                format!(
                    "ΑΜΑ 00000{} Αθήνα {}",
                    index + 1,
                    DECLARATIONS_LINK.greek
                )
            })
            .collect()
    }

    /// Selectors of everything rendered on the page, addressable or not.
    fn present_selectors(&self) -> Vec<String> {
        match self.page {
            Page::UserInfo { saved: false } => vec![
                TEXT_INPUT_SELECTOR.to_string(),
                control_selector(&SAVE_BUTTON),
            ],
            Page::UserInfo { saved: true } => vec![control_selector(&CONTINUE_BUTTON)],
            Page::Registry => {
                let mut selectors = vec![PROPERTY_TABLE_SELECTOR.to_string()];
                if self.scenario.registered_properties > 0 {
                    selectors.push(PROPERTY_ROW_SELECTOR.to_string());
                    selectors.push(control_selector(&DECLARATIONS_LINK));
                }
                selectors
            }
            Page::Maintenance => vec![ERROR_BANNER_SELECTOR.to_string()],
            Page::Declarations => vec![control_selector(&NEW_DECLARATION_BUTTON)],
            Page::NewDeclaration { rejected } => {
                let mut selectors = vec![
                    control_selector(&SUBMIT_BUTTON),
                    control_selector(&BACK_BUTTON),
                ];
                if rejected {
                    selectors.push(ERROR_BANNER_SELECTOR.to_string());
                }
                selectors
            }
            _ => Vec::new(),
        }
    }

    fn unaddressable(&self, selector: &str) -> bool {
        let contact = !self.scenario.contact_inputs_addressable && selector == TEXT_INPUT_SELECTOR;
        let registry = !self.scenario.registry_addressable
            && (selector == PROPERTY_ROW_SELECTOR || selector == control_selector(&DECLARATIONS_LINK));
        contact || registry
    }

    fn is_present(&self, selector: &str) -> bool {
        self.present_selectors().iter().any(|shown| shown == selector)
    }

    fn is_visible(&self, selector: &str) -> bool {
        self.is_present(selector) && !self.unaddressable(selector)
    }

    fn count(&self, selector: &str) -> usize {
        if !self.is_visible(selector) {
            return 0;
        }
        match self.page {
            Page::UserInfo { saved: false } if selector == TEXT_INPUT_SELECTOR => CONTACT_INPUTS,
            Page::Registry if selector == PROPERTY_ROW_SELECTOR => self.scenario.registered_properties,
            _ => 1,
        }
    }

    fn field_name(&self, label: &str) -> Option<&'static str> {
        let form = &self.scenario.form;
        [
            Some(&form.arrival_date),
            Some(&form.departure_date),
            Some(&form.total_rent),
            form.cancellation_amount.as_ref(),
            form.cancellation_date.as_ref(),
            Some(&form.payment_method),
            Some(&form.platform),
        ]
        .into_iter()
        .flatten()
        .find(|field| field.label.greek == label || field.label.english == label)
        .map(|field| field.name)
    }

    fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        self.interactions.push(Interaction::Navigate(url.to_string()));
        if self.scenario.unreachable {
            return Err(SessionError::Navigation {
                url: url.to_string(),
                message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            });
        }

        let next = if self.scenario.stuck_on_unknown {
            self.lost_page()
        } else if base(url) == base(&self.scenario.entry_url) {
            self.entry_landing()
        } else if url == self.declarations_url() && self.logged_in {
            Page::Declarations
        } else {
            self.lost_page()
        };
        self.page = next;
        Ok(())
    }

    fn lost_page(&mut self) -> Page {
        self.lost_pages += 1;
        Page::Lost(self.lost_pages)
    }

    /// Effect of activating a control, however it was addressed.
    fn press(&mut self, selector: &str) -> Result<(), SessionError> {
        let next = if selector == control_selector(&SAVE_BUTTON) {
            if self.contact_inputs.iter().any(Option::is_none) {
                return Err(SessionError::Action {
                    action: "save contact details".to_string(),
                    message: "required fields are empty".to_string(),
                });
            }
            if self.scenario.contact_confirmation {
                Page::UserInfo { saved: true }
            } else {
                self.contact_pending = false;
                self.entry_landing()
            }
        } else if selector == control_selector(&CONTINUE_BUTTON) {
            self.contact_pending = false;
            self.entry_landing()
        } else if selector == control_selector(&DECLARATIONS_LINK) {
            Page::Declarations
        } else if selector == control_selector(&NEW_DECLARATION_BUTTON) {
            self.draft.clear();
            Page::NewDeclaration { rejected: false }
        } else if selector == control_selector(&SUBMIT_BUTTON) {
            self.submit();
            return Ok(());
        } else if selector == control_selector(&BACK_BUTTON) {
            self.leave_form(false);
            Page::Declarations
        } else {
            self.page
        };
        self.page = next;
        Ok(())
    }

    fn click(&mut self, selector: &str) -> Result<(), SessionError> {
        if !self.is_visible(selector) {
            return Err(SessionError::NotFound {
                target: selector.to_string(),
            });
        }
        self.interactions.push(Interaction::Click(selector.to_string()));
        self.press(selector)
    }

    fn fill_contact(&mut self, index: usize, value: &str) {
        self.contact_inputs[index] = Some(value.to_string());
    }

    fn fill_nth(&mut self, selector: &str, index: usize, value: &str) -> Result<(), SessionError> {
        let on_contact_form = matches!(self.page, Page::UserInfo { saved: false });
        let addressable = selector == TEXT_INPUT_SELECTOR && self.is_visible(selector);
        if !on_contact_form || !addressable || index >= CONTACT_INPUTS {
            return Err(SessionError::NotFound {
                target: format!("{selector} #{index}"),
            });
        }
        self.interactions.push(Interaction::Fill {
            target: format!("{selector} #{index}"),
            value: value.to_string(),
        });
        self.fill_contact(index, value);
        Ok(())
    }

    fn form_field(&self, label: &str) -> Result<String, SessionError> {
        let on_form = matches!(self.page, Page::NewDeclaration { .. });
        on_form
            .then(|| self.field_name(label))
            .flatten()
            .map(str::to_string)
            .ok_or_else(|| SessionError::NotFound {
                target: label.to_string(),
            })
    }

    fn fill_labeled(&mut self, label: &str, value: &str) -> Result<(), SessionError> {
        let name = self.form_field(label)?;
        self.interactions.push(Interaction::Fill {
            target: name.clone(),
            value: value.to_string(),
        });
        self.draft.insert(name, value.to_string());
        Ok(())
    }

    fn select_labeled(&mut self, label: &str, option: &str) -> Result<(), SessionError> {
        let name = self.form_field(label)?;
        self.interactions.push(Interaction::Select {
            label: name.clone(),
            option: option.to_string(),
        });
        self.draft.insert(name, option.to_string());
        Ok(())
    }

    fn leave_form(&mut self, submitted: bool) {
        self.forms.push(FormRecord {
            fields: std::mem::take(&mut self.draft),
            submitted,
        });
    }

    fn submit(&mut self) {
        let outcome = self
            .scenario
            .submit_outcomes
            .get(self.submits)
            .copied()
            .unwrap_or(SubmitOutcome::Saved);
        self.submits += 1;

        let next = match outcome {
            SubmitOutcome::Saved => Page::Saved,
            SubmitOutcome::ReturnToList => Page::Declarations,
            SubmitOutcome::Rejected => Page::NewDeclaration { rejected: true },
            SubmitOutcome::Maintenance => Page::Maintenance,
            SubmitOutcome::Unconfirmed => Page::Blank,
        };
        if outcome == SubmitOutcome::Rejected {
            // The draft stays on screen; record what was attempted.
            self.forms.push(FormRecord {
                fields: self.draft.clone(),
                submitted: true,
            });
        } else {
            self.leave_form(true);
        }
        self.page = next;
    }

    fn snapshot(&mut self) -> Result<Vec<u8>, SessionError> {
        self.interactions.push(Interaction::Snapshot);
        if self.scenario.snapshot_fails {
            return Err(SessionError::Action {
                action: "snapshot".to_string(),
                message: "renderer crashed".to_string(),
            });
        }

        let mut rendered = format!("url: {}\n", self.url_of(self.page));
        for text in self.texts() {
            rendered.push_str(&format!("text: {text}\n"));
        }
        for (field, value) in &self.draft {
            rendered.push_str(&format!("field: {field} = {value}\n"));
        }
        Ok(rendered.into_bytes())
    }

    /// Carries out an instruction in the phrasing the filing workflow uses.
    fn follow(&mut self, instruction: &str) -> Result<(), String> {
        self.interactions
            .push(Interaction::Instruction(instruction.to_string()));
        let quoted: Vec<&str> = instruction.split('\'').skip(1).step_by(2).collect();

        if let Some(typed) = instruction.strip_prefix("Type ") {
            let (value, field) = typed
                .strip_suffix(" field")
                .and_then(|rest| rest.rsplit_once(" in the "))
                .ok_or("no field named")?;
            let index = CONTACT_FIELDS
                .iter()
                .position(|known| *known == field)
                .ok_or_else(|| format!("no {field} field on this page"))?;
            if !matches!(self.page, Page::UserInfo { saved: false }) {
                return Err("contact form is not open".to_string());
            }
            self.fill_contact(index, value);
            return Ok(());
        }

        if instruction.starts_with("Fill the field") {
            let (_, value) = instruction
                .split_once("with value: ")
                .ok_or("no value given")?;
            let label = self.known_label(&quoted)?;
            return self.fill_labeled(label, value).map_err(|err| err.to_string());
        }

        if instruction.starts_with("Select ") {
            let (option, labels) = quoted.split_first().ok_or("no option given")?;
            let label = self.known_label(labels)?;
            return self
                .select_labeled(label, option)
                .map_err(|err| err.to_string());
        }

        if instruction.starts_with("In the property table") {
            let row = instruction
                .rsplit(' ')
                .next()
                .and_then(|token| token.parse::<usize>().ok())
                .ok_or("no property row given")?;
            let on_registry = self.page == Page::Registry;
            if !on_registry || row == 0 || row > self.scenario.registered_properties {
                return Err(format!("property row {row} is not shown"));
            }
            self.page = Page::Declarations;
            return Ok(());
        }

        if instruction.starts_with("Click ") {
            let selector = CONTROLS
                .iter()
                .find(|control| quoted.contains(&control.greek) || quoted.contains(&control.english))
                .map(control_selector)
                .filter(|selector| self.is_present(selector))
                .ok_or("no such control on this page")?;
            return self.press(&selector).map_err(|err| err.to_string());
        }

        Err("instruction not understood".to_string())
    }

    fn known_label<'a>(&self, labels: &[&'a str]) -> Result<&'a str, String> {
        labels
            .iter()
            .copied()
            .find(|label| self.field_name(label).is_some())
            .ok_or_else(|| format!("no field labeled {labels:?}"))
    }

    fn read_properties(&mut self, instruction: &str) -> Option<Value> {
        self.interactions
            .push(Interaction::Instruction(instruction.to_string()));
        if self.page != Page::Registry || self.scenario.registered_properties == 0 {
            return None;
        }
        let properties: Vec<Value> = self
            .property_rows()
            .into_iter()
            .enumerate()
            .map(|(index, label)| json!({ "index": index, "label": label, "hasDeclarations": true }))
            .collect();
        Some(json!({ "properties": properties }))
    }
}

fn base(entry_url: &str) -> String {
    format!("{}/", entry_url.trim_end_matches('/'))
}

/// Session half of the simulated portal.
#[derive(Debug)]
pub struct SimulatedPortal {
    world: Rc<RefCell<World>>,
}

impl SimulatedPortal {
    pub fn new(scenario: PortalScenario) -> Self {
        Self {
            world: Rc::new(RefCell::new(World::new(scenario))),
        }
    }

    /// An intent executor acting on this portal's pages.
    pub fn intents(&self) -> SimulatedIntents {
        SimulatedIntents {
            world: Rc::clone(&self.world),
        }
    }

    pub fn scenario(&self) -> PortalScenario {
        self.world.borrow().scenario.clone()
    }

    pub fn interactions(&self) -> Vec<Interaction> {
        self.world.borrow().interactions.clone()
    }

    pub fn navigations(&self) -> usize {
        self.world
            .borrow()
            .interactions
            .iter()
            .filter(|interaction| matches!(interaction, Interaction::Navigate(_)))
            .count()
    }

    /// Instructions handed to [`SimulatedIntents`], in order.
    pub fn instructions(&self) -> Vec<String> {
        self.world
            .borrow()
            .interactions
            .iter()
            .filter_map(|interaction| match interaction {
                Interaction::Instruction(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Forms left via submit or back, in order.
    pub fn forms(&self) -> Vec<FormRecord> {
        self.world.borrow().forms.clone()
    }

    pub fn submitted_forms(&self) -> Vec<FormRecord> {
        self.world
            .borrow()
            .forms
            .iter()
            .filter(|form| form.submitted)
            .cloned()
            .collect()
    }

    pub fn contact_details(&self) -> Vec<String> {
        self.world
            .borrow()
            .contact_inputs
            .iter()
            .flatten()
            .cloned()
            .collect()
    }
}

impl PageInspector for SimulatedPortal {
    fn current_url(&self) -> String {
        self.world.borrow_mut().observe()
    }

    fn text_visible(&self, text: &str) -> bool {
        self.world
            .borrow()
            .texts()
            .iter()
            .any(|shown| shown.contains(text))
    }

    fn element_visible(&self, selector: &str) -> bool {
        self.world.borrow().is_visible(selector)
    }
}

impl PortalSession for SimulatedPortal {
    fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        self.world.borrow_mut().navigate(url)
    }

    fn wait_until_settled(&mut self) -> Result<(), SessionError> {
        Ok(())
    }

    fn count(&self, selector: &str) -> usize {
        self.world.borrow().count(selector)
    }

    fn visible_texts(&self, selector: &str) -> Vec<String> {
        let world = self.world.borrow();
        if world.page == Page::Registry && selector == PROPERTY_ROW_SELECTOR && world.is_visible(selector) {
            world.property_rows()
        } else {
            Vec::new()
        }
    }

    fn click(&mut self, selector: &str) -> Result<(), SessionError> {
        self.world.borrow_mut().click(selector)
    }

    fn fill_nth(&mut self, selector: &str, index: usize, value: &str) -> Result<(), SessionError> {
        self.world.borrow_mut().fill_nth(selector, index, value)
    }

    fn fill_labeled(&mut self, label: &str, value: &str) -> Result<(), SessionError> {
        self.world.borrow_mut().fill_labeled(label, value)
    }

    fn select_labeled(&mut self, label: &str, option: &str) -> Result<(), SessionError> {
        self.world.borrow_mut().select_labeled(label, option)
    }

    fn snapshot(&mut self) -> Result<Vec<u8>, SessionError> {
        self.world.borrow_mut().snapshot()
    }
}

/// Intent executor for a [`SimulatedPortal`].
///
/// Understands the instructions the state machine and pipeline issue and
/// applies them to the shared page, so fallback paths change portal state
/// just as a live executor would.
#[derive(Debug, Clone)]
pub struct SimulatedIntents {
    world: Rc<RefCell<World>>,
}

impl IntentExecutor for SimulatedIntents {
    fn perform_action(&mut self, instruction: &str) -> Result<(), IntentError> {
        self.world
            .borrow_mut()
            .follow(instruction)
            .map_err(|message| IntentError::Failed {
                instruction: instruction.to_string(),
                message,
            })
    }

    fn extract_structured(&mut self, instruction: &str, _shape: &Value) -> Result<Value, IntentError> {
        self.world
            .borrow_mut()
            .read_properties(instruction)
            .ok_or_else(|| IntentError::Failed {
                instruction: instruction.to_string(),
                message: "no property table on this page".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::portal::{PageStateDetector, PortalState};

    #[test]
    fn entry_lands_on_login_until_enough_checks() {
        let mut portal = SimulatedPortal::new(PortalScenario::first_visit());
        portal.navigate(DEFAULT_ENTRY_URL).expect("navigate");
        let detector = PageStateDetector::standard();

        for _ in 0..3 {
            assert_eq!(detector.detect(&portal), PortalState::Login);
        }
        assert_eq!(detector.detect(&portal), PortalState::UserInfo);
    }

    #[test]
    fn registry_without_properties_shows_no_results() {
        let mut portal = SimulatedPortal::new(PortalScenario::named("no-properties").expect("scenario"));
        portal.navigate(DEFAULT_ENTRY_URL).expect("navigate");
        let detector = PageStateDetector::standard();

        assert_eq!(detector.detect(&portal), PortalState::PropertyRegistry);
        assert!(detector.has_no_registered_properties(&portal));
        assert!(portal.visible_texts(PROPERTY_ROW_SELECTOR).is_empty());
    }

    #[test]
    fn form_rejects_fields_it_does_not_declare() {
        let mut scenario = PortalScenario::ready();
        scenario.form.cancellation_amount = None;
        let mut portal = SimulatedPortal::new(scenario);
        portal.navigate(DEFAULT_ENTRY_URL).expect("navigate");
        portal
            .click(&control_selector(&DECLARATIONS_LINK))
            .expect("open declarations");
        portal
            .click(&control_selector(&NEW_DECLARATION_BUTTON))
            .expect("new declaration");

        assert!(portal.fill_labeled("Ημερομηνία Άφιξης", "2025-01-15").is_ok());
        assert!(matches!(
            portal.fill_labeled("Συνολικό Ποσό Ακύρωσης", "450.00"),
            Err(SessionError::NotFound { .. })
        ));
    }

    #[test]
    fn unaddressable_registry_hides_rows_but_not_the_table() {
        let mut portal = SimulatedPortal::new(PortalScenario::named("unaddressable-registry").expect("scenario"));
        portal.navigate(DEFAULT_ENTRY_URL).expect("navigate");

        assert!(portal.element_visible(PROPERTY_TABLE_SELECTOR));
        assert!(!portal.element_visible(&control_selector(&DECLARATIONS_LINK)));
        assert_eq!(portal.count(PROPERTY_ROW_SELECTOR), 0);
        assert!(portal.visible_texts(PROPERTY_ROW_SELECTOR).is_empty());
        assert!(portal.click(&control_selector(&DECLARATIONS_LINK)).is_err());
    }

    #[test]
    fn intents_act_on_the_shared_page() {
        let mut portal = SimulatedPortal::new(PortalScenario::named("unaddressable-registry").expect("scenario"));
        portal.navigate(DEFAULT_ENTRY_URL).expect("navigate");
        let mut intents = portal.intents();

        let listing = intents
            .extract_structured("List the registered properties", &Value::Null)
            .expect("table readable");
        assert_eq!(listing["properties"][0]["index"], 0);
        assert_eq!(listing["properties"][0]["hasDeclarations"], true);

        assert!(intents
            .perform_action("In the property table, click the 'Δηλώσεις' link in the Actions column for property row 2")
            .is_err());
        intents
            .perform_action("In the property table, click the 'Δηλώσεις' link in the Actions column for property row 1")
            .expect("row exists");
        assert_eq!(
            PageStateDetector::standard().detect(&portal),
            PortalState::DeclarationsList
        );

        intents
            .perform_action("Click the 'Νέα Δήλωση' or 'New Declaration' button")
            .expect("control present");
        intents
            .perform_action("Fill the field labeled 'Άγνωστο' (or 'Total Agreed Rent') with value: 450.00")
            .expect("english label resolves");
        intents
            .perform_action("Select 'Airbnb' from the 'Ηλεκτρονική Πλατφόρμα' (or 'Electronic Platform') dropdown")
            .expect("dropdown resolves");
        assert_eq!(portal.instructions().len(), 6);
        assert!(matches!(
            intents.perform_action("Wave at the screen"),
            Err(IntentError::Failed { .. })
        ));
    }

    #[test]
    fn typed_contact_details_land_in_their_inputs() {
        let mut portal = SimulatedPortal::new(PortalScenario {
            contact_inputs_addressable: false,
            ..PortalScenario::first_visit()
        });
        portal.navigate(DEFAULT_ENTRY_URL).expect("navigate");
        let detector = PageStateDetector::standard();
        for _ in 0..4 {
            detector.detect(&portal);
        }
        assert_eq!(detector.detect(&portal), PortalState::UserInfo);
        assert_eq!(portal.count(TEXT_INPUT_SELECTOR), 0);
        assert!(portal.fill_nth(TEXT_INPUT_SELECTOR, 0, "2101234567").is_err());

        let mut intents = portal.intents();
        intents
            .perform_action("Type 2101234567 in the Telephone field")
            .expect("telephone");
        intents
            .perform_action("Type host@example.com in the Email field")
            .expect("email");
        assert!(intents.perform_action("Type 1 in the Fax field").is_err());

        assert_eq!(
            portal.contact_details(),
            vec!["2101234567".to_string(), "host@example.com".to_string()]
        );
    }

    #[test]
    fn every_named_scenario_resolves() {
        for name in PortalScenario::NAMES {
            assert!(PortalScenario::named(name).is_some(), "{name}");
        }
        assert!(PortalScenario::named("haunted").is_none());
    }
}
