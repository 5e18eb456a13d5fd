use std::fmt::Debug;
use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use super::vocabulary::{click_instruction, control_selector, Bilingual};

/// Read-only view of the page currently shown in the portal session.
///
/// Visibility checks never fail: anything that cannot be inspected counts as
/// not visible.
pub trait PageInspector {
    fn current_url(&self) -> String;
    fn text_visible(&self, text: &str) -> bool;
    fn element_visible(&self, selector: &str) -> bool;
}

/// The single live browsing session a run drives.
///
/// Every method addresses the page directly (URL, selector or field label);
/// none of them involve the intent executor.
pub trait PortalSession: PageInspector + Debug {
    fn navigate(&mut self, url: &str) -> Result<(), SessionError>;
    /// Bounded wait for the page to finish loading after an action.
    fn wait_until_settled(&mut self) -> Result<(), SessionError>;
    fn count(&self, selector: &str) -> usize;
    /// Text content of each visible element matching `selector`.
    fn visible_texts(&self, selector: &str) -> Vec<String>;
    /// Clicks the first visible element matching `selector`.
    fn click(&mut self, selector: &str) -> Result<(), SessionError>;
    fn fill_nth(&mut self, selector: &str, index: usize, value: &str) -> Result<(), SessionError>;
    fn fill_labeled(&mut self, label: &str, value: &str) -> Result<(), SessionError>;
    fn select_labeled(&mut self, label: &str, option: &str) -> Result<(), SessionError>;
    /// Full-page capture used as audit evidence.
    fn snapshot(&mut self) -> Result<Vec<u8>, SessionError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },
    #[error("no visible element for {target}")]
    NotFound { target: String },
    #[error("{action} failed: {message}")]
    Action { action: String, message: String },
    #[error("page did not settle: {0}")]
    Timeout(String),
}

/// Best-effort natural-language UI capability.
///
/// Treated as slow and unreliable: callers try direct addressing on the
/// session first and only fall back to these methods.
pub trait IntentExecutor: Debug {
    fn perform_action(&mut self, instruction: &str) -> Result<(), IntentError>;
    fn extract_structured(&mut self, instruction: &str, shape: &Value) -> Result<Value, IntentError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntentError {
    #[error("intent executor unavailable: {0}")]
    Unavailable(String),
    #[error("intent '{instruction}' failed: {message}")]
    Failed { instruction: String, message: String },
    #[error("extracted data did not match the requested shape: {0}")]
    Shape(String),
}

/// Executor used when no natural-language capability is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableIntents;

impl IntentExecutor for UnavailableIntents {
    fn perform_action(&mut self, instruction: &str) -> Result<(), IntentError> {
        Err(IntentError::Unavailable(format!(
            "no executor configured for '{instruction}'"
        )))
    }

    fn extract_structured(&mut self, instruction: &str, _shape: &Value) -> Result<Value, IntentError> {
        Err(IntentError::Unavailable(format!(
            "no executor configured for '{instruction}'"
        )))
    }
}

/// Source of the fixed delays between UI actions and login polls.
pub trait Pacer: Debug {
    fn pause(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn pause(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Pacer that never sleeps; simulated portals have nothing to wait for.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay;

impl Pacer for NoDelay {
    fn pause(&self, _duration: Duration) {}
}

/// Everything a run needs to act on the portal, borrowed for its duration.
#[derive(Debug)]
pub struct PortalDriver<'a> {
    pub session: &'a mut dyn PortalSession,
    pub intents: &'a mut dyn IntentExecutor,
    pub pacer: &'a dyn Pacer,
}

impl<'a> PortalDriver<'a> {
    pub fn new(
        session: &'a mut dyn PortalSession,
        intents: &'a mut dyn IntentExecutor,
        pacer: &'a dyn Pacer,
    ) -> Self {
        Self {
            session,
            intents,
            pacer,
        }
    }

    pub fn pause(&self, duration: Duration) {
        self.pacer.pause(duration);
    }

    /// Clicks a labelled control directly when it is visible, otherwise asks
    /// the intent executor to do it.
    pub fn click_control(&mut self, label: &Bilingual) -> Result<(), IntentError> {
        let selector = control_selector(label);
        if self.session.element_visible(&selector) {
            match self.session.click(&selector) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(control = label.english, error = %err, "direct click failed; using intent executor");
                }
            }
        }
        self.intents.perform_action(&click_instruction(label))
    }
}
