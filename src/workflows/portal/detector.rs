use super::session::PageInspector;
use super::state::PortalState;
use super::vocabulary::{
    matches_any, Bilingual, UrlPatterns, ERROR_BANNER_SELECTOR, MAINTENANCE, NO_RESULTS,
    PROPERTY_TABLE_SELECTOR, SESSION_EXPIRED, SUCCESSFUL_SUBMISSION,
};

/// Maps the live page onto a [`PortalState`].
///
/// Holds no session state; every call re-reads the page through the
/// inspector, so results are never cached across navigation.
#[derive(Debug, Clone, Default)]
pub struct PageStateDetector {
    patterns: UrlPatterns,
}

impl PageStateDetector {
    pub fn new(patterns: UrlPatterns) -> Self {
        Self { patterns }
    }

    pub fn standard() -> Self {
        Self::new(UrlPatterns::standard())
    }

    /// First matching rule wins; URL fragments overlap (`nea-dilosi` contains
    /// `dilosi`), so the order below must not change.
    pub fn detect<P: PageInspector + ?Sized>(&self, page: &P) -> PortalState {
        let url = page.current_url();
        if matches_any(&url, &self.patterns.login) {
            return PortalState::Login;
        }
        if matches_any(&url, &self.patterns.user_info) {
            return PortalState::UserInfo;
        }
        if matches_any(&url, &self.patterns.new_declaration) {
            return PortalState::NewDeclaration;
        }
        if matches_any(&url, &self.patterns.declarations) {
            return PortalState::DeclarationsList;
        }
        if matches_any(&url, &self.patterns.property_registry)
            && page.element_visible(PROPERTY_TABLE_SELECTOR)
        {
            return PortalState::PropertyRegistry;
        }
        if any_text_visible(page, &SUCCESSFUL_SUBMISSION) {
            return PortalState::DeclarationSaved;
        }
        PortalState::Unknown
    }

    pub fn is_logged_in<P: PageInspector + ?Sized>(&self, page: &P) -> bool {
        let url = page.current_url();
        !matches_any(&url, &self.patterns.login) && !self.has_session_expired(page)
    }

    pub fn has_maintenance_notice<P: PageInspector + ?Sized>(&self, page: &P) -> bool {
        any_text_visible(page, &MAINTENANCE)
    }

    pub fn has_session_expired<P: PageInspector + ?Sized>(&self, page: &P) -> bool {
        matches_any(&page.current_url(), &self.patterns.session_expired)
            || any_text_visible(page, &SESSION_EXPIRED)
    }

    pub fn has_no_registered_properties<P: PageInspector + ?Sized>(&self, page: &P) -> bool {
        any_text_visible(page, &NO_RESULTS)
    }

    pub fn has_error_banner<P: PageInspector + ?Sized>(&self, page: &P) -> bool {
        page.element_visible(ERROR_BANNER_SELECTOR)
    }

    /// Snapshot of the boolean page signals, as consumed by the classifier.
    pub fn signals<P: PageInspector + ?Sized>(&self, page: &P) -> PageSignals {
        PageSignals {
            maintenance_notice: self.has_maintenance_notice(page),
            session_expired: self.has_session_expired(page),
            error_banner: self.has_error_banner(page),
        }
    }
}

/// Visible page conditions captured at the moment a failure was observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageSignals {
    pub maintenance_notice: bool,
    pub session_expired: bool,
    pub error_banner: bool,
}

fn any_text_visible<P: PageInspector + ?Sized>(page: &P, text: &Bilingual) -> bool {
    text.variants().iter().any(|variant| page.text_visible(variant))
}
