use serde::Serialize;
use std::fmt;

/// Position within the portal's filing workflow, recomputed from the live page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PortalState {
    Login,
    UserInfo,
    PropertyRegistry,
    DeclarationsList,
    NewDeclaration,
    DeclarationSaved,
    Unknown,
}

impl PortalState {
    pub const fn description(self) -> &'static str {
        match self {
            Self::Login => "TaxisNet login page",
            Self::UserInfo => "User contact information form",
            Self::PropertyRegistry => "Property registry",
            Self::DeclarationsList => "Declarations list for property",
            Self::NewDeclaration => "New declaration form",
            Self::DeclarationSaved => "Declaration saved confirmation",
            Self::Unknown => "Unknown page",
        }
    }

    /// States after which a production submit counts as accepted.
    pub const fn confirms_submission(self) -> bool {
        matches!(self, Self::DeclarationSaved | Self::DeclarationsList)
    }
}

impl fmt::Display for PortalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::Login => "LOGIN",
            Self::UserInfo => "USER_INFO",
            Self::PropertyRegistry => "PROPERTY_REGISTRY",
            Self::DeclarationsList => "DECLARATIONS_LIST",
            Self::NewDeclaration => "NEW_DECLARATION",
            Self::DeclarationSaved => "DECLARATION_SAVED",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(code)
    }
}
