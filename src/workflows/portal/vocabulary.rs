//! Labels, messages and URL fragments of the declaration portal.
//!
//! Greek is the portal's primary language; every label keeps the English
//! variant as a fallback for the intent executor and for text checks.

/// A piece of portal text in both supported languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bilingual {
    pub greek: &'static str,
    pub english: &'static str,
}

impl Bilingual {
    pub const fn new(greek: &'static str, english: &'static str) -> Self {
        Self { greek, english }
    }

    pub fn variants(&self) -> [&'static str; 2] {
        [self.greek, self.english]
    }
}

pub const NO_RESULTS: Bilingual = Bilingual::new("Δεν βρέθηκαν αποτελέσματα", "No results found");
pub const MAINTENANCE: Bilingual = Bilingual::new("Συντήρηση", "Maintenance");
pub const SESSION_EXPIRED: Bilingual = Bilingual::new("Η συνεδρία έληξε", "Session expired");
pub const SUCCESSFUL_SUBMISSION: Bilingual =
    Bilingual::new("Επιτυχής καταχώρηση", "Successful submission");

pub const SAVE_BUTTON: Bilingual = Bilingual::new("Αποθήκευση", "Save");
pub const CONTINUE_BUTTON: Bilingual = Bilingual::new("ΣΥΝΕΧΕΙΑ", "Continue");
pub const DECLARATIONS_LINK: Bilingual = Bilingual::new("Δηλώσεις", "Declarations");
pub const NEW_DECLARATION_BUTTON: Bilingual = Bilingual::new("Νέα Δήλωση", "New Declaration");
pub const SUBMIT_BUTTON: Bilingual = Bilingual::new("Υποβολή", "Submit");
pub const BACK_BUTTON: Bilingual = Bilingual::new("Επιστροφή", "Back");
pub const ADD_PROPERTY_LINK: Bilingual = Bilingual::new("Εισαγωγή Ακινήτου", "Add Property");

pub const ELECTRONIC_PLATFORM_PAYMENT: Bilingual =
    Bilingual::new("Ηλεκτρονική Πλατφόρμα", "Electronic Platform");
pub const AIRBNB_PLATFORM: Bilingual = Bilingual::new("Airbnb", "Airbnb");

pub const PROPERTY_TABLE_SELECTOR: &str = "table, .property-list, [class*=\"registry\"]";
pub const PROPERTY_ROW_SELECTOR: &str = "table tbody tr, .property-row";
pub const TEXT_INPUT_SELECTOR: &str = "input[type=\"text\"]";
pub const ERROR_BANNER_SELECTOR: &str = ".error, .alert-danger, [class*=\"error\"]";

/// URL fragments identifying each portal page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPatterns {
    pub login: Vec<&'static str>,
    pub user_info: Vec<&'static str>,
    pub property_registry: Vec<&'static str>,
    pub declarations: Vec<&'static str>,
    pub new_declaration: Vec<&'static str>,
    pub session_expired: Vec<&'static str>,
}

impl UrlPatterns {
    pub fn standard() -> Self {
        Self {
            login: vec!["login.gsis.gr", "oauth2"],
            user_info: vec!["userInfo"],
            property_registry: vec!["short_term_letting"],
            declarations: vec!["declarations", "dilosi"],
            new_declaration: vec!["newDeclaration", "nea-dilosi"],
            session_expired: vec!["osso_logout", "expired"],
        }
    }
}

impl Default for UrlPatterns {
    fn default() -> Self {
        Self::standard()
    }
}

pub(crate) fn matches_any(url: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|pattern| url.contains(pattern))
}

/// Selector for a clickable control carrying either label.
pub fn control_selector(label: &Bilingual) -> String {
    format!(
        "button:has-text(\"{greek}\"), button:has-text(\"{english}\"), a:has-text(\"{greek}\")",
        greek = label.greek,
        english = label.english
    )
}

/// How a field takes its value: typed dates and amounts, or a dropdown choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Date,
    Number,
    Select,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: &'static str,
    pub label: Bilingual,
    pub kind: FieldKind,
}

impl FormField {
    const fn new(name: &'static str, label: Bilingual, kind: FieldKind) -> Self {
        Self { name, label, kind }
    }

    /// Natural-language instruction for filling this field.
    pub fn fill_instruction(&self, value: &str) -> String {
        format!(
            "Fill the field labeled '{}' (or '{}') with value: {value}",
            self.label.greek, self.label.english
        )
    }

    pub fn select_instruction(&self, option: &str) -> String {
        format!(
            "Select '{option}' from the '{}' (or '{}') dropdown",
            self.label.greek, self.label.english
        )
    }

    pub fn instruction(&self, value: &str) -> String {
        match self.kind {
            FieldKind::Select => self.select_instruction(value),
            FieldKind::Date | FieldKind::Number => self.fill_instruction(value),
        }
    }
}

pub fn click_instruction(label: &Bilingual) -> String {
    format!("Click the '{}' or '{}' button", label.greek, label.english)
}

/// The declaration form's addressable fields.
///
/// Cancellation fields are optional: a destination form that does not
/// declare them cannot take a cancellation declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationForm {
    pub arrival_date: FormField,
    pub departure_date: FormField,
    pub total_rent: FormField,
    pub cancellation_amount: Option<FormField>,
    pub cancellation_date: Option<FormField>,
    pub payment_method: FormField,
    pub platform: FormField,
}

impl DeclarationForm {
    pub fn standard() -> Self {
        Self {
            arrival_date: FormField::new(
                "Arrival Date",
                Bilingual::new("Ημερομηνία Άφιξης", "Arrival Date"),
                FieldKind::Date,
            ),
            departure_date: FormField::new(
                "Departure Date",
                Bilingual::new("Ημερομηνία Αναχώρησης", "Departure Date"),
                FieldKind::Date,
            ),
            total_rent: FormField::new(
                "Total Rent",
                Bilingual::new("Συνολικό Συμφωνηθέν Μίσθωμα", "Total Agreed Rent"),
                FieldKind::Number,
            ),
            cancellation_amount: Some(FormField::new(
                "Cancellation Amount",
                Bilingual::new("Συνολικό Ποσό Ακύρωσης", "Total Cancellation Amount"),
                FieldKind::Number,
            )),
            cancellation_date: Some(FormField::new(
                "Cancellation Date",
                Bilingual::new("Ημερομηνία Ακύρωσης", "Cancellation Date"),
                FieldKind::Date,
            )),
            payment_method: FormField::new(
                "Payment Method",
                Bilingual::new("Τρόπος Πληρωμής", "Payment Method"),
                FieldKind::Select,
            ),
            platform: FormField::new(
                "Platform",
                Bilingual::new("Ηλεκτρονική Πλατφόρμα", "Electronic Platform"),
                FieldKind::Select,
            ),
        }
    }

    pub fn cancellation_fields(&self) -> Option<(&FormField, &FormField)> {
        self.cancellation_amount
            .as_ref()
            .zip(self.cancellation_date.as_ref())
    }
}

impl Default for DeclarationForm {
    fn default() -> Self {
        Self::standard()
    }
}
