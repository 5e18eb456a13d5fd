use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ENTRY_URL: &str = "https://www1.gsis.gr/taxisnet/short_term_letting/";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application, built once per run.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub store: StoreConfig,
    pub filing: FilingConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let database_path = env::var("FILER_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("bookings.db"));

        let dry_run = env::var("DRY_RUN")
            .map(|value| value.trim() != "false")
            .unwrap_or(true);
        let include_retry_later = env::var("FILER_INCLUDE_RETRY")
            .map(|value| matches!(value.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let max_login_wait = millis_var("FILER_MAX_LOGIN_WAIT_MS", 300_000)?;
        let poll_interval = millis_var("FILER_POLL_INTERVAL_MS", 2_000)?;
        if poll_interval.is_zero() {
            return Err(ConfigError::InvalidPollInterval);
        }
        let settle_delay = millis_var("FILER_SETTLE_DELAY_MS", 2_000)?;
        let action_delay = millis_var("FILER_ACTION_DELAY_MS", 100)?;

        let audit_evidence_dir = env::var("FILER_AUDIT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./audit_logs"));
        let entry_url = env::var("AADE_ENTRY_URL").unwrap_or_else(|_| DEFAULT_ENTRY_URL.to_string());

        let contact = ContactDetails {
            phone: env::var("AADE_PHONE").unwrap_or_else(|_| "2101234567".to_string()),
            mobile: env::var("AADE_MOBILE").unwrap_or_else(|_| "6971234567".to_string()),
            email: env::var("AADE_EMAIL").unwrap_or_else(|_| "test@example.com".to_string()),
        };

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            store: StoreConfig { database_path },
            filing: FilingConfig {
                dry_run,
                include_retry_later,
                max_login_wait,
                poll_interval,
                settle_delay,
                action_delay,
                audit_evidence_dir,
                entry_url,
                contact,
            },
            telemetry: TelemetryConfig { log_level },
        })
    }
}

fn millis_var(variable: &'static str, default_ms: u64) -> Result<Duration, ConfigError> {
    match env::var(variable) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::InvalidNumber { variable }),
        Err(_) => Ok(Duration::from_millis(default_ms)),
    }
}

/// Location of the durable booking store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_path: PathBuf,
}

/// Settings for one submission run against the declaration portal.
#[derive(Debug, Clone)]
pub struct FilingConfig {
    pub dry_run: bool,
    pub include_retry_later: bool,
    pub max_login_wait: Duration,
    pub poll_interval: Duration,
    pub settle_delay: Duration,
    pub action_delay: Duration,
    pub audit_evidence_dir: PathBuf,
    pub entry_url: String,
    pub contact: ContactDetails,
}

impl Default for FilingConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            include_retry_later: false,
            max_login_wait: Duration::from_millis(300_000),
            poll_interval: Duration::from_millis(2_000),
            settle_delay: Duration::from_millis(2_000),
            action_delay: Duration::from_millis(100),
            audit_evidence_dir: PathBuf::from("./audit_logs"),
            entry_url: DEFAULT_ENTRY_URL.to_string(),
            contact: ContactDetails::default(),
        }
    }
}

/// Contact details the portal insists on before any declaration work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactDetails {
    pub phone: String,
    pub mobile: String,
    pub email: String,
}

impl Default for ContactDetails {
    fn default() -> Self {
        Self {
            phone: "2101234567".to_string(),
            mobile: "6971234567".to_string(),
            email: "test@example.com".to_string(),
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidNumber { variable: &'static str },
    InvalidPollInterval,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidNumber { variable } => {
                write!(f, "{variable} must be a whole number of milliseconds")
            }
            ConfigError::InvalidPollInterval => {
                write!(f, "FILER_POLL_INTERVAL_MS must be greater than zero")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
