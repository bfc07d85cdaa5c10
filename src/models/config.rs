//! Application configuration structures.
//!
//! Configuration is read from a TOML file, then overridden by environment
//! variables, then validated. Every field has a default so an empty file (or
//! no file at all) yields a working in-memory directory.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::utils::non_empty;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Primary REST store (highest backend precedence)
    #[serde(default)]
    pub primary: PrimaryConfig,

    /// Spreadsheet-backed store
    #[serde(default)]
    pub sheets: SheetsConfig,

    /// Refresh throttling and startup behavior
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Row-capped backend paging
    #[serde(default)]
    pub paging: PagingConfig,

    /// Outbound HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Unparseable numeric values are logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| non_empty(lookup(key).as_deref());

        if let Some(v) = get("PRIMARY_STORE_URL") {
            self.primary.url = Some(v);
        }
        if let Some(v) = get("PRIMARY_STORE_KEY") {
            self.primary.api_key = Some(v);
        }
        if let Some(v) = get("PRIMARY_STORE_TABLE") {
            self.primary.table = v;
        }
        if let Some(v) = get("PRIMARY_STORE_SLUG_COLUMN") {
            self.primary.slug_column = Some(v);
        }

        if let Some(v) = get("SHEETS_SPREADSHEET_ID") {
            self.sheets.spreadsheet_id = Some(v);
        }
        if let Some(v) = get("SHEETS_API_KEY") {
            self.sheets.api_key = Some(v);
        }
        if let Some(v) = get("SHEETS_ACCESS_TOKEN") {
            self.sheets.access_token = Some(v);
        }
        if let Some(v) = get("SHEETS_RANGE") {
            self.sheets.range = v;
        }

        parse_into(get("MIN_REFRESH_INTERVAL_MS"), &mut self.refresh.min_interval_ms);
        parse_into(get("REFRESH_INITIAL_DELAY_MS"), &mut self.refresh.initial_delay_ms);
        parse_into(get("REFRESH_MAX_FAILED_ATTEMPTS"), &mut self.refresh.max_failed_attempts);
        parse_into(get("INIT_TIMEOUT_MS"), &mut self.refresh.init_timeout_ms);
        if let Some(v) = get("DISABLE_AUTO_REFRESH") {
            self.refresh.disable_auto_refresh = matches!(
                v.to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        parse_into(get("PAGE_SIZE"), &mut self.paging.page_size);
        parse_into(get("MAX_PAGES"), &mut self.paging.max_pages);

        parse_into(get("HTTP_TIMEOUT_SECS"), &mut self.http.timeout_secs);
        if let Some(v) = get("LOG_LEVEL") {
            self.logging.level = v;
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.paging.page_size == 0 {
            return Err(AppError::validation("paging.page_size must be > 0"));
        }
        if self.paging.max_pages == 0 {
            return Err(AppError::validation("paging.max_pages must be > 0"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.refresh.init_timeout_ms == 0 {
            return Err(AppError::validation("refresh.init_timeout_ms must be > 0"));
        }
        if let Some(url) = non_empty(self.primary.url.as_deref()) {
            url::Url::parse(&url)?;
        }
        if self.primary.table.trim().is_empty() {
            return Err(AppError::validation("primary.table is empty"));
        }
        if self.sheets.range.trim().is_empty() {
            return Err(AppError::validation("sheets.range is empty"));
        }
        Ok(())
    }
}

fn parse_into<T: std::str::FromStr>(value: Option<String>, slot: &mut T) {
    if let Some(raw) = value {
        match raw.parse() {
            Ok(parsed) => *slot = parsed,
            Err(_) => log::warn!("Ignoring unparseable override value {:?}", raw),
        }
    }
}

/// Primary REST store connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`
    #[serde(default)]
    pub url: Option<String>,

    /// Service or anon key, sent as `apikey` and bearer token
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "defaults::table")]
    pub table: String,

    /// Column holding a persisted slug, if the table has one
    #[serde(default)]
    pub slug_column: Option<String>,
}

impl PrimaryConfig {
    /// Both URL and key are present.
    pub fn is_configured(&self) -> bool {
        non_empty(self.url.as_deref()).is_some() && non_empty(self.api_key.as_deref()).is_some()
    }
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            table: defaults::table(),
            slug_column: None,
        }
    }
}

/// Spreadsheet store connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    #[serde(default)]
    pub spreadsheet_id: Option<String>,

    /// Read-only API key
    #[serde(default)]
    pub api_key: Option<String>,

    /// OAuth token; required for appending rows
    #[serde(default)]
    pub access_token: Option<String>,

    /// A1 range including the header row
    #[serde(default = "defaults::sheet_range")]
    pub range: String,

    #[serde(default = "defaults::sheets_base_url")]
    pub base_url: String,
}

impl SheetsConfig {
    /// A spreadsheet id plus some way to authenticate.
    pub fn has_credentials(&self) -> bool {
        non_empty(self.spreadsheet_id.as_deref()).is_some()
            && (non_empty(self.api_key.as_deref()).is_some()
                || non_empty(self.access_token.as_deref()).is_some())
    }
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: None,
            api_key: None,
            access_token: None,
            range: defaults::sheet_range(),
            base_url: defaults::sheets_base_url(),
        }
    }
}

/// Refresh throttling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Floor between two reloads
    #[serde(default = "defaults::min_interval_ms")]
    pub min_interval_ms: u64,

    /// Grace period after cold start before reads may trigger a reload
    #[serde(default = "defaults::initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Start with refresh disabled
    #[serde(default)]
    pub disable_auto_refresh: bool,

    /// Consecutive failures after which reads stop triggering reloads
    #[serde(default = "defaults::max_failed_attempts")]
    pub max_failed_attempts: u32,

    /// Upper bound for the startup load
    #[serde(default = "defaults::init_timeout_ms")]
    pub init_timeout_ms: u64,
}

impl RefreshConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: defaults::min_interval_ms(),
            initial_delay_ms: defaults::initial_delay_ms(),
            disable_auto_refresh: false,
            max_failed_attempts: defaults::max_failed_attempts(),
            init_timeout_ms: defaults::init_timeout_ms(),
        }
    }
}

/// Paging settings for row-capped backends.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PagingConfig {
    #[serde(default = "defaults::page_size")]
    pub page_size: usize,

    /// Runaway-query guard
    #[serde(default = "defaults::max_pages")]
    pub max_pages: usize,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            page_size: defaults::page_size(),
            max_pages: defaults::max_pages(),
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    // Primary store defaults
    pub fn table() -> String {
        "bookshops".into()
    }

    // Spreadsheet defaults
    pub fn sheet_range() -> String {
        "Bookshops!A:Z".into()
    }
    pub fn sheets_base_url() -> String {
        "https://sheets.googleapis.com/v4".into()
    }

    // Refresh defaults
    pub fn min_interval_ms() -> u64 {
        5 * 60 * 1000
    }
    pub fn initial_delay_ms() -> u64 {
        30 * 1000
    }
    pub fn max_failed_attempts() -> u32 {
        3
    }
    pub fn init_timeout_ms() -> u64 {
        15 * 1000
    }

    // Paging defaults
    pub fn page_size() -> usize {
        1000
    }
    pub fn max_pages() -> usize {
        50
    }

    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; BookshopDirectory/1.0)".into()
    }
    pub fn timeout() -> u64 {
        15
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
