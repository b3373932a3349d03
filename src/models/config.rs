//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{Category, FilterSpec, IdentityKey};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding snapshot files
    #[serde(default = "defaults::output_dir")]
    pub output_dir: PathBuf,

    /// Mail delivery settings
    #[serde(default)]
    pub email: EmailConfig,

    /// Trigger settings
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Change detection and failure policy
    #[serde(default)]
    pub run: RunConfig,

    /// Named searches per category
    #[serde(default)]
    pub search_filters: SearchFilters,

    /// Listing site and selectors
    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// All configured lineages in run order: tenders first, then projects.
    pub fn lineages(&self) -> impl Iterator<Item = (Category, &FilterSpec)> {
        Category::ALL.into_iter().flat_map(move |category| {
            self.search_filters
                .for_category(category)
                .iter()
                .map(move |filter| (category, filter))
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(AppError::validation("output_dir is empty"));
        }

        for category in Category::ALL {
            let mut names = HashSet::new();
            for filter in self.search_filters.for_category(category) {
                validate_filter_name(&filter.name)?;
                if !names.insert(filter.name.as_str()) {
                    return Err(AppError::validation(format!(
                        "duplicate {category} filter name '{}'",
                        filter.name
                    )));
                }
            }
        }

        self.schedule.run_time()?;
        if self.schedule.frequency.trim().eq_ignore_ascii_case("weekly") {
            self.schedule
                .weekday
                .trim()
                .parse::<chrono::Weekday>()
                .map_err(|_| {
                    AppError::validation(format!(
                        "unknown schedule.weekday '{}'",
                        self.schedule.weekday
                    ))
                })?;
        }
        if self.schedule.poll_interval_secs == 0 {
            return Err(AppError::validation(
                "schedule.poll_interval_secs must be > 0",
            ));
        }

        if self.email.enabled {
            if self.email.smtp_server.trim().is_empty() {
                return Err(AppError::validation("email.smtp_server is empty"));
            }
            if self.email.recipients.is_empty() {
                return Err(AppError::validation("email.recipients is empty"));
            }
        }

        if self.source.user_agent.trim().is_empty() {
            return Err(AppError::validation("source.user_agent is empty"));
        }
        if self.source.timeout_secs == 0 {
            return Err(AppError::validation("source.timeout_secs must be > 0"));
        }
        url::Url::parse(&self.source.base_url)?;
        self.source.tenders.validate()?;
        self.source.projects.validate()?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: defaults::output_dir(),
            email: EmailConfig::default(),
            schedule: ScheduleConfig::default(),
            run: RunConfig::default(),
            search_filters: SearchFilters::default(),
            source: SourceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Filter names end up in file names, so keep them to a safe alphabet.
fn validate_filter_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(AppError::validation("filter name is empty"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
    {
        return Err(AppError::validation(format!(
            "filter name '{name}' may only contain ASCII letters, digits, '_' and '-'"
        )));
    }
    Ok(())
}

/// SMTP notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "defaults::smtp_server")]
    pub smtp_server: String,

    #[serde(default = "defaults::smtp_port")]
    pub smtp_port: u16,

    /// Sender address, also the SMTP login
    #[serde(default = "defaults::sender_email")]
    pub sender_email: String,

    #[serde(default = "defaults::sender_password")]
    pub sender_password: String,

    #[serde(default = "defaults::recipients")]
    pub recipients: Vec<String>,

    /// Leading text of every subject line
    #[serde(default = "defaults::subject_prefix")]
    pub subject_prefix: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_server: defaults::smtp_server(),
            smtp_port: defaults::smtp_port(),
            sender_email: defaults::sender_email(),
            sender_password: defaults::sender_password(),
            recipients: defaults::recipients(),
            subject_prefix: defaults::subject_prefix(),
        }
    }
}

/// Run trigger settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// `daily` or `weekly`
    #[serde(default = "defaults::frequency")]
    pub frequency: String,

    /// Local wall-clock time, `HH:MM`
    #[serde(default = "defaults::run_time")]
    pub time: String,

    /// Day of week for weekly runs
    #[serde(default = "defaults::weekday")]
    pub weekday: String,

    /// How often the loop checks whether a run is due
    #[serde(default = "defaults::poll_interval")]
    pub poll_interval_secs: u64,
}

impl ScheduleConfig {
    /// Parse the configured `HH:MM` time.
    pub fn run_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(self.time.trim(), "%H:%M").map_err(|e| {
            AppError::validation(format!("schedule.time '{}' is not HH:MM: {e}", self.time))
        })
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            frequency: defaults::frequency(),
            time: defaults::run_time(),
            weekday: defaults::weekday(),
            poll_interval_secs: defaults::poll_interval(),
        }
    }
}

/// Change detection and failure handling policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// `title` or `title_and_link`
    #[serde(default)]
    pub identity: IdentityKey,

    /// Skip a failing search instead of aborting the whole run
    #[serde(default)]
    pub isolate_source_failures: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            identity: IdentityKey::default(),
            isolate_source_failures: false,
        }
    }
}

/// Named searches, one list per category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub tenders: Vec<FilterSpec>,

    #[serde(default)]
    pub projects: Vec<FilterSpec>,
}

impl SearchFilters {
    pub fn for_category(&self, category: Category) -> &[FilterSpec] {
        match category {
            Category::Tenders => &self.tenders,
            Category::Projects => &self.projects,
        }
    }
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            tenders: vec![
                FilterSpec::new("india_water_tenders")
                    .country("India")
                    .status("Active")
                    .sector("Water and other urban infrastructure and services"),
            ],
            projects: vec![
                FilterSpec::new("india_transport_projects")
                    .country("India")
                    .status("Proposed")
                    .sector("Transport"),
            ],
        }
    }
}

/// Listing site location, HTTP behaviour and selectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    #[serde(default = "defaults::tenders_path")]
    pub tenders_path: String,

    #[serde(default = "defaults::projects_path")]
    pub projects_path: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay between requests in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Query parameter carrying the country filter
    #[serde(default = "defaults::country_param")]
    pub country_param: String,

    /// Query parameter carrying the sector filter
    #[serde(default = "defaults::sector_param")]
    pub sector_param: String,

    #[serde(default = "defaults::tender_selectors")]
    pub tenders: ListingSelectors,

    #[serde(default = "defaults::project_selectors")]
    pub projects: ListingSelectors,
}

impl SourceConfig {
    pub fn path_for(&self, category: Category) -> &str {
        match category {
            Category::Tenders => &self.tenders_path,
            Category::Projects => &self.projects_path,
        }
    }

    pub fn selectors_for(&self, category: Category) -> &ListingSelectors {
        match category {
            Category::Tenders => &self.tenders,
            Category::Projects => &self.projects,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            tenders_path: defaults::tenders_path(),
            projects_path: defaults::projects_path(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            country_param: defaults::country_param(),
            sector_param: defaults::sector_param(),
            tenders: defaults::tender_selectors(),
            projects: defaults::project_selectors(),
        }
    }
}

/// CSS selectors for one listing page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingSelectors {
    /// Selector for each listing item
    pub item: String,

    /// Selector for the title anchor within an item
    pub title: String,

    /// Selector for the status badge within an item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Selector for `Key: Value` metadata lines within an item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,

    /// HTML attribute carrying the link (usually "href")
    #[serde(default = "defaults::link_attr")]
    pub link_attr: String,

    /// Additional named fields taken from the first matching element's text
    #[serde(default)]
    pub fields: Vec<FieldSelector>,
}

impl ListingSelectors {
    /// Check that every selector parses.
    pub fn validate(&self) -> Result<()> {
        let extra = self.fields.iter().map(|f| &f.selector);
        for s in [&self.item, &self.title]
            .into_iter()
            .chain(self.status.iter())
            .chain(self.metadata.iter())
            .chain(extra)
        {
            Selector::parse(s).map_err(|e| AppError::selector(s.as_str(), format!("{e:?}")))?;
        }
        Ok(())
    }
}

/// A named field scraped from a listing item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSelector {
    pub field: String,
    pub selector: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log filter when RUST_LOG is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,

    /// Also append log lines to this file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
            file: None,
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use super::{FieldSelector, ListingSelectors};

    pub fn output_dir() -> PathBuf {
        PathBuf::from("output")
    }

    // Email defaults
    pub fn smtp_server() -> String {
        "smtp.gmail.com".into()
    }
    pub fn smtp_port() -> u16 {
        587
    }
    pub fn sender_email() -> String {
        "your-email@gmail.com".into()
    }
    pub fn sender_password() -> String {
        "your-app-password".into()
    }
    pub fn recipients() -> Vec<String> {
        vec!["recipient@example.com".into()]
    }
    pub fn subject_prefix() -> String {
        "ADB Monitoring".into()
    }

    // Schedule defaults
    pub fn frequency() -> String {
        "daily".into()
    }
    pub fn run_time() -> String {
        "09:00".into()
    }
    pub fn weekday() -> String {
        "monday".into()
    }
    pub fn poll_interval() -> u64 {
        60
    }

    // Source defaults
    pub fn base_url() -> String {
        "https://www.adb.org".into()
    }
    pub fn tenders_path() -> String {
        "/projects/tenders".into()
    }
    pub fn projects_path() -> String {
        "/projects".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; tenderwatch/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn request_delay() -> u64 {
        500
    }
    pub fn country_param() -> String {
        "country".into()
    }
    pub fn sector_param() -> String {
        "sector".into()
    }
    pub fn link_attr() -> String {
        "href".into()
    }

    pub fn tender_selectors() -> ListingSelectors {
        ListingSelectors {
            item: "div.tender-item".into(),
            title: "h3.title a".into(),
            status: Some("div.status".into()),
            metadata: Some("div.metadata div".into()),
            link_attr: link_attr(),
            fields: Vec::new(),
        }
    }

    pub fn project_selectors() -> ListingSelectors {
        ListingSelectors {
            item: "div.project-item".into(),
            title: "h3.title a".into(),
            status: Some("div.status".into()),
            metadata: None,
            link_attr: link_attr(),
            fields: vec![
                FieldSelector {
                    field: "Project Details".into(),
                    selector: "div.project-id".into(),
                },
                FieldSelector {
                    field: "Approval Year".into(),
                    selector: "div.year".into(),
                },
            ],
        }
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
