// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the contact relay.
//!
//! Values are layered: built-in defaults, then an optional TOML file named by
//! `CONTACT_RELAY_CONFIG`, then `CONTACT_RELAY__SECTION__KEY` environment
//! variables, then the flat variables older deployments set (`BIND_ADDR`,
//! `EMAIL_TO`, `MAX_REQUESTS`, `ACCESS_KEY`).

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::sanitizer;

/// Environment variable naming the optional TOML config file.
pub const CONFIG_PATH_ENV: &str = "CONTACT_RELAY_CONFIG";

/// Prefix for structured environment overrides.
pub const ENV_PREFIX: &str = "CONTACT_RELAY";

/// Configuration loading or validation failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("Invalid configuration: {}", .0.join(", "))]
    Invalid(Vec<String>),
}

/// Configuration for the contact relay service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:3000)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Origins allowed by CORS
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Number of reverse proxies in front of the service whose
    /// `X-Forwarded-For` entries are trusted (default: 1)
    #[serde(default = "default_trusted_proxy_hops")]
    pub trusted_proxy_hops: usize,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Submission policy
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Mail delivery configuration
    #[serde(default)]
    pub mail: MailConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Fixed-window rate limiting per client identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Window length in seconds (default: 24 hours)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Requests admitted per client per window (default: 1000)
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Upper bound on tracked client identities (default: 100000)
    #[serde(default = "default_max_tracked_clients")]
    pub max_tracked_clients: usize,

    /// Interval between sweeps of expired windows in seconds (default: 300)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Message returned with 429 responses
    #[serde(default = "default_rate_limit_message")]
    pub message: String,
}

/// How fields required by a selected category are enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionalFieldMode {
    /// Missing fields are validation errors
    Require,
    /// Missing fields are filled with the placeholder
    Default,
}

/// Status code used when the bot trap is tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotRejectionStatus {
    BadRequest,
    Forbidden,
}

/// Fields that become mandatory when `selectedOption` equals `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub name: String,
    pub fields: Vec<String>,
}

/// Policy bundle selecting which optional rules and overrides are active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Reject submissions without the configured access key (default: false)
    #[serde(default)]
    pub require_access_key: bool,

    /// Shared secret expected in `access_key`
    #[serde(default)]
    pub access_key: Option<String>,

    /// Replace the submitted reply address with this one and skip its check
    #[serde(default)]
    pub fixed_reply_to: Option<String>,

    /// Free-form fields allowed to be empty
    #[serde(default = "default_optional_fields")]
    pub optional_fields: Vec<String>,

    /// Verification tokens removed before delivery
    #[serde(default = "default_transport_fields")]
    pub transport_fields: Vec<String>,

    /// Fields holding `key: value; key: value` blocks
    #[serde(default)]
    pub structured_fields: Vec<String>,

    /// Category-conditional required fields
    #[serde(default = "default_categories")]
    pub categories: Vec<CategoryRule>,

    /// Enforcement of category fields (default: require)
    #[serde(default = "default_conditional_mode")]
    pub conditional_mode: ConditionalFieldMode,

    /// Value substituted for missing category fields in `default` mode
    #[serde(default = "default_placeholder")]
    pub placeholder: String,

    /// Status for bot-trap rejections (default: bad_request)
    #[serde(default = "default_bot_rejection")]
    pub bot_rejection: BotRejectionStatus,
}

/// Which delivery backend relays accepted submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MailBackend {
    /// Log the message instead of sending it
    Log,
    /// POST the message to an HTTP mail relay
    Http,
}

/// Mail delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Recipient of every submission
    #[serde(default = "default_recipient")]
    pub recipient: String,

    /// Delivery backend (default: log)
    #[serde(default = "default_mail_backend")]
    pub backend: MailBackend,

    /// Relay endpoint for the http backend
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Bearer token for the relay
    #[serde(default)]
    pub api_token: Option<String>,

    /// Relay request timeout in seconds (default: 10)
    #[serde(default = "default_mail_timeout_secs")]
    pub timeout_secs: u64,

    /// Banner heading of the generated email
    #[serde(default = "default_heading")]
    pub heading: String,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec!["https://localhost".to_string()]
}

fn default_trusted_proxy_hops() -> usize {
    1
}

fn default_window_secs() -> u64 {
    24 * 60 * 60
}

fn default_max_requests() -> u32 {
    1000
}

fn default_max_tracked_clients() -> usize {
    100_000
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_rate_limit_message() -> String {
    "You can only submit once every 24 hours.".to_string()
}

fn default_optional_fields() -> Vec<String> {
    vec!["optionalField".to_string()]
}

fn default_transport_fields() -> Vec<String> {
    vec![
        "h-captcha-response".to_string(),
        "g-recaptcha-response".to_string(),
        "cf-turnstile-response".to_string(),
    ]
}

fn default_categories() -> Vec<CategoryRule> {
    vec![
        CategoryRule {
            name: "lawEnforcementContact".to_string(),
            fields: vec![
                "lawEnforcementName".to_string(),
                "lawEnforcementAgency".to_string(),
            ],
        },
        CategoryRule {
            name: "pressReleasesAndBranding".to_string(),
            fields: vec![
                "nameOfPress".to_string(),
                "nameOfIndividual".to_string(),
                "certifyRepresentation".to_string(),
            ],
        },
    ]
}

fn default_conditional_mode() -> ConditionalFieldMode {
    ConditionalFieldMode::Require
}

fn default_placeholder() -> String {
    "Not provided".to_string()
}

fn default_bot_rejection() -> BotRejectionStatus {
    BotRejectionStatus::BadRequest
}

fn default_recipient() -> String {
    "contact@localhost.localdomain".to_string()
}

fn default_mail_backend() -> MailBackend {
    MailBackend::Log
}

fn default_mail_timeout_secs() -> u64 {
    10
}

fn default_heading() -> String {
    "Contact Form Submission".to_string()
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            allowed_origins: default_allowed_origins(),
            trusted_proxy_hops: default_trusted_proxy_hops(),
            rate_limit: RateLimitConfig::default(),
            policy: PolicyConfig::default(),
            mail: MailConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            max_requests: default_max_requests(),
            max_tracked_clients: default_max_tracked_clients(),
            sweep_interval_secs: default_sweep_interval_secs(),
            message: default_rate_limit_message(),
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            require_access_key: false,
            access_key: None,
            fixed_reply_to: None,
            optional_fields: default_optional_fields(),
            transport_fields: default_transport_fields(),
            structured_fields: Vec::new(),
            categories: default_categories(),
            conditional_mode: default_conditional_mode(),
            placeholder: default_placeholder(),
            bot_rejection: default_bot_rejection(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            recipient: default_recipient(),
            backend: default_mail_backend(),
            endpoint: None,
            api_token: None,
            timeout_secs: default_mail_timeout_secs(),
            heading: default_heading(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl RateLimitConfig {
    /// Get the rate window duration
    pub fn window_duration(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Get the sweep interval
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl PolicyConfig {
    /// Required fields for `category`, if it is a configured category.
    pub fn category_fields(&self, category: &str) -> Option<&[String]> {
        self.categories
            .iter()
            .find(|rule| rule.name == category)
            .map(|rule| rule.fields.as_slice())
    }

    pub fn is_optional(&self, field: &str) -> bool {
        self.optional_fields.iter().any(|f| f == field)
    }

    pub fn is_transport_field(&self, field: &str) -> bool {
        self.transport_fields.iter().any(|f| f == field)
    }

    pub fn is_structured(&self, field: &str) -> bool {
        self.structured_fields.iter().any(|f| f == field)
    }
}

impl MailConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from the optional file at `path` and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("allowed_origins")
                .with_list_parse_key("policy.optional_fields")
                .with_list_parse_key("policy.transport_fields")
                .with_list_parse_key("policy.structured_fields")
                .try_parsing(true),
        );

        let mut config: Config = builder.build()?.try_deserialize()?;
        config.apply_legacy_env(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load using the path named by `CONTACT_RELAY_CONFIG`, if set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).ok();
        Self::load(path.as_deref().map(Path::new))
    }

    /// Apply the flat variables used by earlier deployments.
    fn apply_legacy_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(to) = lookup("EMAIL_TO") {
            self.mail.recipient = to;
        }
        if let Some(max) = lookup("MAX_REQUESTS") {
            self.rate_limit.max_requests = max.parse().map_err(|_| ConfigError::InvalidEnv {
                var: "MAX_REQUESTS",
                value: max.clone(),
            })?;
        }
        if let Some(key) = lookup("ACCESS_KEY") {
            self.policy.access_key = Some(key);
            self.policy.require_access_key = true;
        }
        Ok(())
    }

    /// Check semantic constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.rate_limit.window_secs == 0 {
            errors.push("rate_limit.window_secs must be positive".to_string());
        }
        if self.rate_limit.max_requests == 0 {
            errors.push("rate_limit.max_requests must be positive".to_string());
        }
        if self.rate_limit.sweep_interval_secs == 0 {
            errors.push("rate_limit.sweep_interval_secs must be positive".to_string());
        }
        if self.rate_limit.max_tracked_clients == 0 {
            errors.push("rate_limit.max_tracked_clients must be positive".to_string());
        }
        if self.policy.require_access_key
            && self.policy.access_key.as_deref().map_or(true, str::is_empty)
        {
            errors.push("policy.access_key is required when require_access_key is set".to_string());
        }
        if let Some(fixed) = &self.policy.fixed_reply_to {
            if !sanitizer::is_email(fixed) {
                errors.push(format!("policy.fixed_reply_to is not an email address: {fixed}"));
            }
        }
        if !sanitizer::is_email(&self.mail.recipient) {
            errors.push(format!(
                "mail.recipient is not an email address: {}",
                self.mail.recipient
            ));
        }
        if self.mail.backend == MailBackend::Http {
            match self.mail.endpoint.as_deref().map(url::Url::parse) {
                Some(Ok(url)) if matches!(url.scheme(), "http" | "https") => {}
                Some(_) => errors.push("mail.endpoint must be an http(s) URL".to_string()),
                None => errors.push("mail.endpoint is required for the http backend".to_string()),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}
