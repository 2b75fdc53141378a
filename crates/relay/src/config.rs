use std::{collections::HashMap, fs, path::Path};

use regex::Regex;
use serde::Deserialize;

/// Static configuration of the relay, loaded once per process.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Verified sending address replacing the original `From` address.
    #[serde(default)]
    pub from_email: Option<String>,

    /// Text prepended to every relayed subject.
    #[serde(default)]
    pub subject_prefix: String,

    /// Bucket holding inbound messages and outbound copies.
    #[serde(default = "default_email_bucket")]
    pub email_bucket: String,

    /// Key prefix of inbound messages, including the trailing slash.
    #[serde(default = "default_email_key_prefix")]
    pub email_key_prefix: String,

    /// Key prefix of outbound copies, including the trailing slash.
    #[serde(default = "default_outbound_key_prefix")]
    pub outbound_key_prefix: String,

    /// Folds `user+tag@domain` to `user@domain` before mapping lookup.
    #[serde(default)]
    pub allow_plus_sign: bool,

    /// Aborts when the subject already carries the subject prefix.
    #[serde(default = "default_true")]
    pub loop_detection: bool,

    /// Regular expression of subjects that must never be relayed
    /// (bounces, delivery failures).
    #[serde(default)]
    pub abort_subject: Option<String>,

    /// Fixed address always set as `Bcc`.
    #[serde(default)]
    pub bcc_email: Option<String>,

    /// Mapping of recipient patterns to destination addresses.
    ///
    /// Keys are a full address, a domain (`@example.com`), a local part
    /// (`info`) or the catch-all `@`.
    #[serde(default)]
    pub forward_mapping: HashMap<String, Vec<String>>,

    /// Webhook notification settings, notifications are disabled when absent.
    #[serde(default)]
    pub notify: Option<NotifyConfig>,
}

impl RelayConfig {
    /// Compiles the abort-subject pattern, if one is configured.
    pub fn abort_subject_pattern(&self) -> Result<Option<Regex>, ConfigError> {
        self.abort_subject
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(ConfigError::Pattern)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            from_email: None,
            subject_prefix: String::new(),
            email_bucket: default_email_bucket(),
            email_key_prefix: default_email_key_prefix(),
            outbound_key_prefix: default_outbound_key_prefix(),
            allow_plus_sign: false,
            loop_detection: default_true(),
            abort_subject: None,
            bcc_email: None,
            forward_mapping: HashMap::new(),
            notify: None,
        }
    }
}

/// Chat-webhook notification settings.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    pub webhook_url: String,

    #[serde(default)]
    pub channel: Option<String>,

    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default = "default_icon_emoji")]
    pub icon_emoji: String,
}

/// Loads configuration from a TOML file.
///
/// The abort-subject pattern is compiled once here so that an invalid
/// expression is reported at startup rather than per message.
pub fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: RelayConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;
    config.abort_subject_pattern()?;
    Ok(config)
}

/// Errors that can occur while loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// An I/O error occurred reading the file.
    Io(std::io::Error),
    /// A parse error occurred deserializing TOML.
    Parse(toml::de::Error),
    /// The abort-subject expression is not a valid regular expression.
    Pattern(regex::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "Config parse error: {e}"),
            ConfigError::Pattern(e) => write!(f, "Config pattern error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

fn default_email_bucket() -> String {
    "mail".to_string()
}

fn default_email_key_prefix() -> String {
    "inbound/".to_string()
}

fn default_outbound_key_prefix() -> String {
    "outbound/".to_string()
}

fn default_true() -> bool {
    true
}

fn default_username() -> String {
    "mailfwd".to_string()
}

fn default_icon_emoji() -> String {
    ":envelope_with_arrow:".to_string()
}
