//! Configuration module for pcsync.
//!
//! Provides the typed configuration that maps to the JSON (or YAML) file read
//! by the `service` command, with loading, validation, defaults, and a
//! builder for programmatic use.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::newtypes::RemotePath;
use crate::domain::schedule::{parse_interval, parse_schedule};
use crate::domain::task::Method;

const APP_DIR: &str = "pcsync";

// ---------------------------------------------------------------------------
// Config struct
// ---------------------------------------------------------------------------

/// Top-level configuration for pcsync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Session file of the remote storage client.
    pub cookie_file_path: PathBuf,
    /// SQLite metadata store.
    pub cache_file_path: PathBuf,
    /// Log file used in service mode; defaults to [`Config::default_log_path`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file_path: Option<PathBuf>,
    /// `plaintext`, `aes-cbc-128`, `aes-cbc-192` or `aes-cbc-256`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure_key: Option<String>,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub log_enabled: bool,
    #[serde(default, alias = "PrintfEnabled", deserialize_with = "flexible_bool")]
    pub printf_enabled: bool,
    #[serde(default, alias = "RunInDaemon", deserialize_with = "flexible_bool")]
    pub run_in_daemon: bool,
    /// Scheduled items, in execution order.
    pub items: Vec<ItemConfig>,
}

/// One scheduled item as written in the configuration file.
///
/// Disabled items may leave out everything but `enable`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemConfig {
    #[serde(default = "default_true", deserialize_with = "flexible_bool")]
    pub enable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub md5: bool,
    /// Daily offset, `HH:MM:SS`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    /// Repeat interval, `DD:HH:MM:SS`; zero runs the item once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_path: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Accepts `true`/`false` as well as the integer flags older files use.
fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrInt {
        Bool(bool),
        Int(i64),
    }

    Ok(match BoolOrInt::deserialize(deserializer)? {
        BoolOrInt::Bool(b) => b,
        BoolOrInt::Int(i) => i != 0,
    })
}

impl ItemConfig {
    /// An enabled item without paths.
    pub fn new(method: &str, schedule: &str, interval: &str) -> Self {
        Self {
            enable: true,
            method: Some(method.to_string()),
            md5: false,
            schedule: Some(schedule.to_string()),
            interval: Some(interval.to_string()),
            local_path: None,
            remote_path: None,
        }
    }

    pub fn with_paths(mut self, local: impl Into<PathBuf>, remote: impl Into<String>) -> Self {
        self.local_path = Some(local.into());
        self.remote_path = Some(remote.into());
        self
    }

    pub fn with_md5(mut self, md5: bool) -> Self {
        self.md5 = md5;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enable = false;
        self
    }
}

// ---------------------------------------------------------------------------
// SecureMethod
// ---------------------------------------------------------------------------

/// How the session file is protected at rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecureMethod {
    Plaintext,
    AesCbc128,
    AesCbc192,
    AesCbc256,
}

impl SecureMethod {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "plaintext" => Some(SecureMethod::Plaintext),
            "aes-cbc-128" => Some(SecureMethod::AesCbc128),
            "aes-cbc-192" => Some(SecureMethod::AesCbc192),
            "aes-cbc-256" => Some(SecureMethod::AesCbc256),
            _ => None,
        }
    }

    pub fn needs_key(self) -> bool {
        !matches!(self, SecureMethod::Plaintext)
    }
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from `path`.
    ///
    /// Files ending in `.yaml` or `.yml` are read as YAML, anything else as JSON.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let config: Config = if is_yaml {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Broken YAML in {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Broken JSON in {}", path.display()))?
        };
        Ok(config)
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/pcsync/config.json` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join(APP_DIR)
            .join("config.json")
    }

    /// Default session file when none is configured.
    pub fn default_cookie_path() -> PathBuf {
        data_dir().join("session.json")
    }

    /// Default metadata store when none is configured.
    pub fn default_cache_path() -> PathBuf {
        data_dir().join("cache.db")
    }

    /// Default service log file.
    pub fn default_log_path() -> PathBuf {
        data_dir().join("pcsync.log")
    }

    /// Log file to use in service mode.
    pub fn log_path(&self) -> PathBuf {
        self.log_file_path
            .clone()
            .unwrap_or_else(Self::default_log_path)
    }

    /// Parsed `secureMethod`, `None` when unset.
    pub fn secure(&self) -> Option<SecureMethod> {
        self.secure_method
            .as_deref()
            .filter(|s| !s.is_empty())
            .and_then(SecureMethod::parse)
    }
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join(APP_DIR)
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"items[0].schedule"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `secureMethod`.
const VALID_SECURE_METHODS: &[&str] = &["plaintext", "aes-cbc-128", "aes-cbc-192", "aes-cbc-256"];

/// A validated, enabled-or-disabled item ready for the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledItem {
    /// 1-based position in `items`.
    pub id: i64,
    pub method: Method,
    pub enabled: bool,
    pub md5: bool,
    pub schedule_secs: i64,
    pub interval_secs: i64,
    /// `None` only for [`Method::Reset`].
    pub local_path: Option<PathBuf>,
    /// `None` only for [`Method::Reset`].
    pub remote_path: Option<RemotePath>,
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.cookie_file_path.as_os_str().is_empty() {
            errors.push(ValidationError::new("cookieFilePath", "must not be empty"));
        }
        if self.cache_file_path.as_os_str().is_empty() {
            errors.push(ValidationError::new("cacheFilePath", "must not be empty"));
        }

        if let Some(method) = self.secure_method.as_deref().filter(|s| !s.is_empty()) {
            match SecureMethod::parse(method) {
                None => errors.push(ValidationError::new(
                    "secureMethod",
                    format!(
                        "invalid method '{}'; valid options: {}",
                        method,
                        VALID_SECURE_METHODS.join(", ")
                    ),
                )),
                Some(m) if m.needs_key() => {
                    let has_key = self.secure_key.as_deref().is_some_and(|k| !k.is_empty());
                    if !has_key {
                        errors.push(ValidationError::new(
                            "secureKey",
                            format!("required when secureMethod is '{method}'"),
                        ));
                    }
                }
                Some(_) => {}
            }
        }

        for (index, item) in self.items.iter().enumerate() {
            if let Err(mut item_errors) = check_item(index, item) {
                errors.append(&mut item_errors);
            }
        }

        errors
    }

    /// Items the scheduler should track, in configuration order.
    ///
    /// Disabled items with missing or malformed fields are left out; enabled
    /// ones make the whole call fail with every error found.
    pub fn scheduled_items(&self) -> Result<Vec<ScheduledItem>, Vec<ValidationError>> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(self
            .items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| check_item(index, item).ok().flatten())
            .collect())
    }
}

/// Checks one item.
///
/// Returns `Ok(None)` for a disabled item that cannot be scheduled.
fn check_item(index: usize, item: &ItemConfig) -> Result<Option<ScheduledItem>, Vec<ValidationError>> {
    let field = |name: &str| format!("items[{index}].{name}");
    let mut errors = Vec::new();

    let method = match item.method.as_deref() {
        None => {
            errors.push(ValidationError::new(field("method"), "is required"));
            None
        }
        Some(name) => match name.parse::<Method>() {
            Ok(m) => Some(m),
            Err(_) => {
                errors.push(ValidationError::new(
                    field("method"),
                    format!(
                        "unknown method '{name}'; valid options: update, backup, restore, reset, combine"
                    ),
                ));
                None
            }
        },
    };

    let schedule = parse_required(item.schedule.as_deref(), parse_schedule, &field("schedule"), &mut errors);
    let interval = parse_required(item.interval.as_deref(), parse_interval, &field("interval"), &mut errors);

    let mut local_path = None;
    let mut remote_path = None;
    if method.is_some_and(Method::needs_paths) {
        match &item.local_path {
            Some(p) if !p.as_os_str().is_empty() => local_path = Some(p.clone()),
            _ => errors.push(ValidationError::new(field("localPath"), "is required")),
        }
        match item.remote_path.as_deref() {
            Some(p) => match RemotePath::new(p) {
                Ok(rp) => remote_path = Some(rp),
                Err(e) => errors.push(ValidationError::new(field("remotePath"), e.to_string())),
            },
            None => errors.push(ValidationError::new(field("remotePath"), "is required")),
        }
    }

    match (errors.is_empty(), item.enable) {
        (true, _) => Ok(method.zip(schedule.zip(interval)).map(|(method, (schedule, interval))| {
            ScheduledItem {
                id: index as i64 + 1,
                method,
                enabled: item.enable,
                md5: item.md5,
                schedule_secs: schedule,
                interval_secs: interval,
                local_path,
                remote_path,
            }
        })),
        (false, false) => Ok(None),
        (false, true) => Err(errors),
    }
}

fn parse_required(
    value: Option<&str>,
    parse: fn(&str) -> Result<i64, crate::domain::DomainError>,
    field: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<i64> {
    match value {
        None => {
            errors.push(ValidationError::new(field, "is required"));
            None
        }
        Some(raw) => match parse(raw) {
            Ok(secs) => Some(secs),
            Err(e) => {
                errors.push(ValidationError::new(field, e.to_string()));
                None
            }
        },
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// # Example
///
/// ```rust,no_run
/// use pcsync_core::config::{ConfigBuilder, ItemConfig};
///
/// let config = ConfigBuilder::new("/etc/pcsync/session.json", "/var/lib/pcsync/cache.db")
///     .item(ItemConfig::new("backup", "06:00:00", "24:00:00").with_paths("/var/www", "/backup/www"))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new(cookie_file_path: impl Into<PathBuf>, cache_file_path: impl Into<PathBuf>) -> Self {
        Self {
            config: Config {
                cookie_file_path: cookie_file_path.into(),
                cache_file_path: cache_file_path.into(),
                log_file_path: None,
                secure_method: None,
                secure_key: None,
                log_enabled: false,
                printf_enabled: false,
                run_in_daemon: false,
                items: Vec::new(),
            },
        }
    }

    pub fn log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.log_file_path = Some(path.into());
        self.config.log_enabled = true;
        self
    }

    pub fn secure(mut self, method: impl Into<String>, key: Option<String>) -> Self {
        self.config.secure_method = Some(method.into());
        self.config.secure_key = key;
        self
    }

    pub fn printf_enabled(mut self, enabled: bool) -> Self {
        self.config.printf_enabled = enabled;
        self
    }

    pub fn item(mut self, item: ItemConfig) -> Self {
        self.config.items.push(item);
        self
    }

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
