//! TOML-based configuration persistence for the attendance issuer.
//!
//! Reads and writes `AppConfig` to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\ProximityAttendance\config.toml`
//! - Linux:    `~/.config/proximity-attendance/config.toml`
//! - macOS:    `~/Library/Application Support/ProximityAttendance/config.toml`
//!
//! # Example file
//!
//! ```toml
//! [issuer]
//! issuer_id = "prof-kim"
//! log_level = "info"
//!
//! [acquisition]
//! desired_accuracy_m = 20.0
//! max_duration_ms = 5000
//!
//! [backend]
//! base_url = "http://127.0.0.1:8080"
//! issue_path = "/api/attendance/links"
//! ```
//!
//! # Serde default values
//!
//! Every field carries `#[serde(default = "some_fn")]`, so a file that names
//! only the settings a deployment cares about is complete; everything else
//! falls back to the defaults below.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::acquire_location::AcquisitionConfig;
use crate::application::take_attendance::AttemptSettings;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is outside its allowed range.
    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level application configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub issuer: IssuerSection,
    #[serde(default)]
    pub acquisition: AcquisitionSection,
    #[serde(default)]
    pub emitter: EmitterSection,
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub redemption: RedemptionSection,
}

/// Who is issuing, and how loudly to log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssuerSection {
    /// Identifier of the instructor account sent with every issuance request.
    #[serde(default = "default_issuer_id")]
    pub issuer_id: String,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Location acquisition tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AcquisitionSection {
    /// Accuracy radius at or below which acquisition exits early.
    #[serde(default = "default_desired_accuracy_m")]
    pub desired_accuracy_m: f64,
    /// Hard deadline for one acquisition.
    #[serde(default = "default_max_duration_ms")]
    pub max_duration_ms: u64,
    /// Progress publication cadence.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_true")]
    pub high_accuracy: bool,
    /// Maximum age of a cached fix the hardware may return; 0 forces a fresh fix.
    #[serde(default)]
    pub max_cache_age_ms: u64,
    /// Time allowed for the permission probe's single position read.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

/// Tone emission settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmitterSection {
    /// Linear output amplitude in (0, 1].
    #[serde(default = "default_amplitude")]
    pub amplitude: f32,
}

/// Issuance endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_issue_path")]
    pub issue_path: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Where students redeem issued links.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RedemptionSection {
    #[serde(default = "default_redemption_domain")]
    pub domain: String,
    /// Optional path segment between the domain and `/courses`.
    #[serde(default)]
    pub path_prefix: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_issuer_id() -> String {
    "issuer".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_desired_accuracy_m() -> f64 {
    20.0
}
fn default_max_duration_ms() -> u64 {
    5_000
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_true() -> bool {
    true
}
fn default_probe_timeout_ms() -> u64 {
    5_000
}
fn default_amplitude() -> f32 {
    0.1
}
fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}
fn default_issue_path() -> String {
    "/api/attendance/links".to_string()
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_redemption_domain() -> String {
    "http://localhost:3000".to_string()
}

impl Default for IssuerSection {
    fn default() -> Self {
        Self {
            issuer_id: default_issuer_id(),
            log_level: default_log_level(),
        }
    }
}

impl Default for AcquisitionSection {
    fn default() -> Self {
        Self {
            desired_accuracy_m: default_desired_accuracy_m(),
            max_duration_ms: default_max_duration_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            high_accuracy: default_true(),
            max_cache_age_ms: 0,
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl Default for EmitterSection {
    fn default() -> Self {
        Self {
            amplitude: default_amplitude(),
        }
    }
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            issue_path: default_issue_path(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for RedemptionSection {
    fn default() -> Self {
        Self {
            domain: default_redemption_domain(),
            path_prefix: String::new(),
        }
    }
}

// ── Validation & conversion ───────────────────────────────────────────────────

impl AppConfig {
    /// Checks every value that the application layer would otherwise reject
    /// at run time.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                field,
                reason: reason.into(),
            }
        }

        if self.issuer.issuer_id.trim().is_empty() {
            return Err(invalid("issuer.issuer_id", "must not be empty"));
        }
        let acq = &self.acquisition;
        if !(acq.desired_accuracy_m.is_finite() && acq.desired_accuracy_m > 0.0) {
            return Err(invalid(
                "acquisition.desired_accuracy_m",
                format!("must be a positive number, got {}", acq.desired_accuracy_m),
            ));
        }
        for (field, value) in [
            ("acquisition.max_duration_ms", acq.max_duration_ms),
            ("acquisition.poll_interval_ms", acq.poll_interval_ms),
            ("acquisition.probe_timeout_ms", acq.probe_timeout_ms),
            ("backend.request_timeout_ms", self.backend.request_timeout_ms),
        ] {
            if value == 0 {
                return Err(invalid(field, "must be greater than zero"));
            }
        }
        let amp = self.emitter.amplitude;
        if !(amp > 0.0 && amp <= 1.0) {
            return Err(invalid("emitter.amplitude", format!("must be within (0, 1], got {amp}")));
        }
        if self.backend.base_url.trim().is_empty() {
            return Err(invalid("backend.base_url", "must not be empty"));
        }
        if self.redemption.domain.trim().is_empty() {
            return Err(invalid("redemption.domain", "must not be empty"));
        }
        Ok(())
    }

    /// Acquirer tuning derived from `[acquisition]`.
    pub fn acquisition_config(&self) -> AcquisitionConfig {
        AcquisitionConfig {
            poll_interval: Duration::from_millis(self.acquisition.poll_interval_ms),
            high_accuracy: self.acquisition.high_accuracy,
            maximum_age: Duration::from_millis(self.acquisition.max_cache_age_ms),
        }
    }

    /// Per-attempt settings derived from `[issuer]` and `[acquisition]`.
    pub fn attempt_settings(&self) -> AttemptSettings {
        AttemptSettings {
            issuer_id: self.issuer.issuer_id.clone(),
            desired_accuracy_m: self.acquisition.desired_accuracy_m,
            max_duration: Duration::from_millis(self.acquisition.max_duration_ms),
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.acquisition.probe_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.backend.request_timeout_ms)
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from the default location, returning defaults if the
/// file does not yet exist.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `AppConfig` from `path`, returning defaults if the file does not
/// exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Persists `config` to the default location.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(config, &config_file_path()?)
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("ProximityAttendance"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("proximity-attendance"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("ProximityAttendance")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
