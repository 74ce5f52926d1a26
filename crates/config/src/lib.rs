//! Reissue Configuration
//!
//! Loads the renewal agent's configuration once at startup and validates
//! its shape before anything runs.
//!
//! Two formats are accepted: KDL (the default) and TOML, selected by a
//! `.toml` file extension. Both describe the same model: a concurrency
//! limit, named scanners, named providers, and mappings that pair one
//! scanner with one provider plus renewal policy.
//!
//! # Example
//!
//! ```kdl
//! concurrency 5
//!
//! scanners {
//!     scanner "local" {
//!         type "files"
//!         pattern "/etc/pki/requests/*.csr"
//!     }
//! }
//!
//! providers {
//!     provider "vault" {
//!         type "vault"
//!         address "https://vault.internal:8200"
//!         role "web"
//!     }
//! }
//!
//! mappings {
//!     mapping "web" {
//!         scanner "local"
//!         provider "vault"
//!         expire 720
//!         threshold 168
//!     }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

mod kdl;
pub mod validate;

pub use validate::{ErrorCategory, ValidationError, ValidationResult, ValidationWarning};

/// Default number of certificates processed concurrently
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Default hours between renewal passes in daemon mode
pub const DEFAULT_INTERVAL_HOURS: u64 = 12;

/// Default attempts at storing a freshly signed certificate
pub const DEFAULT_PUSH_ATTEMPTS: u32 = 3;

/// Default delay between storage attempts
pub const DEFAULT_PUSH_RETRY_DELAY_MS: u64 = 500;

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while loading configuration
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("failed to read configuration file {path:?}: {source}")]
    #[diagnostic(code(reissue::config::read))]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// KDL syntax error
    #[error(transparent)]
    #[diagnostic(transparent)]
    Kdl(#[from] ::kdl::KdlError),

    /// TOML syntax or shape error
    #[error("invalid TOML configuration: {0}")]
    #[diagnostic(code(reissue::config::toml))]
    Toml(#[from] toml::de::Error),

    /// Well-formed input describing an invalid configuration
    #[error("invalid configuration: {0}")]
    #[diagnostic(code(reissue::config::invalid))]
    Invalid(String),

    /// Validation found errors
    #[error("configuration validation failed:\n{0}")]
    #[diagnostic(code(reissue::config::validation))]
    Validation(String),
}

// ============================================================================
// Configuration Model
// ============================================================================

/// Root configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Maximum certificates in flight per batch
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Hours between passes in daemon mode
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,

    /// Attempts at storing a signed certificate before giving up
    #[serde(default = "default_push_attempts")]
    pub push_attempts: u32,

    /// Delay between storage attempts in milliseconds
    #[serde(default = "default_push_retry_delay_ms")]
    pub push_retry_delay_ms: u64,

    /// Named scanners
    #[serde(default)]
    pub scanners: BTreeMap<String, ScannerConfig>,

    /// Named providers
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,

    /// Scanner/provider pairings
    #[serde(default)]
    pub mappings: Vec<MappingConfig>,
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_interval_hours() -> u64 {
    DEFAULT_INTERVAL_HOURS
}

fn default_push_attempts() -> u32 {
    DEFAULT_PUSH_ATTEMPTS
}

fn default_push_retry_delay_ms() -> u64 {
    DEFAULT_PUSH_RETRY_DELAY_MS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            interval_hours: DEFAULT_INTERVAL_HOURS,
            push_attempts: DEFAULT_PUSH_ATTEMPTS,
            push_retry_delay_ms: DEFAULT_PUSH_RETRY_DELAY_MS,
            scanners: BTreeMap::new(),
            providers: BTreeMap::new(),
            mappings: Vec::new(),
        }
    }
}

/// Scanner adapter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ScannerConfig {
    /// Request files discovered by glob pattern
    Files(FileScannerConfig),
}

/// File scanner settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FileScannerConfig {
    /// Glob pattern matching certificate request files
    pub pattern: String,

    /// Extension of the certificate stored next to each request
    #[serde(default = "default_cert_extension")]
    pub cert_extension: String,

    /// Extension of the private key stored next to each request
    #[serde(default = "default_key_extension")]
    pub key_extension: String,
}

fn default_cert_extension() -> String {
    "crt".to_string()
}

fn default_key_extension() -> String {
    "key".to_string()
}

impl FileScannerConfig {
    /// Settings for `pattern` with default extensions
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            cert_extension: default_cert_extension(),
            key_extension: default_key_extension(),
        }
    }
}

/// Provider adapter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ProviderConfig {
    /// HashiCorp Vault PKI secrets engine
    Vault(VaultProviderConfig),
    /// Locally generated self-signed certificates
    SelfSigned,
}

/// Vault PKI provider settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VaultProviderConfig {
    /// Vault server address, e.g. `https://vault.internal:8200`
    pub address: String,

    /// PKI secrets engine mount path
    #[serde(default = "default_mount")]
    pub mount: String,

    /// PKI role used to issue certificates
    pub role: String,

    /// Vault token (prefer `token-env`)
    #[serde(default)]
    pub token: Option<String>,

    /// Environment variable holding the Vault token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_mount() -> String {
    "pki".to_string()
}

fn default_token_env() -> String {
    "VAULT_TOKEN".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl VaultProviderConfig {
    /// Settings for `address` and `role` with defaults for everything else
    pub fn new(address: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            mount: default_mount(),
            role: role.into(),
            token: None,
            token_env: default_token_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// A mapping as written in the configuration file
///
/// Every field is optional here; incomplete mappings are reported and
/// skipped by [`Config::mappings`] rather than failing the whole load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MappingConfig {
    /// Name used in logs; defaults to `<scanner>-><provider>`
    #[serde(default)]
    pub name: Option<String>,

    /// Scanner name
    #[serde(default)]
    pub scanner: Option<String>,

    /// Provider name
    #[serde(default)]
    pub provider: Option<String>,

    /// Validity of renewed certificates, in hours
    #[serde(default)]
    pub expire: Option<u64>,

    /// Lead time before expiry that triggers renewal, in hours
    #[serde(default)]
    pub threshold: Option<u64>,
}

impl MappingConfig {
    /// Display name for logs and reports
    pub fn display_name(&self) -> String {
        if let Some(ref name) = self.name {
            return name.clone();
        }
        format!(
            "{}->{}",
            self.scanner.as_deref().unwrap_or("?"),
            self.provider.as_deref().unwrap_or("?")
        )
    }
}

/// A complete, validated mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    /// Name used in logs
    pub name: String,
    /// Scanner name
    pub scanner: String,
    /// Provider name
    pub provider: String,
    /// Validity of renewed certificates, in hours
    pub expire_hours: u64,
    /// Lead time before expiry that triggers renewal, in hours
    pub threshold_hours: u64,
}

// ============================================================================
// Loading
// ============================================================================

impl Config {
    /// Load configuration from a file
    ///
    /// Files ending in `.toml` are parsed as TOML, everything else as KDL.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        let config = if is_toml {
            Self::from_toml(&content)?
        } else {
            Self::from_kdl(&content)?
        };

        info!(
            path = %path.display(),
            scanners = config.scanners.len(),
            providers = config.providers.len(),
            mappings = config.mappings.len(),
            "Loaded configuration"
        );

        Ok(config)
    }

    /// Parse KDL configuration text
    pub fn from_kdl(content: &str) -> Result<Self, ConfigError> {
        self::kdl::parse_config(content)
    }

    /// Parse TOML configuration text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        debug!("Parsing TOML configuration");
        Ok(toml::from_str(content)?)
    }

    /// Validate the configuration
    ///
    /// Errors make the configuration unusable; warnings mark mappings that
    /// will be skipped and other suspicious settings.
    pub fn validate(&self) -> ValidationResult {
        validate::validate_config(self)
    }

    /// Validate, turning any error into [`ConfigError::Validation`]
    ///
    /// Warnings are returned for the caller to log.
    pub fn validated(&self) -> Result<Vec<ValidationWarning>, ConfigError> {
        let result = self.validate();
        if result.errors.is_empty() {
            return Ok(result.warnings);
        }
        let message = result
            .errors
            .iter()
            .map(|e| format!("  - {e}"))
            .collect::<Vec<_>>()
            .join("\n");
        Err(ConfigError::Validation(message))
    }

    /// The mappings that can run, in file order
    ///
    /// Mappings missing a scanner, provider, `expire` or `threshold`, or
    /// naming an undefined scanner or provider, are left out. Use
    /// [`validate`](Self::validate) to see why.
    pub fn mappings(&self) -> Vec<Mapping> {
        self.mappings
            .iter()
            .filter_map(|raw| validate::resolve_mapping(self, raw).ok())
            .collect()
    }
}
