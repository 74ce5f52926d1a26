//! Error types for the renewal agent.

use std::fmt;
use std::io;

use reissue_common::BatchFailure;
use thiserror::Error;

/// Named file belonging to one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilePart {
    /// Certificate signing request
    Csr,
    /// Certificate
    Cert,
    /// Private key
    Key,
}

impl fmt::Display for FilePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilePart::Csr => "request",
            FilePart::Cert => "certificate",
            FilePart::Key => "private key",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while parsing requests and certificates
#[derive(Debug, Error)]
pub enum ParseError {
    /// Not PEM
    #[error("invalid PEM: {0}")]
    Pem(#[from] pem::PemError),

    /// PEM block of the wrong kind
    #[error("expected a {expected} PEM block, found {found}")]
    UnexpectedTag { expected: &'static str, found: String },

    /// DER contents did not parse
    #[error("invalid DER: {0}")]
    Der(String),

    /// Timestamp outside the representable range
    #[error("timestamp {0} is out of range")]
    Timestamp(i64),
}

/// Errors raised by scanners
#[derive(Debug, Error)]
pub enum ScanError {
    /// The discovery pattern does not compile
    #[error("invalid discovery pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// Discovery as a whole failed
    #[error("discovery failed: {0}")]
    Discovery(String),

    /// The record does not say where a file goes
    #[error("record {id} has no {part} location")]
    MissingLocation { id: String, part: FilePart },

    /// Writing a renewed file failed
    #[error("failed to write {part} for {id}: {source}")]
    Write {
        id: String,
        part: FilePart,
        #[source]
        source: BatchFailure<io::Error>,
    },
}

/// Errors raised by providers
///
/// Every per-record variant carries the record id.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The record has nothing to put in the subject
    #[error("record {id} has no common name")]
    MissingCommonName { id: String },

    /// Transport failure talking to the signing backend
    #[error("signing request for {id} failed: {source}")]
    Http {
        id: String,
        #[source]
        source: reqwest::Error,
    },

    /// The signing backend refused the request
    #[error("signing backend rejected {id} (HTTP {status}): {message}")]
    Rejected {
        id: String,
        status: u16,
        message: String,
    },

    /// The signing backend answered with something unusable
    #[error("malformed signing response for {id}: {message}")]
    MalformedResponse { id: String, message: String },

    /// The requested lifetime runs past the last representable date
    #[error("validity of {hours}h for {id} is out of range")]
    Validity { id: String, hours: i64 },

    /// Local certificate generation failed
    #[error("certificate generation for {id} failed: {source}")]
    Generate {
        id: String,
        #[source]
        source: rcgen::Error,
    },

    /// The provider could not be constructed
    #[error("provider configuration error: {0}")]
    Config(String),
}

/// Why one record was not renewed
#[derive(Debug, Error)]
pub enum RenewError {
    /// Signing failed; nothing was stored
    #[error(transparent)]
    Sign(ProviderError),

    /// A certificate was issued but could not be stored
    #[error("certificate {serial} was issued but not stored after {attempts} attempt(s): {source}")]
    Push {
        id: String,
        serial: String,
        attempts: u32,
        #[source]
        source: ScanError,
    },
}

impl RenewError {
    /// Identity of the record that failed
    pub fn id(&self) -> Option<&str> {
        match self {
            RenewError::Sign(err) => err.id(),
            RenewError::Push { id, .. } => Some(id),
        }
    }
}

impl ProviderError {
    /// Identity of the record that failed, for per-record errors
    pub fn id(&self) -> Option<&str> {
        match self {
            ProviderError::MissingCommonName { id }
            | ProviderError::Http { id, .. }
            | ProviderError::Rejected { id, .. }
            | ProviderError::MalformedResponse { id, .. }
            | ProviderError::Validity { id, .. }
            | ProviderError::Generate { id, .. } => Some(id),
            ProviderError::Config(_) => None,
        }
    }
}

/// Errors building the agent from configuration
#[derive(Debug, Error)]
pub enum SetupError {
    /// Configuration failed validation
    #[error(transparent)]
    Config(#[from] reissue_config::ConfigError),

    /// A scanner could not be built
    #[error("scanner '{name}': {source}")]
    Scanner {
        name: String,
        #[source]
        source: ScanError,
    },

    /// A provider could not be built
    #[error("provider '{name}': {source}")]
    Provider {
        name: String,
        #[source]
        source: ProviderError,
    },
}
