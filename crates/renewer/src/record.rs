//! Certificate records flowing through the renewal pipeline.

use std::net::IpAddr;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// A certificate request/certificate pair found by a scanner
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertRecord {
    /// Stable identity, e.g. the canonical request path
    pub id: String,
    /// Where the certificate is stored
    pub cert: Option<PathBuf>,
    /// Where the private key is stored
    pub key: Option<PathBuf>,
    /// Expiry of the current certificate; `None` when it could not be read
    pub expiration: Option<DateTime<Utc>>,
    /// Subject common name
    pub cn: Option<String>,
    /// DNS subject alternative names
    pub sans: Vec<String>,
    /// IP subject alternative names
    pub ip_sans: Vec<IpAddr>,
}

impl CertRecord {
    /// A record with nothing but an identity
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cert: None,
            key: None,
            expiration: None,
            cn: None,
            sans: Vec::new(),
            ip_sans: Vec::new(),
        }
    }

    /// Whether the certificate expires strictly before `now + threshold`
    ///
    /// A record with unknown expiration is never due: it cannot be assessed.
    pub fn is_due(&self, threshold: Duration, now: DateTime<Utc>) -> bool {
        let Some(expiration) = self.expiration else {
            return false;
        };
        match now.checked_add_signed(threshold) {
            Some(horizon) => expiration < horizon,
            None => true,
        }
    }
}

/// Keep the records due for renewal, in their original order
pub fn select_expiring(
    records: Vec<CertRecord>,
    threshold: Duration,
    now: DateTime<Utc>,
) -> Vec<CertRecord> {
    records
        .into_iter()
        .filter(|record| record.is_due(threshold, now))
        .collect()
}

/// A record enriched with a freshly issued certificate
#[derive(Debug, Clone, Serialize)]
pub struct SignedRecord {
    /// The record that was signed
    pub record: CertRecord,
    /// Serial number of the new certificate
    pub serial: String,
    /// PEM certificate, leaf first, followed by any chain
    pub cert_pem: String,
    /// PEM private key
    #[serde(skip)]
    pub key_pem: String,
    /// Expiry of the new certificate, when the provider reports it
    pub expiration: Option<DateTime<Utc>>,
}

impl SignedRecord {
    /// Identity of the underlying record
    pub fn id(&self) -> &str {
        &self.record.id
    }
}
