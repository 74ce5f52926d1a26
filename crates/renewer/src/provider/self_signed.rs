//! Self-signed provider for development and testing.

use async_trait::async_trait;
use chrono::{DateTime, Duration};
use rcgen::{CertificateParams, DnType, KeyPair, SerialNumber};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use super::Provider;
use crate::error::ProviderError;
use crate::record::{CertRecord, SignedRecord};

/// Issues a fresh key pair and a self-signed certificate per record
#[derive(Debug, Clone)]
pub struct SelfSignedProvider {
    name: String,
}

impl SelfSignedProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Random positive serial, as raw bytes and colon-separated hex
fn random_serial() -> (Vec<u8>, String) {
    let mut bytes = Uuid::new_v4().as_bytes().to_vec();
    bytes[0] &= 0x7f;
    let display = bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":");
    (bytes, display)
}

#[async_trait(?Send)]
impl Provider for SelfSignedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn sign(&self, record: &CertRecord, valid: Duration) -> Result<SignedRecord, ProviderError> {
        let id = &record.id;
        let cn = record
            .cn
            .as_deref()
            .ok_or_else(|| ProviderError::MissingCommonName { id: id.clone() })?;
        let generate = |source: rcgen::Error| ProviderError::Generate {
            id: id.clone(),
            source,
        };

        let mut names = record.sans.clone();
        if names.is_empty() {
            names.push(cn.to_string());
        }
        names.extend(record.ip_sans.iter().map(|ip| ip.to_string()));

        let mut params = CertificateParams::new(names).map_err(generate)?;
        params.distinguished_name.push(DnType::CommonName, cn);

        let now = OffsetDateTime::now_utc();
        let not_after = now
            .checked_add(time::Duration::seconds(valid.num_seconds()))
            .ok_or_else(|| ProviderError::Validity {
                id: id.clone(),
                hours: valid.num_hours(),
            })?;
        params.not_before = now;
        params.not_after = not_after;

        let (serial_bytes, serial) = random_serial();
        params.serial_number = Some(SerialNumber::from_slice(&serial_bytes));

        let key = KeyPair::generate().map_err(generate)?;
        let cert = params.self_signed(&key).map_err(generate)?;

        debug!(id = %id, provider = %self.name, serial = %serial, "Issued self-signed certificate");

        Ok(SignedRecord {
            record: record.clone(),
            serial,
            cert_pem: cert.pem(),
            key_pem: key.serialize_pem(),
            expiration: DateTime::from_timestamp(not_after.unix_timestamp(), 0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::x509;

    fn record() -> CertRecord {
        let mut record = CertRecord::new("web");
        record.cn = Some("web.example.com".to_string());
        record.ip_sans = vec!["127.0.0.1".parse().unwrap()];
        record
    }

    #[tokio::test]
    async fn test_sign() {
        let provider = SelfSignedProvider::new("dev");
        let signed = provider.sign(&record(), Duration::hours(48)).await.unwrap();

        assert!(signed.cert_pem.starts_with("-----BEGIN CERTIFICATE-----"));
        assert!(signed.key_pem.contains("PRIVATE KEY"));

        let not_after = x509::parse_not_after(signed.cert_pem.as_bytes()).unwrap();
        assert_eq!(Some(not_after), signed.expiration);

        let remaining = not_after - chrono::Utc::now();
        assert!(remaining > Duration::hours(47));
        assert!(remaining <= Duration::hours(48));
    }

    #[tokio::test]
    async fn test_serials_are_unique_and_positive() {
        let provider = SelfSignedProvider::new("dev");
        let a = provider.sign(&record(), Duration::hours(1)).await.unwrap();
        let b = provider.sign(&record(), Duration::hours(1)).await.unwrap();

        assert_ne!(a.serial, b.serial);
        let first = u8::from_str_radix(&a.serial[..2], 16).unwrap();
        assert!(first < 0x80);
    }

    #[tokio::test]
    async fn test_validity_out_of_range() {
        let provider = SelfSignedProvider::new("dev");
        let err = provider
            .sign(&record(), crate::renewer::hours(100_000_000))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::Validity { hours: 100_000_000, .. }
        ));
        assert_eq!(err.id(), Some("web"));
    }

    #[tokio::test]
    async fn test_missing_common_name() {
        let provider = SelfSignedProvider::new("dev");
        let err = provider
            .sign(&CertRecord::new("bare"), Duration::hours(1))
            .await
            .unwrap_err();
        assert_eq!(err.id(), Some("bare"));
    }
}
