//! PEM request and certificate inspection.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use x509_parser::parse_x509_certificate;
use x509_parser::prelude::{FromDer, GeneralName, ParsedExtension, X509CertificationRequest};

use crate::error::ParseError;

const CSR_TAGS: &[&str] = &["CERTIFICATE REQUEST", "NEW CERTIFICATE REQUEST"];
const CERT_TAG: &str = "CERTIFICATE";

/// Subject information requested by a CSR
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsrSubject {
    pub cn: Option<String>,
    pub sans: Vec<String>,
    pub ip_sans: Vec<IpAddr>,
}

/// Read the common name and subject alternative names from a PEM CSR
pub fn parse_csr_pem(data: &[u8]) -> Result<CsrSubject, ParseError> {
    let block = pem::parse(data)?;
    if !CSR_TAGS.contains(&block.tag()) {
        return Err(ParseError::UnexpectedTag {
            expected: "CERTIFICATE REQUEST",
            found: block.tag().to_string(),
        });
    }

    let (_, csr) = X509CertificationRequest::from_der(block.contents())
        .map_err(|e| ParseError::Der(e.to_string()))?;

    let cn = csr
        .certification_request_info
        .subject
        .iter_common_name()
        .next()
        .and_then(|attr| attr.as_str().ok())
        .map(str::to_string);

    let mut subject = CsrSubject {
        cn,
        ..CsrSubject::default()
    };

    if let Some(extensions) = csr.requested_extensions() {
        for extension in extensions {
            if let ParsedExtension::SubjectAlternativeName(san) = extension {
                for name in &san.general_names {
                    match name {
                        GeneralName::DNSName(dns) => subject.sans.push(dns.to_string()),
                        GeneralName::IPAddress(bytes) => {
                            if let Some(ip) = ip_from_bytes(bytes) {
                                subject.ip_sans.push(ip);
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    Ok(subject)
}

/// Read the expiry of the first certificate in a PEM bundle
pub fn parse_not_after(data: &[u8]) -> Result<DateTime<Utc>, ParseError> {
    let block = pem::parse(data)?;
    if block.tag() != CERT_TAG {
        return Err(ParseError::UnexpectedTag {
            expected: CERT_TAG,
            found: block.tag().to_string(),
        });
    }

    let (_, cert) =
        parse_x509_certificate(block.contents()).map_err(|e| ParseError::Der(e.to_string()))?;

    let timestamp = cert.validity().not_after.timestamp();
    DateTime::from_timestamp(timestamp, 0).ok_or(ParseError::Timestamp(timestamp))
}

fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => <[u8; 4]>::try_from(bytes).ok().map(IpAddr::from),
        16 => <[u8; 16]>::try_from(bytes).ok().map(IpAddr::from),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Request and certificate generation for tests.

    use rcgen::{CertificateParams, DnType, KeyPair};
    use time::OffsetDateTime;

    /// PEM CSR for `cn` with the given DNS and IP names
    pub fn csr_pem(cn: &str, names: &[&str]) -> String {
        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        let mut params = CertificateParams::new(names).unwrap();
        params.distinguished_name.push(DnType::CommonName, cn);
        let key = KeyPair::generate().unwrap();
        params.serialize_request(&key).unwrap().pem().unwrap()
    }

    /// PEM self-signed certificate expiring at `not_after`
    pub fn cert_pem(cn: &str, not_after: OffsetDateTime) -> String {
        let mut params = CertificateParams::new(vec![cn.to_string()]).unwrap();
        params.distinguished_name.push(DnType::CommonName, cn);
        params.not_before = not_after - time::Duration::days(30);
        params.not_after = not_after;
        let key = KeyPair::generate().unwrap();
        params.self_signed(&key).unwrap().pem()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    #[test]
    fn test_parse_csr() {
        let pem = fixtures::csr_pem("web.example.com", &["web.example.com", "www.example.com", "10.0.0.7"]);
        let subject = parse_csr_pem(pem.as_bytes()).unwrap();

        assert_eq!(subject.cn.as_deref(), Some("web.example.com"));
        assert_eq!(subject.sans, vec!["web.example.com", "www.example.com"]);
        assert_eq!(subject.ip_sans, vec!["10.0.0.7".parse::<IpAddr>().unwrap()]);
    }

    #[test]
    fn test_parse_not_after() {
        let not_after = OffsetDateTime::from_unix_timestamp(1_900_000_000).unwrap();
        let pem = fixtures::cert_pem("web.example.com", not_after);

        let parsed = parse_not_after(pem.as_bytes()).unwrap();
        assert_eq!(parsed.timestamp(), 1_900_000_000);
    }

    #[test]
    fn test_wrong_block_kind() {
        let not_after = OffsetDateTime::from_unix_timestamp(1_900_000_000).unwrap();
        let cert = fixtures::cert_pem("web.example.com", not_after);

        let err = parse_csr_pem(cert.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedTag { .. }));
    }

    #[test]
    fn test_garbage() {
        assert!(matches!(
            parse_not_after(b"not a certificate"),
            Err(ParseError::Pem(_))
        ));
    }
}
