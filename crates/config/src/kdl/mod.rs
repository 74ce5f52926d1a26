//! KDL configuration parsing.

use kdl::KdlDocument;
use tracing::{trace, warn};

use crate::{Config, ConfigError};

mod adapters;
mod helpers;
mod mappings;

use helpers::node_u64;

/// Parse a complete KDL configuration document
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let doc: KdlDocument = content.parse()?;
    let mut config = Config::default();

    for node in doc.nodes() {
        let name = node.name().value();
        trace!(node = %name, "Parsing top-level configuration node");

        match name {
            "concurrency" => {
                config.concurrency = usize::try_from(node_u64(node)?).map_err(|_| {
                    ConfigError::Invalid("'concurrency' is out of range".to_string())
                })?;
            }
            "interval-hours" => config.interval_hours = node_u64(node)?,
            "push-attempts" => {
                config.push_attempts = u32::try_from(node_u64(node)?).map_err(|_| {
                    ConfigError::Invalid("'push-attempts' is out of range".to_string())
                })?;
            }
            "push-retry-delay-ms" => config.push_retry_delay_ms = node_u64(node)?,
            "scanners" => config.scanners = adapters::parse_scanners(node)?,
            "providers" => config.providers = adapters::parse_providers(node)?,
            "mappings" => config.mappings = mappings::parse_mappings(node)?,
            other => warn!(node = %other, "Ignoring unknown configuration node"),
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FileScannerConfig, MappingConfig, ProviderConfig, ScannerConfig};

    const FULL_CONFIG: &str = r#"
concurrency 8
interval-hours 6
push-attempts 4
push-retry-delay-ms 250

scanners {
    scanner "local" {
        type "files"
        pattern "/etc/pki/requests/*.csr"
        cert-extension "pem"
    }
}

providers {
    provider "vault" {
        type "vault"
        address "https://vault.internal:8200"
        mount "pki_int"
        role "web"
        token-env "RENEW_TOKEN"
        timeout-secs 10
    }
    provider "dev" {
        type "self-signed"
    }
}

mappings {
    mapping "web" {
        scanner "local"
        provider "vault"
        expire 720
        threshold 168
    }
    mapping {
        scanner "local"
        provider "dev"
    }
}
"#;

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(FULL_CONFIG).unwrap();

        assert_eq!(config.concurrency, 8);
        assert_eq!(config.interval_hours, 6);
        assert_eq!(config.push_attempts, 4);
        assert_eq!(config.push_retry_delay_ms, 250);

        let ScannerConfig::Files(ref files) = config.scanners["local"];
        assert_eq!(
            files,
            &FileScannerConfig {
                pattern: "/etc/pki/requests/*.csr".to_string(),
                cert_extension: "pem".to_string(),
                key_extension: "key".to_string(),
            }
        );

        match &config.providers["vault"] {
            ProviderConfig::Vault(vault) => {
                assert_eq!(vault.address, "https://vault.internal:8200");
                assert_eq!(vault.mount, "pki_int");
                assert_eq!(vault.role, "web");
                assert_eq!(vault.token, None);
                assert_eq!(vault.token_env, "RENEW_TOKEN");
                assert_eq!(vault.timeout_secs, 10);
            }
            other => panic!("unexpected provider {other:?}"),
        }
        assert_eq!(config.providers["dev"], ProviderConfig::SelfSigned);

        assert_eq!(
            config.mappings,
            vec![
                MappingConfig {
                    name: Some("web".to_string()),
                    scanner: Some("local".to_string()),
                    provider: Some("vault".to_string()),
                    expire: Some(720),
                    threshold: Some(168),
                },
                MappingConfig {
                    name: None,
                    scanner: Some("local".to_string()),
                    provider: Some("dev".to_string()),
                    expire: None,
                    threshold: None,
                },
            ]
        );
    }

    #[test]
    fn test_defaults_when_empty() {
        let config = parse_config("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_negative_integer_rejected() {
        let err = parse_config("concurrency -1").unwrap_err();
        assert!(err.to_string().contains("non-negative"));
    }

    #[test]
    fn test_syntax_error() {
        let err = parse_config("scanners {").unwrap_err();
        assert!(matches!(err, ConfigError::Kdl(_)));
    }

    #[test]
    fn test_duplicate_scanner_rejected() {
        let err = parse_config(
            r#"
scanners {
    scanner "a" { type "files"; pattern "/a/*.csr"; }
    scanner "a" { type "files"; pattern "/b/*.csr"; }
}
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("defined more than once"));
    }

    #[test]
    fn test_example_config() {
        let config = parse_config(include_str!("../../../../reissue.example.kdl")).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.mappings().len(), 1);
    }
}
