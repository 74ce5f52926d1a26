//! Configuration linting
//!
//! Settings that load and run but are probably mistakes.

use super::{ValidationResult, ValidationWarning};
use crate::{Config, ProviderConfig};

/// Concurrency above which a signing backend is likely to throttle
const HIGH_CONCURRENCY: usize = 64;

/// Lint configuration for likely mistakes
pub fn lint_config(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    for mapping in &config.mappings {
        // A fresh certificate would already be inside its own renewal window
        if let (Some(expire), Some(threshold)) = (mapping.expire, mapping.threshold) {
            if expire > 0 && threshold >= expire {
                result.add_warning(ValidationWarning::new(format!(
                    "Mapping '{}' has threshold {}h >= expire {}h; certificates will be renewed on every run",
                    mapping.display_name(),
                    threshold,
                    expire
                )));
            }
        }
    }

    for (name, provider) in &config.providers {
        if let ProviderConfig::Vault(vault) = provider {
            if vault.address.starts_with("http://") {
                result.add_warning(ValidationWarning::new(format!(
                    "Provider '{}' talks to Vault over plain HTTP; tokens and private keys travel unencrypted",
                    name
                )));
            }
            if vault.token.is_some() {
                result.add_warning(ValidationWarning::new(format!(
                    "Provider '{}' has an inline token; prefer token-env",
                    name
                )));
            }
        }
    }

    if config.concurrency > HIGH_CONCURRENCY {
        result.add_warning(ValidationWarning::new(format!(
            "concurrency {} is high; the signing backend may throttle or reject requests",
            config.concurrency
        )));
    }

    if config.interval_hours == 0 {
        result.add_warning(ValidationWarning::new(
            "interval-hours 0 is raised to the 1 hour minimum in daemon mode",
        ));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MappingConfig, VaultProviderConfig};

    #[test]
    fn test_threshold_not_below_expire() {
        let mut config = Config::default();
        config.mappings.push(MappingConfig {
            name: Some("web".to_string()),
            expire: Some(24),
            threshold: Some(48),
            ..MappingConfig::default()
        });

        let result = lint_config(&config);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.message.contains("renewed on every run")));
    }

    #[test]
    fn test_plain_http_and_inline_token() {
        let mut vault = VaultProviderConfig::new("http://vault:8200", "web");
        vault.token = Some("s.secret".to_string());

        let mut config = Config::default();
        config
            .providers
            .insert("vault".to_string(), ProviderConfig::Vault(vault));

        let result = lint_config(&config);
        assert_eq!(result.warnings.len(), 2);
    }

    #[test]
    fn test_clean_config_has_no_warnings() {
        assert!(lint_config(&Config::default()).warnings.is_empty());
    }
}
