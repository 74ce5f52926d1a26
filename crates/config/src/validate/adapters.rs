//! Scanner and provider validation
//!
//! Checks what can be checked without touching the filesystem or network:
//! discovery patterns compile and provider addresses parse.

use std::path::Path;

use super::{ErrorCategory, ValidationError, ValidationResult};
use crate::{Config, ProviderConfig, ScannerConfig};

/// Validate scanner and provider definitions
pub fn validate_adapters(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    for (name, scanner) in &config.scanners {
        match scanner {
            ScannerConfig::Files(files) => {
                if let Err(e) = glob::Pattern::new(&files.pattern) {
                    result.add_error(ValidationError::new(
                        ErrorCategory::Scanner,
                        format!("Scanner '{}' has an invalid pattern {:?}: {}", name, files.pattern, e),
                    ));
                }
                if files.cert_extension == files.key_extension {
                    result.add_error(ValidationError::new(
                        ErrorCategory::Scanner,
                        format!(
                            "Scanner '{}' uses extension '{}' for both certificate and key",
                            name, files.cert_extension
                        ),
                    ));
                }
                // Renewed files replace the matched request's extension
                let request_extension = Path::new(&files.pattern)
                    .extension()
                    .and_then(|ext| ext.to_str());
                if let Some(ext) = request_extension.filter(|ext| {
                    *ext == files.cert_extension || *ext == files.key_extension
                }) {
                    result.add_error(ValidationError::new(
                        ErrorCategory::Scanner,
                        format!(
                            "Scanner '{}' would overwrite its certificate requests: pattern and output both use '.{}'",
                            name, ext
                        ),
                    ));
                }
            }
        }
    }

    for (name, provider) in &config.providers {
        match provider {
            ProviderConfig::Vault(vault) => {
                match url::Url::parse(&vault.address) {
                    Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                    Ok(url) => result.add_error(ValidationError::new(
                        ErrorCategory::Provider,
                        format!(
                            "Provider '{}' address must be http or https, got '{}'",
                            name,
                            url.scheme()
                        ),
                    )),
                    Err(e) => result.add_error(ValidationError::new(
                        ErrorCategory::Provider,
                        format!("Provider '{}' has an invalid address {:?}: {}", name, vault.address, e),
                    )),
                }
                if vault.role.trim().is_empty() {
                    result.add_error(ValidationError::new(
                        ErrorCategory::Provider,
                        format!("Provider '{}' has an empty role", name),
                    ));
                }
                if vault.timeout_secs == 0 {
                    result.add_error(ValidationError::new(
                        ErrorCategory::Provider,
                        format!("Provider '{}' timeout-secs must be at least 1", name),
                    ));
                }
            }
            ProviderConfig::SelfSigned => {}
        }
    }

    result
}
