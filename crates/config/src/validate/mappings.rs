//! Mapping validation
//!
//! A mapping that cannot run is skipped with a warning; it never stops the
//! other mappings from loading.

use super::{ValidationResult, ValidationWarning};
use crate::{Config, Mapping, MappingConfig};

/// Turn a raw mapping into a runnable one
///
/// Returns the reason the mapping must be skipped otherwise.
pub fn resolve_mapping(config: &Config, raw: &MappingConfig) -> Result<Mapping, String> {
    let name = raw.display_name();

    let mut missing = Vec::new();
    if raw.scanner.is_none() {
        missing.push("scanner");
    }
    if raw.provider.is_none() {
        missing.push("provider");
    }
    if raw.expire.is_none() {
        missing.push("expire");
    }
    if raw.threshold.is_none() {
        missing.push("threshold");
    }

    let (Some(scanner), Some(provider), Some(expire), Some(threshold)) = (
        raw.scanner.clone(),
        raw.provider.clone(),
        raw.expire,
        raw.threshold,
    ) else {
        return Err(format!(
            "Mapping '{}' is missing {}; skipping it",
            name,
            missing.join(", ")
        ));
    };

    if !config.scanners.contains_key(&scanner) {
        return Err(format!(
            "Mapping '{name}' references undefined scanner '{scanner}'; skipping it"
        ));
    }
    if !config.providers.contains_key(&provider) {
        return Err(format!(
            "Mapping '{name}' references undefined provider '{provider}'; skipping it"
        ));
    }
    if expire == 0 {
        return Err(format!(
            "Mapping '{name}' requests zero-hour certificates (expire 0); skipping it"
        ));
    }

    Ok(Mapping {
        name,
        scanner,
        provider,
        expire_hours: expire,
        threshold_hours: threshold,
    })
}

/// Warn about every mapping that will be skipped
pub fn validate_mappings(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    if config.mappings.is_empty() {
        result.add_warning(ValidationWarning::new(
            "No mappings configured; nothing will be renewed",
        ));
    }

    for raw in &config.mappings {
        if let Err(reason) = resolve_mapping(config, raw) {
            result.add_warning(ValidationWarning::new(reason));
        }
    }

    result
}
