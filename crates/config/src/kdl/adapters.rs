//! Scanner and provider KDL parsing.

use std::collections::BTreeMap;

use kdl::KdlNode;
use tracing::trace;

use crate::{ConfigError, FileScannerConfig, ProviderConfig, ScannerConfig, VaultProviderConfig};

use super::helpers::{children, get_first_arg_string, get_string_entry, get_u64_entry};

/// Parse `scanners { scanner "<name>" { ... } }`
pub fn parse_scanners(node: &KdlNode) -> Result<BTreeMap<String, ScannerConfig>, ConfigError> {
    parse_named_blocks(node, "scanner", parse_scanner)
}

/// Parse `providers { provider "<name>" { ... } }`
pub fn parse_providers(node: &KdlNode) -> Result<BTreeMap<String, ProviderConfig>, ConfigError> {
    parse_named_blocks(node, "provider", parse_provider)
}

fn parse_named_blocks<T>(
    node: &KdlNode,
    kind: &str,
    parse: impl Fn(&str, &KdlNode) -> Result<T, ConfigError>,
) -> Result<BTreeMap<String, T>, ConfigError> {
    let mut parsed = BTreeMap::new();

    for child in children(node) {
        if child.name().value() != kind {
            return Err(ConfigError::Invalid(format!(
                "unexpected '{}' inside '{}', expected '{kind}'",
                child.name().value(),
                node.name().value()
            )));
        }

        let name = get_first_arg_string(child).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "{kind} requires a name argument, e.g. {kind} \"local\" {{ ... }}"
            ))
        })?;

        trace!(kind = %kind, name = %name, "Parsing adapter block");

        let value = parse(&name, child)?;
        if parsed.insert(name.clone(), value).is_some() {
            return Err(ConfigError::Invalid(format!(
                "{kind} '{name}' is defined more than once"
            )));
        }
    }

    Ok(parsed)
}

fn required(node: &KdlNode, kind: &str, name: &str, field: &str) -> Result<String, ConfigError> {
    get_string_entry(node, field).ok_or_else(|| {
        ConfigError::Invalid(format!("{kind} '{name}' requires a '{field}' field"))
    })
}

fn parse_scanner(name: &str, node: &KdlNode) -> Result<ScannerConfig, ConfigError> {
    let kind = required(node, "scanner", name, "type")?;

    match kind.as_str() {
        "files" => {
            let mut files = FileScannerConfig::new(required(node, "scanner", name, "pattern")?);
            if let Some(ext) = get_string_entry(node, "cert-extension") {
                files.cert_extension = ext;
            }
            if let Some(ext) = get_string_entry(node, "key-extension") {
                files.key_extension = ext;
            }
            Ok(ScannerConfig::Files(files))
        }
        other => Err(ConfigError::Invalid(format!(
            "scanner '{name}' has unknown type '{other}' (expected \"files\")"
        ))),
    }
}

fn parse_provider(name: &str, node: &KdlNode) -> Result<ProviderConfig, ConfigError> {
    let kind = required(node, "provider", name, "type")?;

    match kind.as_str() {
        "vault" => {
            let mut vault = VaultProviderConfig::new(
                required(node, "provider", name, "address")?,
                required(node, "provider", name, "role")?,
            );
            if let Some(mount) = get_string_entry(node, "mount") {
                vault.mount = mount;
            }
            vault.token = get_string_entry(node, "token");
            if let Some(token_env) = get_string_entry(node, "token-env") {
                vault.token_env = token_env;
            }
            if let Some(timeout) = get_u64_entry(node, "timeout-secs")? {
                vault.timeout_secs = timeout;
            }
            Ok(ProviderConfig::Vault(vault))
        }
        "self-signed" => Ok(ProviderConfig::SelfSigned),
        other => Err(ConfigError::Invalid(format!(
            "provider '{name}' has unknown type '{other}' (expected \"vault\" or \"self-signed\")"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use crate::kdl::parse_config;

    #[test]
    fn test_unknown_scanner_type() {
        let err = parse_config(
            r#"scanners { scanner "s3" { type "bucket"; pattern "x"; } }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown type 'bucket'"));
    }

    #[test]
    fn test_vault_requires_role() {
        let err = parse_config(
            r#"providers { provider "vault" { type "vault"; address "https://v:8200"; } }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("requires a 'role' field"));
    }

    #[test]
    fn test_scanner_requires_name() {
        let err = parse_config(r#"scanners { scanner { type "files"; } }"#).unwrap_err();
        assert!(err.to_string().contains("requires a name argument"));
    }
}
