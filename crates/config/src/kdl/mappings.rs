//! Mapping KDL parsing.
//!
//! Missing fields are kept as `None`; completeness is a validation concern.

use kdl::KdlNode;
use tracing::trace;

use crate::{ConfigError, MappingConfig};

use super::helpers::{children, get_first_arg_string, get_string_entry, get_u64_entry};

/// Parse `mappings { mapping "<name>" { ... } }`
pub fn parse_mappings(node: &KdlNode) -> Result<Vec<MappingConfig>, ConfigError> {
    let mut mappings = Vec::new();

    for child in children(node) {
        if child.name().value() != "mapping" {
            return Err(ConfigError::Invalid(format!(
                "unexpected '{}' inside 'mappings', expected 'mapping'",
                child.name().value()
            )));
        }

        let mapping = MappingConfig {
            name: get_first_arg_string(child),
            scanner: get_string_entry(child, "scanner"),
            provider: get_string_entry(child, "provider"),
            expire: get_u64_entry(child, "expire")?,
            threshold: get_u64_entry(child, "threshold")?,
        };

        trace!(
            mapping = %mapping.display_name(),
            expire = ?mapping.expire,
            threshold = ?mapping.threshold,
            "Parsed mapping"
        );

        mappings.push(mapping);
    }

    Ok(mappings)
}
