//! Certificate signing backends.

use async_trait::async_trait;
use chrono::Duration;
use reissue_config::ProviderConfig;

use crate::error::ProviderError;
use crate::record::{CertRecord, SignedRecord};

mod self_signed;
mod vault;

pub use self_signed::SelfSignedProvider;
pub use vault::VaultProvider;

/// Issues certificates for records
#[async_trait(?Send)]
pub trait Provider {
    /// Configured name
    fn name(&self) -> &str;

    /// Issue a certificate for `record` valid for `valid`
    ///
    /// Errors carry the record id.
    async fn sign(&self, record: &CertRecord, valid: Duration)
        -> Result<SignedRecord, ProviderError>;
}

/// Build a provider from its configuration
pub fn build(name: &str, config: &ProviderConfig) -> Result<Box<dyn Provider>, ProviderError> {
    match config {
        ProviderConfig::Vault(vault) => Ok(Box::new(VaultProvider::new(name, vault)?)),
        ProviderConfig::SelfSigned => Ok(Box::new(SelfSignedProvider::new(name))),
    }
}
