//! Certificate discovery and storage.
//!
//! A scanner finds certificate records and stores renewed certificates back
//! where it found them.

use std::num::NonZeroUsize;

use async_trait::async_trait;
use chrono::Duration;
use reissue_config::ScannerConfig;

use crate::error::ScanError;
use crate::record::{CertRecord, SignedRecord};

mod files;
pub mod x509;

pub use files::FileScanner;

/// Source and sink of certificate records
#[async_trait(?Send)]
pub trait Scanner {
    /// Configured name
    fn name(&self) -> &str;

    /// Discover every candidate record
    ///
    /// Records whose certificate cannot be read or parsed are returned with
    /// `expiration: None`. An `Err` means discovery as a whole failed.
    /// `threshold` is advisory; callers filter the returned records.
    async fn scan(&self, threshold: Duration) -> Result<Vec<CertRecord>, ScanError>;

    /// Store a renewed certificate and key for its record
    async fn push(&self, signed: &SignedRecord) -> Result<(), ScanError>;
}

/// Build a scanner from its configuration
pub fn build(
    name: &str,
    config: &ScannerConfig,
    concurrency: NonZeroUsize,
) -> Result<Box<dyn Scanner>, ScanError> {
    match config {
        ScannerConfig::Files(files) => Ok(Box::new(FileScanner::new(name, files, concurrency)?)),
    }
}
