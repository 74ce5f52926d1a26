//! Reissue: batch renewal of X.509 certificates
//!
//! Scanners discover certificate records and store renewed certificates.
//! Providers issue certificates. A [`Renewer`] ties one scanner to one
//! provider per configured mapping and renews every certificate that
//! expires within the mapping's threshold, a bounded number at a time.
//!
//! # Example
//!
//! ```ignore
//! use reissue::Renewer;
//! use reissue_config::Config;
//!
//! let config = Config::from_file("reissue.kdl")?;
//! let renewer = Renewer::from_config(&config)?;
//! let report = renewer.run_once().await;
//! ```

pub mod error;
pub mod provider;
pub mod record;
pub mod renewer;
pub mod scanner;
pub mod scheduler;
pub mod signals;

pub use error::{FilePart, ParseError, ProviderError, RenewError, ScanError, SetupError};
pub use provider::{Provider, SelfSignedProvider, VaultProvider};
pub use record::{select_expiring, CertRecord, SignedRecord};
pub use renewer::{BatchReport, MappingOutcome, MappingReport, Renewed, Renewer, RunReport};
pub use scanner::{FileScanner, Scanner};
pub use scheduler::RenewalScheduler;
