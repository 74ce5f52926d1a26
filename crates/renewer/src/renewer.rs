//! Renewal orchestration
//!
//! For every mapping: discover records through its scanner, keep those
//! expiring within the threshold, then sign and store each one through the
//! packed batch executor. Mappings are independent; a failure in one never
//! stops the next.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use reissue_common::{pack, BatchFailure};
use reissue_config::{Config, Mapping};
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::error::{RenewError, ScanError, SetupError};
use crate::provider::{self, Provider};
use crate::record::{select_expiring, CertRecord};
use crate::scanner::{self, Scanner};

/// A certificate that was issued and stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Renewed {
    pub id: String,
    pub serial: String,
    pub expiration: Option<DateTime<Utc>>,
}

/// Outcome of one mapping's batch
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Records the scanner returned
    pub discovered: usize,
    /// Records due for renewal
    pub eligible: usize,
    /// Group sizes the batch ran in
    pub groups: Vec<usize>,
    /// Renewed records, in settlement order
    pub renewed: Vec<Renewed>,
    /// Per-record failures, in settlement order
    pub failures: Vec<BatchFailure<RenewError>>,
}

/// How a mapping run ended
#[derive(Debug)]
pub enum MappingOutcome {
    /// The batch ran; individual records may still have failed
    Completed(BatchReport),
    /// The scanner could not discover records; nothing was renewed
    DiscoveryFailed(ScanError),
    /// The mapping names a scanner or provider that is not registered
    Skipped(String),
}

/// Outcome of one mapping run
#[derive(Debug)]
pub struct MappingReport {
    pub name: String,
    pub outcome: MappingOutcome,
}

impl MappingReport {
    /// Whether anything in this mapping failed
    pub fn has_failures(&self) -> bool {
        match &self.outcome {
            MappingOutcome::Completed(batch) => !batch.failures.is_empty(),
            MappingOutcome::DiscoveryFailed(_) => true,
            MappingOutcome::Skipped(_) => false,
        }
    }
}

/// Outcome of one pass over every mapping
#[derive(Debug, Default)]
pub struct RunReport {
    pub mappings: Vec<MappingReport>,
}

impl RunReport {
    /// Whether any mapping or record failed
    pub fn has_failures(&self) -> bool {
        self.mappings.iter().any(MappingReport::has_failures)
    }

    /// Number of certificates renewed across all mappings
    pub fn renewed(&self) -> usize {
        self.batches().map(|batch| batch.renewed.len()).sum()
    }

    /// Number of records that failed across all mappings
    pub fn failed(&self) -> usize {
        self.batches().map(|batch| batch.failures.len()).sum()
    }

    fn batches(&self) -> impl Iterator<Item = &BatchReport> {
        self.mappings.iter().filter_map(|m| match &m.outcome {
            MappingOutcome::Completed(batch) => Some(batch),
            _ => None,
        })
    }
}

/// Drives renewal for a set of mappings
pub struct Renewer {
    scanners: HashMap<String, Box<dyn Scanner>>,
    providers: HashMap<String, Box<dyn Provider>>,
    mappings: Vec<Mapping>,
    concurrency: NonZeroUsize,
    push_attempts: u32,
    push_retry_delay: StdDuration,
}

impl Renewer {
    /// Create a renewer with no scanners, providers or mappings
    pub fn new(concurrency: NonZeroUsize) -> Self {
        Self {
            scanners: HashMap::new(),
            providers: HashMap::new(),
            mappings: Vec::new(),
            concurrency,
            push_attempts: reissue_config::DEFAULT_PUSH_ATTEMPTS,
            push_retry_delay: StdDuration::from_millis(reissue_config::DEFAULT_PUSH_RETRY_DELAY_MS),
        }
    }

    /// Build a renewer from validated configuration
    ///
    /// Configuration errors and adapter construction failures are fatal.
    /// Mappings that cannot run are logged and left out.
    pub fn from_config(config: &Config) -> Result<Self, SetupError> {
        for warning in config.validated()? {
            warn!("{}", warning);
        }

        let concurrency = NonZeroUsize::new(config.concurrency).ok_or_else(|| {
            reissue_config::ConfigError::Invalid("concurrency must be at least 1".to_string())
        })?;

        let mut renewer = Self::new(concurrency)
            .with_push_retry(config.push_attempts, StdDuration::from_millis(config.push_retry_delay_ms));

        for (name, scanner_config) in &config.scanners {
            let scanner = scanner::build(name, scanner_config, concurrency).map_err(|source| {
                SetupError::Scanner {
                    name: name.clone(),
                    source,
                }
            })?;
            renewer = renewer.with_scanner(scanner);
        }

        for (name, provider_config) in &config.providers {
            let provider =
                provider::build(name, provider_config).map_err(|source| SetupError::Provider {
                    name: name.clone(),
                    source,
                })?;
            renewer = renewer.with_provider(provider);
        }

        for mapping in config.mappings() {
            renewer = renewer.with_mapping(mapping);
        }

        info!(
            scanners = renewer.scanners.len(),
            providers = renewer.providers.len(),
            mappings = renewer.mappings.len(),
            concurrency = concurrency.get(),
            "Renewer ready"
        );

        Ok(renewer)
    }

    /// Register a scanner under its own name
    pub fn with_scanner(mut self, scanner: Box<dyn Scanner>) -> Self {
        self.scanners.insert(scanner.name().to_string(), scanner);
        self
    }

    /// Register a provider under its own name
    pub fn with_provider(mut self, provider: Box<dyn Provider>) -> Self {
        self.providers.insert(provider.name().to_string(), provider);
        self
    }

    /// Add a mapping; mappings run in the order they were added
    pub fn with_mapping(mut self, mapping: Mapping) -> Self {
        self.mappings.push(mapping);
        self
    }

    /// Set how often and how far apart storing a signed certificate is tried
    ///
    /// `attempts` is raised to at least 1.
    pub fn with_push_retry(mut self, attempts: u32, delay: StdDuration) -> Self {
        self.push_attempts = attempts.max(1);
        self.push_retry_delay = delay;
        self
    }

    /// Configured mappings, in run order
    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    /// Look up a registered scanner
    pub fn scanner(&self, name: &str) -> Option<&dyn Scanner> {
        self.scanners.get(name).map(|s| s.as_ref())
    }

    /// Run every mapping once, in order
    pub async fn run_once(&self) -> RunReport {
        info!(mappings = self.mappings.len(), "Starting renewal run");

        let mut report = RunReport::default();
        for mapping in &self.mappings {
            let span = info_span!(
                "mapping",
                name = %mapping.name,
                scanner = %mapping.scanner,
                provider = %mapping.provider
            );
            report
                .mappings
                .push(self.run_mapping(mapping).instrument(span).await);
        }

        info!(
            renewed = report.renewed(),
            failed = report.failed(),
            "Renewal run finished"
        );
        report
    }

    /// Run a single mapping: discover, filter, renew
    pub async fn run_mapping(&self, mapping: &Mapping) -> MappingReport {
        let report = |outcome: MappingOutcome| MappingReport {
            name: mapping.name.clone(),
            outcome,
        };

        let (Some(scanner), Some(provider)) = (
            self.scanners.get(&mapping.scanner),
            self.providers.get(&mapping.provider),
        ) else {
            let reason = format!(
                "scanner '{}' or provider '{}' is not registered",
                mapping.scanner, mapping.provider
            );
            warn!(reason = %reason, "Skipping mapping");
            return report(MappingOutcome::Skipped(reason));
        };

        let threshold = hours(mapping.threshold_hours);
        let valid = hours(mapping.expire_hours);

        let records = match scanner.scan(threshold).await {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "Discovery failed; mapping abandoned for this run");
                return report(MappingOutcome::DiscoveryFailed(e));
            }
        };

        let discovered = records.len();
        let due = select_expiring(records, threshold, Utc::now());
        info!(
            discovered,
            eligible = due.len(),
            threshold_hours = mapping.threshold_hours,
            "Discovered certificates"
        );

        let eligible = due.len();
        let packed = pack(due, self.concurrency, |record| {
            self.renew_one(scanner.as_ref(), provider.as_ref(), record, valid)
        })
        .await;

        for failure in &packed.results.errors {
            if let BatchFailure::Panicked(message) = failure {
                error!(panic = %message, "Renewal panicked");
            }
        }

        let batch = BatchReport {
            discovered,
            eligible,
            groups: packed.groups,
            renewed: packed.results.values,
            failures: packed.results.errors,
        };
        info!(
            renewed = batch.renewed.len(),
            failed = batch.failures.len(),
            "Mapping finished"
        );

        report(MappingOutcome::Completed(batch))
    }

    /// Sign one record, then store it
    ///
    /// A record whose signing fails is never stored.
    async fn renew_one(
        &self,
        scanner: &dyn Scanner,
        provider: &dyn Provider,
        record: CertRecord,
        valid: Duration,
    ) -> Result<Renewed, RenewError> {
        debug!(id = %record.id, expiration = ?record.expiration, "Renewing certificate");

        let signed = provider.sign(&record, valid).await.map_err(|e| {
            error!(id = %record.id, error = %e, "Signing failed");
            RenewError::Sign(e)
        })?;

        let mut attempt = 1;
        loop {
            match scanner.push(&signed).await {
                Ok(()) => break,
                Err(e) if attempt < self.push_attempts => {
                    warn!(
                        id = %record.id,
                        serial = %signed.serial,
                        attempt,
                        error = %e,
                        "Storing certificate failed, retrying"
                    );
                    tokio::time::sleep(self.push_retry_delay).await;
                    attempt += 1;
                }
                Err(source) => {
                    error!(
                        id = %record.id,
                        serial = %signed.serial,
                        attempts = attempt,
                        error = %source,
                        "Issued certificate was not stored"
                    );
                    return Err(RenewError::Push {
                        id: record.id,
                        serial: signed.serial,
                        attempts: attempt,
                        source,
                    });
                }
            }
        }

        info!(
            id = %record.id,
            serial = %signed.serial,
            expiration = ?signed.expiration,
            "Renewed certificate"
        );

        Ok(Renewed {
            id: record.id,
            serial: signed.serial,
            expiration: signed.expiration,
        })
    }
}

impl std::fmt::Debug for Renewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renewer")
            .field("scanners", &self.scanners.keys().collect::<Vec<_>>())
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("mappings", &self.mappings)
            .field("concurrency", &self.concurrency)
            .field("push_attempts", &self.push_attempts)
            .finish()
    }
}

/// Hours as a duration, saturating instead of overflowing
pub fn hours(hours: u64) -> Duration {
    i64::try_from(hours)
        .ok()
        .and_then(Duration::try_hours)
        .unwrap_or(Duration::MAX)
}
