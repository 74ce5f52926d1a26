//! Configuration validation
//!
//! Errors make a configuration unusable. Warnings flag mappings that will be
//! skipped and settings that work but are probably not what was meant.

use std::fmt;

use crate::Config;

mod adapters;
mod lint;
mod mappings;

pub use mappings::resolve_mapping;

/// Area of the configuration an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Top-level batch settings
    Batch,
    /// Scanner definitions
    Scanner,
    /// Provider definitions
    Provider,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Batch => "batch",
            ErrorCategory::Scanner => "scanner",
            ErrorCategory::Provider => "provider",
        };
        f.write_str(name)
    }
}

/// A validation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub category: ErrorCategory,
    pub message: String,
}

impl ValidationError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)
    }
}

/// A validation warning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    pub message: String,
}

impl ValidationWarning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Collected errors and warnings
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Run every validation pass
pub fn validate_config(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    if config.concurrency == 0 {
        result.add_error(ValidationError::new(
            ErrorCategory::Batch,
            "concurrency must be at least 1",
        ));
    }
    if config.push_attempts == 0 {
        result.add_error(ValidationError::new(
            ErrorCategory::Batch,
            "push-attempts must be at least 1",
        ));
    }

    result.merge(adapters::validate_adapters(config));
    result.merge(mappings::validate_mappings(config));
    result.merge(lint::lint_config(config));

    result
}
