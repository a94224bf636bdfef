//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (buckets increasing, counts > 0)
//! - Validate addresses and enumerated strings
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: TelemetryConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::TelemetryConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("exchange.address must not be empty")]
    EmptyAddress,

    #[error("exchange.paths_start_with entry {0:?} must start with '/'")]
    RelativePath(String),

    #[error("metrics.bind_address {0:?} is not a socket address")]
    BindAddress(String),

    #[error("metrics.latency_buckets must not be empty")]
    NoBuckets,

    #[error("metrics.latency_buckets must be positive and strictly increasing")]
    UnorderedBuckets,

    #[error("logging.level {0:?} is not one of trace, debug, info, warn, error")]
    LogLevel(String),

    #[error("workload.connections must be at least 1")]
    NoConnections,

    #[error("workload.path {0:?} must start with '/'")]
    WorkloadPath(String),
}

/// Check a parsed configuration, collecting every problem.
pub fn validate_config(config: &TelemetryConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.exchange.address.trim().is_empty() {
        errors.push(ValidationError::EmptyAddress);
    }

    for path in &config.exchange.paths_start_with {
        if !path.starts_with('/') {
            errors.push(ValidationError::RelativePath(path.clone()));
        }
    }

    if config.metrics.enabled && config.metrics.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.metrics.bind_address.clone()));
    }

    let buckets = &config.metrics.latency_buckets;
    if buckets.is_empty() {
        errors.push(ValidationError::NoBuckets);
    } else if buckets[0] <= 0.0 || buckets.windows(2).any(|w| w[0] >= w[1]) {
        errors.push(ValidationError::UnorderedBuckets);
    }

    let level = config.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::LogLevel(config.logging.level.clone()));
    }

    if config.workload.connections == 0 {
        errors.push(ValidationError::NoConnections);
    }

    if !config.workload.path.starts_with('/') {
        errors.push(ValidationError::WorkloadPath(config.workload.path.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
