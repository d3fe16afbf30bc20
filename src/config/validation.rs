//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, thread counts > 0)
//! - Check that the log filter parses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PipelineConfig → Result<(), Vec<ValidationError>>

use tracing_subscriber::EnvFilter;

use crate::config::schema::PipelineConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check a parsed configuration.
pub fn validate_config(config: &PipelineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.transport.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("transport.connect_timeout_secs", "must be greater than 0"));
    }
    if config.transport.request_timeout_secs == 0 {
        errors.push(ValidationError::new("transport.request_timeout_secs", "must be greater than 0"));
    }
    if config.transport.worker_group.is_empty() {
        errors.push(ValidationError::new("transport.worker_group", "must not be empty"));
    }
    if config.transport.upload_chunk_bytes == 0 {
        errors.push(ValidationError::new("transport.upload_chunk_bytes", "must be greater than 0"));
    }
    if config.runtime.worker_threads == 0 {
        errors.push(ValidationError::new("runtime.worker_threads", "must be greater than 0"));
    }
    if config.runtime.thread_name.is_empty() {
        errors.push(ValidationError::new("runtime.thread_name", "must not be empty"));
    }
    if config.body.max_collect_bytes == 0 {
        errors.push(ValidationError::new("body.max_collect_bytes", "must be greater than 0"));
    }
    if let Err(e) = EnvFilter::try_new(&config.observability.log_filter) {
        errors.push(ValidationError::new("observability.log_filter", e.to_string()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
