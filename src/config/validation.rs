//! Configuration validation.
//!
//! Serde handles syntax; this checks value ranges and cross-field
//! consistency. All problems are reported at once, not just the first.

use std::fmt;

use crate::config::schema::ToolConfig;

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration.
pub fn validate_config(config: &ToolConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.node.chain.trim().is_empty() {
        errors.push(ValidationError::new("node.chain", "must not be empty"));
    }
    if config.node.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("node.rpc_timeout_secs", "must be greater than 0"));
    }
    if let Err(e) = url::Url::parse(&config.node.explorer_url) {
        errors.push(ValidationError::new("node.explorer_url", format!("invalid URL: {e}")));
    }

    let confirmation = &config.confirmation;
    if confirmation.required == 0 {
        errors.push(ValidationError::new("confirmation.required", "must be at least 1"));
    }
    if confirmation.poll_interval_ms == 0 {
        errors.push(ValidationError::new("confirmation.poll_interval_ms", "must be greater than 0"));
    }
    if confirmation.max_attempts == 0 {
        errors.push(ValidationError::new("confirmation.max_attempts", "must be greater than 0"));
    }
    if confirmation.backoff_base_ms > confirmation.backoff_max_ms {
        errors.push(ValidationError::new(
            "confirmation.backoff_base_ms",
            "must not exceed backoff_max_ms",
        ));
    }

    let fees = &config.fees;
    if fees.hard_gas_limit == 0 {
        errors.push(ValidationError::new("fees.hard_gas_limit", "must be greater than 0"));
    }
    if fees.gas_buffer >= fees.hard_gas_limit {
        errors.push(ValidationError::new("fees.gas_buffer", "must be below hard_gas_limit"));
    }
    if fees.storage_buffer > fees.hard_storage_limit {
        errors.push(ValidationError::new("fees.storage_buffer", "must not exceed hard_storage_limit"));
    }
    if fees.max_fee_mutez < fees.minimal_fee_mutez {
        errors.push(ValidationError::new("fees.max_fee_mutez", "must be at least minimal_fee_mutez"));
    }

    if tracing_subscriber::EnvFilter::try_new(&config.observability.log_level).is_err() {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("invalid filter directive '{}'", config.observability.log_level),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&ToolConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_every_problem() {
        let mut config = ToolConfig::default();
        config.confirmation.required = 0;
        config.confirmation.poll_interval_ms = 0;
        config.node.explorer_url = "not a url".to_string();
        config.fees.max_fee_mutez = 1;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "node.explorer_url",
                "confirmation.required",
                "confirmation.poll_interval_ms",
                "fees.max_fee_mutez",
            ]
        );
    }
}
