//! Configuration validation

use crate::schema::{RawConfig, RawHost};
use std::collections::HashSet;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Host '{host}': {message}")]
    HostError { host: String, message: String },

    #[error("Host '{host}': invalid outlet binding '{value}': {message}")]
    InvalidOutletBinding {
        host: String,
        value: String,
        message: String,
    },

    #[error("Duplicate host address: {0}")]
    DuplicateHost(String),

    #[error("Invalid setting '{field}': {message}")]
    InvalidSetting { field: String, message: String },

    #[error("Unsupported outlet model: {0}")]
    UnsupportedOutletModel(String),
}

impl ValidationError {
    /// Host-scoped problems only affect the host they name; the rest of the
    /// fleet still loads.
    pub fn is_host_scoped(&self) -> bool {
        matches!(
            self,
            ValidationError::HostError { .. }
                | ValidationError::InvalidOutletBinding { .. }
                | ValidationError::DuplicateHost(_)
        )
    }
}

/// Outlet models this build can drive
pub const SUPPORTED_OUTLET_MODELS: &[&str] = &["gude"];

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    errors.extend(validate_settings(config));

    // Later entries for an address already seen are skipped at load
    let mut seen = HashSet::new();
    for host in &config.hosts {
        let address = host.address.trim();
        if !address.is_empty() && !seen.insert(address) {
            errors.push(ValidationError::DuplicateHost(address.to_string()));
        }
    }

    for host in &config.hosts {
        errors.extend(validate_host(host));
    }

    errors
}

fn validate_settings(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let non_zero = [
        ("service.period_seconds", config.service.period_seconds),
        ("probe.ping_timeout_ms", config.probe.ping_timeout_ms),
        ("probe.connect_timeout_seconds", config.probe.connect_timeout_seconds),
        ("probe.read_timeout_seconds", config.probe.read_timeout_seconds),
        ("probe.operation_timeout_seconds", config.probe.operation_timeout_seconds),
        ("outlet.timeout_seconds", config.outlet.timeout_seconds),
    ];
    for (field, value) in non_zero {
        if value == Some(0) {
            errors.push(ValidationError::InvalidSetting {
                field: field.into(),
                message: "must be greater than zero".into(),
            });
        }
    }

    if config.service.max_concurrent_polls == Some(0) {
        errors.push(ValidationError::InvalidSetting {
            field: "service.max_concurrent_polls".into(),
            message: "must be greater than zero".into(),
        });
    }

    if config.probe.winrm_port == Some(0) {
        errors.push(ValidationError::InvalidSetting {
            field: "probe.winrm_port".into(),
            message: "must be a valid TCP port".into(),
        });
    }

    if let Some(model) = &config.outlet.model
        && !SUPPORTED_OUTLET_MODELS.contains(&model.to_lowercase().as_str())
    {
        errors.push(ValidationError::UnsupportedOutletModel(model.clone()));
    }

    errors
}

/// Validate a single host entry. Every returned error is host-scoped.
pub fn validate_host(host: &RawHost) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let name = host.address.trim();

    if name.is_empty() {
        errors.push(ValidationError::HostError {
            host: host.label.clone().unwrap_or_default(),
            message: "address cannot be empty".into(),
        });
        return errors;
    }

    if host.login.trim().is_empty() {
        errors.push(ValidationError::HostError {
            host: name.to_string(),
            message: "login cannot be empty".into(),
        });
    }

    for value in &host.outlets {
        if let Err(message) = parse_outlet_binding(value) {
            errors.push(ValidationError::InvalidOutletBinding {
                host: name.to_string(),
                value: value.clone(),
                message,
            });
        }
    }

    errors
}

/// Parse an outlet binding of the form `<outlet address>,<port>`.
///
/// Whitespace around either part is ignored.
pub fn parse_outlet_binding(s: &str) -> Result<(String, u16), String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 2 {
        return Err("Expected \"<address>,<port>\"".into());
    }

    let address = parts[0].trim();
    if address.is_empty() {
        return Err("Outlet address cannot be empty".into());
    }

    let port: u16 = parts[1]
        .trim()
        .parse()
        .map_err(|_| "Invalid port number".to_string())?;

    if port == 0 {
        return Err("Port numbers start at 1".into());
    }

    Ok((address.to_string(), port))
}
