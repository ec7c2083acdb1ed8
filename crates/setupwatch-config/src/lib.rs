//! Configuration parsing and validation for setupwatch
//!
//! Supports TOML configuration with:
//! - Versioned schema
//! - Workstation definitions with outlet bindings
//! - An optional separate username mapping document
//! - Validation that separates fleet-wide errors from per-host problems

mod fleet;
mod schema;
mod validation;

pub use fleet::*;
pub use schema::*;
pub use validation::*;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to load usernames file {path:?}: {message}")]
    UsernamesError { path: PathBuf, message: String },

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// Load and validate configuration from a TOML file.
///
/// A relative `usernames_file` is resolved against the config file's directory.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Fleet> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    build_fleet(toml::from_str(&content)?, path.parent())
}

/// Parse and validate configuration from a TOML string.
///
/// A relative `usernames_file` is resolved against the working directory.
pub fn parse_config(content: &str) -> ConfigResult<Fleet> {
    build_fleet(toml::from_str(content)?, None)
}

/// Load a username mapping document (`"<client name>" = "<person>"` pairs)
pub fn load_usernames(path: impl AsRef<Path>) -> ConfigResult<BTreeMap<String, String>> {
    let path = path.as_ref();
    let usernames_error = |message: String| ConfigError::UsernamesError {
        path: path.to_path_buf(),
        message,
    };

    let content = std::fs::read_to_string(path).map_err(|e| usernames_error(e.to_string()))?;
    toml::from_str(&content).map_err(|e| usernames_error(e.to_string()))
}

fn build_fleet(mut raw: RawConfig, base_dir: Option<&Path>) -> ConfigResult<Fleet> {
    // Check version
    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    // Only fleet-wide problems are fatal
    let errors: Vec<ValidationError> = validate_config(&raw)
        .into_iter()
        .filter(|e| !e.is_host_scoped())
        .collect();
    if !errors.is_empty() {
        return Err(ConfigError::ValidationFailed { errors });
    }

    if let Some(file) = raw.usernames_file.take() {
        let file = match base_dir {
            Some(dir) if file.is_relative() => dir.join(file),
            _ => file,
        };
        // Entries in the separate document win over inline ones
        raw.usernames.extend(load_usernames(&file)?);
    }

    Ok(Fleet::from_raw(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_minimal_config() {
        let config = r#"
            config_version = 1

            [[hosts]]
            address = "10.0.0.21"
            login = "labuser"
            password = "secret"
            outlets = ["10.0.0.5, 3"]
        "#;

        let fleet = parse_config(config).unwrap();
        assert_eq!(fleet.hosts.len(), 1);
        assert_eq!(fleet.hosts[0].id.as_str(), "10.0.0.21");
        assert_eq!(fleet.hosts[0].outlets[0].port, 3);
    }

    #[test]
    fn example_config_is_valid() {
        let fleet = parse_config(include_str!("../../../config.example.toml")).unwrap();
        assert_eq!(fleet.hosts.len(), 2);
        assert_eq!(fleet.hosts[0].label.as_deref(), Some("Bench 1"));
        assert_eq!(fleet.outlet_addresses(), vec!["10.0.0.5", "10.0.0.6"]);
        assert_eq!(fleet.usernames.len(), 2);
    }

    #[test]
    fn reject_wrong_version() {
        let config = r#"
            config_version = 99
        "#;

        let result = parse_config(config);
        assert!(matches!(result, Err(ConfigError::UnsupportedVersion(99))));
    }

    #[test]
    fn host_problems_do_not_fail_load() {
        let config = r#"
            config_version = 1

            [[hosts]]
            address = ""
            login = "labuser"

            [[hosts]]
            address = "10.0.0.22"
            login = "labuser"
            outlets = ["not-a-binding"]
        "#;

        let fleet = parse_config(config).unwrap();
        assert_eq!(fleet.hosts.len(), 1);
        assert!(fleet.hosts[0].outlets.is_empty());
    }

    #[test]
    fn repeated_host_does_not_fail_load() {
        let config = r#"
            config_version = 1

            [[hosts]]
            address = "10.0.0.21"
            login = "labuser"

            [[hosts]]
            address = "10.0.0.22"
            login = "labuser"

            [[hosts]]
            address = "10.0.0.21"
            login = "other"
        "#;

        let fleet = parse_config(config).unwrap();
        let ids: Vec<&str> = fleet.hosts.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["10.0.0.21", "10.0.0.22"]);
        assert_eq!(fleet.hosts[0].login, "labuser");
    }

    #[test]
    fn load_with_usernames_file() {
        let dir = tempfile::tempdir().unwrap();

        let mut users = std::fs::File::create(dir.path().join("usernames.toml")).unwrap();
        writeln!(users, "\"WS-ALICE\" = \"Alice\"").unwrap();
        writeln!(users, "\"WS-BOB\" = \"Robert\"").unwrap();

        let config_path = dir.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
                config_version = 1
                usernames_file = "usernames.toml"

                [service]
                period_seconds = 10
                dry_run = true

                [usernames]
                "WS-BOB" = "Bob"
                "WS-CAROL" = "Carol"
            "#,
        )
        .unwrap();

        let fleet = load_config(&config_path).unwrap();
        assert_eq!(fleet.service.period, std::time::Duration::from_secs(10));
        assert!(fleet.service.dry_run);
        assert_eq!(fleet.usernames.resolve("WS-ALICE"), Some("Alice"));
        assert_eq!(fleet.usernames.resolve("WS-BOB"), Some("Robert"));
        assert_eq!(fleet.usernames.resolve("WS-CAROL"), Some("Carol"));
    }

    #[test]
    fn missing_usernames_file_is_an_error() {
        let config = r#"
            config_version = 1
            usernames_file = "/nonexistent/setupwatch/usernames.toml"
        "#;

        assert!(matches!(parse_config(config), Err(ConfigError::UsernamesError { .. })));
    }
}
