//! Default paths for setupwatch components
//!
//! Paths are user-writable by default (no root required):
//! - Config: `$XDG_CONFIG_HOME/setupwatch/config.toml` or `~/.config/setupwatch/config.toml`
//! - Data (report output): `$XDG_DATA_HOME/setupwatch` or `~/.local/share/setupwatch`

use std::path::PathBuf;

/// Environment variable for overriding the config file path
pub const SETUPWATCH_CONFIG_ENV: &str = "SETUPWATCH_CONFIG";

/// Environment variable for overriding the data directory
pub const SETUPWATCH_DATA_DIR_ENV: &str = "SETUPWATCH_DATA_DIR";

/// Application subdirectory name
const APP_DIR: &str = "setupwatch";

/// Report filename within the data directory
const REPORT_FILENAME: &str = "setupmonitor.html";

/// Get the default config file path.
///
/// Order of precedence:
/// 1. `$SETUPWATCH_CONFIG` environment variable (if set)
/// 2. `$XDG_CONFIG_HOME/setupwatch/config.toml` (if XDG_CONFIG_HOME is set)
/// 3. `~/.config/setupwatch/config.toml` (fallback)
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(SETUPWATCH_CONFIG_ENV) {
        return PathBuf::from(path);
    }

    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join("config.toml");
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join("config.toml");
    }

    PathBuf::from("/etc").join(APP_DIR).join("config.toml")
}

/// Get the default data directory.
///
/// Order of precedence:
/// 1. `$SETUPWATCH_DATA_DIR` environment variable (if set)
/// 2. `$XDG_DATA_HOME/setupwatch` (if XDG_DATA_HOME is set)
/// 3. `~/.local/share/setupwatch` (fallback)
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(SETUPWATCH_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

/// Get the data directory without checking SETUPWATCH_DATA_DIR env var.
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    // Last resort
    PathBuf::from("/tmp").join(APP_DIR).join("data")
}

/// Default location of the published HTML report
pub fn default_report_path() -> PathBuf {
    default_data_dir().join(REPORT_FILENAME)
}
