//! Config validation CLI tool
//!
//! Validates a setupwatchd configuration file and reports any errors.

use setupwatch_config::{ConfigError, RawConfig, CURRENT_CONFIG_VERSION};
use setupwatch_util::default_config_path;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a setupwatchd configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            eprintln!("  validate-config config.example.toml");
            return ExitCode::from(2);
        }
    };

    // Check file exists
    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match setupwatch_config::load_config(&config_path) {
        Ok(fleet) => {
            println!("✓ Configuration is valid");

            let warnings = host_warnings(&config_path);
            if !warnings.is_empty() {
                println!();
                println!("Ignored host entries ({}):", warnings.len());
                for warning in &warnings {
                    println!("  - {}", warning);
                }
            }

            println!();
            println!("Summary:");
            println!("  Config version: {}", CURRENT_CONFIG_VERSION);
            println!("  Poll period: {}s", fleet.service.period.as_secs());
            println!("  Concurrent polls: {}", fleet.service.max_concurrent_polls);
            println!("  Report: {}", fleet.service.report_path.display());
            println!("  Dry run: {}", fleet.service.dry_run);
            println!(
                "  Idle limits: disconnected > {}m, active > {}m",
                fleet.thresholds.disconnected_minutes, fleet.thresholds.active_minutes
            );
            println!("  Username mappings: {}", fleet.usernames.len());
            println!("  Outlet units: {}", fleet.outlet_addresses().len());
            println!("  Hosts: {}", fleet.hosts.len());

            if !fleet.hosts.is_empty() {
                println!();
                println!("Hosts:");
                for host in &fleet.hosts {
                    let ports: Vec<String> = host
                        .outlets
                        .iter()
                        .map(|o| format!("{}#{}", o.address, o.port))
                        .collect();
                    let label = host.label.as_deref().unwrap_or("-");
                    println!("  - {} [{}]: {}", host.id, label, ports.join(", "));
                }
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                ConfigError::UsernamesError { path, message } => {
                    eprintln!("Failed to load usernames file {}:", path.display());
                    eprintln!("  {}", message);
                }
                ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver, CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}

/// Host-scoped problems that were skipped during load
fn host_warnings(path: &Path) -> Vec<String> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    let Ok(raw) = toml::from_str::<RawConfig>(&content) else {
        return Vec::new();
    };
    setupwatch_config::validate_config(&raw)
        .into_iter()
        .filter(|e| e.is_host_scoped())
        .map(|e| e.to_string())
        .collect()
}
