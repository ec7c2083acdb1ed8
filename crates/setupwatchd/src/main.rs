//! setupwatchd - The setup monitor service
//!
//! This is the main entry point for the setupwatchd service.
//! It wires together all the components:
//! - Configuration loading (and reload on SIGHUP)
//! - Host adapters (ping, WinRM, outlet control)
//! - Core poll engine and fleet scheduler
//! - HTML report sink

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use setupwatch_config::{load_config, Fleet, OutletModel};
use setupwatch_core::{FleetScheduler, HostPoller, OutletRegistry, SessionProber};
use setupwatch_host_api::OutletConnector;
use setupwatch_host_linux::{GudeConnector, GudeOptions, SystemPing, WinRmOptions, WinRmShell};
use setupwatch_report::{HtmlFileSink, ReportSink};
use setupwatch_util::{default_config_path, SETUPWATCH_CONFIG_ENV};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// setupwatchd - Workstation idle monitor and outlet power-off service
#[derive(Parser, Debug)]
#[command(name = "setupwatchd")]
#[command(about = "Workstation idle monitor and outlet power-off service", long_about = None)]
struct Args {
    /// Configuration file path (or set SETUPWATCH_CONFIG env var)
    #[arg(short, long, env = SETUPWATCH_CONFIG_ENV, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Report path override
    #[arg(short, long)]
    report: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Run a single poll cycle and exit
    #[arg(long)]
    once: bool,
}

/// Build everything one loaded fleet needs to be polled
fn build_poller(fleet: Fleet) -> Result<Arc<HostPoller>> {
    let probe = Arc::new(SystemPing::new(fleet.probe.ping_timeout));

    let shell = Arc::new(
        WinRmShell::new(WinRmOptions {
            port: fleet.probe.winrm_port,
            connect_timeout: fleet.probe.connect_timeout,
            read_timeout: fleet.probe.read_timeout,
            operation_timeout: fleet.probe.operation_timeout,
            accept_invalid_certs: fleet.probe.accept_invalid_certs,
        })
        .context("Failed to set up WinRM client")?,
    );

    let connector: Box<dyn OutletConnector> = match fleet.outlet.model {
        OutletModel::Gude => Box::new(
            GudeConnector::new(GudeOptions {
                timeout: fleet.outlet.timeout,
                username: fleet.outlet.username.clone(),
                password: fleet.outlet.password.clone(),
            })
            .context("Failed to set up outlet client")?,
        ),
    };

    let outlets = OutletRegistry::connect(&fleet, connector.as_ref());
    let prober = SessionProber::new(probe, shell);

    Ok(Arc::new(HostPoller::new(Arc::new(fleet), prober, outlets)))
}

/// Main service state
struct Service {
    config_path: PathBuf,
    poller_tx: watch::Sender<Arc<HostPoller>>,
    scheduler: FleetScheduler,
}

impl Service {
    fn new(args: &Args) -> Result<Self> {
        // Load configuration
        let fleet = load_config(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        info!(
            config_path = %args.config.display(),
            hosts = fleet.hosts.len(),
            usernames = fleet.usernames.len(),
            dry_run = fleet.service.dry_run,
            "Configuration loaded"
        );

        if fleet.service.dry_run {
            warn!("Dry run enabled: outlets will not be switched");
        }

        let report_path = args
            .report
            .clone()
            .unwrap_or_else(|| fleet.service.report_path.clone());

        // Create report directory
        if let Some(dir) = report_path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create report directory {:?}", dir))?;
        }

        let sink: Arc<dyn ReportSink> = Arc::new(HtmlFileSink::new(
            &report_path,
            fleet.service.report_title.clone(),
            fleet.service.period,
        ));

        info!(report_path = %report_path.display(), "Report sink initialized");

        let poller = build_poller(fleet)?;
        let (poller_tx, poller_rx) = watch::channel(poller);

        Ok(Self {
            config_path: args.config.clone(),
            poller_tx,
            scheduler: FleetScheduler::new(poller_rx, sink),
        })
    }

    /// Reload configuration; keep the current fleet if anything fails
    fn reload(config_path: &Path, poller_tx: &watch::Sender<Arc<HostPoller>>) {
        let fleet = match load_config(config_path) {
            Ok(fleet) => fleet,
            Err(e) => {
                error!(error = %e, "Config reload failed, keeping previous configuration");
                return;
            }
        };

        let hosts = fleet.hosts.len();
        match build_poller(fleet) {
            Ok(poller) => {
                // Applied at the start of the next cycle
                poller_tx.send_replace(poller);
                info!(hosts, "Configuration reloaded");
            }
            Err(e) => {
                error!(error = %e, "Config reload failed, keeping previous configuration");
            }
        }
    }

    async fn run(self) -> Result<()> {
        let Service {
            config_path,
            poller_tx,
            scheduler,
        } = self;

        // Set up signal handlers
        let mut sigterm = signal(SignalKind::terminate())
            .context("Failed to create SIGTERM handler")?;
        let mut sigint = signal(SignalKind::interrupt())
            .context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup())
            .context("Failed to create SIGHUP handler")?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut scheduler = tokio::spawn(scheduler.run(shutdown_rx));

        info!("Service running");

        loop {
            tokio::select! {
                // Signal: SIGTERM or SIGINT - graceful shutdown
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }

                // Signal: SIGHUP - reload configuration
                _ = sighup.recv() => {
                    info!("Received SIGHUP, reloading configuration");
                    Self::reload(&config_path, &poller_tx);
                }

                // The scheduler only returns once shut down
                result = &mut scheduler => {
                    if let Err(e) = result {
                        error!(error = %e, "Fleet scheduler task failed");
                    }
                    return Ok(());
                }
            }
        }

        // Graceful shutdown
        info!("Shutting down setupwatchd");
        let _ = shutdown_tx.send(true);
        if let Err(e) = scheduler.await {
            warn!(error = %e, "Fleet scheduler did not stop cleanly");
        }

        info!("Shutdown complete");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    match args.log_format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "setupwatchd starting"
    );

    // Create and run the service
    let mut service = Service::new(&args)?;

    if args.once {
        let snapshot = service.scheduler.run_cycle().await;
        info!(
            hosts = snapshot.len(),
            offline = snapshot.offline_count(),
            "Single cycle complete"
        );
        return Ok(());
    }

    service.run().await
}
