use anyhow::Context;
use clap::Parser;
use rds_manager::{
    DepotInstaller, Platform, ServerLauncher, ShutdownHandle, Supervisor, SupervisorConfig,
    preflight, shutdown_channel, validate_config,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs, launches and supervises a Rust Dedicated Server.
#[derive(Debug, Parser)]
#[command(name = "rds-manager", version, about)]
struct Cli {
    /// JSON or YAML settings file; defaults apply when omitted
    #[arg(short, long, env = "RDS_MANAGER_CONFIG")]
    config: Option<PathBuf>,

    /// Server install directory, overrides the settings file
    #[arg(long)]
    install_dir: Option<PathBuf>,

    /// File that mirrors everything logged to the console
    #[arg(long, default_value = "server_log.txt")]
    log_file: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Keep the guard alive so buffered file logs are flushed on exit
    let _guard = match init_logging(&cli.log_file) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialise logging: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("FATAL: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    tracing::info!("Rust Dedicated Server auto manager (DepotDownloader)");

    let config = load_config(&cli).context("Failed to load configuration")?;
    validate_config(&config)?;
    let platform = Platform::current()?;

    preflight(&config.install_dir)?;
    let installer = DepotInstaller::new(platform, &config.install_dir)?;

    let (handle, signal) = shutdown_channel();
    tokio::spawn(forward_shutdown_signals(handle));

    let mut supervisor = Supervisor::new(config, platform, installer, ServerLauncher, signal);
    supervisor.run().await?;
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<SupervisorConfig> {
    let config = match &cli.config {
        Some(path) => SupervisorConfig::from_file(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => SupervisorConfig::default(),
    };

    let mut config = config.with_env_overrides(std::env::vars())?;
    if let Some(dir) = &cli.install_dir {
        config.install_dir = dir.clone();
    }
    Ok(config)
}

fn init_logging(log_file: &Path) -> anyhow::Result<WorkerGuard> {
    let dir = log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = log_file
        .file_name()
        .context("log file path has no file name")?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating log directory {}", dir.display()))?;

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(true))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(guard)
}

async fn forward_shutdown_signals(handle: ShutdownHandle) {
    wait_for_termination().await;
    tracing::info!("Shutdown requested");
    handle.request();
}

#[cfg(unix)]
async fn wait_for_termination() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Cannot listen for SIGTERM, only Ctrl-C will stop the manager");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(windows)]
async fn wait_for_termination() {
    match tokio::signal::windows::ctrl_break() {
        Ok(mut ctrl_break) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = ctrl_break.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Cannot listen for Ctrl-Break, only Ctrl-C will stop the manager");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(any(unix, windows)))]
async fn wait_for_termination() {
    let _ = tokio::signal::ctrl_c().await;
}
