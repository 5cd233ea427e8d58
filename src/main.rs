//! plsl-rs - Main Entry Point
//!
//! Runs the configured producers and the stream monitor, lists the streams
//! on the bus, or prints the effective configuration.

use anyhow::Context;
use clap::{Parser, Subcommand};
use plsl_rs::monitor::MonitorHandle;
use plsl_rs::{config::LoggingConfig, App, AppConfig, PlslError};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "plsl-rs", version, about = "Real-time telemetry bus monitor")]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, Default)]
enum Command {
    /// Start the producers and monitor every stream on the bus
    #[default]
    Run,
    /// Start the producers and list the streams they announce as JSON
    Streams,
    /// Print the effective configuration as TOML
    PrintConfig,
}

fn init_logging(config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    match &config.file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            let file_name = path
                .file_name()
                .with_context(|| format!("Log file path {:?} has no file name", path))?;
            let dir = dir.unwrap_or(std::path::Path::new("."));
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
            Ok(None)
        }
    }
}

/// Clear `running` on Ctrl-C or SIGTERM, reload the monitor on SIGHUP
fn spawn_signal_watcher(running: Arc<AtomicBool>, monitor: MonitorHandle) -> std::io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .build()?;

    std::thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            runtime.block_on(watch_signals(&monitor));
            tracing::info!("Shutdown signal received");
            running.store(false, Ordering::Relaxed);
        })?;
    Ok(())
}

async fn watch_signals(monitor: &MonitorHandle) {
    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::hangup()) {
            Ok(mut hangup) => loop {
                tokio::select! {
                    _ = &mut shutdown => return,
                    Some(()) = hangup.recv() => {
                        tracing::info!("SIGHUP received, reloading streams");
                        monitor.reload();
                    }
                }
            },
            Err(e) => tracing::error!("Failed to listen for SIGHUP: {}", e),
        }
    }
    #[cfg(not(unix))]
    let _ = monitor;

    shutdown.await;
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::resolve(cli.config.as_deref())?;
    let _guard = init_logging(&config.logging)?;

    let running = Arc::new(AtomicBool::new(true));
    match cli.command.unwrap_or_default() {
        Command::Run => {
            tracing::info!("Starting plsl-rs");
            let app = App::new(config, running.clone())?;
            app.run(|monitor| Ok(spawn_signal_watcher(running, monitor)?))?;
        }
        Command::Streams => {
            let mut app = App::new(config, running)?;
            app.start_producers()?;
            let streams = app.list_streams();
            app.shutdown();
            println!("{}", serde_json::to_string_pretty(&streams)?);
        }
        Command::PrintConfig => {
            print!("{}", config.to_toml()?);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(PlslError::StreamUnavailable) = e.downcast_ref::<PlslError>() {
                eprintln!("Error: no stream found on the bus");
            } else {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}
