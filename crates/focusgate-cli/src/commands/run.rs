//! `focusgate run`: the long-running daemon.
//!
//! Reads one JSON command per line on stdin and writes one JSON response per
//! line on stdout. Events are written to stdout too, as JSON lines carrying a
//! `type` field; responses never have one. Logs go to stderr.

use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use focusgate_core::daemon::{Daemon, DaemonHandle};
use focusgate_core::session::{
    Command, CoordinatorSettings, LoggingInterceptor, NavigationInterceptor, Response,
    RulesFileInterceptor, SessionCoordinator,
};
use focusgate_core::storage::SqliteStore;
use focusgate_core::{Config, SystemClock};
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

#[derive(Args)]
pub struct RunArgs {
    /// Write compiled rules to this file (overrides interceptor.rules_file)
    #[arg(long)]
    pub rules_file: Option<PathBuf>,
    /// Keep state in memory only
    #[arg(long)]
    pub ephemeral: bool,
}

pub async fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let store = if args.ephemeral {
        SqliteStore::open_memory()?
    } else {
        SqliteStore::open()?
    };

    match args.rules_file.or_else(|| config.rules_file()) {
        Some(path) => {
            info!(path = %path.display(), "Writing rules to file");
            serve(&config, store, RulesFileInterceptor::new(path)).await
        }
        None => serve(&config, store, LoggingInterceptor).await,
    }
}

async fn serve<I>(
    config: &Config,
    store: SqliteStore,
    interceptor: I,
) -> Result<(), Box<dyn std::error::Error>>
where
    I: NavigationInterceptor + 'static,
{
    let coordinator =
        SessionCoordinator::new(SystemClock, CoordinatorSettings::from_config(config));
    let tick = Duration::from_millis(config.timer.tick_interval_ms);
    let (daemon, handle) = Daemon::new(coordinator, store, interceptor, tick);

    let (out_tx, out_rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(write_lines(out_rx));
    let events = tokio::spawn(forward_events(handle.subscribe(), out_tx.clone()));
    let daemon = tokio::spawn(daemon.run(std::future::pending()));
    let lines = spawn_stdin_reader();

    tokio::select! {
        result = read_commands(lines, &handle, &out_tx) => result?,
        _ = shutdown_signal() => {}
    }

    // The daemon stops once its last handle is gone.
    drop(handle);
    daemon.await?;
    events.abort();
    drop(out_tx);
    writer.await??;
    Ok(())
}

/// Stdin is read on a plain thread so a pending read never holds the runtime
/// open after shutdown.
fn spawn_stdin_reader() -> mpsc::Receiver<std::io::Result<String>> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn read_commands(
    mut lines: mpsc::Receiver<std::io::Result<String>>,
    handle: &DaemonHandle,
    out: &mpsc::UnboundedSender<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    while let Some(line) = lines.recv().await {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Command>(line) {
            Ok(command) => match handle.send(command).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, "Daemon unavailable");
                    break;
                }
            },
            Err(e) => {
                debug!(error = %e, "Unparseable command");
                Response::failure(format!("invalid command: {e}"))
            }
        };
        if out.send(serde_json::to_string(&response)?).is_err() {
            break;
        }
    }
    info!("Input closed");
    Ok(())
}

async fn forward_events(
    mut events: broadcast::Receiver<focusgate_core::Event>,
    out: mpsc::UnboundedSender<String>,
) {
    loop {
        match events.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(line) => {
                    if out.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "Failed to encode event"),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event output fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn write_lines(mut lines: mpsc::UnboundedReceiver<String>) -> std::io::Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.recv().await {
        stdout.write_all(line.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Received ctrl-c");
}
