use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use gwsup_common::CommandSource;
use gwsup_supervisor::{RemoteCommandAdapter, Supervisor, SupervisorConfig};

/// Gateway supervisor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (YAML). Built-in defaults when omitted.
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Gateway port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Gateway output file (overrides config)
    #[arg(long, value_name = "FILE")]
    log_file: Option<std::path::PathBuf>,

    /// Kill whatever holds the gateway port before starting
    #[arg(long)]
    clear_port: bool,

    /// Do not start the gateway on launch
    #[arg(long)]
    no_autostart: bool,

    /// Run duration in seconds (for testing)
    #[arg(long)]
    run_duration: Option<u64>,

    /// Treat each stdin line as a remote chat command (e.g. /restart)
    #[arg(long)]
    commands_from_stdin: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match args.config {
        Some(ref path) => SupervisorConfig::load_from_file(path)?,
        None => SupervisorConfig::default(),
    };

    if let Some(port) = args.port {
        config.gateway.port = Some(port);
    }
    if let Some(ref file) = args.log_file {
        config.logs.file = file.clone();
    }
    if args.port.is_some() || args.log_file.is_some() {
        config.validate()?;
    }

    initialize_logging(args.debug, &config.supervisor.log_level)?;

    info!("Starting gateway supervisor");
    if let Some(ref path) = args.config {
        info!("Config file: {}", path);
    }

    let supervisor = Supervisor::new(config).context("Failed to create supervisor")?;

    if args.clear_port {
        match supervisor.kill_port_occupants(CommandSource::Local).await {
            Ok(cleanup) => info!(port = cleanup.port, killed = ?cleanup.killed, "Gateway port cleared"),
            Err(e) => warn!("Failed to clear gateway port: {}", e),
        }
    }

    if args.no_autostart {
        info!("Autostart disabled, waiting for commands");
    } else {
        match supervisor.start(CommandSource::Local).await {
            Ok(ack) => info!(pid = ?ack.pid, "Gateway started"),
            // Keep running so the operator can inspect logs and retry.
            Err(e) => error!("Failed to start gateway: {}", e),
        }
    }

    if args.commands_from_stdin {
        let adapter = RemoteCommandAdapter::new(supervisor.clone());
        tokio::spawn(async move {
            if let Err(e) = read_commands(adapter).await {
                warn!("Command reader stopped: {}", e);
            }
        });
    }

    if let Some(duration) = args.run_duration {
        info!("Running for {} seconds (test mode)", duration);
        tokio::time::sleep(tokio::time::Duration::from_secs(duration)).await;
    } else {
        wait_for_shutdown_signal().await?;
    }

    info!("Shutting down gateway supervisor...");
    let final_status = supervisor.detailed_status();
    supervisor
        .shutdown()
        .await
        .map_err(|e| anyhow::anyhow!("Shutdown failed: {}", e))?;
    info!(
        status = %serde_json::to_string(&final_status)?,
        "Gateway supervisor shut down"
    );

    Ok(())
}

async fn read_commands(adapter: RemoteCommandAdapter) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let reply = adapter
            .handle_message(&line)
            .await
            .unwrap_or_else(|| "Not a command. Send /help for the list.".to_string());
        println!("{}", reply);
    }

    Ok(())
}

fn initialize_logging(debug: bool, configured: &str) -> Result<()> {
    let level = if debug { "debug" } else { configured };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .with_thread_ids(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    use tokio::signal;

    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to create SIGTERM handler")?;
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
            .context("Failed to create SIGINT handler")?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM signal");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT signal");
            }
        }
    }

    #[cfg(windows)]
    {
        signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;
        info!("Received Ctrl+C signal");
    }

    Ok(())
}
