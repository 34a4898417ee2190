//! CLI entry point for the PMD401 emulator and client.
//!
//! # Usage
//!
//! Run an emulator until Ctrl-C:
//! ```bash
//! pmd401 emulator --channels 4 --port 4001
//! ```
//!
//! Talk to a controller:
//! ```bash
//! pmd401 channels --host 127.0.0.1
//! pmd401 ask X0E
//! ```

#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pmd401::client::{ClientConfig, Pmd401Client};
use pmd401::emu::Emulator;
use pmd401::logging::{self, LogFormat, TracingConfig};
use pmd401::AppConfig;
use tokio::signal;

#[derive(Parser)]
#[command(name = "pmd401", version)]
#[command(about = "PMD401 motion controller emulator and client", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the controller emulator until interrupted
    Emulator {
        /// Listen address
        #[arg(long)]
        host: Option<String>,
        /// Listen port (0 picks a free port)
        #[arg(long)]
        port: Option<u16>,
        /// Number of simulated channels
        #[arg(long)]
        channels: Option<u32>,
        /// Motor simulator tick in milliseconds
        #[arg(long)]
        tick_ms: Option<u64>,
    },

    /// Send one raw request and print the reply line
    Ask {
        /// Request, e.g. "X0E" (a trailing newline is added if missing)
        line: String,
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Print the controller's channel numbers
    Channels {
        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Args)]
struct TargetArgs {
    /// Controller address
    #[arg(long)]
    host: Option<String>,
    /// Controller port
    #[arg(long)]
    port: Option<u16>,
}

impl TargetArgs {
    fn apply(self, client: &mut ClientConfig) {
        if let Some(host) = self.host {
            client.host = host;
        }
        if let Some(port) = self.port {
            client.port = port;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }

    match cli.command {
        Commands::Emulator {
            host,
            port,
            channels,
            tick_ms,
        } => {
            let emulator = &mut config.emulator;
            if let Some(host) = host {
                emulator.host = host;
            }
            if let Some(port) = port {
                emulator.port = port;
            }
            if let Some(channels) = channels {
                emulator.channels = channels;
            }
            if let Some(tick_ms) = tick_ms {
                emulator.tick_ms = tick_ms;
            }
            init_logging(&config)?;
            run_emulator(&config).await
        }
        Commands::Ask { line, target } => {
            target.apply(&mut config.client);
            init_logging(&config)?;
            ask(&config.client, &line).await
        }
        Commands::Channels { target } => {
            target.apply(&mut config.client);
            init_logging(&config)?;
            list_channels(&config.client).await
        }
    }
}

fn init_logging(config: &AppConfig) -> Result<()> {
    config.validate().context("invalid configuration")?;
    let tracing_config = TracingConfig::from_logging_config(&config.logging)?;
    logging::init(tracing_config)?;
    Ok(())
}

async fn run_emulator(config: &AppConfig) -> Result<()> {
    let emulator = Emulator::start(&config.emulator)
        .await
        .context("failed to start emulator")?;
    println!("PMD401 emulator listening on {}", emulator.local_addr());

    signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutdown signal received");

    emulator.shutdown().await.context("emulator shutdown failed")?;
    Ok(())
}

async fn ask(config: &ClientConfig, line: &str) -> Result<()> {
    let client = Pmd401Client::new(config)?;
    let reply = client
        .raw_ask(line)
        .await
        .with_context(|| format!("request {line:?} to {}:{} failed", config.host, config.port));
    client.teardown().await;
    println!("{}", reply?);
    Ok(())
}

async fn list_channels(config: &ClientConfig) -> Result<()> {
    let client = Pmd401Client::new(config)?;
    let channels = client
        .get_channel_numbers()
        .await
        .with_context(|| format!("channel enumeration on {}:{} failed", config.host, config.port));
    client.teardown().await;
    for channel in channels? {
        println!("{channel}");
    }
    Ok(())
}
