use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::*;
use mrmc_link::config::MULTICAST_EXAMPLE_ENDPOINT;
use mrmc_link::timing::FrameRate;
use mrmc_link::{ConnectionStatus, JsonLinesClient, LinkClient, LogClient, RigSource, SourceConfig};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::sleep;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Output {
    /// One JSON object per schema or frame on stdout
    Json,
    /// Frames at debug level through the logger
    Log,
}

/// Receive camera rig telemetry and forward subject poses
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(after_help = format!("Multicast example endpoint: {}", MULTICAST_EXAMPLE_ENDPOINT))]
struct Args {
    /// JSON configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Endpoint to listen on, address:port
    #[arg(long)]
    endpoint: Option<String>,

    /// Subject schema file
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Output frame rate in frames per second
    #[arg(long)]
    frame_rate: Option<u32>,

    /// trace, debug, info, warn or error
    #[arg(long)]
    log_level: Option<String>,

    #[arg(long, value_enum, default_value = "json")]
    output: Output,

    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<u64>,
}

fn load_config(args: &Args) -> Result<SourceConfig> {
    let mut config = match &args.config {
        Some(path) => SourceConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => SourceConfig::default(),
    };
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(schema) = &args.schema {
        config.schema_path = Some(schema.clone());
    }
    if let Some(frame_rate) = args.frame_rate {
        config.frame_rate = FrameRate::new(frame_rate, 1);
    }
    if let Some(log_level) = &args.log_level {
        config.log_level = log_level.clone();
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let level = config
        .log_level
        .parse::<LevelFilter>()
        .with_context(|| format!("Invalid log level {}", config.log_level))?;
    TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )?;

    if config.schema_path.is_some() {
        config.schema_text().context("Failed to read subject schema")?;
    }

    let client: Arc<dyn LinkClient> = match args.output {
        Output::Json => Arc::new(JsonLinesClient::new(std::io::stdout())),
        Output::Log => Arc::new(LogClient),
    };
    let source = RigSource::start(&config, client);
    if source.status() == ConnectionStatus::DeviceNotFound {
        anyhow::bail!("{}: {}", config.endpoint, source.status());
    }

    let started = Instant::now();
    let mut last_stats = source.stats();
    while source.is_source_still_valid() {
        sleep(Duration::from_secs(1));
        let stats = source.stats();
        info!(
            "{} on {}: {} datagrams/s, {} frames/s",
            source.status(),
            source.endpoint(),
            stats.received - last_stats.received,
            stats.frames_emitted - last_stats.frames_emitted
        );
        last_stats = stats;
        if let Some(duration) = args.duration {
            if started.elapsed() >= Duration::from_secs(duration) {
                source.request_shutdown();
            }
        }
    }
    Ok(())
}
