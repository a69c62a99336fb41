//! Plantwatch Service - reading collector and HTTP gateway.
//!
//! Run with: `cargo run -p plantwatch-service -- serve`

use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use plantwatch_service::{
    AppState, Collector, Config, DatabaseCredentials, DeviceClient, DeviceCredentials,
    LoggingConfig, Secrets, api,
};

/// Plantwatch Service - reading collector and HTTP gateway.
#[derive(Parser, Debug)]
#[command(name = "plantwatch-service")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the device and store readings on a fixed interval.
    Collect {
        /// Run a single cycle and exit.
        #[arg(long)]
        once: bool,

        /// Seconds between cycles (overrides config).
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Run the HTTP gateway (default behavior).
    Serve {
        /// Host to bind (overrides config).
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides config).
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Secrets may live in a .env file next to the binary.
    dotenvy::dotenv().ok();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    match args.command {
        Some(Command::Collect { once, interval }) => {
            if let Some(interval) = interval {
                config.service.interval_seconds = interval;
            }
            config.validate()?;
            init_logging(&config.logging)?;
            run_collector(config, once).await
        }
        Some(Command::Serve { host, port }) => {
            if let Some(host) = host {
                config.api.host = host;
            }
            if let Some(port) = port {
                config.api.port = port;
            }
            config.validate()?;
            init_logging(&config.logging)?;
            run_server(config).await
        }
        None => {
            config.validate()?;
            init_logging(&config.logging)?;
            run_server(config).await
        }
    }
}

/// Console logging, plus an optional plain-text log file.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let level = config.level_filter().unwrap_or(LevelFilter::INFO);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "plantwatch_service={level},plantwatch_store={level},tower_http={level}"
        ))
    });

    let file_layer = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory {:?}", parent))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    Ok(())
}

fn device_client(config: &Config, credentials: DeviceCredentials) -> anyhow::Result<DeviceClient> {
    Ok(DeviceClient::new(
        &config.esp.endpoint,
        config.esp.timeout(),
        credentials,
    )?)
}

async fn run_collector(config: Config, once: bool) -> anyhow::Result<()> {
    let device = device_client(&config, DeviceCredentials::from_env())?;
    let target = config.database.target(&DatabaseCredentials::from_env());
    info!("Storing readings in {:?}", target);
    let collector = Collector::new(device, target);

    if once {
        // Failures are logged by the cycle itself and do not fail the process.
        collector.run_cycle().await;
        return Ok(());
    }

    collector.run_forever(config.service.interval()).await;
    Ok(())
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    let secrets = Secrets::from_env();
    let device = device_client(&config, secrets.device.clone())?;
    let collector = Collector::new(
        device.clone(),
        config.database.target(&secrets.database),
    );
    let state = AppState::new(secrets.api_key.clone(), device, collector);

    let app = api::app(state);

    let host = config.api.host.as_str();
    let port = config.api.port;
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Failed to bind {}", config.api.bind_address()))?;

    info!("Starting Plant Watcher API on {}", config.api.bind_address());
    info!("Device endpoint: {}", config.esp.endpoint);
    info!(
        "Example: http://{}:{}/read?api_key={}",
        host,
        port,
        secrets.api_key.expose()
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
