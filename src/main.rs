use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use messages::DEFAULT_MESSAGE_TYPE;
use robotview::config::{ConfigError, ConfigOverrides, ViewerConfig};
use robotview::ingest::{CollectError, Entry, FsEntry, HttpUploader, IngestError, Ingestor};
use robotview::model::{HttpProbeLoader, LoadError, LoggingScene, ModelSlot, ModelSwapper, PoseApplier};
use robotview::net::{Channel, Dispatcher, WsConnector};
use robotview::status::{StatusSink, TracingStatus};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Collect(#[from] CollectError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("failed to wait for shutdown signal: {0}")]
    Signal(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "robotview", about = "Headless robot viewer: joint-state sync and model upload")]
struct Cli {
    #[arg(long, env = "ROBOTVIEW_WS_URL")]
    ws_url: Option<String>,

    #[arg(long, env = "ROBOTVIEW_SERVER_URL")]
    server_url: Option<String>,

    #[arg(long, env = "ROBOTVIEW_RECONNECT_MS")]
    reconnect_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the initial model and apply joint states until Ctrl-C.
    Watch {
        #[arg(long, help = "Model to load first; defaults to ROBOTVIEW_DEFAULT_MODEL")]
        model: Option<String>,
    },
    /// Upload files and directories as one dropped selection, then load the result.
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Hot-swap the model at a URL, relative to the server or absolute.
    Load { url: String },
}

fn load_config(cli: &Cli) -> Result<ViewerConfig, ConfigError> {
    ViewerConfig::from_env_with(&ConfigOverrides {
        ws_url: cli.ws_url.clone(),
        server_url: cli.server_url.clone(),
        reconnect_ms: cli.reconnect_ms,
    })
}

fn swapper(config: &ViewerConfig, client: &reqwest::Client) -> Arc<ModelSwapper> {
    let slot = ModelSlot::new(Arc::new(LoggingScene));
    Arc::new(ModelSwapper::new(
        Arc::new(HttpProbeLoader::new(client.clone())),
        slot,
        config.server_url.clone(),
    ))
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let client = reqwest::Client::new();

    match cli.command {
        Command::Watch { model } => run_watch(&config, &client, model).await,
        Command::Upload { paths } => run_upload(&config, &client, paths).await,
        Command::Load { url } => run_load(&config, &client, &url).await,
    }
}

async fn run_watch(config: &ViewerConfig, client: &reqwest::Client, model: Option<String>) -> Result<(), CliError> {
    let status: Arc<dyn StatusSink> = Arc::new(TracingStatus);
    let swapper = swapper(config, client);
    let _initial = swapper.spawn_load(model.unwrap_or_else(|| config.default_model.clone()));

    let dispatcher = Arc::new(Dispatcher::new());
    PoseApplier::new(swapper.slot().clone()).register(&dispatcher);
    dispatcher.on(DEFAULT_MESSAGE_TYPE, |message| {
        tracing::debug!(body = ?message.body, "untyped message");
        Ok(())
    });

    let channel = Channel::new(
        config.ws_url.clone(),
        config.reconnect_delay,
        Arc::new(WsConnector),
        dispatcher,
        status,
    );
    channel.connect();

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    channel.disconnect();
    Ok(())
}

async fn run_upload(config: &ViewerConfig, client: &reqwest::Client, paths: Vec<PathBuf>) -> Result<(), CliError> {
    let mut entries: Vec<Arc<dyn Entry>> = Vec::with_capacity(paths.len());
    for path in paths {
        entries.push(Arc::new(FsEntry::from_path(path, config.dir_page_size).await?));
    }

    let ingestor = Ingestor::new(
        Arc::new(HttpUploader::new(client.clone(), config.upload_url())),
        swapper(config, client),
        Arc::new(TracingStatus),
        config.description_suffix.clone(),
    );
    let outcome = ingestor.handle_drop(&entries).await?;
    println!("{}", outcome.model_url);
    Ok(())
}

async fn run_load(config: &ViewerConfig, client: &reqwest::Client, url: &str) -> Result<(), CliError> {
    let swapper = swapper(config, client);
    swapper.load(url).await?;
    println!("{}", swapper.resolve(url));
    Ok(())
}
