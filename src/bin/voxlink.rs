use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use voxlink::prelude::*;

#[derive(Parser)]
#[command(name = "voxlink", about = "Voice capture streaming client")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "VOXLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Ingestion endpoint host
    #[arg(long)]
    host: Option<String>,

    /// Ingestion endpoint port
    #[arg(long)]
    port: Option<u16>,

    /// Persisted state file
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Raw 16-bit little-endian PCM input (stdin if omitted)
    #[arg(short, long)]
    input: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> Result<(ClientConfig, Option<PathBuf>), ConfigError> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::load(path)?,
            None => ClientConfig::default(),
        };
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(state_file) = self.state_file {
            config.storage.state_file = state_file;
        }
        config.validate()?;
        Ok((config, self.input))
    }
}

async fn stream<A: AudioSource>(config: ClientConfig, source: A) -> Result<(), ClientError> {
    let connector = TcpConnector::new(config.server_addr());
    let store = FileStore::new(&config.storage.state_file);
    let mut client = Orchestrator::new(&config, source, HostRadio::new(), connector, store).await?;

    tokio::select! {
        _ = client.run() => {}
        _ = tokio::signal::ctrl_c() => info!("received SIGINT, shutting down"),
    }
    client.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    voxlink::logging::init_from_env();

    let (config, input) = match cli.into_config() {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            std::process::exit(1);
        }
    };
    info!(server = %config.server_addr(), "starting voxlink");

    let frame_bytes = config.audio.frame_bytes();
    let result = match input {
        Some(path) => match tokio::fs::File::open(&path).await {
            Ok(file) => stream(config, PcmReader::new(file, frame_bytes)).await,
            Err(e) => {
                eprintln!("failed to open {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => stream(config, PcmReader::new(tokio::io::stdin(), frame_bytes)).await,
    };

    if let Err(e) = result {
        error!("client failed: {e}");
        std::process::exit(1);
    }
}
