use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use voxlink::core::constants::{DEFAULT_BIND_ADDR, DEFAULT_IDLE_TIMEOUT};
use voxlink::server::{DirectorySink, IngestServer};

#[derive(Parser)]
#[command(name = "voxlink-ingest", about = "Voice stream ingestion endpoint")]
struct Cli {
    /// Address to listen on
    #[arg(short, long, default_value = DEFAULT_BIND_ADDR)]
    bind: String,

    /// Directory receiving `.raw` audio chunks
    #[arg(short, long, default_value = "audio")]
    out_dir: PathBuf,

    /// Seconds of silence before a device connection is dropped
    #[arg(long, default_value_t = DEFAULT_IDLE_TIMEOUT.as_secs())]
    idle_timeout_secs: u64,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    voxlink::logging::init_from_env();

    let sink = match DirectorySink::create(&cli.out_dir).await {
        Ok(sink) => sink,
        Err(e) => {
            eprintln!("failed to create {}: {e}", cli.out_dir.display());
            std::process::exit(1);
        }
    };

    let server = match IngestServer::bind(cli.bind.as_str(), sink).await {
        Ok(server) => server.with_idle_timeout(Duration::from_secs(cli.idle_timeout_secs)),
        Err(e) => {
            eprintln!("failed to listen on {}: {e}", cli.bind);
            std::process::exit(1);
        }
    };

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("server failed: {e}");
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => info!("received SIGINT, shutting down"),
    }
}
