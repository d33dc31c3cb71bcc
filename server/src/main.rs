use clap::Parser;
use log::{error, info};
use server::moderation::{AllowAll, Moderator, NameBlocklist};
use server::network::{Server, ServerConfig};
use server::relay::{Relay, RelayConfig, DEFAULT_MAX_IMAGE_BYTES};
use server::store::{FlowerStore, JsonFileStore, MemoryStore, DEFAULT_MAX_FLOWERS};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "64")]
    max_clients: usize,

    /// JSON Lines file flowers are persisted to; memory only when omitted
    #[arg(short, long)]
    flowers_file: Option<PathBuf>,

    /// Flowers kept before the oldest are dropped
    #[arg(long, default_value_t = DEFAULT_MAX_FLOWERS)]
    max_flowers: usize,

    /// Largest accepted flower image payload in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_IMAGE_BYTES)]
    max_image_bytes: usize,

    /// Seconds of silence before a socket is dropped (0 disables)
    #[arg(long, default_value = "60")]
    idle_timeout_secs: u64,

    /// Reject flowers whose creator name contains this word (repeatable)
    #[arg(long = "blocked-word")]
    blocked_words: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let store: Box<dyn FlowerStore> = match &args.flowers_file {
        Some(path) => Box::new(JsonFileStore::open(path, args.max_flowers)),
        None => {
            info!("No flower file given, flowers will not survive a restart");
            Box::new(MemoryStore::new(args.max_flowers))
        }
    };

    let moderator: Box<dyn Moderator> = if args.blocked_words.is_empty() {
        Box::new(AllowAll)
    } else {
        Box::new(NameBlocklist::new(&args.blocked_words))
    };

    let relay = Relay::new(
        RelayConfig {
            max_image_bytes: args.max_image_bytes,
        },
        store,
        moderator,
    );

    let config = ServerConfig {
        bind_addr: format!("{}:{}", args.host, args.port),
        max_clients: args.max_clients,
        idle_timeout: Duration::from_secs(args.idle_timeout_secs),
    };

    let mut server = Server::new(config, relay).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
