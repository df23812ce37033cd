use clap::Parser;
use log::info;
use server::network::{Server, ServerConfig};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Maximum number of concurrent connections
    #[arg(short, long, default_value = "32")]
    max_clients: usize,

    /// Players seated together in one room
    #[arg(long, default_value = "2")]
    players_per_room: usize,

    /// Instructions sent with the survey command
    #[arg(short, long, default_value = "Pick the taboo word")]
    survey: String,

    /// Seconds of silence before a connection is dropped
    #[arg(long, default_value = "300")]
    idle_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let address = format!("{}:{}", args.host, args.port);
    let config = ServerConfig {
        max_clients: args.max_clients,
        players_per_room: args.players_per_room,
        survey: args.survey,
        idle_timeout: Duration::from_secs(args.idle_timeout),
    };

    info!("Starting server on {}", address);
    info!("Rooms seat {} players", config.players_per_room);

    let server = Server::bind(&address, config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
