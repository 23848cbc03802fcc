use clap::Parser;
use log::info;
use std::time::Duration;
use store::network::{Server, StoreConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Shared store for arena clients", long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "9000")]
    port: u16,

    /// Maximum number of concurrent sessions
    #[arg(short, long, default_value = "64")]
    max_sessions: usize,

    /// Seconds of silence before a session is dropped and its hooks run
    #[arg(short = 't', long, default_value = "5")]
    session_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);

    let config = StoreConfig {
        max_sessions: args.max_sessions,
        session_timeout: Duration::from_secs(args.session_timeout),
        ..StoreConfig::default()
    };

    info!(
        "Starting store on {} (max {} sessions, {}s timeout)",
        address, config.max_sessions, args.session_timeout
    );

    let mut server = Server::new(&address, config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
