use clap::Parser;
use log::{error, info};
use server::game::GameConfig;
use server::network::{Server, ServerConfig, ServerEvent};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Maximum number of grid columns
    #[arg(long, default_value_t = shared::DEFAULT_MAX_WIDTH)]
    max_width: usize,

    /// Cell count of the final level
    #[arg(long, default_value_t = shared::DEFAULT_MAX_CHECKBOXES)]
    max_checkboxes: usize,

    /// Cell count of the first level
    #[arg(long, default_value_t = shared::DEFAULT_START_LEVEL)]
    start_level: usize,

    /// Maximum number of concurrent connections
    #[arg(short, long, default_value_t = server::network::DEFAULT_MAX_CLIENTS)]
    max_clients: usize,

    /// Outbound queue length per connection
    #[arg(long, default_value_t = server::network::DEFAULT_SEND_QUEUE_CAPACITY)]
    send_queue: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = ServerConfig {
        game: GameConfig {
            max_width: args.max_width,
            max_checkboxes: args.max_checkboxes,
            start_level: args.start_level,
        },
        max_clients: args.max_clients,
        send_queue_capacity: args.send_queue,
    };

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::bind(&address, config).await?;
    let shutdown = server.shutdown_handle();

    info!(
        "Season runs from {} to {} cells, at most {} columns wide",
        config.game.start_level, config.game.max_checkboxes, config.game.max_width
    );

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down gracefully...");
            let _ = shutdown.send(ServerEvent::Shutdown);
        }
    });

    if let Err(e) = server.run().await {
        error!("Server stopped: {}", e);
        return Err(e.into());
    }

    Ok(())
}
