use clap::Parser;
use client::network;
use log::info;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server WebSocket URL to connect to
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:8080")]
    server: String,

    /// Client identifier to register with (random when omitted)
    #[arg(short = 'c', long)]
    client_id: Option<String>,

    /// Number of toggles to send before disconnecting
    #[arg(short = 't', long, default_value = "20")]
    toggles: usize,

    /// Milliseconds between toggles
    #[arg(short = 'i', long, default_value = "250")]
    interval_ms: u64,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let client_id = args.client_id.unwrap_or_else(network::generate_client_id);

    info!("Connecting to {} as {}", args.server, client_id);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }

    let mut client = network::Client::connect(&args.server, client_id, args.fake_ping).await?;
    client.register().await?;

    let player = client.wait_for_registration().await?;
    info!(
        "Registered as player {} ({} players online)",
        player,
        client.state().player_count
    );

    let summary = client
        .run_bot(args.toggles, Duration::from_millis(args.interval_ms))
        .await?;

    info!(
        "Sent {} toggles: {} accepted, {} refused, {} unanswered, {} levels won while connected, {} cells held",
        summary.sent,
        summary.accepted,
        summary.rejected,
        summary.unanswered,
        summary.levels_won,
        client.state().owned_by_me()
    );
    if let Some(message) = &client.state().season_message {
        info!("{}", message);
    }

    client.close().await?;
    Ok(())
}
