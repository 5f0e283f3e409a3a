use clap::Parser;
use rendezvous::config::Config;
use rendezvous::signaling::RelayServer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rendezvous=info")),
        )
        .init();

    let config = Config::parse();
    let bind_addr = config.listen_addr();

    println!("   Rendezvous relay");
    println!("   Binding to {}", bind_addr);
    println!("   Press Ctrl+C to stop\n");

    let server = RelayServer::bind(&bind_addr)
        .await?
        .with_heartbeat(config.heartbeat());

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}
