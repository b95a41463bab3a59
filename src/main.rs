use siphon::config::Config;
use siphon::server::ProxyServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;
    let server = ProxyServer::new(cfg.clone());

    tokio::select! {
        res = server.start(cfg.listen_port) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            server.stop()?;
        }
    }

    Ok(())
}
