use anyhow::Result;

use intrabar_engine::config::Config;
use intrabar_engine::server;

#[tokio::main]
async fn main() -> Result<()> {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                config
                    .logging
                    .level
                    .parse()
                    .unwrap_or_else(|_| "info".parse().unwrap())
            }),
        )
        .json()
        .init();

    tracing::info!(
        bind_addr = %config.server.bind_addr,
        entry_offset = config.engine.entry_offset_points,
        "Starting intrabar-engine"
    );

    server::serve(config.server.bind_addr.clone(), config.engine.clone()).await
}
