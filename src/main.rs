mod codegen;
mod config;
mod error;
mod gateway;
mod logging;
mod relay;
mod render;
mod server;
mod session;
mod store;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::Config::parse();

    logging::init_logging(&config.log_level, &config.log_format);

    let store = store::SessionStore::new(config.relay_settings());
    let state = gateway::AppState::new(store, config.templates.clone());

    server::run(&config.listen, state).await
}
