mod protocol;
mod server;
mod tools;

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use altiplano_core::api::ApiClient;
use altiplano_core::auth::{AuthGate, Credentials, TokenCache};
use altiplano_core::Config;

use crate::server::McpServer;
use crate::tools::ToolRouter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // stdout carries the protocol stream; all diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = Config::load()?;
    let api = Arc::new(ApiClient::new(&config)?);
    let cache = Arc::new(TokenCache::new(config.token_cache_path()?));

    let defaults = match (&config.username, &config.password) {
        (Some(username), Some(password)) => Some(Credentials {
            username: username.clone(),
            password: password.clone(),
        }),
        _ => None,
    };

    let gate = Arc::new(AuthGate::new(cache, api.clone(), defaults));
    let server = McpServer::new(ToolRouter::new(api, gate));

    server.run_stdio().await?;
    Ok(())
}
