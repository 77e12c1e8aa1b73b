//! `parley serve`: Start the HTTP API server.

use super::{CliResult, load_config};
use std::path::Path;

pub async fn run(config_path: Option<&Path>, port: Option<u16>, host: Option<String>) -> CliResult {
    let mut config = load_config(config_path)?;

    if let Some(port) = port {
        config.gateway.port = port;
    }
    if let Some(host) = host {
        config.gateway.host = host;
    }

    println!("⚖️  Parley Gateway");
    println!("   Listening:  {}:{}", config.gateway.host, config.gateway.port);
    println!("   Provider:   {} ({})", config.default_provider, config.default_model);
    println!("   Store:      {}", config.store.backend);
    println!(
        "   Admin auth: {}",
        if config.gateway.admin_token.is_some() { "bearer token" } else { "open" }
    );

    parley_gateway::start(config).await?;

    Ok(())
}
