//! `kbchat serve`: start the HTTP gateway.

use std::path::PathBuf;

pub async fn run(
    config_path: Option<PathBuf>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("kbchat gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {}", config.llm.model);
    if !config.has_api_key() {
        println!("   No API key yet: /invoke is unavailable until one is set");
    }

    kbchat_gateway::start(config).await?;

    Ok(())
}
