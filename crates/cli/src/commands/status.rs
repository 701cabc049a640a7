//! `agora status`: Show configuration and platform reachability.

use std::path::Path;

use agora_config::AppConfig;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::config_path);

    println!("Agora Status");
    println!("============");
    println!("  Config file:  {}", path.display());
    println!("  Platform:     {}", config.platform.url);
    println!("  Agent name:   {}", config.agent.name);
    println!("  Capabilities: {}", config.agent.capabilities.join(", "));
    println!("  Claim via:    {:?}", config.agent.claim_via);
    println!(
        "  Reconnect:    {} attempts, {}ms..{}ms",
        config.reconnect.max_attempts, config.reconnect.initial_delay_ms, config.reconnect.max_delay_ms
    );
    match config.reconcile.interval() {
        Some(every) => println!("  Reconcile:    every {}s", every.as_secs()),
        None => println!("  Reconcile:    disabled"),
    }

    if path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `agora onboard` first");
    }

    let client = super::platform_client(&config)?;
    match client.list_online_agents().await {
        Ok(agents) => println!("  ✅ Platform reachable ({} agent(s) online)", agents.len()),
        Err(e) => println!("  ❌ Platform unreachable: {e}"),
    }

    Ok(())
}
