pub mod agents;
pub mod onboard;
pub mod run;
pub mod status;
pub mod tasks;

use std::path::Path;

use agora_config::AppConfig;
use agora_transport::PlatformClient;

/// Load the config from `path` if given, else from the default location.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load_with_overrides(path, |key| std::env::var(key).ok()),
        None => AppConfig::load(),
    };
    Ok(config.map_err(|e| format!("Failed to load config: {e}"))?)
}

pub fn platform_client(config: &AppConfig) -> Result<PlatformClient, Box<dyn std::error::Error>> {
    Ok(PlatformClient::new(
        &config.platform.url,
        config.platform.request_timeout(),
    )?)
}
