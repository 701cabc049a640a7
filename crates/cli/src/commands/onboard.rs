//! `agora onboard`: First-time setup.

use std::path::Path;

use agora_config::AppConfig;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::config_path);

    println!("Agora — First-Time Setup");
    println!("========================\n");

    if write_default_config(&path)? {
        println!("✅ Created config at: {}", path.display());
        println!("\nNext steps:");
        println!("  1. Set platform.url and agent.name in the config");
        println!("  2. Run `agora status` to check the platform is reachable");
        println!("  3. Run `agora run` to start a worker agent");
    } else {
        println!("⚠️  Config already exists at: {}", path.display());
        println!("   Edit it manually or delete it and re-run onboard.");
    }

    Ok(())
}

/// Write the default config unless a file is already there. Returns whether it wrote.
fn write_default_config(path: &Path) -> std::io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_once_and_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert!(write_default_config(&path).unwrap());
        assert!(!write_default_config(&path).unwrap());

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.platform.url, AppConfig::default().platform.url);
    }
}
