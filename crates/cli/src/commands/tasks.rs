//! `agora tasks`: List pending tasks.

use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let client = super::platform_client(&config)?;

    let tasks = client.list_pending_tasks().await?;
    if tasks.is_empty() {
        println!("No pending tasks.");
        return Ok(());
    }

    println!("{:<6} {:<8} {:<8} TITLE", "ID", "PRIORITY", "CREATOR");
    for task in &tasks {
        let creator = task
            .creator_agent_id
            .map_or_else(|| "-".to_string(), |id| id.to_string());
        println!(
            "{:<6} {:<8} {:<8} {}",
            task.id, task.priority, creator, task.title
        );
    }
    println!("\n{} pending task(s)", tasks.len());
    Ok(())
}
