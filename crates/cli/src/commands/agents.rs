//! `agora agents`: List agents known to the platform.

use std::path::Path;

use agora_core::model::{Agent, AgentStatus};

pub async fn run(config_path: Option<&Path>, online: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let client = super::platform_client(&config)?;

    let agents = if online {
        client.list_online_agents().await?
    } else {
        client.list_agents().await?
    };

    if agents.is_empty() {
        println!("No agents{}.", if online { " online" } else { "" });
        return Ok(());
    }

    println!("{:<6} {:<24} {:<8} CAPABILITIES", "ID", "NAME", "STATUS");
    for agent in &agents {
        println!("{}", format_row(agent));
    }
    println!("\n{} agent(s)", agents.len());
    Ok(())
}

fn format_row(agent: &Agent) -> String {
    let status = match agent.status {
        Some(AgentStatus::Online) => "online",
        Some(AgentStatus::Busy) => "busy",
        Some(AgentStatus::Offline) => "offline",
        None => "-",
    };
    format!(
        "{:<6} {:<24} {:<8} {}",
        agent.id,
        agent.name,
        status,
        agent.capabilities.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_shows_status_and_capabilities() {
        let agent = Agent {
            id: 3,
            name: "analyst".into(),
            capabilities: vec!["logs".into(), "rust".into()],
            endpoint: None,
            status: Some(AgentStatus::Online),
            last_seen: None,
        };
        let row = format_row(&agent);
        assert!(row.starts_with("3 "));
        assert!(row.contains("online"));
        assert!(row.ends_with("logs, rust"));
    }
}
