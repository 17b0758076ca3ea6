//! Agent management commands: add, list.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use console::style;

use parley_core::chat::ChatRepository;
use parley_types::chat::AgentProfile;

use crate::state::AppState;

#[derive(Subcommand)]
pub enum AgentCommand {
    /// Register a new agent.
    Add(AddAgentArgs),

    /// List registered agents.
    #[command(alias = "ls")]
    List,
}

#[derive(Args)]
pub struct AddAgentArgs {
    /// Display name used in rooms and mentions.
    #[arg(long)]
    pub name: String,

    /// Provider name or alias (e.g., "openai", "claude", "ollama").
    #[arg(long)]
    pub provider: String,

    /// Model identifier passed to the vendor.
    #[arg(long)]
    pub model: String,

    #[arg(long)]
    pub system_prompt: Option<String>,

    /// Agent-specific API key overriding the environment default.
    #[arg(long, env = "PARLEY_AGENT_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Agent-specific base URL.
    #[arg(long)]
    pub endpoint: Option<String>,

    #[arg(long)]
    pub temperature: Option<f32>,

    #[arg(long)]
    pub max_output_tokens: Option<u32>,
}

pub async fn handle(cmd: AgentCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        AgentCommand::Add(args) => add(state, args, json).await,
        AgentCommand::List => list(state, json).await,
    }
}

/// Build the profile, storing the provider in canonical form.
pub fn build_profile(state: &AppState, args: AddAgentArgs) -> Result<AgentProfile> {
    if args.name.trim().is_empty() {
        bail!("agent name must not be blank");
    }
    let provider = state.registry.normalize(&args.provider);
    if !state.registry.provider_ids().contains(&provider.as_str()) {
        bail!(
            "unknown provider '{}' (known: {})",
            args.provider,
            state.registry.provider_ids().join(", ")
        );
    }

    let mut agent = AgentProfile::new(args.name.trim(), provider, args.model);
    agent.system_prompt = args.system_prompt.filter(|p| !p.trim().is_empty());
    agent.api_key = args.api_key.filter(|k| !k.trim().is_empty());
    agent.endpoint = args.endpoint.filter(|e| !e.trim().is_empty());
    agent.temperature = args.temperature;
    agent.max_output_tokens = args.max_output_tokens;
    Ok(agent)
}

async fn add(state: &AppState, args: AddAgentArgs, json: bool) -> Result<()> {
    let agent = build_profile(state, args)?;
    state.chat.save_agent(&agent).await?;
    tracing::info!(agent_id = %agent.id, provider = %agent.provider, "agent added");

    if json {
        println!("{}", serde_json::to_string_pretty(&agent)?);
    } else {
        println!(
            "  {} Added {} ({} / {})",
            style("✓").green().bold(),
            style(&agent.name).bold(),
            agent.provider,
            agent.model
        );
        println!("    id: {}", style(agent.id).cyan());
    }
    Ok(())
}

async fn list(state: &AppState, json: bool) -> Result<()> {
    let agents = state.chat.list_agents().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&agents)?);
        return Ok(());
    }

    if agents.is_empty() {
        println!(
            "  {} No agents yet. Use {} to add one.",
            style("i").blue().bold(),
            style("parley agent add").cyan()
        );
        return Ok(());
    }

    println!();
    for agent in &agents {
        let key = if agent.api_key.is_some() { " (own key)" } else { "" };
        println!(
            "  {} {:<12} {}/{}{}",
            style(agent.id).dim(),
            style(&agent.name).bold(),
            agent.provider,
            agent.model,
            style(key).dim()
        );
    }
    println!();
    Ok(())
}
