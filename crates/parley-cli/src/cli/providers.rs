//! Provider inspection commands: list, models, check.
//!
//! Credentials come from the environment at startup; these commands only
//! report what was bound and whether the vendor accepts it.

use anyhow::Result;
use clap::Subcommand;
use console::style;
use tracing::Instrument;

use parley_observe::genai_attrs::{
    GEN_AI_OPERATION_NAME, GEN_AI_SYSTEM, OP_LIST_MODELS, OP_VALIDATE,
};

use crate::state::AppState;

#[derive(Subcommand)]
pub enum ProvidersCommand {
    /// List known providers and whether a default key is configured.
    #[command(alias = "ls")]
    List,

    /// List the models a provider offers.
    Models {
        /// Provider name or alias (e.g., "openai", "claude", "wenxin").
        provider: String,
    },

    /// Verify credentials against the vendor.
    Check {
        /// Only check this provider.
        provider: Option<String>,
    },
}

pub async fn handle(cmd: ProvidersCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        ProvidersCommand::List => list(state, json),
        ProvidersCommand::Models { provider } => models(state, &provider, json).await,
        ProvidersCommand::Check { provider } => check(state, provider.as_deref(), json).await,
    }
}

/// Key status for one provider as shown by `list`.
fn key_status(state: &AppState, id: &str) -> Result<&'static str> {
    let adapter = state.registry.default_adapter(id)?;
    Ok(if !adapter.requires_api_key() {
        "not needed"
    } else if state.registry.has_default_key(id) {
        "configured"
    } else {
        "missing"
    })
}

fn list(state: &AppState, json: bool) -> Result<()> {
    let ids = state.registry.provider_ids();

    if json {
        let rows = ids
            .iter()
            .map(|id| {
                Ok(serde_json::json!({
                    "provider": id,
                    "key": key_status(state, id)?,
                }))
            })
            .collect::<Result<Vec<_>>>()?;
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!();
    for id in ids {
        let status = key_status(state, id)?;
        let marker = match status {
            "missing" => style("✗").red(),
            _ => style("✓").green(),
        };
        println!("  {marker} {:<10} {}", style(id).bold(), style(status).dim());
    }
    println!();
    Ok(())
}

async fn models(state: &AppState, provider: &str, json: bool) -> Result<()> {
    let id = state.registry.normalize(provider);
    let adapter = state.registry.default_adapter(&id)?;
    let span = tracing::info_span!(
        "providers.models",
        { GEN_AI_OPERATION_NAME } = OP_LIST_MODELS,
        { GEN_AI_SYSTEM } = id.as_str(),
    );
    let models = adapter.list_models().instrument(span).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&models)?);
        return Ok(());
    }

    println!();
    println!("  {} {}", style("Models for").dim(), style(&id).bold());
    for model in &models {
        println!("    {model}");
    }
    println!();
    Ok(())
}

async fn check(state: &AppState, only: Option<&str>, json: bool) -> Result<()> {
    let ids: Vec<String> = match only {
        Some(provider) => vec![state.registry.normalize(provider)],
        None => state
            .registry
            .provider_ids()
            .into_iter()
            .map(str::to_string)
            .collect(),
    };

    let mut results = Vec::with_capacity(ids.len());
    for id in &ids {
        let span = tracing::info_span!(
            "providers.check",
            { GEN_AI_OPERATION_NAME } = OP_VALIDATE,
            { GEN_AI_SYSTEM } = id.as_str(),
        );
        let outcome = match state.registry.resolve(id, None) {
            Ok(adapter) => {
                if adapter.validate_credential().instrument(span).await {
                    Ok(())
                } else {
                    Err("rejected by vendor or unreachable".to_string())
                }
            }
            Err(e) => Err(e.to_string()),
        };
        results.push((id.as_str(), outcome));
    }

    if json {
        let rows: Vec<_> = results
            .iter()
            .map(|(id, outcome)| {
                serde_json::json!({
                    "provider": id,
                    "valid": outcome.is_ok(),
                    "error": outcome.as_ref().err(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!();
    for (id, outcome) in &results {
        match outcome {
            Ok(()) => println!("  {} {}", style("✓").green().bold(), style(id).bold()),
            Err(reason) => println!(
                "  {} {} {}",
                style("✗").red().bold(),
                style(id).bold(),
                style(reason).dim()
            ),
        }
    }
    println!();
    Ok(())
}
