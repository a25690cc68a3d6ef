//! Role subcommands.

use anyhow::{Context, Result};
use colored::Colorize;

use crate::utils::{load_registry, print_json, with_registry};
use crate::{GlobalOpts, RoleCommand};

/// Execute a role subcommand.
pub fn execute(global: &GlobalOpts, command: RoleCommand) -> Result<()> {
    let message = match command {
        RoleCommand::AddArbitrator { who, actor } => {
            with_registry(global, |registry| {
                registry
                    .add_arbitrator(&actor, who.clone())
                    .context("Failed to add arbitrator")
            })?;
            format!("{} is an arbitrator", who)
        }
        RoleCommand::RemoveArbitrator { who, actor } => {
            with_registry(global, |registry| {
                registry
                    .remove_arbitrator(&actor, &who)
                    .context("Failed to remove arbitrator")
            })?;
            format!("{} is no longer an arbitrator", who)
        }
        RoleCommand::TransferAdmin { who, actor } => {
            with_registry(global, |registry| {
                registry
                    .transfer_admin(&actor, who.clone())
                    .context("Failed to transfer admin")
            })?;
            format!("{} is now the admin", who)
        }
        RoleCommand::List => {
            let (registry, _) = load_registry(&global.registry)?;
            let admin = registry.admin();
            let arbitrators = registry.arbitrators();
            if global.json {
                print_json(&serde_json::json!({
                    "admin": admin,
                    "arbitrators": arbitrators,
                }))?;
            } else if !global.quiet {
                println!("   {} {}", "Admin:".dimmed(), admin);
                let names: Vec<_> = arbitrators.iter().map(|a| a.as_str()).collect();
                let listed = if names.is_empty() {
                    "none".dimmed().to_string()
                } else {
                    names.join(", ")
                };
                println!("   {} {}", "Arbitrators:".dimmed(), listed);
            }
            return Ok(());
        }
    };

    if global.json {
        print_json(&serde_json::json!({ "ok": true }))?;
    } else if !global.quiet {
        println!("{}", message.green());
    }
    Ok(())
}
