//! Dispute subcommands.

use anyhow::{Context, Result};
use colored::Colorize;
use firstmark_core::{Dispute, DisputeStatus};
use tracing::info;

use crate::utils::{format_timestamp, load_registry, print_json, with_registry};
use crate::{DisputeCommand, GlobalOpts};

/// Execute a dispute subcommand.
pub fn execute(global: &GlobalOpts, command: DisputeCommand) -> Result<()> {
    match command {
        DisputeCommand::Raise {
            target,
            accuser,
            reason,
        } => {
            let id = with_registry(global, |registry| {
                registry
                    .raise_dispute(&accuser, &target, &reason)
                    .context("Failed to raise dispute")
            })?;
            info!(dispute_id = id, target = %target.short(), "Dispute raised");

            if global.json {
                print_json(&serde_json::json!({ "id": id, "target": target }))?;
            } else if !global.quiet {
                println!(
                    "{} {} against {}",
                    "Dispute".yellow().bold(),
                    format!("#{}", id).bold(),
                    target.short()
                );
            }
            Ok(())
        }
        DisputeCommand::Resolve {
            id,
            actor,
            uphold,
            reject: _,
        } => {
            let dispute = with_registry(global, |registry| {
                registry
                    .resolve_dispute(id, uphold, &actor)
                    .context("Failed to resolve dispute")?;
                Ok(registry.get_dispute(id)?)
            })?;

            if global.json {
                print_json(&dispute)?;
            } else if !global.quiet {
                println!(
                    "{} {} {}",
                    "Dispute".bold(),
                    format!("#{}", id).bold(),
                    status_label(dispute.status())
                );
            }
            Ok(())
        }
        DisputeCommand::List { target, open } => {
            let (registry, _) = load_registry(&global.registry)?;
            let disputes: Vec<Dispute> = match target {
                Some(target) => registry.disputes_for(&target),
                None => registry.disputes(),
            }
            .into_iter()
            .filter(|d| !open || d.is_open())
            .collect();

            if global.json {
                print_json(&disputes)?;
            } else if !global.quiet {
                print_disputes(&disputes);
            }
            Ok(())
        }
    }
}

fn status_label(status: DisputeStatus) -> String {
    match status {
        DisputeStatus::Open => status.to_string().yellow().to_string(),
        DisputeStatus::Upheld => status.to_string().red().to_string(),
        DisputeStatus::Rejected => status.to_string().green().to_string(),
    }
}

fn print_disputes(disputes: &[Dispute]) {
    if disputes.is_empty() {
        println!("{}", "No disputes".dimmed());
        return;
    }
    for dispute in disputes {
        println!();
        println!(
            "{} {}",
            format!("#{}", dispute.id).bold(),
            status_label(dispute.status())
        );
        println!("   {} {}", "Target:".dimmed(), dispute.target);
        println!("   {} {}", "Accuser:".dimmed(), dispute.accuser);
        println!("   {} {}", "Reason:".dimmed(), dispute.reason);
        println!(
            "   {} {}",
            "Raised:".dimmed(),
            format_timestamp(&dispute.created_at)
        );
        if let (Some(resolver), Some(at)) = (&dispute.resolver, &dispute.resolved_at) {
            println!(
                "   {} {} at {}",
                "Resolved by:".dimmed(),
                resolver,
                format_timestamp(at)
            );
        }
    }
}
