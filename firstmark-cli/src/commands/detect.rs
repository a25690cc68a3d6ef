//! Detect command implementation.

use std::path::PathBuf;

use anyhow::Result;
use colored::Colorize;
use firstmark_core::{DetectResult, MediaKind};
use tracing::info;

use crate::utils::{fingerprint_file, print_json, with_registry};
use crate::GlobalOpts;

/// Execute the detect command.
///
/// A match is reported on stdout and exits successfully; only `submit`
/// treats a duplicate as a failure.
pub async fn execute(global: &GlobalOpts, file: PathBuf, kind: Option<MediaKind>) -> Result<()> {
    let (triple, _) = fingerprint_file(&file, kind).await?;
    let result = with_registry(global, |registry| Ok(registry.detect(&triple)))?;

    info!(kind = %result.kind, exact = %triple.exact.short(), "Detection finished");

    if global.json {
        print_json(&result)?;
    } else if !global.quiet {
        print_detect_result(&result);
    }
    Ok(())
}

pub fn print_detect_result(result: &DetectResult) {
    println!();
    match &result.matched {
        None => {
            println!("{}", result.kind.to_string().green().bold());
            println!();
            println!("   {}", "No registered content matches".dimmed());
        }
        Some(matched) => {
            println!("{}", result.kind.to_string().yellow().bold());
            println!();
            println!("   {} {}", "Owner:".dimmed(), matched.owner);
            println!("   {} {}", "Locator:".dimmed(), matched.locator);
            println!("   {} {}", "Matched record:".dimmed(), matched.matched_hash);
        }
    }
}
