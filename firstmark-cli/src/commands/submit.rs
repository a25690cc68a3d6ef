//! Submit command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use firstmark_core::{FirstmarkError, MediaKind, Principal, SubmitOutcome};
use tracing::{info, warn};

use super::detect::print_detect_result;
use super::records::print_record;
use crate::utils::{fingerprint_file, print_json, with_registry};
use crate::GlobalOpts;

/// Execute the submit command: register the file only if it is original.
pub async fn execute(
    global: &GlobalOpts,
    file: PathBuf,
    owner: Principal,
    locator: String,
    kind: Option<MediaKind>,
) -> Result<()> {
    let (triple, _) = fingerprint_file(&file, kind).await?;
    let outcome = with_registry(global, |registry| {
        registry
            .submit(&owner, triple, &locator)
            .context("Submission failed")
    })?;

    match outcome {
        SubmitOutcome::Registered(record) => {
            info!(owner = %owner, exact = %record.exact().short(), "Submission registered");
            if global.json {
                print_json(&record)?;
            } else if !global.quiet {
                println!();
                println!("{}", "Registered".green().bold());
                println!();
                print_record(&record);
            }
            Ok(())
        }
        SubmitOutcome::Duplicate(result) => {
            warn!(kind = %result.kind, "Submission is a duplicate");
            if global.json {
                print_json(&result)?;
            } else if !global.quiet {
                print_detect_result(&result);
            }
            let original = result
                .matched
                .as_ref()
                .map(|m| (m.matched_hash, m.owner.to_string()));
            match original {
                Some((hash, owner)) => Err(FirstmarkError::AlreadyRegistered(hash))
                    .with_context(|| format!("{} already owned by {}", result.kind, owner)),
                None => anyhow::bail!("Submission rejected as {}", result.kind),
            }
        }
    }
}
