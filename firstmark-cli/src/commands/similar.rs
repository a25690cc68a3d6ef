//! Similar command implementation.

use std::path::PathBuf;

use anyhow::{bail, Result};
use colored::Colorize;
use firstmark_core::MediaKind;
use serde::Serialize;

use crate::utils::{fingerprint_file, load_registry, print_json};
use crate::GlobalOpts;

#[derive(Serialize)]
struct SimilarHit<'a> {
    exact: String,
    owner: &'a str,
    locator: &'a str,
    hamming_distance: u32,
}

/// Execute the similar command. Read-only: does not count as a detection.
pub async fn execute(
    global: &GlobalOpts,
    file: PathBuf,
    max_distance: u32,
    limit: usize,
    kind: Option<MediaKind>,
) -> Result<()> {
    let (triple, kind) = fingerprint_file(&file, kind).await?;
    let Some(query) = triple.perceptual else {
        bail!("{} content has no perceptual fingerprint to compare", kind);
    };

    let (registry, _) = load_registry(&global.registry)?;
    let hits = registry.find_similar(&query, max_distance, limit);

    if global.json {
        let rows: Vec<_> = hits
            .iter()
            .map(|hit| SimilarHit {
                exact: hit.record.exact().to_hex(),
                owner: hit.record.owner.as_str(),
                locator: &hit.record.locator,
                hamming_distance: hit.hamming_distance,
            })
            .collect();
        print_json(&rows)?;
    } else if !global.quiet {
        if hits.is_empty() {
            println!("{}", "No similar records".dimmed());
        }
        for hit in &hits {
            println!(
                "{:>3}  {}  {}  {}",
                hit.hamming_distance.to_string().cyan(),
                hit.record.exact().short(),
                hit.record.owner,
                hit.record.locator.dimmed()
            );
        }
    }
    Ok(())
}
