//! Fingerprint command implementation.

use std::path::PathBuf;

use anyhow::Result;
use colored::Colorize;
use firstmark_core::{FingerprintTriple, MediaKind};

use crate::utils::{fingerprint_file, print_json};
use crate::GlobalOpts;

/// Execute the fingerprint command. Does not touch the registry.
pub async fn execute(global: &GlobalOpts, file: PathBuf, kind: Option<MediaKind>) -> Result<()> {
    let (triple, kind) = fingerprint_file(&file, kind).await?;

    if global.json {
        print_json(&triple)?;
    } else if !global.quiet {
        println!();
        println!("{} {}", "Fingerprint of".bold(), file.display());
        println!();
        println!("   {} {}", "Kind:".dimmed(), kind);
        print_triple(&triple);
    }
    Ok(())
}

/// Print the three tiers, one per line.
pub fn print_triple(triple: &FingerprintTriple) {
    println!("   {} {}", "Exact:".dimmed(), triple.exact);
    match &triple.perceptual {
        Some(p) => println!("   {} {} ({} bits)", "Perceptual:".dimmed(), p, p.bits()),
        None => println!("   {} {}", "Perceptual:".dimmed(), "n/a".dimmed()),
    }
    match &triple.audio {
        Some(a) => println!("   {} {}", "Audio:".dimmed(), a),
        None => println!("   {} {}", "Audio:".dimmed(), "n/a".dimmed()),
    }
}
