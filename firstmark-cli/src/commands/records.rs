//! Record views: show, owner, stats, views.

use anyhow::{Context, Result};
use colored::Colorize;
use firstmark_core::{ExactHash, Principal, Record};

use super::fingerprint::print_triple;
use crate::utils::{format_timestamp, load_registry, print_json, with_registry};
use crate::GlobalOpts;

/// Print the fields of one record, indented.
pub fn print_record(record: &Record) {
    println!("   {} {}", "Owner:".dimmed(), record.owner);
    println!("   {} {}", "Locator:".dimmed(), record.locator);
    println!(
        "   {} {}",
        "Registered:".dimmed(),
        format_timestamp(&record.created_at)
    );
    print_triple(&record.fingerprint);
    let disputed = if record.disputed {
        "yes".red().to_string()
    } else {
        "no".green().to_string()
    };
    println!("   {} {}", "Disputed:".dimmed(), disputed);
    println!("   {} {}", "Views:".dimmed(), record.view_count);
}

/// Show one record.
pub fn show(global: &GlobalOpts, exact: ExactHash) -> Result<()> {
    let (registry, _) = load_registry(&global.registry)?;
    let record = registry.get_record(&exact).context("Lookup failed")?;

    if global.json {
        print_json(&record)?;
    } else if !global.quiet {
        println!();
        println!("{} {}", "Record".bold(), exact.short());
        println!();
        print_record(&record);
    }
    Ok(())
}

/// List an owner's records in registration order.
pub fn owner(global: &GlobalOpts, owner: Principal) -> Result<()> {
    let (registry, _) = load_registry(&global.registry)?;
    let records = registry.records_by_owner(&owner);

    if global.json {
        print_json(&records)?;
    } else if !global.quiet {
        println!();
        println!("{} {} ({})", "Records of".bold(), owner, records.len());
        for record in &records {
            println!();
            println!("   {} {}", "Exact:".dimmed(), record.exact());
            println!("   {} {}", "Locator:".dimmed(), record.locator);
            println!(
                "   {} {}",
                "Registered:".dimmed(),
                format_timestamp(&record.created_at)
            );
        }
    }
    Ok(())
}

/// Print registry-wide counters.
pub fn stats(global: &GlobalOpts) -> Result<()> {
    let (registry, _) = load_registry(&global.registry)?;
    let stats = registry.stats();

    if global.json {
        print_json(&stats)?;
    } else if !global.quiet {
        println!();
        println!("{}", "Registry statistics".bold());
        println!();
        println!("   {} {}", "Registered:".dimmed(), stats.total_registered);
        println!(
            "   {} {}",
            "Duplicates detected:".dimmed(),
            stats.total_duplicates_detected
        );
        println!("   {} {}", "Disputes:".dimmed(), stats.total_disputes);
    }
    Ok(())
}

/// Record a view and print the new count.
pub fn views(global: &GlobalOpts, exact: ExactHash) -> Result<()> {
    let count = with_registry(global, |registry| {
        registry.increment_views(&exact).context("Failed to record view")
    })?;

    if global.json {
        print_json(&serde_json::json!({ "exact": exact, "views": count }))?;
    } else if !global.quiet {
        println!("{} {}", exact.short(), format!("{} views", count).cyan());
    }
    Ok(())
}
