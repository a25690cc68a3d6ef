//! Init command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use firstmark_core::{Principal, Registry};
use tracing::info;

use crate::utils::{ensure_writable, lock_registry, print_json, save_registry};
use crate::{GlobalOpts, SnapshotFormat};

/// Execute the init command.
pub fn execute(global: &GlobalOpts, admin: Principal, force: bool) -> Result<()> {
    let _lock = lock_registry(&global.registry)?;
    ensure_writable(&global.registry, force)?;

    let registry = Registry::new(admin.clone()).context("Failed to create registry")?;
    let format = global.format.unwrap_or(SnapshotFormat::Cbor);
    save_registry(&registry, &global.registry, format)?;

    info!(path = %global.registry.display(), admin = %admin, "Registry initialized");

    if global.json {
        print_json(&serde_json::json!({
            "registry": global.registry.display().to_string(),
            "admin": admin,
        }))?;
    } else if !global.quiet {
        println!();
        println!("{}", "Registry initialized".green().bold());
        println!();
        println!("   {} {}", "Path:".dimmed(), global.registry.display());
        println!("   {} {}", "Admin:".dimmed(), admin);
        println!("   {} {:?}", "Format:".dimmed(), format);
    }
    Ok(())
}
