//! Common utility functions shared across CLI commands.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use firstmark_core::{
    EngineConfig, FingerprintEngine, FingerprintTriple, MediaKind, Registry, RegistrySnapshot,
};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::{GlobalOpts, SnapshotFormat};

/// Load the registry file, trying CBOR first then JSON.
///
/// Returns the registry and the encoding it was stored in.
pub fn load_registry(path: &Path) -> Result<(Registry, SnapshotFormat)> {
    let bytes = std::fs::read(path).with_context(|| {
        format!(
            "Failed to read registry: {} (create one with `firstmark init`)",
            path.display()
        )
    })?;

    let (snapshot, format) = match RegistrySnapshot::from_cbor(&bytes) {
        Ok(snapshot) => (snapshot, SnapshotFormat::Cbor),
        Err(cbor_err) => match RegistrySnapshot::from_json(&bytes) {
            Ok(snapshot) => (snapshot, SnapshotFormat::Json),
            // Report the CBOR failure unless the file looks like JSON
            Err(json_err) if bytes.first() == Some(&b'{') => {
                return Err(json_err).context("Failed to parse registry file as JSON")
            }
            Err(_) => return Err(cbor_err).context("Failed to parse registry file"),
        },
    };
    debug!(format = ?format, records = snapshot.records.len(), "Parsed registry");

    let registry = Registry::from_snapshot(snapshot)
        .with_context(|| format!("Registry file {} is inconsistent", path.display()))?;
    Ok((registry, format))
}

/// Exclusive inter-process lock on a registry file, released on drop.
///
/// Held from load through save so concurrent invocations serialize their
/// read-modify-write cycles instead of overwriting each other.
#[derive(Debug)]
pub struct RegistryLock {
    file: File,
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

/// Sidecar lock file next to the registry (`<registry>.lock`).
pub fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// Block until this process holds the registry lock.
pub fn lock_registry(path: &Path) -> Result<RegistryLock> {
    let lock_path = lock_path(path);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)
        .with_context(|| format!("Failed to write registry lock: {}", lock_path.display()))?;
    fs2::FileExt::lock_exclusive(&file)
        .with_context(|| format!("Failed to lock registry: {}", lock_path.display()))?;
    debug!(path = %lock_path.display(), "Acquired registry lock");
    Ok(RegistryLock { file })
}

/// Write the registry through a uniquely named temporary file in the same
/// directory, then atomically replace the target.
pub fn save_registry(registry: &Registry, path: &Path, format: SnapshotFormat) -> Result<()> {
    let snapshot = registry.snapshot();
    let bytes = match format {
        SnapshotFormat::Cbor => snapshot.to_cbor(),
        SnapshotFormat::Json => snapshot.to_json(),
    }
    .context("Failed to serialize registry")?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to write registry: {}", dir.display()))?;
    tmp.write_all(&bytes)
        .with_context(|| format!("Failed to write registry: {}", tmp.path().display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("Failed to write registry: {}", tmp.path().display()))?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to write registry: {}", path.display()))?;

    info!(path = %path.display(), bytes = bytes.len(), format = ?format, "Saved registry");
    Ok(())
}

/// Lock, load, mutate and save the registry in one step.
pub fn with_registry<T>(
    global: &GlobalOpts,
    op: impl FnOnce(&Registry) -> Result<T>,
) -> Result<T> {
    let _lock = lock_registry(&global.registry)?;
    let (registry, stored_format) = load_registry(&global.registry)?;
    let outcome = op(&registry);
    // Detections bump counters even when the operation reports an error
    save_registry(
        &registry,
        &global.registry,
        global.format.unwrap_or(stored_format),
    )?;
    outcome
}

/// Read a media file and fingerprint it on the blocking pool.
pub async fn fingerprint_file(
    file: &Path,
    kind: Option<MediaKind>,
) -> Result<(FingerprintTriple, MediaKind)> {
    let content =
        std::fs::read(file).with_context(|| format!("Failed to read file: {}", file.display()))?;
    let kind = kind.unwrap_or_else(|| MediaKind::from_extension(file));
    info!(path = %file.display(), bytes = content.len(), kind = %kind, "Read file");

    let engine = FingerprintEngine::new(EngineConfig::from_env())
        .context("Invalid fingerprint engine configuration")?;
    let triple = engine
        .compute_with_timeout(content, kind)
        .await
        .with_context(|| format!("Failed to fingerprint {}", file.display()))?;
    Ok((triple, kind))
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

/// Format a timestamp as a human-readable UTC string.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Refuse to clobber an existing file unless forced.
pub fn ensure_writable(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "Registry {} already exists (use --force to overwrite)",
            path.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use firstmark_core::Principal;
    use tempfile::TempDir;

    #[test]
    fn test_format_timestamp() {
        // 2024-01-15 12:30:45 UTC
        let ts = Utc.timestamp_opt(1705321845, 0).unwrap();
        let formatted = format_timestamp(&ts);
        assert_eq!(formatted, "2024-01-15 12:30:45 UTC");
    }

    #[test]
    fn test_save_and_load_both_formats() {
        let dir = TempDir::new().unwrap();
        let registry = Registry::new(Principal::new("root")).unwrap();

        for format in [SnapshotFormat::Cbor, SnapshotFormat::Json] {
            let path = dir.path().join(format!("{:?}.firstmark", format));
            save_registry(&registry, &path, format).unwrap();
            let (loaded, detected) = load_registry(&path).unwrap();
            assert_eq!(detected, format);
            assert_eq!(loaded.admin(), Principal::new("root"));
        }

        // Only the two registries remain; temporary files were renamed away
        let mut names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, vec!["Cbor.firstmark", "Json.firstmark"]);
    }

    #[test]
    fn test_lock_path_is_sidecar() {
        assert_eq!(
            lock_path(Path::new("data/registry.firstmark")),
            PathBuf::from("data/registry.firstmark.lock")
        );
    }

    #[test]
    fn test_registry_lock_is_exclusive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registry.firstmark");

        let guard = lock_registry(&path).unwrap();
        let other = File::open(lock_path(&path)).unwrap();
        assert!(fs2::FileExt::try_lock_exclusive(&other).is_err());

        drop(guard);
        assert!(fs2::FileExt::try_lock_exclusive(&other).is_ok());
        fs2::FileExt::unlock(&other).unwrap();
    }

    #[test]
    fn test_save_into_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let registry = Registry::new(Principal::new("root")).unwrap();
        let err = save_registry(
            &registry,
            &dir.path().join("missing").join("registry"),
            SnapshotFormat::Cbor,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("Failed to write registry"));
    }

    #[test]
    fn test_load_missing_registry() {
        let dir = TempDir::new().unwrap();
        let err = load_registry(&dir.path().join("nope")).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read registry"));
    }

    #[test]
    fn test_load_garbage_registry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad");
        std::fs::write(&path, b"\x01\x02 definitely not a registry").unwrap();
        assert!(load_registry(&path).is_err());
    }

    #[test]
    fn test_ensure_writable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reg");
        assert!(ensure_writable(&path, false).is_ok());
        std::fs::write(&path, b"x").unwrap();
        assert!(ensure_writable(&path, false).is_err());
        assert!(ensure_writable(&path, true).is_ok());
    }
}
