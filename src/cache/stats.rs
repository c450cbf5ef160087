//! Cache statistics and maintenance.
//!
//! Backs the `skillet cache` subcommand: sizes, entry listings and removal.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::error::{Result, SkilletError};

use super::{BOOTSTRAP_DIR, MANIFEST_FILE, WHEELS_DIR, WheelCache};

/// A single cached wheel-set entry
#[derive(Debug, Clone)]
pub struct CachedEntry {
    /// Directory name under `wheels/`
    pub key: String,
    /// Package identity recorded in the manifest
    pub ident: String,
    /// Number of wheels in the entry
    pub wheels: usize,
    /// Total size in bytes
    pub size: u64,
}

impl CachedEntry {
    pub fn formatted_size(&self) -> String {
        format_size(self.size)
    }
}

/// Aggregate cache statistics
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Number of wheel-set entries
    pub entries: usize,
    /// Number of cached bootstrappers
    pub bootstrappers: usize,
    /// Total size in bytes
    pub total_size: u64,
}

impl CacheStats {
    pub fn formatted_size(&self) -> String {
        format_size(self.total_size)
    }
}

/// Format a byte count as a human-readable string
fn format_size(size: u64) -> String {
    let value = size as f64;
    if value < 1024.0 {
        format!("{size} B")
    } else if value < 1024.0 * 1024.0 {
        format!("{:.1} KB", value / 1024.0)
    } else if value < 1024.0 * 1024.0 * 1024.0 {
        format!("{:.1} MB", value / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", value / (1024.0 * 1024.0 * 1024.0))
    }
}

fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

fn count_subdirs(path: &Path) -> usize {
    fs::read_dir(path)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_dir())
                .filter(|e| !e.file_name().to_string_lossy().starts_with(".staging-"))
                .count()
        })
        .unwrap_or(0)
}

/// Collect aggregate statistics for a cache root
pub fn cache_stats(cache: &WheelCache) -> Result<CacheStats> {
    let root = cache.root();
    if !root.exists() {
        return Ok(CacheStats::default());
    }

    Ok(CacheStats {
        entries: count_subdirs(&root.join(WHEELS_DIR)),
        bootstrappers: count_subdirs(&root.join(BOOTSTRAP_DIR)),
        total_size: dir_size(root),
    })
}

/// List wheel-set entries, skipping in-flight staging directories
pub fn list_entries(cache: &WheelCache) -> Result<Vec<CachedEntry>> {
    let wheels_root = cache.root().join(WHEELS_DIR);
    if !wheels_root.exists() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for dir_entry in fs::read_dir(&wheels_root).map_err(|e| SkilletError::CacheOperationFailed {
        message: format!("cannot read {}: {}", wheels_root.display(), e),
    })? {
        let dir_entry = dir_entry.map_err(|e| SkilletError::CacheOperationFailed {
            message: format!("cannot read cache entry: {e}"),
        })?;
        let path = dir_entry.path();
        let key = dir_entry.file_name().to_string_lossy().into_owned();
        if !path.is_dir() || key.starts_with(".staging-") {
            continue;
        }

        // An unreadable manifest is listed as such rather than skipped, so
        // `cache clear --only` can still remove it
        let (ident, wheels) = fs::read_to_string(path.join(MANIFEST_FILE))
            .ok()
            .and_then(|raw| serde_json::from_str::<super::CacheManifest>(&raw).ok())
            .map(|m| (m.ident, m.wheels.len()))
            .unwrap_or_else(|| ("<unreadable>".to_string(), 0));

        entries.push(CachedEntry {
            key,
            ident,
            wheels,
            size: dir_size(&path),
        });
    }

    entries.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(entries)
}

/// Remove every entry from the cache
pub fn clear_cache(cache: &WheelCache) -> Result<()> {
    let root = cache.root();
    if !root.exists() {
        return Ok(());
    }
    fs::remove_dir_all(root).map_err(|e| SkilletError::CacheOperationFailed {
        message: format!("cannot remove {}: {}", root.display(), e),
    })
}

/// Remove a single wheel-set entry by key
pub fn remove_entry(cache: &WheelCache, key: &str) -> Result<()> {
    let path = cache.root().join(WHEELS_DIR).join(key);
    if !path.is_dir() {
        return Err(SkilletError::CacheOperationFailed {
            message: format!("no cached entry named {key}"),
        });
    }
    fs::remove_dir_all(&path).map_err(|e| SkilletError::CacheOperationFailed {
        message: format!("cannot remove {}: {}", path.display(), e),
    })
}
