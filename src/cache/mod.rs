//! Wheel and bootstrapper cache.
//!
//! Content-addressed store shared by concurrent builds on the same host.
//! Layout under the cache root:
//!
//! ```text
//! <cache>/wheels/<key>/manifest.json     entry metadata, written last
//! <cache>/wheels/<key>/wheels/*.whl      the cached artifact set
//! <cache>/bootstrap/<key>/...            unpacked virtualenv bootstrapper
//! ```
//!
//! Writes are staged into a temp directory inside the cache root and renamed
//! into place, so a concurrent reader of the same key either sees nothing or
//! a complete entry. A reader of a different key is never affected. An entry
//! that appears concurrently wins the race; the staged copy is discarded.
//!
//! Cache failures are represented as errors here but are never fatal: every
//! caller downgrades them to a warning and a miss.

pub mod stats;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkilletError};
use crate::ident::PackageInfo;

/// Default cache directory name under the user's cache directory
const CACHE_DIR: &str = "skillet";

/// Subdirectory for wheel-set entries
pub const WHEELS_DIR: &str = "wheels";

/// Subdirectory for bootstrapper entries
pub const BOOTSTRAP_DIR: &str = "bootstrap";

/// Entry metadata file; written last so its presence marks a complete entry
pub const MANIFEST_FILE: &str = "manifest.json";

/// Get the default cache directory path
///
/// Uses the platform's standard cache location (e.g. XDG on Linux,
/// Library/Caches on macOS) with a `skillet` subdirectory. Can be overridden
/// with the `SKILLET_CACHE_DIR` environment variable.
pub fn cache_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("SKILLET_CACHE_DIR") {
        return Ok(PathBuf::from(dir));
    }

    let base = dirs::cache_dir().ok_or_else(|| SkilletError::CacheOperationFailed {
        message: "Could not determine cache directory".to_string(),
    })?;

    Ok(base.join(CACHE_DIR))
}

/// Convert an identity to a path-safe cache key segment
pub fn path_safe_key(value: &str) -> String {
    let key: String = value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let key = key.trim_matches('-').to_string();
    if key.is_empty() { "unknown".to_string() } else { key }
}

/// Cache key for a bootstrapper of the given version spec
pub fn bootstrap_key(version: Option<&str>) -> String {
    format!("virtualenv-{}", path_safe_key(version.unwrap_or("latest")))
}

/// Deterministic signature over everything that influences the resolved
/// dependency set: interpreter, platform, package-tool options, pinned tool
/// versions and the requirements list contents.
pub fn dependency_signature(
    python: &Path,
    platform: &str,
    pip_options: &[String],
    wheel_version: Option<&str>,
    requirements: Option<&Path>,
) -> Result<String> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(python.to_string_lossy().as_bytes());
    hasher.update(b"\0");
    hasher.update(platform.as_bytes());
    hasher.update(b"\0");
    for option in pip_options {
        hasher.update(option.as_bytes());
        hasher.update(b"\0");
    }
    hasher.update(wheel_version.unwrap_or("latest").as_bytes());
    hasher.update(b"\0");
    if let Some(path) = requirements {
        let contents = fs::read(path).map_err(|e| SkilletError::CacheOperationFailed {
            message: format!("cannot read requirements file {}: {}", path.display(), e),
        })?;
        hasher.update(&contents);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Cache key for a package's wheel set
pub fn wheel_key(info: &PackageInfo, signature: &str) -> String {
    let short = &signature[..signature.len().min(16)];
    format!("{}-{}", path_safe_key(&info.ident), short)
}

/// Metadata stored with every wheel-set entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheManifest {
    /// Package identity the entry was built for
    pub ident: String,
    /// File names of the cached wheels
    pub wheels: Vec<String>,
    /// Seconds since the epoch at store time
    pub created: u64,
}

/// A complete, readable cache entry
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub path: PathBuf,
    pub manifest: CacheManifest,
}

/// Handle to a cache root directory
#[derive(Debug, Clone)]
pub struct WheelCache {
    root: PathBuf,
}

impl WheelCache {
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn open_default() -> Result<Self> {
        Ok(Self::at(cache_dir()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn wheels_dir(&self) -> PathBuf {
        self.root.join(WHEELS_DIR)
    }

    fn bootstrap_dir(&self) -> PathBuf {
        self.root.join(BOOTSTRAP_DIR)
    }

    /// Look up a wheel-set entry. `Ok(None)` is a miss; an unreadable or
    /// corrupt entry is an error the caller downgrades to a miss.
    pub fn lookup_wheels(&self, key: &str) -> Result<Option<CacheEntry>> {
        let entry_path = self.wheels_dir().join(key);
        let manifest_path = entry_path.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&manifest_path).map_err(|e| {
            SkilletError::CacheOperationFailed {
                message: format!("cannot read {}: {}", manifest_path.display(), e),
            }
        })?;
        let manifest: CacheManifest =
            serde_json::from_str(&raw).map_err(|e| SkilletError::CacheOperationFailed {
                message: format!("corrupt manifest {}: {}", manifest_path.display(), e),
            })?;

        Ok(Some(CacheEntry {
            path: entry_path,
            manifest,
        }))
    }

    /// Copy a cached wheel set into a build's `data/` directory. Returns the
    /// number of wheels placed.
    pub fn place_wheels(&self, entry: &CacheEntry, data_dir: &Path) -> Result<usize> {
        let wheels = entry.path.join(WHEELS_DIR);
        let mut placed = 0;
        for name in &entry.manifest.wheels {
            let src = wheels.join(name);
            let dst = data_dir.join(name);
            fs::copy(&src, &dst).map_err(|e| SkilletError::CacheOperationFailed {
                message: format!("cannot copy cached wheel {}: {}", src.display(), e),
            })?;
            placed += 1;
        }
        Ok(placed)
    }

    /// Snapshot the wheels in `data_dir` as a new entry. The entry is staged
    /// in a temp directory and renamed into place; a concurrent writer of the
    /// same key wins the race and this snapshot is discarded.
    pub fn store_wheels(&self, key: &str, ident: &str, data_dir: &Path) -> Result<()> {
        let wheels_root = self.wheels_dir();
        fs::create_dir_all(&wheels_root).map_err(|e| SkilletError::CacheOperationFailed {
            message: format!("cannot create {}: {}", wheels_root.display(), e),
        })?;

        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&wheels_root)
            .map_err(|e| SkilletError::CacheOperationFailed {
                message: format!("cannot create staging directory: {e}"),
            })?;

        let staged_wheels = staging.path().join(WHEELS_DIR);
        fs::create_dir(&staged_wheels).map_err(|e| SkilletError::CacheOperationFailed {
            message: format!("cannot create staging wheels directory: {e}"),
        })?;

        let mut names = Vec::new();
        for entry in fs::read_dir(data_dir).map_err(|e| SkilletError::CacheOperationFailed {
            message: format!("cannot read {}: {}", data_dir.display(), e),
        })? {
            let entry = entry.map_err(|e| SkilletError::CacheOperationFailed {
                message: format!("cannot read directory entry: {e}"),
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(".whl") {
                continue;
            }
            fs::copy(entry.path(), staged_wheels.join(&name)).map_err(|e| {
                SkilletError::CacheOperationFailed {
                    message: format!("cannot stage wheel {name}: {e}"),
                }
            })?;
            names.push(name);
        }
        names.sort();

        let manifest = CacheManifest {
            ident: ident.to_string(),
            wheels: names,
            created: unix_now(),
        };
        let manifest_json = serde_json::to_string_pretty(&manifest).map_err(|e| {
            SkilletError::CacheOperationFailed {
                message: format!("cannot serialize manifest: {e}"),
            }
        })?;
        // Manifest last: its presence marks the staged entry complete
        fs::write(staging.path().join(MANIFEST_FILE), manifest_json).map_err(|e| {
            SkilletError::CacheOperationFailed {
                message: format!("cannot write manifest: {e}"),
            }
        })?;

        publish_staged(staging, &wheels_root.join(key))
    }

    /// Look up a bootstrapper entry. Present only when the unpacked tree was
    /// fully published.
    pub fn lookup_bootstrap(&self, key: &str) -> Result<Option<PathBuf>> {
        let entry_path = self.bootstrap_dir().join(key);
        if entry_path.is_dir() {
            Ok(Some(entry_path))
        } else {
            Ok(None)
        }
    }

    /// Store an unpacked bootstrapper tree under the given key
    pub fn store_bootstrap(&self, key: &str, src_tree: &Path) -> Result<()> {
        let bootstrap_root = self.bootstrap_dir();
        fs::create_dir_all(&bootstrap_root).map_err(|e| SkilletError::CacheOperationFailed {
            message: format!("cannot create {}: {}", bootstrap_root.display(), e),
        })?;

        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&bootstrap_root)
            .map_err(|e| SkilletError::CacheOperationFailed {
                message: format!("cannot create staging directory: {e}"),
            })?;

        copy_tree(src_tree, staging.path())?;
        publish_staged(staging, &bootstrap_root.join(key))
    }
}

/// Atomically publish a fully staged entry at its final path. If the entry
/// already exists (a concurrent build finished first), the staged copy is
/// simply dropped.
fn publish_staged(staging: tempfile::TempDir, final_path: &Path) -> Result<()> {
    if final_path.exists() {
        return Ok(());
    }
    let staged = staging.keep();
    match fs::rename(&staged, final_path) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = fs::remove_dir_all(&staged);
            if final_path.exists() {
                // Lost the race; the other entry is complete
                Ok(())
            } else {
                Err(SkilletError::CacheOperationFailed {
                    message: format!("cannot publish cache entry {}: {}", final_path.display(), e),
                })
            }
        }
    }
}

/// Recursive copy used for bootstrapper trees
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).map_err(|e| SkilletError::CacheOperationFailed {
        message: format!("cannot create {}: {}", dst.display(), e),
    })?;
    for entry in fs::read_dir(src).map_err(|e| SkilletError::CacheOperationFailed {
        message: format!("cannot read {}: {}", src.display(), e),
    })? {
        let entry = entry.map_err(|e| SkilletError::CacheOperationFailed {
            message: format!("cannot read directory entry: {e}"),
        })?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if src_path.is_dir() {
            copy_tree(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path).map_err(|e| SkilletError::CacheOperationFailed {
                message: format!(
                    "cannot copy {} to {}: {}",
                    src_path.display(),
                    dst_path.display(),
                    e
                ),
            })?;
        }
    }
    Ok(())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
