//! Build virtualenv provisioning.
//!
//! Obtains the virtualenv bootstrapper (from the cache, or downloaded with
//! the host interpreter's pip and unpacked), then uses it to create the
//! private build environment under a scratch directory. The unpacked
//! bootstrapper tree doubles as the reusable artifact that is bundled into
//! `data/` for offline installs and stored in the cache after a successful
//! build.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::Command;

use flate2::read::GzDecoder;
use tar::Archive;
use walkdir::WalkDir;

use crate::cache::{self, WheelCache};
use crate::error::{Result, SkilletError};
use crate::exec;
use crate::log::Log;
use crate::progress;
use crate::wheels::tool_spec;

/// Name of the bootstrapper entry script inside the unpacked distribution
const BOOTSTRAP_SCRIPT: &str = "virtualenv.py";

/// A provisioned build environment
#[derive(Debug, Clone)]
pub struct ProvisionedEnv {
    /// Root of the build virtualenv
    pub venv_path: PathBuf,
    /// Interpreter inside the build virtualenv
    pub python: PathBuf,
    /// Package tool inside the build virtualenv
    pub pip: PathBuf,
    /// Unpacked bootstrapper tree (the reusable artifact)
    pub bootstrap_src: PathBuf,
}

impl ProvisionedEnv {
    /// The environment's executable directory, for PATH injection into hooks
    pub fn bin_dir(&self) -> PathBuf {
        self.venv_path.join(bin_dir_name())
    }
}

fn bin_dir_name() -> &'static str {
    if cfg!(windows) { "Scripts" } else { "bin" }
}

/// Environment provisioner
pub struct Provisioner<'a> {
    pub python: &'a Path,
    pub virtualenv_version: Option<&'a str>,
    pub cache: Option<&'a WheelCache>,
    pub no_download: bool,
    pub log: &'a Log,
}

impl Provisioner<'_> {
    /// Provision a fresh build virtualenv under the scratch area
    pub fn provision(&self, scratch: &mut crate::scratch::Scratch) -> Result<ProvisionedEnv> {
        let bootstrap_src = self.obtain_bootstrapper(scratch)?;

        self.log.info("Setting up build virtualenv");
        let venv_root = scratch.create("venv")?;
        let venv_path = venv_root.join("venv");

        exec::run_captured(
            Command::new(self.python)
                .arg(bootstrap_src.join(BOOTSTRAP_SCRIPT))
                .arg(&venv_path),
            self.log,
        )
        .map_err(|e| SkilletError::ProvisioningFailed {
            message: e.to_string(),
        })?;

        let bin = venv_path.join(bin_dir_name());
        Ok(ProvisionedEnv {
            python: bin.join(exe_name("python")),
            pip: bin.join(exe_name("pip")),
            venv_path,
            bootstrap_src,
        })
    }

    /// Locate the bootstrapper: cached copy if available, otherwise download
    /// and unpack one. With downloads disabled a cache miss is fatal.
    fn obtain_bootstrapper(&self, scratch: &mut crate::scratch::Scratch) -> Result<PathBuf> {
        let key = cache::bootstrap_key(self.virtualenv_version);

        if let Some(cache) = self.cache {
            match cache.lookup_bootstrap(&key) {
                Ok(Some(path)) => {
                    self.log.info("Using cached virtualenv bootstrapper");
                    return Ok(path);
                }
                Ok(None) => {}
                Err(e) => self.log.warn(format!("ignoring bootstrapper cache: {e}")),
            }
        }

        if self.no_download {
            return Err(SkilletError::ProvisioningFailed {
                message: format!(
                    "bootstrapper '{key}' is not cached and downloads are disabled"
                ),
            });
        }

        let download_dir = scratch.create("bootstrap")?;
        let spec = tool_spec("virtualenv", self.virtualenv_version);

        let pb = progress::spinner("Downloading virtualenv bootstrapper...");
        let result = exec::run_captured(
            Command::new(self.python)
                .arg("-m")
                .arg("pip")
                .arg("download")
                .arg(&spec)
                .arg("--no-deps")
                .arg("--no-binary")
                .arg(":all:")
                .arg("-d")
                .arg(&download_dir),
            self.log,
        );
        progress::finish(pb);
        result.map_err(|e| SkilletError::ProvisioningFailed {
            message: e.to_string(),
        })?;

        let archive = find_downloaded_archive(&download_dir)?;
        let unpacked = download_dir.join("unpacked");
        unpack_archive(&archive, &unpacked)?;
        locate_bootstrap_script(&unpacked)
    }
}

fn exe_name(base: &str) -> String {
    if cfg!(windows) {
        format!("{base}.exe")
    } else {
        base.to_string()
    }
}

/// Copy the bootstrapper tree into the workspace `data/` directory so the
/// generated installer can create a virtualenv without network access.
pub fn place_bootstrap_files(bootstrap_src: &Path, data_dir: &Path, log: &Log) -> Result<()> {
    log.info("Placing virtualenv bootstrapper");
    cache::copy_tree(bootstrap_src, data_dir).map_err(|e| SkilletError::ProvisioningFailed {
        message: e.to_string(),
    })
}

/// Pick the single archive pip downloaded into the directory
fn find_downloaded_archive(dir: &Path) -> Result<PathBuf> {
    let entries = std::fs::read_dir(dir).map_err(|e| SkilletError::ProvisioningFailed {
        message: format!("cannot read download directory {}: {}", dir.display(), e),
    })?;

    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".tar.gz")
            || name.ends_with(".tgz")
            || name.ends_with(".tar")
            || name.ends_with(".zip")
        {
            return Ok(path);
        }
    }

    Err(SkilletError::ProvisioningFailed {
        message: format!("no bootstrapper archive found in {}", dir.display()),
    })
}

/// Unpack a downloaded sdist/wheel archive
fn unpack_archive(archive_path: &Path, dest: &Path) -> Result<()> {
    let name = archive_path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let io_err = |e: std::io::Error| SkilletError::ProvisioningFailed {
        message: format!("cannot unpack {}: {}", archive_path.display(), e),
    };

    std::fs::create_dir_all(dest).map_err(io_err)?;
    let file = File::open(archive_path).map_err(io_err)?;

    if name.ends_with(".zip") {
        unpack_zip(file, dest, archive_path)
    } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Archive::new(GzDecoder::new(BufReader::new(file)))
            .unpack(dest)
            .map_err(io_err)
    } else if name.ends_with(".tar") {
        Archive::new(BufReader::new(file)).unpack(dest).map_err(io_err)
    } else {
        Err(SkilletError::ProvisioningFailed {
            message: format!("unsupported bootstrapper archive format: {name}"),
        })
    }
}

fn unpack_zip(file: File, dest: &Path, archive_path: &Path) -> Result<()> {
    let zip_err = |message: String| SkilletError::ProvisioningFailed { message };

    let mut archive = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|e| zip_err(format!("cannot open zip {}: {}", archive_path.display(), e)))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| zip_err(format!("cannot read zip entry: {e}")))?;
        let Some(rel_path) = entry.enclosed_name() else {
            return Err(zip_err("zip entry escapes the archive root".to_string()));
        };
        let dest_path = dest.join(rel_path);

        if entry.is_dir() {
            std::fs::create_dir_all(&dest_path)
                .map_err(|e| zip_err(format!("cannot create {}: {}", dest_path.display(), e)))?;
        } else {
            if let Some(parent) = dest_path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| zip_err(format!("cannot create {}: {}", parent.display(), e)))?;
            }
            let mut out = File::create(&dest_path)
                .map_err(|e| zip_err(format!("cannot create {}: {}", dest_path.display(), e)))?;
            std::io::copy(&mut entry, &mut out)
                .map_err(|e| zip_err(format!("cannot write {}: {}", dest_path.display(), e)))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = entry.unix_mode() {
                    let _ = std::fs::set_permissions(
                        &dest_path,
                        std::fs::Permissions::from_mode(mode),
                    );
                }
            }
        }
    }

    Ok(())
}

/// Find the directory containing `virtualenv.py` inside the unpacked tree
fn locate_bootstrap_script(unpacked: &Path) -> Result<PathBuf> {
    for entry in WalkDir::new(unpacked).into_iter().filter_map(|e| e.ok()) {
        if entry.file_type().is_file() && entry.file_name() == BOOTSTRAP_SCRIPT {
            if let Some(parent) = entry.path().parent() {
                return Ok(parent.to_path_buf());
            }
        }
    }
    Err(SkilletError::ProvisioningFailed {
        message: format!("{BOOTSTRAP_SCRIPT} not found in the downloaded bootstrapper"),
    })
}
