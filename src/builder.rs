//! The build pipeline.
//!
//! Drives every component in order: validate → provision → describe → create
//! workspace → place cached/base deps → prebuild hook → materialize wheels →
//! write meta → postbuild hook → update cache → generate installer → copy
//! source → archive → cleanup → finalize. Every stage after workspace
//! creation reaches cleanup no matter which stage fails; cleanup is a
//! guaranteed step around the fallible pipeline body, not a conditional
//! branch.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::archive::{self, ArchiveFormat};
use crate::cache::{self, WheelCache};
use crate::describe;
use crate::error::{Result, SkilletError};
use crate::hooks::{self, HookKind};
use crate::ident::PackageInfo;
use crate::installer;
use crate::log::Log;
use crate::provision::{Provisioner, place_bootstrap_files};
use crate::scratch::Scratch;
use crate::wheels::Materializer;

/// Everything a single build needs; immutable once constructed
#[derive(Debug)]
pub struct BuildOptions {
    pub project: PathBuf,
    pub output: PathBuf,
    pub python: PathBuf,
    pub virtualenv_version: Option<String>,
    pub wheel_version: Option<String>,
    pub pip_options: Vec<String>,
    pub requirements: Option<PathBuf>,
    pub format: ArchiveFormat,
    pub prebuild_script: Option<PathBuf>,
    pub postbuild_script: Option<PathBuf>,
    /// `None` when caching is disabled
    pub cache: Option<WheelCache>,
    pub no_download: bool,
}

/// Top-level build driver
pub struct Builder {
    opts: BuildOptions,
    log: Log,
}

impl Builder {
    pub fn new(opts: BuildOptions, log: Log) -> Self {
        Self { opts, log }
    }

    /// Run the whole pipeline. The scratch area is destroyed on every exit
    /// path; only the finished artifact survives under the output directory.
    pub fn build(&self) -> Result<PathBuf> {
        if !self.opts.project.is_dir() {
            return Err(SkilletError::ProjectPathMissing {
                path: self.opts.project.display().to_string(),
            });
        }

        let started = Instant::now();
        let mut scratch = Scratch::new(self.opts.output.clone(), self.log.clone());
        let result = self.run_pipeline(&mut scratch);
        scratch.cleanup();

        let artifact = result?;
        archive::finalize(&artifact, started.elapsed(), &self.log);
        Ok(artifact)
    }

    fn run_pipeline(&self, scratch: &mut Scratch) -> Result<PathBuf> {
        let provisioner = Provisioner {
            python: &self.opts.python,
            virtualenv_version: self.opts.virtualenv_version.as_deref(),
            cache: self.opts.cache.as_ref(),
            no_download: self.opts.no_download,
            log: &self.log,
        };
        let env = provisioner.provision(scratch)?;

        self.log.info("Analyzing package");
        let info = describe::describe(&env, &self.opts.project, &self.log)?;
        {
            let _indent = self.log.indented();
            self.log.info(format!("Name: {}", info.name));
            self.log.info(format!("Version: {}", info.version));
        }

        let scratchpad = scratch.create("buildbase")?;
        let data_dir = scratchpad.join("data");
        fs::create_dir_all(&data_dir).map_err(|e| SkilletError::IoError {
            message: format!("cannot create {}: {}", data_dir.display(), e),
        })?;

        // The accumulator lives next to the venv, outside the staging tree,
        // so it is never swept into the archive
        let accumulator = env.venv_path.join("install_script");

        place_bootstrap_files(&env.bootstrap_src, &data_dir, &self.log)?;
        let (wheel_key, cache_hit) = self.place_cached_wheels(&info, &data_dir)?;

        if let Some(script) = &self.opts.prebuild_script {
            hooks::run_hook(
                HookKind::Prebuild,
                script,
                &scratchpad,
                &env,
                &accumulator,
                &self.log,
            )?;
        }

        let materializer = Materializer {
            env: &env,
            pip_options: &self.opts.pip_options,
            wheel_version: self.opts.wheel_version.as_deref(),
            requirements: self.opts.requirements.as_deref(),
            offline: cache_hit || self.opts.no_download,
            log: &self.log,
        };
        materializer.materialize(&self.opts.project, &data_dir)?;

        archive::write_meta(&scratchpad, &info)?;
        ensure_exists(&accumulator)?;

        if let Some(script) = &self.opts.postbuild_script {
            hooks::run_hook(
                HookKind::Postbuild,
                script,
                &scratchpad,
                &env,
                &accumulator,
                &self.log,
            )?;
        }

        self.update_cache(&wheel_key, cache_hit, &info, &data_dir, &env.bootstrap_src);

        let postinstall = fs::read_to_string(&accumulator).map_err(|e| SkilletError::IoError {
            message: format!("cannot read install script accumulator: {e}"),
        })?;
        let python_name = self.opts.python.file_name().map(|n| n.to_string_lossy().into_owned());
        let text = installer::render(&installer::InstallerParams {
            ident: &info.ident,
            name: &info.name,
            python: python_name.as_deref().unwrap_or("python3"),
            postinstall: postinstall.trim_end(),
        })?;
        installer::write(&scratchpad.join("install.sh"), &text)?;

        archive::copy_source(&self.opts.project, &scratchpad, &self.log)?;
        archive::create_archive(
            &scratchpad,
            &info,
            self.opts.format,
            &self.opts.output,
            &self.log,
        )
    }

    /// Consult the wheel cache for this identity. Any cache trouble is a
    /// warning and a miss, never an abort.
    fn place_cached_wheels(&self, info: &PackageInfo, data_dir: &Path) -> Result<(String, bool)> {
        let Some(cache) = &self.opts.cache else {
            return Ok((String::new(), false));
        };

        let signature = match cache::dependency_signature(
            &self.opts.python,
            &info.platform,
            &self.opts.pip_options,
            self.opts.wheel_version.as_deref(),
            self.opts.requirements.as_deref(),
        ) {
            Ok(signature) => signature,
            Err(e) => {
                self.log.warn(format!("skipping wheel cache: {e}"));
                return Ok((String::new(), false));
            }
        };
        let wheel_key = cache::wheel_key(info, &signature);

        match cache.lookup_wheels(&wheel_key) {
            Ok(Some(entry)) => match cache.place_wheels(&entry, data_dir) {
                Ok(count) => {
                    self.log.info(format!("Using {count} cached wheels"));
                    Ok((wheel_key, true))
                }
                Err(e) => {
                    self.log.warn(format!("ignoring wheel cache: {e}"));
                    Ok((wheel_key, false))
                }
            },
            Ok(None) => Ok((wheel_key, false)),
            Err(e) => {
                self.log.warn(format!("ignoring unreadable cache entry: {e}"));
                Ok((wheel_key, false))
            }
        }
    }

    /// Store the build's artifacts for future builds of the same identity.
    /// Runs only after materialization succeeded; failures are warnings.
    fn update_cache(
        &self,
        wheel_key: &str,
        cache_hit: bool,
        info: &PackageInfo,
        data_dir: &Path,
        bootstrap_src: &Path,
    ) {
        let Some(cache) = &self.opts.cache else {
            return;
        };

        if !cache_hit && !wheel_key.is_empty() {
            if let Err(e) = cache.store_wheels(wheel_key, &info.ident, data_dir) {
                self.log.warn(format!("could not update wheel cache: {e}"));
            }
        }

        let bootstrap_key = cache::bootstrap_key(self.opts.virtualenv_version.as_deref());
        let already_cached = matches!(cache.lookup_bootstrap(&bootstrap_key), Ok(Some(_)));
        if !already_cached {
            if let Err(e) = cache.store_bootstrap(&bootstrap_key, bootstrap_src) {
                self.log.warn(format!("could not cache bootstrapper: {e}"));
            }
        }
    }
}

fn ensure_exists(path: &Path) -> Result<()> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| SkilletError::IoError {
            message: format!("cannot create {}: {}", path.display(), e),
        })?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn minimal_options(project: PathBuf, output: PathBuf) -> BuildOptions {
        BuildOptions {
            project,
            output,
            python: PathBuf::from("python3"),
            virtualenv_version: None,
            wheel_version: None,
            pip_options: Vec::new(),
            requirements: None,
            format: ArchiveFormat::TarGz,
            prebuild_script: None,
            postbuild_script: None,
            cache: None,
            no_download: false,
        }
    }

    #[test]
    fn test_missing_project_is_a_usage_error_with_no_side_effects() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("dist");
        let opts = minimal_options(temp.path().join("missing-project"), output.clone());

        let err = Builder::new(opts, Log::new(false)).build().unwrap_err();
        assert!(err.is_usage());
        // Nothing was created, not even the output directory
        assert!(!output.exists());
    }

    #[test]
    fn test_ensure_exists_creates_and_preserves() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("install_script");

        ensure_exists(&path).unwrap();
        assert!(path.exists());

        fs::write(&path, "echo hi\n").unwrap();
        ensure_exists(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "echo hi\n");
    }
}
