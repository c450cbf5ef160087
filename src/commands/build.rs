//! Build command implementation
//!
//! Validates the option combination before any build step runs, resolves the
//! interpreter and cache policy, then hands everything to the pipeline:
//! 1. Validate flags (disable-cache + disable-network is a usage error)
//! 2. Resolve the project path (defaults to the working directory)
//! 3. Discover or accept the Python interpreter
//! 4. Resolve the wheel cache location (default, overridden, or disabled)
//! 5. Run the build pipeline; the workspace is destroyed on every exit path

use std::path::PathBuf;

use crate::builder::{BuildOptions, Builder};
use crate::cache::WheelCache;
use crate::cli::BuildArgs;
use crate::error::{Result, SkilletError};
use crate::log::Log;

/// Run the build command
pub fn run(args: BuildArgs, verbose: bool) -> Result<()> {
    let log = Log::new(verbose);

    // Validated before anything touches the filesystem
    let cache = resolve_cache_policy(&args, &log)?;

    let project = match args.path {
        Some(path) => path,
        None => std::env::current_dir().map_err(|e| SkilletError::IoError {
            message: format!("cannot determine current directory: {e}"),
        })?,
    };
    log.info(format!("Using project from {}", project.display()));

    let python = resolve_interpreter(args.python)?;
    log.info(format!("Using interpreter {}", python.display()));

    let opts = BuildOptions {
        project,
        output: args.output,
        python,
        virtualenv_version: args.virtualenv_version,
        wheel_version: args.wheel_version,
        pip_options: args.pip_option,
        requirements: args.requirements,
        format: args.format,
        prebuild_script: args.prebuild_script,
        postbuild_script: args.postbuild_script,
        cache,
        no_download: args.no_download,
    };

    Builder::new(opts, log).build()?;
    Ok(())
}

/// Decide whether and where to cache. Disabling the cache while also
/// disabling downloads can never work: offline builds resolve wheels from
/// the cache.
fn resolve_cache_policy(args: &BuildArgs, log: &Log) -> Result<Option<WheelCache>> {
    if args.no_wheel_cache {
        if args.no_download {
            return Err(SkilletError::ConflictingCacheFlags);
        }
        return Ok(None);
    }

    let cache = match &args.wheel_cache {
        Some(dir) => WheelCache::at(dir.clone()),
        None => WheelCache::open_default()?,
    };
    log.info(format!("Using wheel cache in {}", cache.root().display()));
    Ok(Some(cache))
}

/// Use the explicit interpreter, or discover one on PATH
fn resolve_interpreter(python: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(python) = python {
        return Ok(python);
    }
    which::which("python3")
        .or_else(|_| which::which("python"))
        .map_err(|_| SkilletError::InterpreterNotFound)
}
