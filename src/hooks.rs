//! Pre/post-build hook execution.
//!
//! Hooks run as ordinary executables with the scratchpad as working
//! directory and the build virtualenv activated through the environment:
//! `VIRTUAL_ENV` points at the venv, its bin directory is prepended to
//! `PATH`, and `INSTALL_SCRIPT` names the accumulator file whose contents end
//! up verbatim in the generated installer's post-install step. A failing hook
//! aborts the build; a broken hook must not silently produce an incomplete
//! package.

use std::fmt;
use std::path::Path;
use std::process::Command;

use normpath::PathExt;

use crate::error::{Result, SkilletError};
use crate::exec;
use crate::log::Log;
use crate::provision::ProvisionedEnv;

/// Which build phase a hook belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Prebuild,
    Postbuild,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookKind::Prebuild => write!(f, "prebuild"),
            HookKind::Postbuild => write!(f, "postbuild"),
        }
    }
}

/// Execute a hook script; fatal on non-zero exit
pub fn run_hook(
    kind: HookKind,
    script: &Path,
    scratchpad: &Path,
    env: &ProvisionedEnv,
    accumulator: &Path,
    log: &Log,
) -> Result<()> {
    log.info(format!("Running {kind} script {}", script.display()));

    // The child runs with the scratchpad as cwd, so a relative script path
    // must be resolved against the invocation directory first
    let script = script
        .normalize()
        .map(normpath::BasePathBuf::into_path_buf)
        .map_err(|e| SkilletError::HookFailed {
            kind: kind.to_string(),
            message: format!("cannot resolve {}: {}", script.display(), e),
        })?;

    let path_var = prepend_to_path(&env.bin_dir());

    let mut cmd = Command::new(&script);
    cmd.current_dir(scratchpad)
        .env("VIRTUAL_ENV", &env.venv_path)
        .env("INSTALL_SCRIPT", accumulator)
        .env("PATH", path_var);

    exec::run_streamed(&mut cmd, log).map_err(|e| SkilletError::HookFailed {
        kind: kind.to_string(),
        message: e.to_string(),
    })
}

fn prepend_to_path(bin_dir: &Path) -> std::ffi::OsString {
    let current = std::env::var_os("PATH").unwrap_or_default();
    let paths = std::iter::once(bin_dir.to_path_buf()).chain(std::env::split_paths(&current));
    std::env::join_paths(paths).unwrap_or_else(|_| bin_dir.as_os_str().to_os_string())
}
