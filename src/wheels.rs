//! Dependency materialization.
//!
//! Drives the package tool inside the build virtualenv: pins the wheel tool,
//! then builds a wheel for the application and every declared dependency into
//! the workspace `data/` directory. Caller-supplied pip options are passed
//! through verbatim on every invocation. When the wheel cache was hit for
//! this identity (or downloads are disabled) pip is pointed at `data/`
//! instead of the network.

use std::fs;
use std::path::Path;
use std::process::Command;

use crate::error::{Result, SkilletError};
use crate::exec;
use crate::log::Log;
use crate::progress;
use crate::provision::ProvisionedEnv;

/// Requirement spec for a pinned or latest-stable tool
pub fn tool_spec(name: &str, version: Option<&str>) -> String {
    match version {
        Some(version) => format!("{name}=={version}"),
        None => name.to_string(),
    }
}

/// Dependency materializer
pub struct Materializer<'a> {
    pub env: &'a ProvisionedEnv,
    pub pip_options: &'a [String],
    pub wheel_version: Option<&'a str>,
    pub requirements: Option<&'a Path>,
    /// Resolve from `data/` only; set on a cache hit or when downloads are
    /// disabled
    pub offline: bool,
    pub log: &'a Log,
}

impl Materializer<'_> {
    /// Build all required wheels into `data_dir`
    pub fn materialize(&self, project: &Path, data_dir: &Path) -> Result<()> {
        self.log.info("Building wheels");
        let _indent = self.log.indented();

        self.ensure_wheel_tool(data_dir)?;
        self.build_wheels(project, data_dir)
    }

    /// Make sure the wheel tool itself is available in the build environment
    fn ensure_wheel_tool(&self, data_dir: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.env.pip);
        cmd.arg("install");
        cmd.args(self.pip_options);
        if self.offline {
            cmd.arg("--no-index").arg("--find-links").arg(data_dir);
        }
        cmd.arg(tool_spec("wheel", self.wheel_version));

        exec::run_captured(&mut cmd, self.log).map_err(|e| SkilletError::MaterializeFailed {
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Resolve and build the application's wheels plus the explicit
    /// requirements list
    fn build_wheels(&self, project: &Path, data_dir: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.env.pip);
        cmd.arg("wheel");
        cmd.arg(format!("--wheel-dir={}", data_dir.display()));
        cmd.args(self.pip_options);
        if self.offline {
            cmd.arg("--no-index").arg("--find-links").arg(data_dir);
        }

        if let Some(requirements) = self.requirements {
            cmd.arg("-r").arg(requirements);
            // Ship the requirements list so the installer can replay it
            fs::copy(requirements, data_dir.join("requirements.txt")).map_err(|e| {
                SkilletError::MaterializeFailed {
                    message: format!(
                        "cannot copy requirements file {}: {}",
                        requirements.display(),
                        e
                    ),
                }
            })?;
        }

        cmd.arg(project);

        let pb = progress::spinner("Building wheels...");
        let result = exec::run_captured(&mut cmd, self.log);
        progress::finish(pb);

        result.map_err(|e| SkilletError::MaterializeFailed {
            message: e.to_string(),
        })?;
        Ok(())
    }
}
