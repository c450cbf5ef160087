//! Common test utilities for Skillet integration tests
//!
//! Builds run hermetically against fake `python`/`pip` shims: every external
//! invocation is appended to a log file the tests can assert on, the
//! "downloaded" bootstrapper is a tarball the python shim fabricates on the
//! fly, and the fake `virtualenv.py` knows how to create a venv-shaped
//! directory whether it is executed by the bash shim (during builds) or by a
//! real Python (when the generated installer is exercised).

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// Shell source of the fake build interpreter, named `python3` on disk
const PYTHON_SHIM: &str = r#"#!/usr/bin/env bash
set -eu
echo "python $*" >> "${SKILLET_TEST_LOG:?}"

if [ "${1:-}" = "-m" ] && [ "${2:-}" = "pip" ] && [ "${3:-}" = "download" ]; then
  dest=""
  prev=""
  for arg in "$@"; do
    if [ "$prev" = "-d" ]; then dest="$arg"; fi
    prev="$arg"
  done
  mkdir -p "$dest/virtualenv-99.0"
  cp "${SKILLET_TEST_BIN:?}/virtualenv.py" "$dest/virtualenv-99.0/virtualenv.py"
  tar -C "$dest" -czf "$dest/virtualenv-99.0.tar.gz" virtualenv-99.0
  rm -rf "$dest/virtualenv-99.0"
  exit 0
fi

case "${1:-}" in
  */virtualenv.py|virtualenv.py)
    dest="$2"
    mkdir -p "$dest/bin"
    cp "$0" "$dest/bin/python"
    cp "${SKILLET_TEST_BIN:?}/pip" "$dest/bin/pip"
    : > "$dest/bin/activate"
    chmod +x "$dest/bin/python" "$dest/bin/pip"
    ;;
  setup.py)
    echo "${SKILLET_TEST_NAME:-demo}"
    echo "${SKILLET_TEST_VERSION:-1.0}"
    ;;
  *)
    ;;
esac
exit 0
"#;

/// Shell source of the fake package tool installed into build venvs
const PIP_SHIM: &str = r#"#!/usr/bin/env bash
set -eu
echo "pip $*" >> "${SKILLET_TEST_LOG:?}"
case "${1:-}" in
  install)
    ;;
  wheel)
    dest=""
    for arg in "$@"; do
      case "$arg" in
        --wheel-dir=*) dest="${arg#--wheel-dir=}" ;;
      esac
    done
    mkdir -p "$dest"
    : > "$dest/${SKILLET_TEST_NAME:-demo}-${SKILLET_TEST_VERSION:-1.0}-py3-none-any.whl"
    : > "$dest/helperlib-2.4-py3-none-any.whl"
    ;;
esac
exit 0
"#;

/// Python source of the fake bootstrapper; also runs under a real Python so
/// the generated installer can be exercised end to end
const VIRTUALENV_SHIM: &str = r#"import os
import sys

dest = sys.argv[1]
bindir = os.path.join(dest, 'bin')
os.makedirs(bindir, exist_ok=True)

pip = os.path.join(bindir, 'pip')
with open(pip, 'w') as f:
    f.write('#!/bin/sh\necho "pip $*" >> "${SKILLET_TEST_LOG:-/dev/null}"\nexit 0\n')
os.chmod(pip, 0o755)

with open(os.path.join(bindir, 'activate'), 'w') as f:
    f.write('')
"#;

/// A hermetic build fixture: project, shims, cache and output dirs
pub struct TestBuild {
    pub temp: TempDir,
    pub project: PathBuf,
    pub output: PathBuf,
    pub cache_dir: PathBuf,
    pub shim_dir: PathBuf,
    pub python: PathBuf,
    pub invocation_log: PathBuf,
}

impl TestBuild {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("create test tempdir");
        let root = temp.path();

        let project = root.join("project");
        fs::create_dir_all(project.join("webapp")).expect("create project");
        fs::write(
            project.join("setup.py"),
            "from setuptools import setup\n\nsetup(name='demo', version='1.0')\n",
        )
        .expect("write setup.py");
        fs::write(project.join("webapp/__init__.py"), "").expect("write module");
        // Content that must never reach the archive
        fs::create_dir_all(project.join(".git")).expect("create .git");
        fs::write(project.join(".git/HEAD"), "ref: refs/heads/main").expect("write HEAD");
        fs::write(project.join("webapp/cached.pyc"), "bytecode").expect("write pyc");

        let shim_dir = root.join("shims");
        fs::create_dir_all(&shim_dir).expect("create shims dir");
        let python = write_executable(&shim_dir.join("python3"), PYTHON_SHIM);
        write_executable(&shim_dir.join("pip"), PIP_SHIM);
        fs::write(shim_dir.join("virtualenv.py"), VIRTUALENV_SHIM).expect("write virtualenv.py");

        let invocation_log = root.join("invocations.log");
        fs::write(&invocation_log, "").expect("create invocation log");

        Self {
            project,
            output: root.join("dist"),
            cache_dir: root.join("cache"),
            shim_dir,
            python,
            invocation_log,
            temp,
        }
    }

    /// The skillet binary with the fixture environment applied
    #[allow(deprecated)]
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("skillet").expect("skillet binary");
        cmd.current_dir(self.temp.path())
            .env("SKILLET_CACHE_DIR", &self.cache_dir)
            .env("SKILLET_TEST_LOG", &self.invocation_log)
            .env("SKILLET_TEST_BIN", &self.shim_dir)
            .env("SKILLET_TEST_NAME", "demo")
            .env("SKILLET_TEST_VERSION", "1.0");
        cmd
    }

    /// A `build` invocation against the fixture project and interpreter
    pub fn build_command(&self) -> Command {
        let mut cmd = self.command();
        cmd.arg("build")
            .arg(&self.project)
            .arg("--output")
            .arg(&self.output)
            .arg("-p")
            .arg(&self.python);
        cmd
    }

    /// Identity the fixture package resolves to on this host
    pub fn ident(&self) -> String {
        format!(
            "demo-1.0-{}-{}",
            std::env::consts::OS,
            std::env::consts::ARCH
        )
    }

    /// Every external command the shims observed, in order
    pub fn invocations(&self) -> Vec<String> {
        fs::read_to_string(&self.invocation_log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn clear_invocations(&self) {
        fs::write(&self.invocation_log, "").expect("truncate invocation log");
    }

    /// Names of scratch directories still present under the output dir
    pub fn scratch_leftovers(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.output) else {
            return Vec::new();
        };
        entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(".skillet-"))
            .collect()
    }

    /// Drop an executable hook script into the fixture root
    pub fn write_hook(&self, name: &str, body: &str) -> PathBuf {
        write_executable(
            &self.temp.path().join(name),
            &format!("#!/usr/bin/env bash\nset -eu\n{body}\n"),
        )
    }
}

fn write_executable(path: &Path, content: &str) -> PathBuf {
    fs::write(path, content).expect("write script");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("chmod script");
    }
    path.to_path_buf()
}
