//! Contract tests for the generated install script
//!
//! The installer runs on arbitrary target hosts, so it is exercised here as a
//! black box: built once into a `dir` artifact, then driven through its
//! argument parsing and its full offline install flow against the fake
//! interpreter shims.

#![cfg(unix)]

mod common;

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

use common::TestBuild;

struct InstallerFixture {
    build: TestBuild,
    artifact: PathBuf,
}

impl InstallerFixture {
    fn new() -> Self {
        let build = TestBuild::new();
        let requirements = build.temp.path().join("requirements.txt");
        fs::write(&requirements, "flask==3.0\n").unwrap();
        let hook = build.write_hook(
            "post.sh",
            r#"echo 'echo postinstall-ran' >> "$INSTALL_SCRIPT""#,
        );

        let mut cmd = build.build_command();
        cmd.arg("--format")
            .arg("dir")
            .arg("-r")
            .arg(&requirements)
            .arg("--postbuild-script")
            .arg(&hook);
        cmd.assert().success();

        let artifact = build.output.join(build.ident());
        Self { build, artifact }
    }

    fn run_installer(&self, args: &[&str]) -> Output {
        Command::new("bash")
            .arg("install.sh")
            .args(args)
            .current_dir(&self.artifact)
            .env("SKILLET_TEST_LOG", &self.build.invocation_log)
            .env("SKILLET_TEST_BIN", &self.build.shim_dir)
            .output()
            .expect("run install.sh")
    }
}

#[test]
fn test_installer_help() {
    let fixture = InstallerFixture::new();
    let output = fixture.run_installer(&["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage: ./install.sh [OPTIONS] DST"));
    assert!(stdout.contains("-p --python PYTHON"));
    assert!(stdout.contains(&fixture.build.ident()));
}

#[test]
fn test_installer_requires_destination() {
    let fixture = InstallerFixture::new();
    let output = fixture.run_installer(&[]);

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("destination argument is required"));
}

#[test]
fn test_installer_rejects_unknown_flags() {
    let fixture = InstallerFixture::new();
    let output = fixture.run_installer(&["--frobnicate", "dest"]);

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("no such option: --frobnicate"));
}

#[test]
fn test_installer_embeds_build_interpreter_basename() {
    let fixture = InstallerFixture::new();
    let script = fs::read_to_string(fixture.artifact.join("install.sh")).unwrap();
    assert!(script.contains("py=\"python3\""));
}

#[test]
fn test_full_offline_install_with_interpreter_override() {
    let fixture = InstallerFixture::new();
    let dest = fixture.build.temp.path().join("deployed");
    let python = fixture.build.python.to_string_lossy().into_owned();

    fixture.build.clear_invocations();
    let output = fixture.run_installer(&["-p", &python, dest.to_str().unwrap()]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "install failed:\n{stdout}\n{stderr}");

    // Progress lines of the installer contract
    assert!(stdout.contains("Setting up virtualenv"));
    assert!(stdout.contains(&format!("Installing {}", fixture.build.ident())));
    assert!(stdout.contains(&format!("Copying {}", fixture.build.ident())));
    assert!(stdout.contains("Done."));

    // The post-install fragment accumulated by the build hook ran
    assert!(stdout.contains("postinstall-ran"));

    // The overridden interpreter created the virtualenv from the bundled
    // bootstrapper
    let invocations = fixture.build.invocations();
    assert!(
        invocations
            .iter()
            .any(|line| line.starts_with("python ") && line.contains("virtualenv.py")),
        "bootstrapper not invoked: {invocations:?}"
    );

    // Bundled artifacts were installed strictly offline, requirements included
    let pip_install = invocations
        .iter()
        .find(|line| line.starts_with("pip install"))
        .expect("pip install ran on the target");
    assert!(pip_install.contains("--no-index"));
    assert!(pip_install.contains("--find-links"));
    assert!(pip_install.contains("requirements.txt"));

    // Source tree was copied into the new environment
    assert!(dest.join("src/setup.py").is_file());
    assert!(dest.join("src/webapp/__init__.py").is_file());
    assert!(dest.join("bin/pip").is_file());
}

#[test]
fn test_installer_python_equals_syntax() {
    let fixture = InstallerFixture::new();
    let dest = fixture.build.temp.path().join("deployed-eq");
    let python_arg = format!("--python={}", fixture.build.python.to_string_lossy());

    let output = fixture.run_installer(&[&python_arg, dest.to_str().unwrap()]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "install failed:\n{stdout}");
    assert!(dest.join("src").is_dir());
}

#[test]
fn test_installer_rejects_missing_interpreter() {
    let fixture = InstallerFixture::new();
    let bogus = fixture
        .build
        .temp
        .path()
        .join("no-such-python")
        .to_string_lossy()
        .into_owned();

    let output = fixture.run_installer(&["-p", &bogus, "dest"]);
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("python interpreter not found"));
}
