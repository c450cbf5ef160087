//! Subprocess execution helpers.
//!
//! Every external stage (bootstrapper download, virtualenv creation, pip
//! invocations) blocks until the child exits. Failures surface the rendered
//! command line plus the captured output so the failing stage can wrap them
//! into its own error variant.

use std::process::{Command, Stdio};

use crate::error::{Result, SkilletError};
use crate::log::Log;

/// Render a command line for log and error messages
pub fn render(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().into_owned()];
    parts.extend(cmd.get_args().map(|arg| arg.to_string_lossy().into_owned()));
    parts.join(" ")
}

fn failure_message(status: std::process::ExitStatus, stdout: &[u8], stderr: &[u8]) -> String {
    let mut message = format!("exited with {status}");
    let stderr = String::from_utf8_lossy(stderr);
    let stdout = String::from_utf8_lossy(stdout);
    // Last lines only; pip output can run to thousands of lines
    for chunk in [stderr.trim(), stdout.trim()] {
        if !chunk.is_empty() {
            let tail: Vec<&str> = chunk.lines().rev().take(8).collect();
            let tail: Vec<&str> = tail.into_iter().rev().collect();
            message.push_str(": ");
            message.push_str(&tail.join("\n"));
            break;
        }
    }
    message
}

/// Run a command with captured output, returning stdout on success
pub fn run_captured(cmd: &mut Command, log: &Log) -> Result<String> {
    let rendered = render(cmd);
    log.debug(format!("$ {rendered}"));

    let output = cmd
        .stdin(Stdio::null())
        .output()
        .map_err(|e| SkilletError::CommandFailed {
            command: rendered.clone(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(SkilletError::CommandFailed {
            command: rendered,
            message: failure_message(output.status, &output.stdout, &output.stderr),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run a command with inherited stdio (hook scripts stream their own output)
pub fn run_streamed(cmd: &mut Command, log: &Log) -> Result<()> {
    let rendered = render(cmd);
    log.debug(format!("$ {rendered}"));

    let status = cmd
        .stdin(Stdio::null())
        .status()
        .map_err(|e| SkilletError::CommandFailed {
            command: rendered.clone(),
            message: e.to_string(),
        })?;

    if !status.success() {
        return Err(SkilletError::CommandFailed {
            command: rendered,
            message: format!("exited with {status}"),
        });
    }

    Ok(())
}
