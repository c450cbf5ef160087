//! Package introspection.
//!
//! Asks the application to describe itself inside the provisioned
//! environment. `setup.py` may print arbitrary warnings before answering, so
//! the name and version are taken from the last two non-empty output lines.

use std::path::Path;
use std::process::Command;

use crate::error::{Result, SkilletError};
use crate::exec;
use crate::ident::{PackageInfo, host_platform};
use crate::log::Log;
use crate::provision::ProvisionedEnv;

/// Introspect the application's declared name and version
pub fn describe(env: &ProvisionedEnv, project: &Path, log: &Log) -> Result<PackageInfo> {
    let output = exec::run_captured(
        Command::new(&env.python)
            .arg("setup.py")
            .arg("--name")
            .arg("--version")
            .current_dir(project),
        log,
    )
    .map_err(|e| SkilletError::DescribeFailed {
        message: e.to_string(),
    })?;

    parse_description(&output)
}

fn parse_description(output: &str) -> Result<PackageInfo> {
    let lines: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let &[name, version] = lines.last_chunk::<2>().ok_or_else(|| {
        SkilletError::DescribeFailed {
            message: format!("expected name and version lines, got {:?}", output.trim()),
        }
    })?;

    Ok(PackageInfo::new(name, version, host_platform()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_output() {
        let info = parse_description("webapp\n1.4.2\n").unwrap();
        assert_eq!(info.name, "webapp");
        assert_eq!(info.version, "1.4.2");
        assert_eq!(info.ident, format!("webapp-1.4.2-{}", host_platform()));
    }

    #[test]
    fn test_parse_tolerates_setup_warnings() {
        let output = "warning: no files found matching '*.cfg'\n\nwebapp\n1.4.2\n";
        let info = parse_description(output).unwrap();
        assert_eq!(info.name, "webapp");
        assert_eq!(info.version, "1.4.2");
    }

    #[test]
    fn test_parse_rejects_short_output() {
        assert!(parse_description("webapp\n").is_err());
        assert!(parse_description("").is_err());
    }
}
