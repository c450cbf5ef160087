//! Package identity records.

use serde::{Deserialize, Serialize};

/// What the package describer learned about the application. Constructed once,
/// immutable afterwards; consumed by cache keying, installer templating and
/// archive naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Declared package name (from `setup.py --name`)
    pub name: String,
    /// Declared package version (from `setup.py --version`)
    pub version: String,
    /// Build host platform, e.g. `linux-x86_64`
    pub platform: String,
    /// Stable join of name, version and platform
    pub ident: String,
}

impl PackageInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>, platform: impl Into<String>) -> Self {
        let name = name.into();
        let version = version.into();
        let platform = platform.into();
        let ident = format!("{name}-{version}-{platform}");
        Self {
            name,
            version,
            platform,
            ident,
        }
    }
}

/// Platform string of the build host
pub fn host_platform() -> String {
    format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ident_is_stable_join() {
        let info = PackageInfo::new("webapp", "1.4.2", "linux-x86_64");
        assert_eq!(info.ident, "webapp-1.4.2-linux-x86_64");
    }

    #[test]
    fn test_host_platform_has_os_and_arch() {
        let platform = host_platform();
        assert!(platform.contains('-'));
        assert!(platform.starts_with(std::env::consts::OS));
    }

    #[test]
    fn test_package_info_serializes() {
        let info = PackageInfo::new("webapp", "1.4.2", "linux-x86_64");
        let json = serde_json::to_string(&info).unwrap();
        let back: PackageInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(info, back);
    }
}
