//! Host platform detection.
//!
//! Maps the running operating system and architecture onto a canonical
//! [`PlatformKey`]. Release feeds and install strategies are both keyed by it.
//!
//! Detection never fails: hosts that match no known case resolve to
//! [`PlatformKey::Unknown`], which has no release feed.
//!
//! # Examples
//!
//! ```rust,no_run
//! use appboot_cli::platform::{self, PlatformKey};
//!
//! let key = platform::resolve();
//! println!("Running on {key}");
//!
//! assert_eq!(platform::resolve_from("windows", 32, "x86"), PlatformKey::WinX86);
//! ```

use std::fmt;
use std::str::FromStr;

/// Operating system family of a [`PlatformKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsFamily {
    /// macOS, distributed as a disk image
    Mac,
    /// Windows, distributed as an executable installer
    Windows,
    /// Linux, distributed as a tarred AppImage
    Linux,
}

/// Canonical `{OS family, architecture}` identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformKey {
    /// `mac/arm`
    MacArm,
    /// `mac/x86_64`
    MacX86_64,
    /// `win/x86_64`
    WinX86_64,
    /// `win/x86`
    WinX86,
    /// `linux/x86_64`
    LinuxX86_64,
    /// No supported platform matched
    Unknown,
}

impl PlatformKey {
    /// All keys that have a release feed.
    pub const SUPPORTED: [Self; 5] =
        [Self::MacArm, Self::MacX86_64, Self::WinX86_64, Self::WinX86, Self::LinuxX86_64];

    /// The key as used in feed paths, e.g. `mac/arm`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MacArm => "mac/arm",
            Self::MacX86_64 => "mac/x86_64",
            Self::WinX86_64 => "win/x86_64",
            Self::WinX86 => "win/x86",
            Self::LinuxX86_64 => "linux/x86_64",
            Self::Unknown => "unknown",
        }
    }

    /// Operating system family, or `None` for [`Unknown`](Self::Unknown).
    #[must_use]
    pub const fn os_family(self) -> Option<OsFamily> {
        match self {
            Self::MacArm | Self::MacX86_64 => Some(OsFamily::Mac),
            Self::WinX86_64 | Self::WinX86 => Some(OsFamily::Windows),
            Self::LinuxX86_64 => Some(OsFamily::Linux),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for PlatformKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::SUPPORTED
            .into_iter()
            .chain(std::iter::once(Self::Unknown))
            .find(|key| key.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "unknown platform '{s}' (expected one of: {}, unknown)",
                    Self::SUPPORTED.map(Self::as_str).join(", ")
                )
            })
    }
}

/// Detect the platform of the running host.
#[must_use]
pub fn resolve() -> PlatformKey {
    let pointer_width = if cfg!(target_pointer_width = "64") {
        64
    } else {
        32
    };
    let key = resolve_from(std::env::consts::OS, pointer_width, std::env::consts::ARCH);
    tracing::debug!(
        "Resolved platform {} (os={}, arch={}, pointer width={})",
        key,
        std::env::consts::OS,
        std::env::consts::ARCH,
        pointer_width
    );
    key
}

/// Map host introspection values onto a [`PlatformKey`].
///
/// * `os` - operating system identifier as in [`std::env::consts::OS`]
/// * `pointer_width` - pointer width in bits
/// * `arch` - CPU architecture string as in [`std::env::consts::ARCH`]
///
/// Windows is split on pointer width alone. macOS is split on the
/// architecture string. Only x86_64 Linux has published builds.
#[must_use]
pub fn resolve_from(os: &str, pointer_width: u32, arch: &str) -> PlatformKey {
    match os {
        "windows" if pointer_width == 64 => PlatformKey::WinX86_64,
        "windows" => PlatformKey::WinX86,
        "macos" if arch.contains("arm64") || arch.contains("aarch64") => PlatformKey::MacArm,
        "macos" if arch.contains("x86_64") => PlatformKey::MacX86_64,
        "linux" if arch == "x86_64" => PlatformKey::LinuxX86_64,
        _ => PlatformKey::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_from_windows_uses_pointer_width() {
        assert_eq!(resolve_from("windows", 64, "x86_64"), PlatformKey::WinX86_64);
        assert_eq!(resolve_from("windows", 32, "x86"), PlatformKey::WinX86);
    }

    #[test]
    fn test_resolve_from_macos_uses_arch() {
        assert_eq!(resolve_from("macos", 64, "aarch64"), PlatformKey::MacArm);
        assert_eq!(resolve_from("macos", 64, "arm64"), PlatformKey::MacArm);
        assert_eq!(resolve_from("macos", 64, "x86_64"), PlatformKey::MacX86_64);
        assert_eq!(resolve_from("macos", 64, "powerpc"), PlatformKey::Unknown);
    }

    #[test]
    fn test_resolve_from_linux_and_others() {
        assert_eq!(resolve_from("linux", 64, "x86_64"), PlatformKey::LinuxX86_64);
        assert_eq!(resolve_from("linux", 64, "aarch64"), PlatformKey::Unknown);
        assert_eq!(resolve_from("freebsd", 64, "x86_64"), PlatformKey::Unknown);
    }

    #[test]
    fn test_resolve_is_stable() {
        assert_eq!(resolve(), resolve());
    }

    #[test]
    fn test_parse_round_trips_display() {
        for key in PlatformKey::SUPPORTED {
            assert_eq!(key.to_string().parse::<PlatformKey>(), Ok(key));
        }
        assert_eq!("unknown".parse::<PlatformKey>(), Ok(PlatformKey::Unknown));
        assert!("mac/ppc".parse::<PlatformKey>().is_err());
    }

    #[test]
    fn test_os_family() {
        assert_eq!(PlatformKey::MacArm.os_family(), Some(OsFamily::Mac));
        assert_eq!(PlatformKey::WinX86.os_family(), Some(OsFamily::Windows));
        assert_eq!(PlatformKey::LinuxX86_64.os_family(), Some(OsFamily::Linux));
        assert_eq!(PlatformKey::Unknown.os_family(), None);
    }
}
