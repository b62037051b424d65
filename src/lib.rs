//! appboot - self-updating application bootstrapper
//!
//! Installs the newest release of an application from a release feed:
//!
//! 1. Resolve the host to a canonical platform key ([`platform`])
//! 2. Build the feed URL for that platform and release channel, fetch it, and
//!    take the first release's download URL and SHA-256 ([`feed`])
//! 3. Stream the installer to disk ([`download`])
//! 4. Verify the file against the published checksum ([`verify`])
//! 5. Install and launch it the platform's way ([`install`])
//!
//! [`pipeline`] sequences these steps as an explicit state machine; a checksum
//! mismatch or any other failure halts the run before anything is installed
//! or launched.
//!
//! # Modules
//!
//! - [`cli`] - command line, logging setup, wiring
//! - [`config`] - launch configuration (`launch.toml`)
//! - [`core`] - error taxonomy and exit codes
//! - [`download`] - streaming download with progress and an inactivity deadline
//! - [`feed`] - feed location, fetching and parsing
//! - [`install`] - platform install strategies and the process capability
//! - [`pipeline`] - state machine and driver
//! - [`platform`] - host platform detection
//! - [`transport`] - HTTP capability
//! - [`verify`] - SHA-256 verification
//! - [`view`] - progress reporting
//!
//! # Platforms
//!
//! | Key | Installer | Install |
//! |-----|-----------|---------|
//! | `win/x86_64`, `win/x86` | `.exe` | run through `cmd.exe /C` |
//! | `mac/arm`, `mac/x86_64` | `.dmg` | mount, copy bundle to `~/Applications`, open |
//! | `linux/x86_64` | `.AppImage.tar` | extract, `chmod +x`, run |

pub mod cli;
pub mod config;
pub mod core;
pub mod download;
pub mod feed;
pub mod install;
pub mod pipeline;
pub mod platform;
pub mod transport;
pub mod verify;
pub mod view;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
