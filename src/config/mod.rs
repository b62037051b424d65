//! Launch configuration for appboot.
//!
//! A small TOML file tells the bootstrapper which release channel to follow,
//! which launch profile to hand to the installed application, and where to put
//! downloads and extracted files. Every key is optional; a missing file means
//! defaults throughout.
//!
//! # Location
//!
//! The first of these that applies is used:
//!
//! 1. `--config <path>` on the command line
//! 2. `APPBOOT_CONFIG_PATH` environment variable
//! 3. `launch.toml` next to the executable
//! 4. `~/.appboot/launch.toml` (`%LOCALAPPDATA%\appboot\launch.toml` on Windows)
//!
//! # File Format
//!
//! ```toml
//! RELEASE_TYPE = "PTB"            # "PTB" follows the beta channel, anything else stable
//! LAUNCH_PROFILE = "my-profile"   # exported to the launched application when non-empty
//! download_dir = "/var/tmp/appboot"
//!
//! [install]
//! app_bundle = "Mudlet.app"
//! artifact_suffix = ".AppImage"
//! profile_env = "MUDLET_PROFILES"
//! applications_dir = "~/Applications"
//! extract_dir = "/tmp/ExtractedApp"
//!
//! [feed]
//! base_url = "https://feeds.dblsqd.com/MKMMR7HNSP65PquQQbiDIw/"
//!
//! [network]
//! timeout_secs = 30
//! inactivity_timeout_secs = 300
//! ```

mod launch;

pub use launch::{
    CONFIG_FILE_NAME, CONFIG_PATH_ENV, FeedSection, InstallSection, LaunchConfig, NetworkSection,
};
