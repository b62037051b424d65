use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::debug;

use crate::feed::{FeedLocator, ReleaseChannel};
use crate::install::InstallSettings;

/// Environment variable overriding the configuration file location.
pub const CONFIG_PATH_ENV: &str = "APPBOOT_CONFIG_PATH";

/// File name looked up next to the executable and in the user config dir.
pub const CONFIG_FILE_NAME: &str = "launch.toml";

/// Bootstrapper settings read from `launch.toml`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct LaunchConfig {
    /// `"PTB"` selects the beta channel
    #[serde(rename = "RELEASE_TYPE", alias = "release_type", default)]
    pub release_type: Option<String>,

    /// Forwarded to the launched application
    #[serde(rename = "LAUNCH_PROFILE", alias = "launch_profile", alias = "MUDLET_PROFILES", default)]
    pub launch_profile: Option<String>,

    /// Where installers are downloaded to
    #[serde(default)]
    pub download_dir: Option<PathBuf>,

    /// Install names and locations
    #[serde(default)]
    pub install: InstallSection,

    /// Release feed location
    #[serde(default)]
    pub feed: FeedSection,

    /// Network deadlines
    #[serde(default)]
    pub network: NetworkSection,
}

/// `[install]` table; unset keys fall back to [`InstallSettings::default`].
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct InstallSection {
    /// Bundle name inside the mounted disk image
    pub app_bundle: Option<String>,
    /// File name suffix of the runnable artifact in the Linux archive
    pub artifact_suffix: Option<String>,
    /// Environment variable that carries the launch profile
    pub profile_env: Option<String>,
    /// Where the macOS bundle is installed; `~` is expanded
    pub applications_dir: Option<String>,
    /// Scratch directory for Linux extraction; emptied before every extract
    pub extract_dir: Option<String>,
}

/// `[feed]` table.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct FeedSection {
    /// Feed root; the channel and platform path is appended to it
    pub base_url: Option<String>,
}

/// `[network]` table.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct NetworkSection {
    /// Deadline for the whole feed request
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Longest silence tolerated while streaming the download
    #[serde(default = "default_inactivity_timeout_secs")]
    pub inactivity_timeout_secs: u64,
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_inactivity_timeout_secs() -> u64 {
    300
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            inactivity_timeout_secs: default_inactivity_timeout_secs(),
        }
    }
}

impl LaunchConfig {
    /// Load from `explicit` if given, else from the first existing candidate
    /// location, else defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen file cannot be read or parsed, or if an
    /// explicit path does not exist.
    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path).await;
        }

        for candidate in Self::candidate_paths() {
            if candidate.exists() {
                return Self::load_from(&candidate).await;
            }
            debug!("No configuration at {}", candidate.display());
        }

        Ok(Self::default())
    }

    /// Load from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML of
    /// the expected shape.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read launch config from {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse launch config from {}", path.display()))?;
        debug!("Loaded launch config from {}", path.display());
        Ok(config)
    }

    /// Locations searched when no explicit path is given.
    ///
    /// When `APPBOOT_CONFIG_PATH` is set it is the only candidate.
    #[must_use]
    pub fn candidate_paths() -> Vec<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return vec![PathBuf::from(path)];
        }

        let mut paths = Vec::new();
        if let Some(dir) = std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf)) {
            paths.push(dir.join(CONFIG_FILE_NAME));
        }
        if let Ok(path) = Self::default_path() {
            paths.push(path);
        }
        paths
    }

    /// Per-user configuration file location.
    ///
    /// # Errors
    ///
    /// Returns an error if the home (or, on Windows, local data) directory
    /// cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("appboot")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".appboot")
        };

        Ok(config_dir.join(CONFIG_FILE_NAME))
    }

    /// Release channel selected by `RELEASE_TYPE`.
    #[must_use]
    pub fn channel(&self) -> ReleaseChannel {
        self.release_type.as_deref().map(ReleaseChannel::from_release_type).unwrap_or_default()
    }

    /// Launch profile, if set and non-empty.
    #[must_use]
    pub fn launch_profile(&self) -> Option<&str> {
        self.launch_profile.as_deref().filter(|profile| !profile.is_empty())
    }

    /// Feed locator for the configured base URL.
    #[must_use]
    pub fn feed_locator(&self) -> FeedLocator {
        self.feed.base_url.as_deref().map_or_else(FeedLocator::default, FeedLocator::new)
    }

    /// Deadline for the feed request.
    #[must_use]
    pub const fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.network.timeout_secs)
    }

    /// Longest silence tolerated while downloading.
    #[must_use]
    pub const fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.network.inactivity_timeout_secs)
    }

    /// Download directory: configured, else `<cache>/appboot`, else
    /// `<tmp>/appboot`.
    #[must_use]
    pub fn download_dir(&self) -> PathBuf {
        self.download_dir.as_deref().map(expand_home).unwrap_or_else(|| {
            dirs::cache_dir().unwrap_or_else(std::env::temp_dir).join("appboot")
        })
    }

    /// Install settings with configured overrides applied.
    #[must_use]
    pub fn install_settings(&self) -> InstallSettings {
        let defaults = InstallSettings::default();
        let section = &self.install;
        InstallSettings {
            app_bundle: section.app_bundle.clone().unwrap_or(defaults.app_bundle),
            artifact_suffix: section.artifact_suffix.clone().unwrap_or(defaults.artifact_suffix),
            profile_env: section.profile_env.clone().unwrap_or(defaults.profile_env),
            applications_dir: section
                .applications_dir
                .as_deref()
                .map_or(defaults.applications_dir, |dir| expand_home(Path::new(dir))),
            extract_dir: section
                .extract_dir
                .as_deref()
                .map_or(defaults.extract_dir, |dir| expand_home(Path::new(dir))),
        }
    }
}

/// Expand a leading `~` to the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
