//! Platform-dispatched installation of a verified installer.
//!
//! Each platform family installs differently:
//!
//! | Strategy | Platforms | Steps |
//! |----------|-----------|-------|
//! | [`InstallStrategy::DirectExecute`] | `win/*` | `cmd.exe /C <installer>` |
//! | [`InstallStrategy::DiskImage`] | `mac/*` | mount, replace bundle, copy, unmount, `open` |
//! | [`InstallStrategy::Archive`] | `linux/*` | `tar -xf`, locate artifact, `chmod +x`, run |
//!
//! Every external step goes through a [`ProcessRunner`] and is awaited before
//! the next one starts. A load-bearing step that fails aborts the remaining
//! steps with [`BootstrapError::InstallStepFailed`].

pub mod archive;
pub mod disk_image;
pub mod process;
pub mod removal;
pub mod windows;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::core::BootstrapError;
use crate::platform::{OsFamily, PlatformKey};
use process::{ProcessCommand, ProcessOutput, ProcessRunner};
use removal::RemovalStrategy;

/// How a platform's installer is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStrategy {
    /// Run the installer through the command interpreter.
    DirectExecute,
    /// Mount a disk image and copy the application bundle out of it.
    DiskImage,
    /// Extract an archive and run the contained application image.
    Archive,
}

impl InstallStrategy {
    /// Strategy for `platform`, or `None` for [`PlatformKey::Unknown`].
    #[must_use]
    pub fn for_platform(platform: PlatformKey) -> Option<Self> {
        Some(match platform.os_family()? {
            OsFamily::Windows => Self::DirectExecute,
            OsFamily::Mac => Self::DiskImage,
            OsFamily::Linux => Self::Archive,
        })
    }
}

/// Names and locations used by the install strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallSettings {
    /// Application bundle expected inside the disk image
    pub app_bundle: String,
    /// File suffix of the runnable artifact inside the archive
    pub artifact_suffix: String,
    /// Environment variable carrying the launch profile
    pub profile_env: String,
    /// Per-user application directory the bundle is copied to
    pub applications_dir: PathBuf,
    /// Scratch directory the archive is extracted into
    pub extract_dir: PathBuf,
}

impl Default for InstallSettings {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(std::env::temp_dir);
        Self {
            app_bundle: "Mudlet.app".to_string(),
            artifact_suffix: ".AppImage".to_string(),
            profile_env: "MUDLET_PROFILES".to_string(),
            applications_dir: home.join("Applications"),
            extract_dir: std::env::temp_dir().join("ExtractedApp"),
        }
    }
}

/// Everything a strategy needs for one install.
pub struct InstallContext<'a> {
    /// Process capability
    pub runner: &'a dyn ProcessRunner,
    /// Names and locations
    pub settings: &'a InstallSettings,
    /// Removal cascade for a previously installed copy
    pub removal: &'a [Box<dyn RemovalStrategy>],
    /// Environment overrides for the launched application or installer
    pub env: Vec<(String, String)>,
}

impl InstallContext<'_> {
    /// Run a load-bearing step; spawn failures and non-zero exits both become
    /// [`BootstrapError::InstallStepFailed`].
    pub async fn run_step(&self, command: ProcessCommand) -> Result<ProcessOutput, BootstrapError> {
        let output = self
            .runner
            .run(&command)
            .await
            .map_err(|e| BootstrapError::install_step(command.step_name(), e.to_string()))?;

        if output.success() {
            Ok(output)
        } else {
            tracing::warn!(
                target: "process",
                "Step '{}' failed: {}",
                command.step_name(),
                output.failure_reason()
            );
            Err(BootstrapError::install_step(command.step_name(), output.failure_reason()))
        }
    }
}

/// Installs a verified file using the strategy for the host platform.
pub struct InstallDispatcher {
    runner: Arc<dyn ProcessRunner>,
    settings: InstallSettings,
    removal: Vec<Box<dyn RemovalStrategy>>,
}

impl InstallDispatcher {
    /// Create a dispatcher with the default removal cascade.
    pub fn new(runner: Arc<dyn ProcessRunner>, settings: InstallSettings) -> Self {
        Self {
            runner,
            settings,
            removal: removal::default_cascade(),
        }
    }

    /// Replace the removal cascade.
    #[must_use]
    pub fn with_removal_strategies(mut self, strategies: Vec<Box<dyn RemovalStrategy>>) -> Self {
        self.removal = strategies;
        self
    }

    /// Install settings in use.
    #[must_use]
    pub const fn settings(&self) -> &InstallSettings {
        &self.settings
    }

    /// Install `file_path` for `platform` and launch the result.
    ///
    /// `launch_profile` is forwarded as the profile environment variable
    /// only when it is non-empty.
    pub async fn install(
        &self,
        platform: PlatformKey,
        file_path: &Path,
        launch_profile: Option<&str>,
    ) -> Result<(), BootstrapError> {
        let strategy = InstallStrategy::for_platform(platform).ok_or_else(|| {
            BootstrapError::install_step("dispatch", format!("no install strategy for platform '{platform}'"))
        })?;

        let env = match launch_profile {
            Some(profile) if !profile.is_empty() => {
                vec![(self.settings.profile_env.clone(), profile.to_string())]
            }
            _ => Vec::new(),
        };

        let ctx = InstallContext {
            runner: self.runner.as_ref(),
            settings: &self.settings,
            removal: &self.removal,
            env,
        };

        info!("Installing {} ({:?})", file_path.display(), strategy);
        match strategy {
            InstallStrategy::DirectExecute => windows::install(&ctx, file_path).await,
            InstallStrategy::DiskImage => disk_image::install(&ctx, file_path).await,
            InstallStrategy::Archive => archive::install(&ctx, file_path).await,
        }
    }
}
