//! Best-effort removal of a previously installed copy.
//!
//! Strategies are tried in order and the cascade stops at the first one that
//! succeeds. Only when every strategy fails is the install aborted with
//! [`BootstrapError::CannotReplaceExistingInstall`].

use async_trait::async_trait;
use std::path::Path;
use tracing::{info, warn};

use super::process::{ProcessCommand, ProcessRunner};
use crate::core::BootstrapError;

/// One way of deleting a path.
#[async_trait]
pub trait RemovalStrategy: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Try to remove `path`; `true` on success.
    async fn remove(&self, path: &Path, runner: &dyn ProcessRunner) -> bool;
}

/// Delete `path` as a single file or symlink.
pub struct RemoveFile;

#[async_trait]
impl RemovalStrategy for RemoveFile {
    fn name(&self) -> &'static str {
        "file removal"
    }

    async fn remove(&self, path: &Path, _runner: &dyn ProcessRunner) -> bool {
        tokio::fs::remove_file(path).await.is_ok()
    }
}

/// Delete `path` as a directory tree.
pub struct RemoveDirAll;

#[async_trait]
impl RemovalStrategy for RemoveDirAll {
    fn name(&self) -> &'static str {
        "recursive removal"
    }

    async fn remove(&self, path: &Path, _runner: &dyn ProcessRunner) -> bool {
        tokio::fs::remove_dir_all(path).await.is_ok()
    }
}

/// Delete `path` with an external `rm -rf`.
pub struct ForcedRemove;

#[async_trait]
impl RemovalStrategy for ForcedRemove {
    fn name(&self) -> &'static str {
        "forced removal"
    }

    async fn remove(&self, path: &Path, runner: &dyn ProcessRunner) -> bool {
        let command = ProcessCommand::new("rm")
            .arg("-rf")
            .arg(path.display().to_string())
            .step("remove existing install");
        match runner.run(&command).await {
            Ok(output) if output.success() => true,
            Ok(output) => {
                warn!("rm -rf {} failed: {}", path.display(), output.failure_reason());
                false
            }
            Err(e) => {
                warn!("Could not run rm: {}", e);
                false
            }
        }
    }
}

/// File removal, then recursive removal, then `rm -rf`.
#[must_use]
pub fn default_cascade() -> Vec<Box<dyn RemovalStrategy>> {
    vec![Box::new(RemoveFile), Box::new(RemoveDirAll), Box::new(ForcedRemove)]
}

/// Remove `path` using the first strategy that succeeds.
pub async fn remove_existing(
    path: &Path,
    strategies: &[Box<dyn RemovalStrategy>],
    runner: &dyn ProcessRunner,
) -> Result<(), BootstrapError> {
    info!("Application already exists at {}. Removing it...", path.display());

    for strategy in strategies {
        if strategy.remove(path, runner).await {
            info!("Existing application removed ({})", strategy.name());
            return Ok(());
        }
        warn!("{} of {} failed", strategy.name(), path.display());
    }

    Err(BootstrapError::CannotReplaceExistingInstall {
        path: path.display().to_string(),
    })
}
