//! macOS install from a disk image.
//!
//! The image is attached with `hdiutil`, the application bundle is copied into
//! the per-user applications directory (replacing any previous copy), the
//! image is detached and the installed bundle is opened.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::InstallContext;
use super::process::ProcessCommand;
use super::removal::remove_existing;
use crate::core::BootstrapError;

/// Marker identifying the mount point line in `hdiutil attach` output.
const VOLUME_MARKER: &str = "/Volumes/";

/// Install the bundle contained in `image` and launch it.
pub async fn install(ctx: &InstallContext<'_>, image: &Path) -> Result<(), BootstrapError> {
    let attach = ctx
        .run_step(
            ProcessCommand::new("hdiutil")
                .args(["attach", &image.display().to_string(), "-nobrowse"])
                .step("mount"),
        )
        .await?;

    let volume = find_mount_point(&attach.stdout).ok_or_else(|| {
        BootstrapError::install_step("mount", "no mounted volume found in hdiutil output")
    })?;
    info!("Mounted disk image at {}", volume.display());

    let result = copy_bundle(ctx, &volume).await;

    // Detach failures never override the outcome of the copy
    detach(ctx, &volume).await;
    let installed = result?;

    info!("Launching {}", installed.display());
    ctx.run_step(
        ProcessCommand::new("open")
            .arg(installed.display().to_string())
            .envs(ctx.env.iter().cloned())
            .step("launch"),
    )
    .await?;

    Ok(())
}

/// Copy the bundle out of the mounted volume, returning its installed path.
async fn copy_bundle(ctx: &InstallContext<'_>, volume: &Path) -> Result<PathBuf, BootstrapError> {
    let settings = ctx.settings;
    let source = volume.join(&settings.app_bundle);
    if !tokio::fs::try_exists(&source).await.unwrap_or(false) {
        return Err(BootstrapError::MountedVolumeMissingApp {
            volume: volume.display().to_string(),
            app: settings.app_bundle.clone(),
        });
    }

    let target = settings.applications_dir.join(&settings.app_bundle);
    if tokio::fs::symlink_metadata(&target).await.is_ok() {
        remove_existing(&target, ctx.removal, ctx.runner).await?;
    }

    tokio::fs::create_dir_all(&settings.applications_dir).await.map_err(|e| {
        BootstrapError::install_step(
            "copy",
            format!("cannot create {}: {e}", settings.applications_dir.display()),
        )
    })?;

    debug!("Copying {} to {}", source.display(), settings.applications_dir.display());
    ctx.run_step(
        ProcessCommand::new("cp")
            .args([
                "-R".to_string(),
                source.display().to_string(),
                settings.applications_dir.display().to_string(),
            ])
            .step("copy"),
    )
    .await?;

    Ok(target)
}

async fn detach(ctx: &InstallContext<'_>, volume: &Path) {
    let command = ProcessCommand::new("hdiutil")
        .args(["detach".to_string(), volume.display().to_string()])
        .step("unmount");
    match ctx.runner.run(&command).await {
        Ok(output) if output.success() => debug!("Detached {}", volume.display()),
        Ok(output) => warn!("Failed to detach {}: {}", volume.display(), output.failure_reason()),
        Err(e) => warn!("Failed to run hdiutil detach: {}", e),
    }
}

/// Extract the mount point from `hdiutil attach` output.
///
/// The first line mentioning `/Volumes/` wins; its last tab-separated field is
/// the mount point.
#[must_use]
pub fn find_mount_point(stdout: &str) -> Option<PathBuf> {
    let line = stdout.lines().find(|line| line.contains(VOLUME_MARKER))?;
    let field = match line.rsplit_once('\t') {
        Some((_, last)) => last,
        None => &line[line.find(VOLUME_MARKER)?..],
    }
    .trim();
    (!field.is_empty()).then(|| PathBuf::from(field))
}
