//! Linux install from a tarred application image.

use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use super::InstallContext;
use super::process::ProcessCommand;
use crate::core::BootstrapError;

/// Extract `archive`, make the contained artifact executable and run it.
pub async fn install(ctx: &InstallContext<'_>, archive: &Path) -> Result<(), BootstrapError> {
    let settings = ctx.settings;
    let extract_dir = &settings.extract_dir;

    reset_dir(extract_dir).await?;

    ctx.run_step(
        ProcessCommand::new("tar")
            .args([
                "-xf".to_string(),
                archive.display().to_string(),
                "-C".to_string(),
                extract_dir.display().to_string(),
            ])
            .step("extract"),
    )
    .await?;

    let artifact = find_artifact(extract_dir, &settings.artifact_suffix).ok_or_else(|| {
        BootstrapError::ArtifactNotFoundInArchive {
            dir: extract_dir.display().to_string(),
            pattern: settings.artifact_suffix.clone(),
        }
    })?;
    info!("Found {}", artifact.display());

    ctx.run_step(
        ProcessCommand::new("chmod")
            .args(["+x".to_string(), artifact.display().to_string()])
            .step("chmod"),
    )
    .await?;

    info!("Launching {}", artifact.display());
    ctx.run_step(ProcessCommand::new(artifact.display().to_string()).envs(ctx.env.iter().cloned()).step("launch"))
        .await?;

    Ok(())
}

/// Empty `dir` so that only freshly extracted files can match the artifact.
async fn reset_dir(dir: &Path) -> Result<(), BootstrapError> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => debug!("Cleared {}", dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(BootstrapError::install_step(
                "extract",
                format!("cannot clear {}: {e}", dir.display()),
            ));
        }
    }
    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        BootstrapError::install_step("extract", format!("cannot create {}: {e}", dir.display()))
    })
}

/// First regular file under `dir` (sorted by path) whose name ends in `suffix`.
#[must_use]
pub fn find_artifact(dir: &Path, suffix: &str) -> Option<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .find(|entry| entry.file_name().to_string_lossy().ends_with(suffix))
        .map(|entry| {
            debug!("Matched artifact {}", entry.path().display());
            entry.into_path()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::InstallSettings;
    use crate::test_utils::ScriptedRunner;
    use tempfile::TempDir;

    fn settings(temp: &TempDir) -> InstallSettings {
        InstallSettings {
            applications_dir: temp.path().join("Applications"),
            extract_dir: temp.path().join("ExtractedApp"),
            ..InstallSettings::default()
        }
    }

    fn ctx<'a>(runner: &'a ScriptedRunner, settings: &'a InstallSettings) -> InstallContext<'a> {
        InstallContext {
            runner,
            settings,
            removal: &[],
            env: vec![("MUDLET_PROFILES".to_string(), "default".to_string())],
        }
    }

    #[test]
    fn test_find_artifact_sorted_and_nested() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("b")).unwrap();
        std::fs::write(temp.path().join("b/Zed.AppImage"), b"").unwrap();
        std::fs::write(temp.path().join("a.AppImage"), b"").unwrap();
        std::fs::write(temp.path().join("readme.txt"), b"").unwrap();

        assert_eq!(find_artifact(temp.path(), ".AppImage"), Some(temp.path().join("a.AppImage")));
        assert_eq!(find_artifact(temp.path(), ".deb"), None);
    }

    fn unpacking(names: &[&str]) -> ScriptedRunner {
        ScriptedRunner::new().unpacks(names.iter().map(|n| ((*n).to_string(), b"\x7fELF".to_vec())).collect())
    }

    #[tokio::test]
    async fn test_extract_chmod_launch() {
        let temp = TempDir::new().unwrap();
        let settings = settings(&temp);
        let artifact = settings.extract_dir.join("Mudlet.AppImage");
        let runner = unpacking(&["Mudlet.AppImage"]);

        install(&ctx(&runner, &settings), Path::new("/tmp/Mudlet.AppImage.tar")).await.unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(
            calls[0].command_line(),
            format!("tar -xf /tmp/Mudlet.AppImage.tar -C {}", settings.extract_dir.display())
        );
        assert_eq!(calls[1].command_line(), format!("chmod +x {}", artifact.display()));
        assert_eq!(calls[2].program(), artifact.display().to_string());
        assert_eq!(calls[2].env_vars().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_artifact_from_earlier_run_is_discarded() {
        let temp = TempDir::new().unwrap();
        let settings = settings(&temp);
        std::fs::create_dir_all(settings.extract_dir.join("old")).unwrap();
        let stale = settings.extract_dir.join("Mudlet-4.16.0.AppImage");
        std::fs::write(&stale, b"old build").unwrap();
        std::fs::write(settings.extract_dir.join("old/A.AppImage"), b"older build").unwrap();
        let runner = unpacking(&["Mudlet-4.17.2.AppImage"]);

        install(&ctx(&runner, &settings), Path::new("/tmp/Mudlet.AppImage.tar")).await.unwrap();

        let fresh = settings.extract_dir.join("Mudlet-4.17.2.AppImage");
        let calls = runner.calls();
        assert_eq!(calls[1].command_line(), format!("chmod +x {}", fresh.display()));
        assert_eq!(calls[2].program(), fresh.display().to_string());
        assert!(!stale.exists());
        assert!(!settings.extract_dir.join("old").exists());
    }

    #[tokio::test]
    async fn test_missing_artifact_ignores_leftovers() {
        let temp = TempDir::new().unwrap();
        let settings = settings(&temp);
        std::fs::create_dir_all(&settings.extract_dir).unwrap();
        std::fs::write(settings.extract_dir.join("Mudlet-4.16.0.AppImage"), b"old build").unwrap();
        let runner = unpacking(&["README"]);

        let err = install(&ctx(&runner, &settings), Path::new("/tmp/Mudlet.AppImage.tar")).await.unwrap_err();

        assert!(matches!(err, BootstrapError::ArtifactNotFoundInArchive { .. }));
        assert_eq!(runner.programs(), vec!["tar"]);
    }

    #[tokio::test]
    async fn test_extract_failure_stops() {
        let temp = TempDir::new().unwrap();
        let settings = settings(&temp);
        let runner = ScriptedRunner::new().fail("tar", 2);

        let err = install(&ctx(&runner, &settings), Path::new("/tmp/x.tar")).await.unwrap_err();

        assert!(matches!(err, BootstrapError::InstallStepFailed { ref step, .. } if step == "extract"));
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_chmod_failure_stops() {
        let temp = TempDir::new().unwrap();
        let settings = settings(&temp);
        let runner = unpacking(&["Mudlet.AppImage"]).fail("chmod", 1);

        let err = install(&ctx(&runner, &settings), Path::new("/tmp/x.tar")).await.unwrap_err();

        assert!(matches!(err, BootstrapError::InstallStepFailed { ref step, .. } if step == "chmod"));
        assert_eq!(runner.programs(), vec!["tar", "chmod"]);
    }
}
