//! Windows install: hand the installer to the command interpreter.

use std::path::Path;

use super::InstallContext;
use super::process::ProcessCommand;
use crate::core::BootstrapError;

/// Run `cmd.exe /C <installer>` with the launch environment and wait for it.
pub async fn install(ctx: &InstallContext<'_>, installer: &Path) -> Result<(), BootstrapError> {
    let command = ProcessCommand::new("cmd.exe")
        .arg("/C")
        .arg(installer.display().to_string())
        .envs(ctx.env.iter().cloned())
        .step("run installer");

    ctx.run_step(command).await?;
    Ok(())
}
