//! External process capability.
//!
//! Install steps shell out to platform tools (`hdiutil`, `cp`, `tar`,
//! `chmod`, `open`, `cmd.exe`). They are described as [`ProcessCommand`]s and
//! executed by a [`ProcessRunner`], so the same install logic runs against the
//! real system or a scripted fake.
//!
//! # Examples
//!
//! ```rust,no_run
//! use appboot_cli::install::process::{ProcessCommand, ProcessRunner, SystemProcessRunner};
//!
//! # async fn example() -> std::io::Result<()> {
//! let output = SystemProcessRunner
//!     .run(&ProcessCommand::new("hdiutil").args(["attach", "App.dmg", "-nobrowse"]).step("mount"))
//!     .await?;
//! if output.success() {
//!     println!("{}", output.stdout);
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

/// A program invocation with arguments and environment overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessCommand {
    program: String,
    args: Vec<String>,
    env_vars: Vec<(String, String)>,
    step: Option<String>,
}

impl ProcessCommand {
    /// Create a command for `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable on top of the inherited environment.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Set several environment variables.
    pub fn envs<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.env_vars.extend(vars);
        self
    }

    /// Name the install step this command belongs to, for logs and errors.
    pub fn step(mut self, step: impl Into<String>) -> Self {
        self.step = Some(step.into());
        self
    }

    /// The program to run.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The program's arguments.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Environment overrides.
    #[must_use]
    pub fn env_vars(&self) -> &[(String, String)] {
        &self.env_vars
    }

    /// Step name, defaulting to the program name.
    #[must_use]
    pub fn step_name(&self) -> &str {
        self.step.as_deref().unwrap_or(&self.program)
    }

    /// The command line as a single string, for logging.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` if the process was killed by a signal
    pub code: Option<i32>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl ProcessOutput {
    /// Whether the process exited with code 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Short failure description: stderr if any, else the exit status.
    #[must_use]
    pub fn failure_reason(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            match self.code {
                Some(code) => format!("exited with code {code}"),
                None => "terminated by signal".to_string(),
            }
        } else {
            stderr.to_string()
        }
    }
}

/// Capability to run a command to completion.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `command`, wait for it, and capture its output.
    ///
    /// An `Err` means the process could not be started at all.
    async fn run(&self, command: &ProcessCommand) -> std::io::Result<ProcessOutput>;
}

/// [`ProcessRunner`] that spawns real processes with `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessRunner;

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn run(&self, command: &ProcessCommand) -> std::io::Result<ProcessOutput> {
        // Prefer the PATH-resolved location so logs show what actually ran
        let program = which::which(command.program())
            .map_or_else(|_| command.program().into(), std::path::PathBuf::into_os_string);

        tracing::debug!(
            target: "process",
            "({}) Executing: {}",
            command.step_name(),
            command.command_line()
        );

        let mut cmd = Command::new(program);
        cmd.args(command.arguments()).stdout(Stdio::piped()).stderr(Stdio::piped());
        for (key, value) in command.env_vars() {
            tracing::trace!(target: "process", "Setting env var: {}={}", key, value);
            cmd.env(key, value);
        }

        let output = cmd.output().await?;
        let result = ProcessOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !result.stdout.trim().is_empty() {
            tracing::debug!(target: "process", "({}) {}", command.step_name(), result.stdout.trim());
        }
        if result.success() {
            tracing::debug!(target: "process", "({}) Completed", command.step_name());
        } else {
            tracing::debug!(
                target: "process",
                "({}) Failed with exit code {:?}: {}",
                command.step_name(),
                result.code,
                result.stderr.trim()
            );
        }

        Ok(result)
    }
}
