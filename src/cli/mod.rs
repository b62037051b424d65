//! Command-line interface for appboot.
//!
//! A single command: resolve the host platform, pick the release channel,
//! then download, verify, install and launch the latest release. Options
//! only adjust how that happens.
//!
//! # Examples
//!
//! ```bash
//! appboot                              # install from the configured channel
//! appboot --channel beta               # follow public test builds
//! appboot --platform win/x86 --print-feed
//! appboot -v --config ./launch.toml    # verbose, custom configuration
//! APPBOOT_NO_PROGRESS=1 appboot        # no progress bar
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::config::LaunchConfig;
use crate::core::BootstrapError;
use crate::download::Downloader;
use crate::feed::{ReleaseChannel, ReleaseFeedClient};
use crate::install::InstallDispatcher;
use crate::install::process::SystemProcessRunner;
use crate::pipeline::{Bootstrapper, PipelineController};
use crate::platform::{self, PlatformKey};
use crate::transport::{HttpTransport, ReqwestTransport};
use crate::view::TerminalProgressView;

#[cfg(test)]
mod tests;

/// Settings derived from the command line that shape the run itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliConfig {
    /// Default log filter; `RUST_LOG` takes precedence when set
    pub log_level: String,
    /// Hide the progress bar
    pub no_progress: bool,
    /// Explicit configuration file
    pub config_path: Option<PathBuf>,
}

/// Download, verify, install and launch the latest release.
#[derive(Parser, Debug)]
#[command(
    name = "appboot",
    about = "Install and launch the latest release of the application",
    version,
    long_about = "Fetches the release feed for this platform, downloads the newest installer, \
                  verifies its SHA-256 checksum, then installs and launches it."
)]
pub struct Cli {
    /// Show debug output (equivalent to `RUST_LOG=debug`).
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only show errors; also hides the progress bar.
    #[arg(short, long)]
    quiet: bool,

    /// Path to the launch configuration file.
    ///
    /// Defaults to `APPBOOT_CONFIG_PATH`, then `launch.toml` next to the
    /// executable, then `~/.appboot/launch.toml`.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Disable the progress bar (same as setting `APPBOOT_NO_PROGRESS`).
    #[arg(long)]
    no_progress: bool,

    /// Release channel to install from, overriding `RELEASE_TYPE`.
    #[arg(long, value_name = "stable|beta")]
    channel: Option<ReleaseChannel>,

    /// Platform key to install for instead of the detected one.
    #[arg(long, value_name = "KEY")]
    platform: Option<PlatformKey>,

    /// Print the release feed URL and exit without downloading anything.
    #[arg(long)]
    print_feed: bool,
}

impl Cli {
    /// Run the bootstrapper.
    ///
    /// # Errors
    ///
    /// Returns the [`BootstrapError`] the run failed with (wrapped in
    /// `anyhow`), or a configuration error.
    pub async fn execute(self) -> Result<()> {
        let cli_config = self.build_config();
        init_logging(&cli_config.log_level);
        self.execute_with_config(cli_config).await
    }

    /// Translate flags into a [`CliConfig`].
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        };

        CliConfig {
            log_level: log_level.to_string(),
            no_progress: self.no_progress || self.quiet,
            config_path: self.config.clone(),
        }
    }

    /// Run with an explicit [`CliConfig`]; logging is left as is.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn execute_with_config(self, cli_config: CliConfig) -> Result<()> {
        let config = LaunchConfig::load(cli_config.config_path.as_deref()).await?;

        let platform = self.platform.unwrap_or_else(platform::resolve);
        let channel = self.channel.unwrap_or_else(|| config.channel());
        debug!("Platform {}, channel {}", platform, channel);

        if self.print_feed {
            let url = config.feed_locator().locate(platform, channel).ok_or_else(|| {
                BootstrapError::NoFeedForPlatform {
                    platform: platform.to_string(),
                }
            })?;
            println!("{url}");
            return Ok(());
        }

        let transport: Arc<dyn HttpTransport> =
            Arc::new(ReqwestTransport::new().context("Failed to initialise the HTTP client")?);
        let feed_client = ReleaseFeedClient::new(transport.clone(), platform, config.feed_timeout());
        let downloader = Downloader::new(transport, config.download_dir(), config.inactivity_timeout());
        let installer = InstallDispatcher::new(Arc::new(SystemProcessRunner), config.install_settings());

        let bootstrapper = Bootstrapper::new(platform, feed_client, downloader, installer)
            .with_launch_profile(config.launch_profile().map(str::to_string));

        let token = bootstrapper.cancellation_token();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling");
                token.cancel();
            }
        });

        let view = Arc::new(TerminalProgressView::with_hidden(cli_config.no_progress));
        let mut controller = PipelineController::new(config.feed_locator(), view);
        let result = bootstrapper.run(&mut controller, channel).await;
        interrupt.abort();

        Ok(result?)
    }
}

/// Install the global `tracing` subscriber, writing to stderr.
///
/// `RUST_LOG` wins over `default_level` when set.
pub fn init_logging(default_level: &str) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(default_level)
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
