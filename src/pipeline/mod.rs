//! Download-verify-install state machine.
//!
//! [`PipelineController`] owns the run's [`PipelineState`] and decides what
//! happens next. It performs no I/O itself: [`start`](PipelineController::start)
//! and [`dispatch`](PipelineController::dispatch) return the next
//! [`PipelineAction`], and whoever performs that action feeds the outcome back
//! in as a [`PipelineEvent`]. [`Bootstrapper`] is the driver that does this
//! against real capabilities.
//!
//! ```text
//! Idle -> FetchingFeed -> Downloading -> Verifying -> Installing -> Completed
//!              \               \             \            \
//!               +---------------+-------------+------------+--> Failed(reason)
//! ```
//!
//! At most one action is outstanding at a time. Failures are terminal; a new
//! run needs a new controller.

mod runner;

pub use runner::Bootstrapper;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::BootstrapError;
use crate::download::DownloadProgress;
use crate::feed::{DownloadDescriptor, FeedLocator, ReleaseChannel};
use crate::platform::PlatformKey;
use crate::view::ProgressView;

/// Phase of a bootstrap run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    /// Not started
    Idle,
    /// Waiting for the release feed
    FetchingFeed,
    /// Streaming the installer to disk
    Downloading,
    /// Hashing the downloaded installer
    Verifying,
    /// Running the platform install strategy
    Installing,
    /// Installed and launched
    Completed,
    /// Halted; holds the reason
    Failed(BootstrapError),
}

impl PipelineState {
    /// Whether the run has ended.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::FetchingFeed => f.write_str("fetching feed"),
            Self::Downloading => f.write_str("downloading"),
            Self::Verifying => f.write_str("verifying"),
            Self::Installing => f.write_str("installing"),
            Self::Completed => f.write_str("completed"),
            Self::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

/// Outcome reported back to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// The feed was fetched and parsed
    FeedReceived(DownloadDescriptor),
    /// The feed could not be fetched or parsed
    FeedFailed(BootstrapError),
    /// More of the installer has been written
    DownloadProgress(DownloadProgress),
    /// The installer is on disk and closed
    DownloadComplete(PathBuf),
    /// The download failed
    DownloadFailed(BootstrapError),
    /// Checksum comparison result, or the I/O error that prevented it
    VerifyResult(Result<bool, BootstrapError>),
    /// The install strategy finished
    InstallComplete,
    /// The install strategy failed
    InstallFailed(BootstrapError),
    /// The user asked to stop
    Cancel,
}

/// Work the controller wants done next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineAction {
    /// GET the release feed
    FetchFeed {
        /// Feed URL
        url: String,
    },
    /// Download the installer
    Download {
        /// Installer URL
        url: String,
        /// Local file name
        file_name: String,
    },
    /// Hash the downloaded installer
    Verify {
        /// Downloaded file
        path: PathBuf,
        /// Checksum from the feed
        expected_checksum: String,
    },
    /// Install and launch
    Install {
        /// Verified installer
        path: PathBuf,
    },
}

impl PipelineAction {
    /// Whether the action is a network request that cancellation may abort.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::FetchFeed { .. } | Self::Download { .. })
    }
}

/// The bootstrap state machine.
pub struct PipelineController {
    state: PipelineState,
    locator: FeedLocator,
    view: Arc<dyn ProgressView>,
    descriptor: Option<DownloadDescriptor>,
    downloaded: Option<PathBuf>,
    in_flight: Option<PipelineAction>,
}

impl PipelineController {
    /// Create an idle controller reporting to `view`.
    pub fn new(locator: FeedLocator, view: Arc<dyn ProgressView>) -> Self {
        Self {
            state: PipelineState::Idle,
            locator,
            view,
            descriptor: None,
            downloaded: None,
            in_flight: None,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Descriptor from the feed, once received.
    #[must_use]
    pub const fn descriptor(&self) -> Option<&DownloadDescriptor> {
        self.descriptor.as_ref()
    }

    /// The action awaiting its completion event, if any.
    #[must_use]
    pub const fn in_flight(&self) -> Option<&PipelineAction> {
        self.in_flight.as_ref()
    }

    /// Final result once the run has ended, `None` while it is still going.
    #[must_use]
    pub fn outcome(&self) -> Option<Result<(), BootstrapError>> {
        match &self.state {
            PipelineState::Completed => Some(Ok(())),
            PipelineState::Failed(e) => Some(Err(e.clone())),
            _ => None,
        }
    }

    /// Begin a run: locate the feed for `platform` on `channel`.
    ///
    /// Fails immediately with [`BootstrapError::NoFeedForPlatform`] and
    /// issues nothing if the platform has no feed.
    pub fn start(&mut self, platform: PlatformKey, channel: ReleaseChannel) -> Option<PipelineAction> {
        if self.state != PipelineState::Idle {
            warn!("Ignoring start request in state '{}'", self.state);
            return None;
        }

        self.view.set_status_text("Preparing to download...");
        self.view.set_progress_percent(None);

        let Some(url) = self.locator.locate(platform, channel) else {
            self.fail(BootstrapError::NoFeedForPlatform {
                platform: platform.to_string(),
            });
            return None;
        };

        info!("Fetching {} release feed for {}", channel, platform);
        self.state = PipelineState::FetchingFeed;
        self.view.set_status_text("Fetching release feed...");
        Some(self.issue(PipelineAction::FetchFeed {
            url,
        }))
    }

    /// Apply an event and return the next action, if any.
    ///
    /// Events that the current phase does not expect are ignored.
    pub fn dispatch(&mut self, event: PipelineEvent) -> Option<PipelineAction> {
        if self.state.is_terminal() {
            warn!("Ignoring {:?} after the run ended ({})", event, self.state);
            return None;
        }

        match event {
            PipelineEvent::Cancel => {
                self.in_flight = None;
                self.fail(BootstrapError::Cancelled);
                None
            }
            PipelineEvent::FeedReceived(descriptor) if self.state == PipelineState::FetchingFeed => {
                self.complete();
                self.on_feed(descriptor)
            }
            PipelineEvent::FeedFailed(error) if self.state == PipelineState::FetchingFeed => {
                self.complete();
                self.fail(error);
                None
            }
            PipelineEvent::DownloadProgress(progress) if self.state == PipelineState::Downloading => {
                if let Some(descriptor) = &self.descriptor {
                    self.view.set_status_text(&progress.status_text(&descriptor.file_name));
                }
                self.view.set_progress_percent(progress.percent());
                None
            }
            PipelineEvent::DownloadComplete(path) if self.state == PipelineState::Downloading => {
                self.complete();
                self.on_downloaded(path)
            }
            PipelineEvent::DownloadFailed(error) if self.state == PipelineState::Downloading => {
                self.complete();
                self.fail(error);
                None
            }
            PipelineEvent::VerifyResult(result) if self.state == PipelineState::Verifying => {
                self.complete();
                self.on_verified(result)
            }
            PipelineEvent::InstallComplete if self.state == PipelineState::Installing => {
                self.complete();
                info!("Installation completed");
                self.state = PipelineState::Completed;
                self.view.set_status_text("Installation Completed");
                self.view.set_progress_percent(Some(100));
                self.view.close();
                None
            }
            PipelineEvent::InstallFailed(error) if self.state == PipelineState::Installing => {
                self.complete();
                self.fail(error);
                None
            }
            other => {
                warn!("Ignoring unexpected {:?} in state '{}'", other, self.state);
                None
            }
        }
    }

    fn on_feed(&mut self, descriptor: DownloadDescriptor) -> Option<PipelineAction> {
        info!("Latest release: {}", descriptor.download_url);
        let action = PipelineAction::Download {
            url: descriptor.download_url.clone(),
            file_name: descriptor.file_name.clone(),
        };
        self.view.set_status_text(&format!("Downloading {}...", descriptor.file_name));
        self.view.set_progress_percent(None);
        self.descriptor = Some(descriptor);
        self.state = PipelineState::Downloading;
        Some(self.issue(action))
    }

    fn on_downloaded(&mut self, path: PathBuf) -> Option<PipelineAction> {
        let Some((file_name, expected_checksum)) =
            self.descriptor.as_ref().map(|d| (d.file_name.clone(), d.expected_checksum.clone()))
        else {
            self.fail(BootstrapError::FeedParseError {
                reason: "download completed without a feed descriptor".to_string(),
            });
            return None;
        };

        self.view.set_status_text(&format!("Verifying {file_name}..."));
        self.downloaded = Some(path.clone());
        self.state = PipelineState::Verifying;
        Some(self.issue(PipelineAction::Verify {
            path,
            expected_checksum,
        }))
    }

    fn on_verified(&mut self, result: Result<bool, BootstrapError>) -> Option<PipelineAction> {
        let matched = match result {
            Ok(matched) => matched,
            Err(error) => {
                self.fail(error);
                return None;
            }
        };

        let (file_name, expected) = self
            .descriptor
            .as_ref()
            .map(|d| (d.file_name.clone(), d.expected_checksum.clone()))
            .unwrap_or_default();

        match self.downloaded.clone() {
            Some(path) if matched => {
                self.view.set_status_text(&format!("Installing {file_name}"));
                self.state = PipelineState::Installing;
                Some(self.issue(PipelineAction::Install {
                    path,
                }))
            }
            path => {
                self.fail(BootstrapError::ChecksumMismatch {
                    file: path.map(|p| p.display().to_string()).unwrap_or(file_name),
                    expected,
                });
                None
            }
        }
    }

    fn issue(&mut self, action: PipelineAction) -> PipelineAction {
        assert!(
            self.in_flight.is_none(),
            "issued {action:?} while {:?} is still outstanding",
            self.in_flight
        );
        debug!("Issuing {:?}", action);
        self.in_flight = Some(action.clone());
        action
    }

    fn complete(&mut self) {
        self.in_flight = None;
    }

    fn fail(&mut self, error: BootstrapError) {
        warn!("Bootstrap failed while {}: {}", self.state, error);
        self.view.set_status_text(&error.status_text());
        self.view.abandon();
        self.state = PipelineState::Failed(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingView;

    fn controller() -> (PipelineController, Arc<RecordingView>) {
        let view = Arc::new(RecordingView::default());
        let controller = PipelineController::new(FeedLocator::new("https://feeds.example.com/acct"), view.clone());
        (controller, view)
    }

    fn descriptor() -> DownloadDescriptor {
        DownloadDescriptor {
            download_url: "https://dl.example.com/Mudlet-4.17.2.dmg".to_string(),
            expected_checksum: "abc123".to_string(),
            file_name: "Mudlet-4.17.2.dmg".to_string(),
        }
    }

    /// Drive a controller up to the `Verifying` phase.
    fn to_verifying(controller: &mut PipelineController) {
        controller.start(PlatformKey::MacArm, ReleaseChannel::Stable).unwrap();
        controller.dispatch(PipelineEvent::FeedReceived(descriptor())).unwrap();
        controller.dispatch(PipelineEvent::DownloadComplete(PathBuf::from("/dl/Mudlet-4.17.2.dmg"))).unwrap();
    }

    #[test]
    fn test_happy_path_actions() {
        let (mut controller, view) = controller();

        let action = controller.start(PlatformKey::MacArm, ReleaseChannel::Beta);
        assert_eq!(
            action,
            Some(PipelineAction::FetchFeed {
                url: "https://feeds.example.com/acct/public-test-build/mac/arm".to_string()
            })
        );
        assert_eq!(controller.state(), &PipelineState::FetchingFeed);

        let action = controller.dispatch(PipelineEvent::FeedReceived(descriptor()));
        assert_eq!(
            action,
            Some(PipelineAction::Download {
                url: "https://dl.example.com/Mudlet-4.17.2.dmg".to_string(),
                file_name: "Mudlet-4.17.2.dmg".to_string()
            })
        );

        let progress = DownloadProgress {
            received: 1_048_576,
            total: Some(4_194_304),
        };
        assert_eq!(controller.dispatch(PipelineEvent::DownloadProgress(progress)), None);
        assert_eq!(view.last_status().as_deref(), Some("Downloading Mudlet-4.17.2.dmg... 1.0 / 4.0 MB"));
        assert_eq!(view.percents().last(), Some(&Some(25)));

        let action = controller.dispatch(PipelineEvent::DownloadComplete(PathBuf::from("/dl/Mudlet-4.17.2.dmg")));
        assert_eq!(
            action,
            Some(PipelineAction::Verify {
                path: PathBuf::from("/dl/Mudlet-4.17.2.dmg"),
                expected_checksum: "abc123".to_string()
            })
        );

        let action = controller.dispatch(PipelineEvent::VerifyResult(Ok(true)));
        assert_eq!(
            action,
            Some(PipelineAction::Install {
                path: PathBuf::from("/dl/Mudlet-4.17.2.dmg")
            })
        );
        assert_eq!(view.last_status().as_deref(), Some("Installing Mudlet-4.17.2.dmg"));

        assert_eq!(controller.dispatch(PipelineEvent::InstallComplete), None);
        assert_eq!(controller.state(), &PipelineState::Completed);
        assert_eq!(controller.outcome(), Some(Ok(())));
        assert_eq!(view.last_status().as_deref(), Some("Installation Completed"));
        assert!(view.is_closed());
        assert!(!view.is_abandoned());
        assert!(controller.in_flight().is_none());
    }

    #[test]
    fn test_unknown_platform_issues_nothing() {
        let (mut controller, view) = controller();

        assert_eq!(controller.start(PlatformKey::Unknown, ReleaseChannel::Stable), None);
        assert_eq!(
            controller.state(),
            &PipelineState::Failed(BootstrapError::NoFeedForPlatform {
                platform: "unknown".to_string()
            })
        );
        assert!(controller.in_flight().is_none());
        assert!(!view.is_closed());
        assert!(view.is_abandoned());
    }

    #[test]
    fn test_checksum_mismatch_halts_before_install() {
        let (mut controller, view) = controller();
        to_verifying(&mut controller);

        assert_eq!(controller.dispatch(PipelineEvent::VerifyResult(Ok(false))), None);
        assert_eq!(
            controller.state(),
            &PipelineState::Failed(BootstrapError::ChecksumMismatch {
                file: "/dl/Mudlet-4.17.2.dmg".to_string(),
                expected: "abc123".to_string()
            })
        );
        assert_eq!(view.last_status().as_deref(), Some("SHA256 Verification Failed"));
        assert!(view.is_abandoned());

        // Terminal: nothing moves it afterwards
        assert_eq!(controller.dispatch(PipelineEvent::VerifyResult(Ok(true))), None);
        assert_eq!(controller.dispatch(PipelineEvent::InstallComplete), None);
        assert!(matches!(controller.state(), PipelineState::Failed(_)));
    }

    #[test]
    fn test_verification_io_error() {
        let (mut controller, _view) = controller();
        to_verifying(&mut controller);

        let error = BootstrapError::VerificationIoError {
            path: "/dl/Mudlet-4.17.2.dmg".to_string(),
            reason: "gone".to_string(),
        };
        controller.dispatch(PipelineEvent::VerifyResult(Err(error.clone())));
        assert_eq!(controller.outcome(), Some(Err(error)));
    }

    #[test]
    fn test_feed_failure() {
        let (mut controller, view) = controller();
        controller.start(PlatformKey::WinX86, ReleaseChannel::Stable).unwrap();

        controller.dispatch(PipelineEvent::FeedFailed(BootstrapError::NoReleasesAvailable));

        assert_eq!(controller.state(), &PipelineState::Failed(BootstrapError::NoReleasesAvailable));
        assert_eq!(view.last_status().as_deref(), Some("The release feed lists no releases"));
    }

    #[test]
    fn test_download_and_install_failures() {
        let (mut controller, _view) = controller();
        controller.start(PlatformKey::LinuxX86_64, ReleaseChannel::Stable).unwrap();
        controller.dispatch(PipelineEvent::FeedReceived(descriptor())).unwrap();
        let error = BootstrapError::DownloadError {
            url: "u".to_string(),
            reason: "reset".to_string(),
        };
        controller.dispatch(PipelineEvent::DownloadFailed(error.clone()));
        assert_eq!(controller.outcome(), Some(Err(error)));

        let (mut controller, _view) = self::controller();
        to_verifying(&mut controller);
        controller.dispatch(PipelineEvent::VerifyResult(Ok(true))).unwrap();
        let error = BootstrapError::install_step("copy", "exit 1");
        controller.dispatch(PipelineEvent::InstallFailed(error.clone()));
        assert_eq!(controller.outcome(), Some(Err(error)));
    }

    #[test]
    fn test_unexpected_events_are_ignored() {
        let (mut controller, _view) = controller();
        controller.start(PlatformKey::WinX86_64, ReleaseChannel::Stable).unwrap();

        assert_eq!(controller.dispatch(PipelineEvent::InstallComplete), None);
        assert_eq!(controller.dispatch(PipelineEvent::DownloadComplete(PathBuf::from("/x"))), None);
        assert_eq!(controller.dispatch(PipelineEvent::VerifyResult(Ok(true))), None);
        assert_eq!(controller.state(), &PipelineState::FetchingFeed);
        assert!(controller.in_flight().is_some());
    }

    #[test]
    fn test_cancel_clears_outstanding_request() {
        let (mut controller, view) = controller();
        controller.start(PlatformKey::WinX86_64, ReleaseChannel::Stable).unwrap();
        controller.dispatch(PipelineEvent::FeedReceived(descriptor())).unwrap();

        assert_eq!(controller.dispatch(PipelineEvent::Cancel), None);
        assert_eq!(controller.state(), &PipelineState::Failed(BootstrapError::Cancelled));
        assert!(controller.in_flight().is_none());
        assert_eq!(view.last_status().as_deref(), Some("Cancelled"));
    }

    #[test]
    fn test_start_twice_is_ignored() {
        let (mut controller, _view) = controller();
        controller.start(PlatformKey::WinX86, ReleaseChannel::Stable).unwrap();
        assert_eq!(controller.start(PlatformKey::WinX86, ReleaseChannel::Stable), None);
    }

    #[test]
    #[should_panic(expected = "still outstanding")]
    fn test_second_request_while_outstanding_panics() {
        let (mut controller, _view) = controller();
        controller.start(PlatformKey::WinX86, ReleaseChannel::Stable).unwrap();
        controller.issue(PipelineAction::Install {
            path: PathBuf::from("/x"),
        });
    }
}
