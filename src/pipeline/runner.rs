use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{PipelineAction, PipelineController, PipelineEvent};
use crate::core::BootstrapError;
use crate::download::Downloader;
use crate::feed::{ReleaseChannel, ReleaseFeedClient};
use crate::install::InstallDispatcher;
use crate::platform::PlatformKey;
use crate::verify::IntegrityVerifier;

/// Performs [`PipelineAction`]s against real capabilities until the
/// controller reaches a terminal state.
///
/// Network actions are raced against a [`CancellationToken`]; cancelling
/// drops the in-flight request and fails the run with
/// [`BootstrapError::Cancelled`]. Verification and installation always run
/// to completion once started.
pub struct Bootstrapper {
    platform: PlatformKey,
    feed_client: ReleaseFeedClient,
    downloader: Downloader,
    installer: InstallDispatcher,
    launch_profile: Option<String>,
    cancel: CancellationToken,
}

impl Bootstrapper {
    /// Create a driver for `platform`.
    pub fn new(
        platform: PlatformKey,
        feed_client: ReleaseFeedClient,
        downloader: Downloader,
        installer: InstallDispatcher,
    ) -> Self {
        Self {
            platform,
            feed_client,
            downloader,
            installer,
            launch_profile: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Forward `profile` to the launched application.
    #[must_use]
    pub fn with_launch_profile(mut self, profile: Option<String>) -> Self {
        self.launch_profile = profile;
        self
    }

    /// Use `token` to cancel the run.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels this run when triggered.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drive `controller` from `Idle` to a terminal state.
    ///
    /// # Errors
    ///
    /// Returns the error the run failed with.
    pub async fn run(
        &self,
        controller: &mut PipelineController,
        channel: ReleaseChannel,
    ) -> Result<(), BootstrapError> {
        let mut next = controller.start(self.platform, channel);

        while let Some(action) = next {
            let event = if action.is_network() {
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => {
                        info!("Cancellation requested");
                        PipelineEvent::Cancel
                    }
                    event = self.perform(action, controller) => event,
                }
            } else {
                self.perform(action, controller).await
            };
            next = controller.dispatch(event);
        }

        controller.outcome().unwrap_or_else(|| {
            Err(BootstrapError::install_step("pipeline", format!("run stopped in state '{}'", controller.state())))
        })
    }

    async fn perform(&self, action: PipelineAction, controller: &mut PipelineController) -> PipelineEvent {
        match action {
            PipelineAction::FetchFeed {
                url,
            } => match self.feed_client.fetch(&url).await {
                Ok(descriptor) => PipelineEvent::FeedReceived(descriptor),
                Err(error) => PipelineEvent::FeedFailed(error),
            },
            PipelineAction::Download {
                url,
                file_name,
            } => {
                let result = self
                    .downloader
                    .download(&url, &file_name, |progress| {
                        controller.dispatch(PipelineEvent::DownloadProgress(progress));
                    })
                    .await;
                match result {
                    Ok(path) => PipelineEvent::DownloadComplete(path),
                    Err(error) => PipelineEvent::DownloadFailed(error),
                }
            }
            PipelineAction::Verify {
                path,
                expected_checksum,
            } => PipelineEvent::VerifyResult(IntegrityVerifier::verify(&path, &expected_checksum).await),
            PipelineAction::Install {
                path,
            } => match self.installer.install(self.platform, &path, self.launch_profile.as_deref()).await {
                Ok(()) => PipelineEvent::InstallComplete,
                Err(error) => PipelineEvent::InstallFailed(error),
            },
        }
    }
}
