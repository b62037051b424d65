//! Error handling for appboot
//!
//! The error system follows two principles:
//! 1. **Strongly-typed errors** so the pipeline can decide exactly how to halt
//! 2. **User-friendly messages** with actionable suggestions for the terminal
//!
//! # Architecture
//!
//! - [`BootstrapError`] - every failure the download-verify-install pipeline can end in
//! - [`ErrorContext`] - wrapper adding details and a suggestion for display
//!
//! Every [`BootstrapError`] is terminal for the current run. Nothing in the
//! pipeline retries; the error is converted into a status-text update and the
//! state machine halts.
//!
//! # Exit Codes
//!
//! | Code | Category |
//! |------|----------|
//! | 0 | success |
//! | 1 | configuration / usage / anything uncategorised |
//! | 2 | feed resolution |
//! | 3 | download |
//! | 4 | verification |
//! | 5 | install |
//! | 6 | cancelled |
//!
//! # Examples
//!
//! ```rust,no_run
//! use appboot_cli::core::{BootstrapError, user_friendly_error};
//!
//! let error = BootstrapError::NoReleasesAvailable;
//! assert_eq!(error.exit_code(), 2);
//!
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display(); // Shows colored error with suggestions
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// Exit code for configuration, usage and uncategorised failures.
pub const EXIT_GENERIC: i32 = 1;
/// Exit code for failures while resolving the release feed.
pub const EXIT_FEED: i32 = 2;
/// Exit code for failures while downloading the installer.
pub const EXIT_DOWNLOAD: i32 = 3;
/// Exit code for failures while verifying the installer.
pub const EXIT_VERIFY: i32 = 4;
/// Exit code for failures while installing or launching.
pub const EXIT_INSTALL: i32 = 5;
/// Exit code for a user-cancelled run.
pub const EXIT_CANCELLED: i32 = 6;

/// Every way a bootstrap run can fail.
///
/// The variants mirror the pipeline phases: feed resolution, download,
/// verification and installation, plus [`Cancelled`](Self::Cancelled) for a
/// user-requested teardown. All fields are owned strings so the error can be
/// cloned into [`PipelineState::Failed`](crate::pipeline::PipelineState) and
/// still be returned to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BootstrapError {
    /// The platform key has no release feed mapping (e.g. `unknown`).
    #[error("No release feed available for platform '{platform}'")]
    NoFeedForPlatform {
        /// Canonical platform key that could not be mapped
        platform: String,
    },

    /// The feed request failed at the transport level or timed out.
    #[error("Failed to fetch release feed from {url}: {reason}")]
    FeedFetchError {
        /// Feed URL that was requested
        url: String,
        /// Transport error text
        reason: String,
    },

    /// The feed body was not a JSON object of the expected shape.
    #[error("Failed to parse release feed: {reason}")]
    FeedParseError {
        /// Description of the parse failure
        reason: String,
    },

    /// The feed's `releases` list was empty.
    #[error("The release feed lists no releases")]
    NoReleasesAvailable,

    /// The download URL does not end in a recognised installer file name.
    #[error("Download URL does not point to a recognised installer: {url}")]
    UnrecognizedDownloadUrl {
        /// The URL taken from the feed
        url: String,
    },

    /// The installer download failed at the transport level or stalled.
    #[error("Error downloading file: {reason}")]
    DownloadError {
        /// URL being downloaded
        url: String,
        /// Transport error text
        reason: String,
    },

    /// Writing the downloaded bytes to disk failed.
    #[error("Failed to save download to {path}: {reason}")]
    LocalWriteError {
        /// Destination path
        path: String,
        /// Underlying I/O error text
        reason: String,
    },

    /// The downloaded file's digest does not match the feed checksum.
    #[error("SHA256 verification failed for {file} (expected {expected})")]
    ChecksumMismatch {
        /// File that was verified
        file: String,
        /// Checksum published by the feed
        expected: String,
    },

    /// The downloaded file could not be opened or read while hashing.
    #[error("Failed to read {path} for verification: {reason}")]
    VerificationIoError {
        /// File that was being hashed
        path: String,
        /// Underlying I/O error text
        reason: String,
    },

    /// The mounted disk image does not contain the application bundle.
    #[error("Mounted volume {volume} does not contain {app}")]
    MountedVolumeMissingApp {
        /// Mount point reported by the mount tool
        volume: String,
        /// Expected bundle name
        app: String,
    },

    /// Every removal strategy failed on a previously installed copy.
    #[error("Cannot replace existing installation at {path}")]
    CannotReplaceExistingInstall {
        /// Path of the existing installation
        path: String,
    },

    /// The extracted archive holds no artifact with the expected suffix.
    #[error("No '*{pattern}' file found in extracted archive at {dir}")]
    ArtifactNotFoundInArchive {
        /// Extraction directory that was scanned
        dir: String,
        /// Expected file suffix
        pattern: String,
    },

    /// A load-bearing install sub-step (mount, copy, chmod, ...) failed.
    #[error("Install step '{step}' failed: {reason}")]
    InstallStepFailed {
        /// Name of the step
        step: String,
        /// Exit status or error output
        reason: String,
    },

    /// The user cancelled the run.
    #[error("Cancelled")]
    Cancelled,
}

impl BootstrapError {
    /// Process exit code for this failure category.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::NoFeedForPlatform {
                ..
            }
            | Self::FeedFetchError {
                ..
            }
            | Self::FeedParseError {
                ..
            }
            | Self::NoReleasesAvailable
            | Self::UnrecognizedDownloadUrl {
                ..
            } => EXIT_FEED,
            Self::DownloadError {
                ..
            }
            | Self::LocalWriteError {
                ..
            } => EXIT_DOWNLOAD,
            Self::ChecksumMismatch {
                ..
            }
            | Self::VerificationIoError {
                ..
            } => EXIT_VERIFY,
            Self::MountedVolumeMissingApp {
                ..
            }
            | Self::CannotReplaceExistingInstall {
                ..
            }
            | Self::ArtifactNotFoundInArchive {
                ..
            }
            | Self::InstallStepFailed {
                ..
            } => EXIT_INSTALL,
            Self::Cancelled => EXIT_CANCELLED,
        }
    }

    /// Short text for the progress view's status line.
    ///
    /// Checksum failures keep the terse wording users already know; every
    /// other error uses its display form.
    #[must_use]
    pub fn status_text(&self) -> String {
        match self {
            Self::ChecksumMismatch {
                ..
            } => "SHA256 Verification Failed".to_string(),
            other => other.to_string(),
        }
    }

    /// Shorthand for [`InstallStepFailed`](Self::InstallStepFailed).
    pub fn install_step(step: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InstallStepFailed {
            step: step.into(),
            reason: reason.into(),
        }
    }
}

/// Error context wrapper that adds user-friendly details and a suggestion.
///
/// ```rust,no_run
/// use appboot_cli::core::{BootstrapError, ErrorContext};
///
/// let context = ErrorContext::new(BootstrapError::NoReleasesAvailable)
///     .with_suggestion("Try again later")
///     .with_details("The feed is reachable but empty");
///
/// context.display();
/// ```
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error, if it is one of ours
    pub error: Option<BootstrapError>,
    /// Message used when the error is not a [`BootstrapError`]
    pub message: String,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a context from a [`BootstrapError`].
    #[must_use]
    pub fn new(error: BootstrapError) -> Self {
        Self {
            message: error.to_string(),
            error: Some(error),
            suggestion: None,
            details: None,
        }
    }

    /// Create a context for an error that has no typed variant.
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self {
            error: None,
            message: message.into(),
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Exit code to terminate the process with.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.error.as_ref().map_or(EXIT_GENERIC, BootstrapError::exit_code)
    }

    /// Print the error, details and suggestion to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.message);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with a suggestion where one is known.
///
/// Recognises [`BootstrapError`], [`std::io::Error`] and [`toml::de::Error`];
/// anything else is shown with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(bootstrap_error) = error.downcast_ref::<BootstrapError>() {
        return create_error_context(bootstrap_error.clone());
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::other(format!("Invalid launch configuration: {toml_error}"))
            .with_suggestion("Check the TOML syntax of your launch.toml file");
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>()
        && io_error.kind() == std::io::ErrorKind::PermissionDenied
    {
        return ErrorContext::other(error.to_string())
            .with_suggestion("Check file ownership or run from a directory you can write to");
    }

    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::other(message)
}

fn create_error_context(error: BootstrapError) -> ErrorContext {
    match &error {
        BootstrapError::NoFeedForPlatform {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Download the installer manually from the project website")
            .with_details("Releases are published for mac/arm, mac/x86_64, win/x86_64, win/x86 and linux/x86_64"),
        BootstrapError::FeedFetchError {
            ..
        }
        | BootstrapError::DownloadError {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check your internet connection and run the bootstrapper again"),
        BootstrapError::FeedParseError {
            ..
        }
        | BootstrapError::NoReleasesAvailable
        | BootstrapError::UnrecognizedDownloadUrl {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("The release feed may be temporarily inconsistent; try again later"),
        BootstrapError::LocalWriteError {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Make sure the download directory exists, is writable and has free space"),
        BootstrapError::ChecksumMismatch {
            ..
        } => ErrorContext::new(error)
            .with_details("The downloaded installer was corrupted or altered in transit and was not run")
            .with_suggestion("Run the bootstrapper again to download a fresh copy"),
        BootstrapError::VerificationIoError {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check that nothing else is modifying or locking the downloaded file"),
        BootstrapError::MountedVolumeMissingApp {
            ..
        }
        | BootstrapError::ArtifactNotFoundInArchive {
            ..
        } => ErrorContext::new(error)
            .with_details("The downloaded package does not have the expected layout"),
        BootstrapError::CannotReplaceExistingInstall {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Quit the running application and remove the old copy manually"),
        BootstrapError::InstallStepFailed {
            ..
        } => ErrorContext::new(error).with_suggestion("Re-run with --verbose to see the failing command's output"),
        BootstrapError::Cancelled => ErrorContext::new(error),
    }
}
