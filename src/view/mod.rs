//! Progress view shown while the bootstrapper runs.
//!
//! The pipeline reports through the [`ProgressView`] contract: a status line,
//! an optional completion percentage and a final close. [`TerminalProgressView`]
//! renders it with `indicatif`.
//!
//! # Environment Variables
//!
//! - `APPBOOT_NO_PROGRESS`: set to any value to hide the progress bar

use indicatif::{ProgressBar, ProgressStyle};

/// Environment variable that hides the terminal progress bar.
pub const NO_PROGRESS_ENV: &str = "APPBOOT_NO_PROGRESS";

/// Sink for user-visible progress.
///
/// Implementations use interior mutability so a view can be shared between
/// the controller and whoever created it.
pub trait ProgressView: Send + Sync {
    /// Replace the status line.
    fn set_status_text(&self, text: &str);

    /// Set the completion percentage; `None` means indeterminate.
    fn set_progress_percent(&self, percent: Option<u8>);

    /// Dismiss the view after a successful run.
    fn close(&self);

    /// Stop the view after a failed run, leaving the last status visible.
    fn abandon(&self);
}

fn is_progress_disabled() -> bool {
    std::env::var(NO_PROGRESS_ENV).is_ok()
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("[{bar:40.cyan/blue}] {pos:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━╸━")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"])
}

/// [`ProgressView`] backed by an `indicatif` bar on stderr.
///
/// Shows a spinner while the percentage is unknown and switches to a bar
/// once the download reports a total. Hidden when `APPBOOT_NO_PROGRESS` is
/// set.
#[derive(Clone)]
pub struct TerminalProgressView {
    bar: ProgressBar,
}

impl TerminalProgressView {
    /// Create a view, hidden if progress output is disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::with_hidden(false)
    }

    /// Create a view that is hidden when `hidden` is set or progress output
    /// is disabled through the environment.
    #[must_use]
    pub fn with_hidden(hidden: bool) -> Self {
        let bar = if hidden || is_progress_disabled() {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(100);
            bar.set_style(spinner_style());
            bar.enable_steady_tick(std::time::Duration::from_millis(100));
            bar
        };
        Self {
            bar,
        }
    }

    /// Whether the bar is drawn at all.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.bar.is_hidden()
    }
}

impl Default for TerminalProgressView {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressView for TerminalProgressView {
    fn set_status_text(&self, text: &str) {
        self.bar.set_message(text.to_string());
    }

    fn set_progress_percent(&self, percent: Option<u8>) {
        if let Some(percent) = percent {
            self.bar.set_style(bar_style());
            self.bar.set_position(u64::from(percent.min(100)));
        } else {
            self.bar.set_style(spinner_style());
        }
    }

    fn close(&self) {
        self.bar.finish();
    }

    fn abandon(&self) {
        self.bar.abandon();
    }
}
