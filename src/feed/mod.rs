//! Release feed resolution.
//!
//! A release feed is a hosted JSON document listing the most recent releases
//! for one platform on one channel. This module turns a [`PlatformKey`] and a
//! [`ReleaseChannel`] into a feed URL ([`FeedLocator`]) and a fetched feed into
//! a validated [`DownloadDescriptor`] ([`ReleaseFeedClient`]).
//!
//! # Feed URL layout
//!
//! ```text
//! {base_url}{channel segment}/{platform key}
//! https://feeds.dblsqd.com/MKMMR7HNSP65PquQQbiDIw/release/mac/arm
//! https://feeds.dblsqd.com/MKMMR7HNSP65PquQQbiDIw/public-test-build/win/x86_64
//! ```

mod client;

pub use client::{ReleaseFeedClient, derive_file_name, parse_feed};

use crate::platform::PlatformKey;
use std::fmt;
use std::str::FromStr;

/// Default feed host and account prefix.
pub const DEFAULT_FEED_BASE_URL: &str = "https://feeds.dblsqd.com/MKMMR7HNSP65PquQQbiDIw/";

/// Release track to install from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleaseChannel {
    /// Regular releases
    #[default]
    Stable,
    /// Public test builds
    Beta,
}

impl ReleaseChannel {
    /// Map the configured `RELEASE_TYPE` value onto a channel.
    ///
    /// Only the exact value `PTB` selects the beta channel.
    #[must_use]
    pub fn from_release_type(release_type: &str) -> Self {
        if release_type == "PTB" {
            Self::Beta
        } else {
            Self::Stable
        }
    }

    /// Path segment used in the feed URL.
    #[must_use]
    pub const fn feed_segment(self) -> &'static str {
        match self {
            Self::Stable => "release",
            Self::Beta => "public-test-build",
        }
    }
}

impl fmt::Display for ReleaseChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable => f.write_str("stable"),
            Self::Beta => f.write_str("beta"),
        }
    }
}

impl FromStr for ReleaseChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stable" | "release" => Ok(Self::Stable),
            "beta" | "ptb" | "public-test-build" => Ok(Self::Beta),
            other => Err(format!("unknown release channel '{other}' (expected stable or beta)")),
        }
    }
}

/// Builds feed URLs from a fixed base address.
#[derive(Debug, Clone)]
pub struct FeedLocator {
    base_url: String,
}

impl Default for FeedLocator {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_BASE_URL)
    }
}

impl FeedLocator {
    /// Create a locator for `base_url`. A trailing `/` is added if missing.
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            base_url,
        }
    }

    /// Feed URL for `platform` on `channel`, or `None` if the platform has no feed.
    #[must_use]
    pub fn locate(&self, platform: PlatformKey, channel: ReleaseChannel) -> Option<String> {
        if !PlatformKey::SUPPORTED.contains(&platform) {
            return None;
        }
        Some(format!("{}{}/{}", self.base_url, channel.feed_segment(), platform.as_str()))
    }
}

/// Validated result of a feed fetch.
///
/// All three fields are non-empty; the pipeline never proceeds with a
/// partial descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadDescriptor {
    /// Where to download the installer from
    pub download_url: String,
    /// Expected SHA-256 of the installer, hex, compared case-insensitively
    pub expected_checksum: String,
    /// Local file name derived from the download URL
    pub file_name: String,
}
