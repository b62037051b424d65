use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use super::DownloadDescriptor;
use crate::core::BootstrapError;
use crate::platform::{OsFamily, PlatformKey};
use crate::transport::HttpTransport;

/// Last path segment followed by a recognised installer extension.
static INSTALLER_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/([^/]+)\.(exe|dmg|AppImage\.tar)$").expect("installer pattern is valid")
});

/// Fetches a release feed and turns it into a [`DownloadDescriptor`].
pub struct ReleaseFeedClient {
    transport: Arc<dyn HttpTransport>,
    platform: PlatformKey,
    deadline: Duration,
}

impl ReleaseFeedClient {
    /// Create a client for `platform`, whose naming rule applies to derived file names.
    pub fn new(transport: Arc<dyn HttpTransport>, platform: PlatformKey, deadline: Duration) -> Self {
        Self {
            transport,
            platform,
            deadline,
        }
    }

    /// GET the feed at `url` and parse it.
    ///
    /// The whole request, including reading the body, must finish within the
    /// client's deadline.
    pub async fn fetch(&self, url: &str) -> Result<DownloadDescriptor, BootstrapError> {
        let request = async {
            let body = self.transport.get(url).await?;
            body.collect().await
        };

        let body = match timeout(self.deadline, request).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => {
                return Err(BootstrapError::FeedFetchError {
                    url: url.to_string(),
                    reason: e.message,
                });
            }
            Err(_) => {
                return Err(BootstrapError::FeedFetchError {
                    url: url.to_string(),
                    reason: format!("timed out after {} seconds", self.deadline.as_secs()),
                });
            }
        };

        parse_feed(&body, self.platform)
    }
}

/// Parse a feed body into a descriptor.
///
/// Only `releases[0].download` is consulted. A missing `releases` key counts
/// as an empty list.
pub fn parse_feed(body: &[u8], platform: PlatformKey) -> Result<DownloadDescriptor, BootstrapError> {
    let document: Value = serde_json::from_slice(body).map_err(|e| BootstrapError::FeedParseError {
        reason: e.to_string(),
    })?;

    let Some(root) = document.as_object() else {
        return Err(BootstrapError::FeedParseError {
            reason: "feed document is not a JSON object".to_string(),
        });
    };

    let first = root
        .get("releases")
        .and_then(Value::as_array)
        .and_then(|releases| releases.first())
        .ok_or(BootstrapError::NoReleasesAvailable)?;

    let download = first.get("download");
    let field = |name: &str| {
        download.and_then(|d| d.get(name)).and_then(Value::as_str).unwrap_or_default().trim().to_string()
    };
    let expected_checksum = field("sha256");
    let download_url = field("url");

    debug!("SHA-256: {}", expected_checksum);
    debug!("URL: {}", download_url);

    if expected_checksum.is_empty() {
        return Err(BootstrapError::FeedParseError {
            reason: "latest release has no sha256 checksum".to_string(),
        });
    }

    let file_name = derive_file_name(&download_url, platform).ok_or_else(|| {
        BootstrapError::UnrecognizedDownloadUrl {
            url: download_url.clone(),
        }
    })?;

    Ok(DownloadDescriptor {
        download_url,
        expected_checksum,
        file_name,
    })
}

/// Derive the local installer file name from a download URL.
///
/// The URL must end in `/<name>.exe`, `/<name>.dmg` or `/<name>.AppImage.tar`.
/// macOS and Linux keep the extension so the install step can recognise the
/// container; every other platform gets the bare name.
#[must_use]
pub fn derive_file_name(url: &str, platform: PlatformKey) -> Option<String> {
    let captures = INSTALLER_FILE.captures(url)?;
    let stem = &captures[1];
    let extension = &captures[2];

    match platform.os_family() {
        Some(OsFamily::Mac | OsFamily::Linux) => Some(format!("{stem}.{extension}")),
        _ => Some(stem.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{HttpBody, TransportError};
    use async_trait::async_trait;

    const CHECKSUM: &str = "ABCDEF0123456789ABCDEF0123456789ABCDEF0123456789ABCDEF0123456789";

    struct StaticTransport(Result<Vec<u8>, TransportError>);

    #[async_trait]
    impl HttpTransport for StaticTransport {
        async fn get(&self, _url: &str) -> Result<HttpBody, TransportError> {
            self.0.clone().map(|bytes| HttpBody::from_bytes(bytes, 16))
        }
    }

    struct HangingTransport;

    #[async_trait]
    impl HttpTransport for HangingTransport {
        async fn get(&self, _url: &str) -> Result<HttpBody, TransportError> {
            std::future::pending().await
        }
    }

    fn feed(url: &str) -> Vec<u8> {
        serde_json::json!({
            "releases": [
                { "download": { "url": url, "sha256": CHECKSUM } },
                { "download": { "url": "https://x/y/Old-1.0.0.exe", "sha256": "00" } }
            ]
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_derive_file_name_windows_strips_extension() {
        assert_eq!(
            derive_file_name("https://x/y/Foo-1.2.3.exe", PlatformKey::WinX86_64).as_deref(),
            Some("Foo-1.2.3")
        );
        assert_eq!(
            derive_file_name("https://x/y/Foo-1.2.3.exe", PlatformKey::WinX86).as_deref(),
            Some("Foo-1.2.3")
        );
    }

    #[test]
    fn test_derive_file_name_mac_and_linux_keep_extension() {
        assert_eq!(
            derive_file_name("https://x/y/Foo-1.2.3.exe", PlatformKey::LinuxX86_64).as_deref(),
            Some("Foo-1.2.3.exe")
        );
        assert_eq!(
            derive_file_name("https://x/Mudlet-4.19.1.dmg", PlatformKey::MacArm).as_deref(),
            Some("Mudlet-4.19.1.dmg")
        );
        assert_eq!(
            derive_file_name("https://x/Mudlet-4.19.1-linux-x64.AppImage.tar", PlatformKey::LinuxX86_64)
                .as_deref(),
            Some("Mudlet-4.19.1-linux-x64.AppImage.tar")
        );
    }

    #[test]
    fn test_derive_file_name_is_idempotent() {
        let url = "https://x/y/Foo-1.2.3.exe";
        let first = derive_file_name(url, PlatformKey::WinX86_64);
        let second = derive_file_name(url, PlatformKey::WinX86_64);
        assert_eq!(first, second);
    }

    #[test]
    fn test_derive_file_name_rejects_unknown_extensions() {
        assert_eq!(derive_file_name("https://x/y/Foo-1.2.3.zip", PlatformKey::WinX86_64), None);
        assert_eq!(derive_file_name("https://x/y/Foo.exe?token=1", PlatformKey::WinX86_64), None);
        assert_eq!(derive_file_name("", PlatformKey::MacArm), None);
    }

    #[test]
    fn test_parse_feed_takes_first_release() {
        let descriptor = parse_feed(&feed("https://x/y/App-9.9.9.exe"), PlatformKey::WinX86_64).unwrap();
        assert_eq!(descriptor.download_url, "https://x/y/App-9.9.9.exe");
        assert_eq!(descriptor.expected_checksum, CHECKSUM);
        assert!(descriptor.expected_checksum.eq_ignore_ascii_case(&CHECKSUM.to_lowercase()));
        assert_eq!(descriptor.file_name, "App-9.9.9");
    }

    #[test]
    fn test_parse_feed_empty_releases() {
        let body = br#"{"releases": []}"#;
        assert_eq!(parse_feed(body, PlatformKey::MacArm), Err(BootstrapError::NoReleasesAvailable));
        assert_eq!(parse_feed(b"{}", PlatformKey::MacArm), Err(BootstrapError::NoReleasesAvailable));
    }

    #[test]
    fn test_parse_feed_rejects_non_object() {
        assert!(matches!(
            parse_feed(b"[1, 2, 3]", PlatformKey::MacArm),
            Err(BootstrapError::FeedParseError { .. })
        ));
        assert!(matches!(
            parse_feed(b"<html>oops</html>", PlatformKey::MacArm),
            Err(BootstrapError::FeedParseError { .. })
        ));
    }

    #[test]
    fn test_parse_feed_requires_checksum() {
        let body = br#"{"releases": [{"download": {"url": "https://x/App.exe"}}]}"#;
        assert!(matches!(
            parse_feed(body, PlatformKey::WinX86_64),
            Err(BootstrapError::FeedParseError { .. })
        ));
    }

    #[test]
    fn test_parse_feed_unrecognised_url() {
        let result = parse_feed(&feed("https://x/y/App-9.9.9.msi"), PlatformKey::WinX86_64);
        assert_eq!(
            result,
            Err(BootstrapError::UnrecognizedDownloadUrl {
                url: "https://x/y/App-9.9.9.msi".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_fetch_maps_transport_error() {
        let client = ReleaseFeedClient::new(
            Arc::new(StaticTransport(Err(TransportError::new("HTTP 503")))),
            PlatformKey::MacArm,
            Duration::from_secs(5),
        );
        let err = client.fetch("https://feed").await.unwrap_err();
        assert_eq!(
            err,
            BootstrapError::FeedFetchError {
                url: "https://feed".to_string(),
                reason: "HTTP 503".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_fetch_parses_body() {
        let client = ReleaseFeedClient::new(
            Arc::new(StaticTransport(Ok(feed("https://x/y/App-9.9.9.dmg")))),
            PlatformKey::MacX86_64,
            Duration::from_secs(5),
        );
        let descriptor = client.fetch("https://feed").await.unwrap();
        assert_eq!(descriptor.file_name, "App-9.9.9.dmg");
    }

    #[tokio::test]
    async fn test_fetch_deadline() {
        let client =
            ReleaseFeedClient::new(Arc::new(HangingTransport), PlatformKey::MacArm, Duration::from_millis(50));
        let err = client.fetch("https://feed").await.unwrap_err();
        match err {
            BootstrapError::FeedFetchError {
                reason,
                ..
            } => assert!(reason.contains("timed out")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
