//! Installer integrity verification.
//!
//! Verifies a downloaded installer against the SHA-256 checksum published in
//! the release feed. This detects corrupted or incomplete downloads and
//! tampering in transit; the feed's TLS channel is trusted for authenticity.
//!
//! A mismatch is a policy result (`Ok(false)`), not an error. Only failing to
//! read the file is an error.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::core::BootstrapError;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Verifies downloaded files against expected SHA-256 checksums.
pub struct IntegrityVerifier;

impl IntegrityVerifier {
    /// Compute the lowercase hex SHA-256 of a file.
    ///
    /// The file is streamed through the hasher on the blocking thread pool,
    /// so large installers don't stall the async runtime.
    ///
    /// ```rust,no_run
    /// use appboot_cli::verify::IntegrityVerifier;
    /// use std::path::Path;
    ///
    /// # async fn example() -> Result<(), appboot_cli::core::BootstrapError> {
    /// let checksum = IntegrityVerifier::compute_sha256(Path::new("Mudlet.dmg")).await?;
    /// println!("SHA256: {checksum}");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn compute_sha256(file_path: &Path) -> Result<String, BootstrapError> {
        debug!("Computing SHA256 checksum for: {}", file_path.display());

        let path = file_path.to_path_buf();
        tokio::task::spawn_blocking(move || hash_file(&path))
            .await
            .map_err(|e| io_error(file_path, &e.to_string()))?
    }

    /// Check a file against `expected_hex`, ignoring case.
    ///
    /// Returns `Ok(false)` on a mismatch. Fails with
    /// [`BootstrapError::VerificationIoError`] if the file cannot be read.
    pub async fn verify(file_path: &Path, expected_hex: &str) -> Result<bool, BootstrapError> {
        info!("Verifying checksum for: {}", file_path.display());

        let actual = Self::compute_sha256(file_path).await?;
        let expected = expected_hex.trim();

        if actual.eq_ignore_ascii_case(expected) {
            info!("SHA-256 verification succeeded");
            Ok(true)
        } else {
            warn!("SHA-256 verification failed");
            warn!("Computed: {}", actual);
            warn!("Expected: {}", expected);
            Ok(false)
        }
    }
}

fn hash_file(path: &Path) -> Result<String, BootstrapError> {
    let file = File::open(path).map_err(|e| io_error(path, &e.to_string()))?;
    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let read = reader.read(&mut buffer).map_err(|e| io_error(path, &e.to_string()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

fn io_error(path: &Path, reason: &str) -> BootstrapError {
    BootstrapError::VerificationIoError {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}
