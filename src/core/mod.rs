//! Core types shared across the bootstrapper: the error taxonomy, the
//! user-facing error context, and process exit codes.

pub mod error;

pub use error::{
    BootstrapError, ErrorContext, EXIT_CANCELLED, EXIT_DOWNLOAD, EXIT_FEED, EXIT_GENERIC,
    EXIT_INSTALL, EXIT_VERIFY, user_friendly_error,
};
