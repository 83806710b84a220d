//! Error types for the tracker binary.

/// Top-level error for the tracker binary.
///
/// Only startup failures end the process. Failures once the tracker is
/// running (a dropped channel, a failed REST fetch) are logged and
/// recovered from.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: bustrack_core::ConfigError,
    },

    /// The REST client could not be built.
    #[error("api error: {source}")]
    Api {
        /// The underlying client error.
        #[from]
        source: bustrack_client::ApiError,
    },

    /// Waiting for the shutdown signal failed.
    #[error("signal error: {0}")]
    Signal(#[from] std::io::Error),
}
