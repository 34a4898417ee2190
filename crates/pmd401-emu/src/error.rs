//! Error types for the emulator.

use thiserror::Error;

/// Channel store failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// Requested channel index is not in `0..count`.
    #[error("channel {index} out of range (controller has {count} channels)")]
    ChannelOutOfRange { index: u32, count: u32 },
}

/// Failures starting or running the emulator.
#[derive(Error, Debug)]
pub enum EmuError {
    /// Listener could not be bound.
    ///
    /// **Recovery Strategy**: pick another port or stop whatever holds it.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Accept loop or socket query failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration values parse but make no sense (zero channels, zero tick).
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// The server task panicked or was cancelled.
    #[error("server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Convenience alias for emulator results.
pub type EmuResult<T> = std::result::Result<T, EmuError>;
