//! Error types for the lazy transport and the controller client.

use std::time::Duration;

use pmd401_proto::ReplyError;
use thiserror::Error;

/// Failures of the lazily connected TCP transport.
///
/// Connect failures leave the transport usable; the next call retries.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connecting to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed by peer")]
    Closed,

    #[error("transport has been torn down")]
    TornDown,
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Failures of a request/reply exchange with a controller.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("no reply within {0:?}")]
    Timeout(Duration),

    #[error("unexpected reply: {0}")]
    UnexpectedReply(#[from] ReplyError),

    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
