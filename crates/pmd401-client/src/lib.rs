//! PMD401 Client
//!
//! Talks to a PMD401 controller (or the emulator) over a TCP connection that
//! is opened on first use and closed again after a period of inactivity.
//!
//! - [`lazy`]: [`LazyTcpStream`], the idle-closing transport
//! - [`timer`]: [`DelayedCallback`], the re-arming timer behind it
//! - [`client`]: [`Pmd401Client`], driver operations as request/reply exchanges

pub mod client;
pub mod error;
pub mod lazy;
pub mod timer;

pub use client::{ClientConfig, Pmd401Client, DEFAULT_ENCODER_MODE};
pub use error::{ClientError, ClientResult, TransportError, TransportResult};
pub use lazy::{LazyTcpStream, DEFAULT_CONNECT_TIMEOUT};
pub use timer::DelayedCallback;
