//! PMD401 controller client.
//!
//! Driver-facing operations expressed as request/reply exchanges over a
//! [`LazyTcpStream`]. Each exchange holds the client's exchange lock, so
//! concurrent callers never read each other's replies.
//!
//! # Usage
//!
//! ```rust,no_run
//! use pmd401_client::{ClientConfig, Pmd401Client};
//!
//! # async fn run() -> Result<(), pmd401_client::ClientError> {
//! let client = Pmd401Client::new(&ClientConfig::default())?;
//! for channel in client.get_channel_numbers().await? {
//!     let encoder = client.get_encoder_position(channel).await?;
//!     println!("channel {channel}: encoder at {encoder}");
//! }
//! client.teardown().await;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use bytes::BytesMut;
use pmd401_proto::{
    parse_channel_list, parse_config_reply, parse_value_reply, take_reply_line, Delimiter,
    Request, DEFAULT_HOST, DEFAULT_PORT,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::instrument;

use crate::error::{ClientError, ClientResult};
use crate::lazy::LazyTcpStream;

/// Bytes requested from the transport per read.
const READ_CHUNK: usize = 4096;

/// Encoder mode written by [`Pmd401Client::configure_encoder`] unless configured.
pub const DEFAULT_ENCODER_MODE: u32 = 6;

/// Configuration for the controller client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Controller address (default: 127.0.0.1)
    #[serde(default = "default_host")]
    pub host: String,
    /// Controller port (default: 4001)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Close the connection after this long without traffic (default: 10000)
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    /// Give up connecting after this long (default: 5000)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Give up waiting for a reply after this long (default: 2000)
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,
    /// Argument for the encoder configuration command (default: 6)
    #[serde(default = "default_encoder_mode")]
    pub encoder_mode: u32,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_idle_timeout_ms() -> u64 {
    10_000
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_reply_timeout_ms() -> u64 {
    2_000
}

fn default_encoder_mode() -> u32 {
    DEFAULT_ENCODER_MODE
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            idle_timeout_ms: default_idle_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            reply_timeout_ms: default_reply_timeout_ms(),
            encoder_mode: default_encoder_mode(),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> ClientResult<()> {
        if self.host.trim().is_empty() {
            return Err(ClientError::Configuration("host must not be empty".into()));
        }
        for (name, value) in [
            ("idle_timeout_ms", self.idle_timeout_ms),
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("reply_timeout_ms", self.reply_timeout_ms),
        ] {
            if value == 0 {
                return Err(ClientError::Configuration(format!("{name} must be positive")));
            }
        }
        Ok(())
    }
}

/// Client for one PMD401 controller.
#[derive(Debug)]
pub struct Pmd401Client {
    transport: LazyTcpStream,
    reply_timeout: Duration,
    encoder_mode: u32,
    /// Exchange lock; guards the buffer of received, not yet consumed bytes.
    exchange: Mutex<BytesMut>,
}

impl Pmd401Client {
    /// Create a client. No connection is made until the first request.
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let transport = LazyTcpStream::new(
            config.host.clone(),
            config.port,
            Duration::from_millis(config.idle_timeout_ms),
        )
        .with_connect_timeout(Duration::from_millis(config.connect_timeout_ms));

        Ok(Self {
            transport,
            reply_timeout: Duration::from_millis(config.reply_timeout_ms),
            encoder_mode: config.encoder_mode,
            exchange: Mutex::new(BytesMut::with_capacity(READ_CHUNK)),
        })
    }

    pub fn transport(&self) -> &LazyTcpStream {
        &self.transport
    }

    /// Enumerate the controller's channels.
    ///
    /// The listing has no terminator of its own, so a status query is sent
    /// behind it and the listing ends where the status reply begins.
    #[instrument(skip(self), err)]
    pub async fn get_channel_numbers(&self) -> ClientResult<Vec<u32>> {
        let mut buf = self.begin_exchange().await;
        self.transport
            .send(&Request::ListChannels.encode(Delimiter::Newline))
            .await?;
        self.transport
            .send(&Request::Status.encode(Delimiter::Newline))
            .await?;

        let deadline = Instant::now() + self.reply_timeout;
        loop {
            if let Some(end) = buf.iter().position(|&b| b == b'\r') {
                let listing = buf.split_to(end + 1);
                let channels = parse_channel_list(&listing)?;
                tracing::debug!(?channels, "enumerated channels");
                return Ok(channels);
            }
            self.fill(&mut buf, deadline).await?;
        }
    }

    #[instrument(skip(self), err)]
    pub async fn get_target_position(&self, channel: u32) -> ClientResult<i64> {
        let line = self.ask(&Request::ReadTarget { channel }).await?;
        Ok(parse_value_reply(&line, channel, "T")?)
    }

    /// Set a new target; returns the target it replaced.
    #[instrument(skip(self), err)]
    pub async fn set_target_position(&self, channel: u32, position: i64) -> ClientResult<i64> {
        let request = Request::WriteTarget {
            channel,
            value: position,
        };
        let line = self.ask(&request).await?;
        Ok(parse_value_reply(&line, channel, "T")?)
    }

    #[instrument(skip(self), err)]
    pub async fn get_encoder_position(&self, channel: u32) -> ClientResult<i64> {
        let line = self.ask(&Request::ReadEncoder { channel }).await?;
        Ok(parse_value_reply(&line, channel, "E")?)
    }

    #[instrument(skip(self), err)]
    pub async fn get_encoder_config(&self, channel: u32) -> ClientResult<String> {
        let line = self.ask(&Request::ReadEncoderConfig { channel }).await?;
        Ok(parse_config_reply(&line, channel)?)
    }

    /// Write the configured encoder mode. The controller sends no reply.
    #[instrument(skip(self), fields(mode = self.encoder_mode), err)]
    pub async fn configure_encoder(&self, channel: u32) -> ClientResult<()> {
        let _guard = self.begin_exchange().await;
        let argument = self.encoder_mode.to_string();
        let request = Request::WriteEncoderConfig {
            channel,
            argument: &argument,
        };
        self.transport.send(&request.encode(Delimiter::Silent)).await?;
        Ok(())
    }

    /// Halt a channel where it stands by making its encoder position the
    /// new target. Returns that position.
    #[instrument(skip(self), err)]
    pub async fn stop(&self, channel: u32) -> ClientResult<i64> {
        let mut buf = self.begin_exchange().await;

        let line = self
            .exchange_line(&mut buf, &Request::ReadEncoder { channel }.encode(Delimiter::Newline))
            .await?;
        let position = parse_value_reply(&line, channel, "E")?;

        let request = Request::WriteTarget {
            channel,
            value: position,
        };
        let line = self
            .exchange_line(&mut buf, &request.encode(Delimiter::Newline))
            .await?;
        parse_value_reply(&line, channel, "T")?;

        Ok(position)
    }

    /// Send an arbitrary request and return the first reply line.
    ///
    /// A `\n` is appended unless the line already ends in a delimiter.
    /// Requests ending in `;` get no reply and therefore time out.
    #[instrument(skip(self), err)]
    pub async fn raw_ask(&self, line: &str) -> ClientResult<String> {
        let mut buf = self.begin_exchange().await;
        self.exchange_line(&mut buf, &with_delimiter(line)).await
    }

    /// Send an arbitrary request without waiting for a reply.
    #[instrument(skip(self), err)]
    pub async fn raw_send(&self, line: &str) -> ClientResult<()> {
        let _guard = self.begin_exchange().await;
        self.transport.send(&with_delimiter(line)).await?;
        Ok(())
    }

    /// Close the connection for good.
    pub async fn teardown(&self) {
        self.transport.teardown().await;
    }

    async fn ask(&self, request: &Request<'_>) -> ClientResult<String> {
        let mut buf = self.begin_exchange().await;
        self.exchange_line(&mut buf, &request.encode(Delimiter::Newline))
            .await
    }

    /// Take the exchange lock, discarding bytes left over from earlier
    /// exchanges, such as extra lines of a multi-line reply. A reply that
    /// misses its deadline is dropped with its connection in `fill`.
    async fn begin_exchange(&self) -> tokio::sync::MutexGuard<'_, BytesMut> {
        let mut buf = self.exchange.lock().await;
        if !buf.is_empty() {
            tracing::debug!(
                stale = %String::from_utf8_lossy(&buf).escape_debug(),
                "discarding stale reply bytes"
            );
            buf.clear();
        }
        buf
    }

    async fn exchange_line(&self, buf: &mut BytesMut, request: &[u8]) -> ClientResult<String> {
        self.transport.send(request).await?;

        let deadline = Instant::now() + self.reply_timeout;
        loop {
            if let Some(line) = take_reply_line(buf) {
                return Ok(line);
            }
            self.fill(buf, deadline).await?;
        }
    }

    async fn fill(&self, buf: &mut BytesMut, deadline: Instant) -> ClientResult<()> {
        let received = tokio::time::timeout_at(deadline, self.transport.receive(READ_CHUNK)).await;
        match received {
            Ok(Ok(chunk)) => {
                buf.extend_from_slice(&chunk);
                Ok(())
            }
            Ok(Err(e)) => {
                buf.clear();
                Err(e.into())
            }
            Err(_) => {
                // a late reply goes down with the old connection
                tracing::debug!(
                    timeout = ?self.reply_timeout,
                    "reply timed out, dropping connection"
                );
                buf.clear();
                self.transport.reset().await;
                Err(ClientError::Timeout(self.reply_timeout))
            }
        }
    }
}

fn with_delimiter(line: &str) -> Vec<u8> {
    let mut bytes = line.as_bytes().to_vec();
    if !matches!(bytes.last(), Some(b'\n' | b'\r' | b';')) {
        bytes.push(b'\n');
    }
    bytes
}
