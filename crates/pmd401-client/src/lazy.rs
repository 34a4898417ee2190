//! TCP stream that connects on first use and disconnects when idle.
//!
//! Every `send`/`receive` pushes the idle deadline forward. A background
//! timer closes the socket once the deadline passes; the next call opens a
//! fresh connection transparently.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::{TransportError, TransportResult};
use crate::timer::DelayedCallback;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

struct Inner {
    stream: Option<TcpStream>,
    deadline: Instant,
    timer: Option<DelayedCallback>,
    /// Bumped on every connect so a stale timer never closes a newer socket.
    generation: u64,
    torn_down: bool,
}

impl Inner {
    fn drop_connection(&mut self) -> bool {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        self.stream.take().is_some()
    }
}

/// Lazily connected, idle-closing TCP stream.
pub struct LazyTcpStream {
    host: String,
    port: u16,
    idle_timeout: Duration,
    connect_timeout: Duration,
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for LazyTcpStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyTcpStream")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("idle_timeout", &self.idle_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

impl LazyTcpStream {
    pub fn new(host: impl Into<String>, port: u16, idle_timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            idle_timeout,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            inner: Arc::new(Mutex::new(Inner {
                stream: None,
                deadline: Instant::now(),
                timer: None,
                generation: 0,
                torn_down: false,
            })),
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Write all of `data`, connecting first if needed.
    pub async fn send(&self, data: &[u8]) -> TransportResult<()> {
        let mut guard = self.inner.lock().await;
        let stream = self.prepare(&mut guard).await?;

        tracing::trace!(
            host = %self.host,
            port = self.port,
            data = %String::from_utf8_lossy(data).escape_debug(),
            ">"
        );

        if let Err(e) = stream.write_all(data).await {
            self.disconnect(&mut guard, "write failed");
            return Err(e.into());
        }
        Ok(())
    }

    /// Read up to `max_bytes`, connecting first if needed.
    ///
    /// Returns whatever a single read yields. A zero-byte read from the peer
    /// closes the connection and reports [`TransportError::Closed`].
    ///
    /// The transport lock is held until the read completes and there is no
    /// read timeout here, so `send`, `teardown` and the idle timer wait for
    /// a silent peer. Bound the wait with `tokio::time::timeout`; dropping
    /// the future releases the lock.
    pub async fn receive(&self, max_bytes: usize) -> TransportResult<Vec<u8>> {
        let mut guard = self.inner.lock().await;
        if guard.torn_down {
            return Err(TransportError::TornDown);
        }
        if max_bytes == 0 {
            return Ok(Vec::new());
        }
        let stream = self.prepare(&mut guard).await?;

        let mut buf = vec![0u8; max_bytes];
        match stream.read(&mut buf).await {
            Ok(0) => {
                self.disconnect(&mut guard, "peer closed");
                Err(TransportError::Closed)
            }
            Ok(n) => {
                buf.truncate(n);
                tracing::trace!(
                    host = %self.host,
                    port = self.port,
                    data = %String::from_utf8_lossy(&buf).escape_debug(),
                    "<"
                );
                Ok(buf)
            }
            Err(e) => {
                self.disconnect(&mut guard, "read failed");
                Err(e.into())
            }
        }
    }

    /// Close the connection for good. Idempotent.
    ///
    /// Waits for an in-flight `receive` to finish first.
    pub async fn teardown(&self) {
        let mut guard = self.inner.lock().await;
        guard.torn_down = true;
        self.disconnect(&mut guard, "teardown");
    }

    /// Drop the current connection, if any. The next call reconnects.
    ///
    /// Anything the peer still sends on the old connection is lost.
    pub async fn reset(&self) {
        let mut guard = self.inner.lock().await;
        self.disconnect(&mut guard, "reset");
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.lock().await.stream.is_some()
    }

    /// Push the deadline forward and make sure a socket is open.
    async fn prepare<'a>(&self, inner: &'a mut Inner) -> TransportResult<&'a mut TcpStream> {
        if inner.torn_down {
            return Err(TransportError::TornDown);
        }
        inner.deadline = Instant::now() + self.idle_timeout;

        let stream = match inner.stream.take() {
            Some(stream) => stream,
            None => {
                let stream = self.connect().await?;
                inner.generation = inner.generation.wrapping_add(1);
                inner.timer = Some(self.arm_idle_timer(inner.generation));
                stream
            }
        };
        Ok(inner.stream.insert(stream))
    }

    async fn connect(&self) -> TransportResult<TcpStream> {
        let addr = format!("{}:{}", self.host, self.port);
        tracing::debug!(host = %self.host, port = self.port, "connecting");

        let connect = TcpStream::connect((self.host.as_str(), self.port));
        let stream = match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(TransportError::Connect { addr, source }),
            Err(_) => {
                return Err(TransportError::ConnectTimeout {
                    addr,
                    timeout: self.connect_timeout,
                })
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(error = %e, "failed to set TCP_NODELAY");
        }
        Ok(stream)
    }

    fn disconnect(&self, inner: &mut Inner, reason: &str) {
        if inner.drop_connection() {
            tracing::debug!(host = %self.host, port = self.port, reason, "disconnecting");
        }
    }

    fn arm_idle_timer(&self, generation: u64) -> DelayedCallback {
        let weak: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);
        let host = self.host.clone();
        let port = self.port;

        DelayedCallback::spawn(self.idle_timeout, move || {
            let weak = weak.clone();
            let host = host.clone();
            async move {
                let shared = weak.upgrade()?;
                let mut inner = shared.lock().await;
                if inner.generation != generation || inner.stream.is_none() {
                    return None;
                }

                let now = Instant::now();
                if now < inner.deadline {
                    return Some(inner.deadline - now);
                }

                tracing::debug!(host = %host, port, reason = "idle", "disconnecting");
                inner.stream = None;
                // this task is the timer; detach rather than abort
                inner.timer = None;
                None
            }
        })
    }
}

impl Drop for LazyTcpStream {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.try_lock() {
            if let Some(timer) = inner.timer.take() {
                timer.cancel();
            }
        }
    }
}
