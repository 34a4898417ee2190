//! TCP connection server.
//!
//! One task per accepted connection. Each session reads into a
//! [`FrameBuffer`], dispatches every complete line against the shared
//! [`Controller`] and writes the reply back, until the peer closes the stream
//! or the socket fails. A peer that resets mid-write ends its own session and
//! nothing else.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use pmd401_proto::{Frame, FrameBuffer, Reply};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::Instrument;

use crate::controller::Controller;
use crate::dispatch::handle_line;
use crate::error::{EmuError, EmuResult};

const READ_CHUNK: usize = 4096;

pub struct EmulatorServer {
    listener: TcpListener,
    controller: Arc<Controller>,
}

impl EmulatorServer {
    /// Bind the listener. Port 0 picks a free port, see [`Self::local_addr`].
    pub async fn bind<A>(addr: A, controller: Arc<Controller>) -> EmuResult<Self>
    where
        A: ToSocketAddrs + std::fmt::Debug,
    {
        let display = format!("{addr:?}");
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| EmuError::Bind {
                addr: display,
                source,
            })?;

        Ok(Self {
            listener,
            controller,
        })
    }

    pub fn local_addr(&self) -> EmuResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever.
    pub async fn serve(self) -> EmuResult<()> {
        self.serve_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// Sessions already running are left to finish on their own.
    pub async fn serve_until<F>(self, shutdown: F) -> EmuResult<()>
    where
        F: Future<Output = ()>,
    {
        let local = self.local_addr()?;
        tracing::info!(%local, "PMD401 emulator listening");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!(%local, "emulator no longer accepting connections");
                    return Ok(());
                }
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => self.spawn_session(stream, peer),
                        Err(e) => tracing::error!(error = %e, "accept error"),
                    }
                }
            }
        }
    }

    fn spawn_session(&self, stream: TcpStream, peer: SocketAddr) {
        let controller = self.controller.clone();
        let span = tracing::info_span!("session", %peer);

        tokio::spawn(
            async move {
                tracing::info!("client connected");
                match handle_session(stream, &controller).await {
                    Ok(()) => tracing::info!("client disconnected"),
                    Err(e) => tracing::warn!(error = %e, "session ended with error"),
                }
            }
            .instrument(span),
        );
    }
}

/// Errors that just mean the peer went away.
fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}

async fn handle_session(mut stream: TcpStream, controller: &Controller) -> io::Result<()> {
    let mut frames = FrameBuffer::new();
    let mut buf = vec![0u8; READ_CHUNK];

    let result = 'session: loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) => break 'session Ok(()),
            Ok(n) => n,
            Err(e) if is_disconnect(&e) => {
                tracing::debug!(error = %e, "peer reset connection");
                break 'session Ok(());
            }
            Err(e) => break 'session Err(e),
        };
        frames.extend(&buf[..n]);

        while let Some(frame) = frames.next_frame() {
            let reply = match frame {
                Frame::Line { line, delimiter } => handle_line(controller, &line, delimiter),
                Frame::Overflow => {
                    tracing::debug!("request line too long");
                    Some(Reply::ParseError)
                }
            };
            let Some(reply) = reply else {
                continue;
            };

            match stream.write_all(&reply.encode()).await {
                Ok(()) => {}
                Err(e) if is_disconnect(&e) => {
                    tracing::debug!(error = %e, "peer closed connection during write");
                    break 'session Ok(());
                }
                Err(e) => break 'session Err(e),
            }
        }
    };

    if let Some(rest) = frames.take_remainder() {
        tracing::debug!(
            discarded = %String::from_utf8_lossy(&rest),
            "unterminated input at end of stream"
        );
    }

    // write side first, then the socket drops
    let _ = stream.shutdown().await;
    result
}
