//! Loopback-only TCP listener for the admin protocol.
//!
//! Each accepted connection runs its own [`Session`]. Requests and responses
//! are newline-delimited JSON. A session is closed after a malformed line,
//! after `idle_timeout` without a complete line, or once `max_session` has
//! elapsed since it was accepted.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::constants::MAX_ADMIN_LINE_BYTES;

use super::commands::AdminContext;
use super::protocol::Frame;
use super::session::{Outcome, Session};

/// Time limits applied to every admin session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    pub idle_timeout: Duration,
    pub max_session: Duration,
}

/// Only loopback peers may use the admin protocol.
pub fn is_local_peer(peer: &SocketAddr) -> bool {
    peer.ip().to_canonical().is_loopback()
}

enum ReadLine {
    Line(String),
    Eof,
    TooLong,
    NotUtf8,
}

async fn read_request_line<R>(reader: &mut BufReader<R>, buf: &mut Vec<u8>) -> std::io::Result<ReadLine>
where
    R: AsyncRead + Unpin,
{
    buf.clear();
    let limit = (MAX_ADMIN_LINE_BYTES + 1) as u64;
    let read = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if read == 0 {
        return Ok(ReadLine::Eof);
    }
    if buf.last() != Some(&b'\n') && buf.len() > MAX_ADMIN_LINE_BYTES {
        return Ok(ReadLine::TooLong);
    }
    match std::str::from_utf8(buf) {
        Ok(line) => Ok(ReadLine::Line(line.trim().to_string())),
        Err(_) => Ok(ReadLine::NotUtf8),
    }
}

async fn write_frame<W>(writer: &mut W, frame: &Frame) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame.to_line().as_bytes()).await?;
    writer.flush().await
}

/// Serve one admin connection until it closes.
///
/// Connections from non-loopback peers are closed without a response.
pub async fn serve_session<S>(stream: S, peer: SocketAddr, ctx: Arc<AdminContext>, limits: SessionLimits)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    if !is_local_peer(&peer) {
        warn!(peer = %peer, "Rejected non-local admin connection");
        let _ = writer.shutdown().await;
        return;
    }

    info!(peer = %peer, "Admin session opened");
    let mut reader = BufReader::new(reader);
    let mut session = Session::new(ctx);
    let deadline = Instant::now() + limits.max_session;
    let mut buf = Vec::new();

    loop {
        let read = tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {
                let _ = write_frame(&mut writer, &Frame::error("session expired")).await;
                debug!(peer = %peer, "Admin session reached its time limit");
                break;
            }
            read = tokio::time::timeout(limits.idle_timeout, read_request_line(&mut reader, &mut buf)) => read,
        };

        let line = match read {
            Err(_) => {
                let _ = write_frame(&mut writer, &Frame::error("session idle timeout")).await;
                debug!(peer = %peer, "Admin session idle");
                break;
            }
            Ok(Err(e)) => {
                warn!(peer = %peer, error = %e, "Admin read failed");
                break;
            }
            Ok(Ok(ReadLine::Eof)) => break,
            Ok(Ok(ReadLine::TooLong)) => {
                let _ = write_frame(&mut writer, &Frame::error("malformed request: line too long")).await;
                break;
            }
            Ok(Ok(ReadLine::NotUtf8)) => {
                let _ = write_frame(&mut writer, &Frame::error("malformed request: invalid UTF-8")).await;
                break;
            }
            Ok(Ok(ReadLine::Line(line))) => line,
        };

        if line.is_empty() {
            continue;
        }

        let (frame, outcome) = session.handle_line(&line).await;
        if let Err(e) = write_frame(&mut writer, &frame).await {
            warn!(peer = %peer, error = %e, "Admin write failed");
            break;
        }
        if outcome == Outcome::Close {
            break;
        }
    }

    let _ = writer.shutdown().await;
    info!(peer = %peer, "Admin session closed");
}

/// Accept loop for admin connections.
pub struct AdminServer {
    listener: TcpListener,
    ctx: Arc<AdminContext>,
    limits: SessionLimits,
}

impl AdminServer {
    pub async fn bind(addr: SocketAddr, ctx: AdminContext, limits: SessionLimits) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            ctx: Arc::new(ctx),
            limits,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown_rx` carries `true`.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        match self.listener.local_addr() {
            Ok(addr) => info!(addr = %addr, "Admin server listening"),
            Err(e) => warn!(error = %e, "Admin server address unavailable"),
        }

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => self.spawn_session(stream, peer),
                        Err(e) => error!(error = %e, "Admin accept failed"),
                    }
                }
            }
        }

        info!("Admin server stopped");
    }

    fn spawn_session(&self, stream: TcpStream, peer: SocketAddr) {
        let ctx = Arc::clone(&self.ctx);
        let limits = self.limits;
        tokio::spawn(serve_session(stream, peer, ctx, limits));
    }
}
