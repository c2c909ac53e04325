//! Per-connection session handler.
//!
//! Each accepted TCP connection runs one session task through the states
//! `AwaitingName -> Active -> Terminated`. Every blocking read is bounded
//! by the poll interval so the session observes shutdown within one tick;
//! there is no forced interrupt of an in-progress read.
//!
//! Outbound traffic goes through a dedicated writer task fed by an
//! unbounded channel, so broadcasts never block on this peer's socket.
//! Cleanup is structured as straight-line code after the read loop
//! returns a termination reason, which makes it run exactly once on every
//! exit path.

use std::{fmt, net::SocketAddr, time::Duration};

use crosstalk_proto::{ClientMessage, LineReader, notice, parse_registration};
use tokio::{
    io::AsyncWriteExt,
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::mpsc,
    time::timeout,
};

use crate::{
    broadcast::Broadcaster,
    registry::{ClientId, ClientRecord, SharedRegistry},
    shutdown::ShutdownSignal,
};

/// Why a session terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionEnd {
    /// Peer sent `/quit`.
    CleanQuit,
    /// Shutdown signal observed at a poll tick.
    Shutdown,
    /// Peer closed the connection or a read failed.
    ConnectionLost,
    /// First message was not a valid registration.
    RegistrationFailed,
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CleanQuit => write!(f, "clean quit"),
            Self::Shutdown => write!(f, "shutdown"),
            Self::ConnectionLost => write!(f, "connection lost"),
            Self::RegistrationFailed => write!(f, "registration failed"),
        }
    }
}

/// Everything a session needs besides its own socket.
#[derive(Clone)]
pub(crate) struct SessionContext {
    pub registry: SharedRegistry,
    pub broadcaster: Broadcaster,
    pub shutdown: ShutdownSignal,
    pub poll_interval: Duration,
    pub max_line_len: usize,
}

/// Run one connection to completion.
pub(crate) async fn run_session(
    ctx: SessionContext,
    id: ClientId,
    stream: TcpStream,
    peer: SocketAddr,
) {
    let (read_half, write_half) = stream.into_split();
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(write_loop(write_half, rx));
    let mut reader = LineReader::with_limit(read_half, ctx.max_line_len);

    let end = match await_registration(&ctx, &mut reader, &tx).await {
        Ok(name) => {
            tracing::info!(id, name = %name, %peer, "registered");
            run_registered(&ctx, id, &name, &mut reader, &tx).await
        },
        Err(end) => end,
    };

    // Dropping the outbound handle lets the writer drain pending lines
    // (the usage hint on a failed registration included) and close the
    // socket.
    drop(tx);
    let _ = writer.await;

    tracing::info!(id, %peer, reason = %end, "session terminated");
}

/// Register, announce, relay, then clean up. Called once registration has
/// produced a display name; cleanup here runs on every exit path.
async fn run_registered(
    ctx: &SessionContext,
    id: ClientId,
    name: &str,
    reader: &mut LineReader<OwnedReadHalf>,
    tx: &mpsc::UnboundedSender<String>,
) -> SessionEnd {
    if let Err(e) = ctx.registry.lock().register(id, ClientRecord::stream(name, tx.clone())) {
        tracing::error!(id, "registration rejected: {e}");
        return SessionEnd::RegistrationFailed;
    }

    // The joiner does not see its own join notice
    ctx.broadcaster.broadcast(&notice::joined(name), Some(id)).await;

    let end = active_loop(ctx, id, name, reader, tx).await;

    // The broadcaster may have evicted us already after a failed write;
    // whoever removes the record owns the departure notice.
    if ctx.registry.lock().remove(id).is_some() {
        ctx.broadcaster.broadcast(&notice::left(name), Some(id)).await;
    }

    end
}

/// `AwaitingName`: bounded-wait for the first line and validate it.
async fn await_registration(
    ctx: &SessionContext,
    reader: &mut LineReader<OwnedReadHalf>,
    tx: &mpsc::UnboundedSender<String>,
) -> Result<String, SessionEnd> {
    loop {
        match timeout(ctx.poll_interval, reader.next_line()).await {
            Err(_elapsed) => {
                if ctx.shutdown.is_stopping() {
                    return Err(SessionEnd::Shutdown);
                }
            },
            Ok(Ok(Some(line))) => {
                return parse_registration(&line).map_err(|e| {
                    tracing::debug!("rejecting registration: {e}");
                    let _ = tx.send(notice::USAGE_HINT.to_string());
                    SessionEnd::RegistrationFailed
                });
            },
            Ok(Ok(None)) => return Err(SessionEnd::ConnectionLost),
            Ok(Err(e)) => {
                tracing::debug!("read failed before registration: {e}");
                return Err(SessionEnd::ConnectionLost);
            },
        }
    }
}

/// `Active`: read one message per iteration and dispatch it.
async fn active_loop(
    ctx: &SessionContext,
    id: ClientId,
    name: &str,
    reader: &mut LineReader<OwnedReadHalf>,
    tx: &mpsc::UnboundedSender<String>,
) -> SessionEnd {
    loop {
        let line = match timeout(ctx.poll_interval, reader.next_line()).await {
            Err(_elapsed) => {
                if ctx.shutdown.is_stopping() {
                    return SessionEnd::Shutdown;
                }
                continue;
            },
            Ok(Ok(Some(line))) => line,
            Ok(Ok(None)) => return SessionEnd::ConnectionLost,
            Ok(Err(e)) => {
                tracing::debug!(id, "read failed: {e}");
                return SessionEnd::ConnectionLost;
            },
        };

        match ClientMessage::parse(&line) {
            ClientMessage::Quit => return SessionEnd::CleanQuit,
            ClientMessage::Help => {
                let _ = tx.send(notice::HELP_TEXT.to_string());
            },
            ClientMessage::Unknown(command) => {
                tracing::debug!(id, command, "unknown command");
                let _ = tx.send(notice::UNKNOWN_COMMAND.to_string());
            },
            ClientMessage::Chat(text) => {
                ctx.broadcaster.broadcast(&notice::chat_line(name, &text), Some(id)).await;
            },
        }
    }
}

/// Writer task: drain the outbound channel into the socket.
///
/// Exits when the channel closes (session cleanup) or a write fails; in
/// the failure case the closed channel is how the broadcaster learns this
/// member is unreachable.
async fn write_loop(mut writer: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = rx.recv().await {
        let mut data = line.into_bytes();
        data.push(b'\n');
        if let Err(e) = writer.write_all(&data).await {
            tracing::debug!("outbound write failed: {e}");
            return;
        }
    }
    let _ = writer.shutdown().await;
}
