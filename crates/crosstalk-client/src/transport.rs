//! Socket transport for the client.
//!
//! Provides [`ConnectedClient`], a channel-based handle to a server
//! connection. Lines are sent and received via the channels; an internal
//! task owns the socket I/O. The same handle shape covers both
//! transports, so the input loop never cares which one is underneath.

use std::sync::Arc;

use crosstalk_proto::LineReader;
use thiserror::Error;
use tokio::{
    io::AsyncWriteExt,
    net::{TcpStream, UdpSocket},
    sync::mpsc,
};

/// Largest accepted datagram from the server.
const MAX_DATAGRAM: usize = 64 * 1024;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not reach the server.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Socket I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Transport to connect with. Must match what the server is serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Reliable stream connection.
    Tcp,
    /// Connected datagram socket.
    Udp,
}

/// Handle to a connected client.
///
/// Lines flow through the channels; an internal task does the socket I/O.
/// Dropping or closing `to_server` lets the task flush pending sends and
/// exit; [`ConnectedClient::stop`] aborts it immediately.
pub struct ConnectedClient {
    /// Send lines to the server.
    pub to_server: mpsc::Sender<String>,
    /// Receive lines from the server. Closes when the server goes away.
    pub from_server: mpsc::Receiver<String>,
    /// Abort handle to stop the connection task.
    abort_handle: tokio::task::AbortHandle,
}

impl ConnectedClient {
    /// Stop the connection task immediately.
    pub fn stop(&self) {
        self.abort_handle.abort();
    }
}

/// Connect to a Crosstalk server.
pub async fn connect(
    server_addr: &str,
    transport: Transport,
) -> Result<ConnectedClient, TransportError> {
    let (to_server_tx, to_server_rx) = mpsc::channel::<String>(32);
    let (from_server_tx, from_server_rx) = mpsc::channel::<String>(32);

    let handle = match transport {
        Transport::Tcp => {
            let stream = TcpStream::connect(server_addr)
                .await
                .map_err(|e| TransportError::Connect(e.to_string()))?;
            tokio::spawn(run_stream_connection(stream, to_server_rx, from_server_tx))
        },
        Transport::Udp => {
            let socket = UdpSocket::bind("0.0.0.0:0")
                .await
                .map_err(|e| TransportError::Connect(e.to_string()))?;
            socket
                .connect(server_addr)
                .await
                .map_err(|e| TransportError::Connect(e.to_string()))?;
            tokio::spawn(run_datagram_connection(socket, to_server_rx, from_server_tx))
        },
    };

    Ok(ConnectedClient {
        to_server: to_server_tx,
        from_server: from_server_rx,
        abort_handle: handle.abort_handle(),
    })
}

/// Bridge a TCP stream to the channels.
async fn run_stream_connection(
    stream: TcpStream,
    mut to_server: mpsc::Receiver<String>,
    from_server: mpsc::Sender<String>,
) {
    let (read_half, mut write_half) = stream.into_split();

    let recv_handle = tokio::spawn(async move {
        let mut reader = LineReader::new(read_half);
        loop {
            match reader.next_line().await {
                Ok(Some(line)) => {
                    if from_server.send(line).await.is_err() {
                        return;
                    }
                },
                Ok(None) => return,
                Err(e) => {
                    tracing::debug!("read failed: {e}");
                    return;
                },
            }
        }
    });

    while let Some(line) = to_server.recv().await {
        let mut data = line.into_bytes();
        data.push(b'\n');
        if let Err(e) = write_half.write_all(&data).await {
            tracing::debug!("send failed: {e}");
            break;
        }
    }

    let _ = write_half.shutdown().await;
    recv_handle.abort();
}

/// Bridge a connected UDP socket to the channels.
async fn run_datagram_connection(
    socket: UdpSocket,
    mut to_server: mpsc::Receiver<String>,
    from_server: mpsc::Sender<String>,
) {
    let socket = Arc::new(socket);

    let recv_socket = Arc::clone(&socket);
    let recv_handle = tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            match recv_socket.recv(&mut buf).await {
                Ok(len) => {
                    let text = String::from_utf8_lossy(&buf[..len]);
                    for line in text.lines() {
                        if from_server.send(line.to_string()).await.is_err() {
                            return;
                        }
                    }
                },
                Err(e) => {
                    tracing::debug!("recv failed: {e}");
                    return;
                },
            }
        }
    });

    while let Some(line) = to_server.recv().await {
        if let Err(e) = socket.send(line.as_bytes()).await {
            tracing::debug!("send failed: {e}");
            break;
        }
    }

    recv_handle.abort();
}
