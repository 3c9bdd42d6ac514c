//! WebSocket transport for the client.
//!
//! Provides [`ConnectedClient`] which handles WebSocket I/O for packet
//! transport. This is a thin layer that just sends/receives packets - protocol
//! logic remains in the Sans-IO [`crate::Client`].

use futures_util::{SinkExt, StreamExt};
use parley_proto::Packet;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};

/// Capacity of the packet channels in each direction.
const CHANNEL_CAPACITY: usize = 64;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Connection task is gone.
    #[error("transport closed")]
    Closed,
}

/// What the connection task reports to the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Decoded packet from the broker.
    Packet(Packet),
    /// Socket closed; no further packets follow.
    Closed {
        /// Close reason.
        reason: String,
    },
}

/// Handle to a connected client with WebSocket transport.
///
/// Packets are sent/received via the channels, and an internal task handles
/// the socket I/O.
pub struct ConnectedClient {
    /// Send packets to the broker.
    pub to_server: mpsc::Sender<Packet>,
    /// Receive packets from the broker.
    pub from_server: mpsc::Receiver<Inbound>,
    /// Abort handle to stop the connection task.
    abort_handle: tokio::task::AbortHandle,
}

impl ConnectedClient {
    /// Stop the connection.
    pub fn stop(&self) {
        self.abort_handle.abort();
    }

    /// Queue a packet for sending.
    ///
    /// # Errors
    ///
    /// - `TransportError::Closed` if the connection task has exited
    pub async fn send(&self, packet: Packet) -> Result<(), TransportError> {
        self.to_server.send(packet).await.map_err(|_| TransportError::Closed)
    }
}

impl Drop for ConnectedClient {
    fn drop(&mut self) {
        self.abort_handle.abort();
    }
}

/// Open a WebSocket to the broker at `url` (`ws://` or `wss://`).
///
/// Returns a [`ConnectedClient`] with channels for packet transport.
pub async fn connect(url: &str) -> Result<ConnectedClient, TransportError> {
    let (stream, _response) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| TransportError::Connection(e.to_string()))?;

    tracing::debug!(%url, "websocket open");

    let (to_server_tx, to_server_rx) = mpsc::channel::<Packet>(CHANNEL_CAPACITY);
    let (from_server_tx, from_server_rx) = mpsc::channel::<Inbound>(CHANNEL_CAPACITY);

    let handle = tokio::spawn(run_connection(stream, to_server_rx, from_server_tx));

    Ok(ConnectedClient {
        to_server: to_server_tx,
        from_server: from_server_rx,
        abort_handle: handle.abort_handle(),
    })
}

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Run the connection, bridging between channels and the socket.
async fn run_connection(
    stream: Socket,
    mut to_server: mpsc::Receiver<Packet>,
    from_server: mpsc::Sender<Inbound>,
) {
    let (mut write, mut read) = stream.split();

    let reason = loop {
        tokio::select! {
            outgoing = to_server.recv() => {
                let Some(packet) = outgoing else {
                    // Driver dropped the handle: close politely.
                    let _ = write.send(Message::Close(None)).await;
                    break "closed by client".to_string();
                };
                if let Err(e) = write.send(Message::Text(packet.to_text().into())).await {
                    break format!("write failed: {e}");
                }
            },
            incoming = read.next() => {
                let bytes = match incoming {
                    Some(Ok(Message::Text(text))) => text.as_bytes().to_vec(),
                    Some(Ok(Message::Binary(data))) => data.to_vec(),
                    Some(Ok(Message::Close(frame))) => {
                        break frame.map_or_else(|| "closed by server".to_string(), |f| f.reason.as_str().to_string());
                    },
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => break format!("read failed: {e}"),
                    None => break "stream ended".to_string(),
                };

                match Packet::decode(&bytes) {
                    Ok(packet) => {
                        if from_server.send(Inbound::Packet(packet)).await.is_err() {
                            return;
                        }
                    },
                    Err(e) => tracing::warn!(error = %e, "undecodable packet dropped"),
                }
            },
        }
    };

    tracing::debug!(%reason, "websocket closed");
    let _ = from_server.send(Inbound::Closed { reason }).await;
}
