//! WebSocket connection lifecycle.
//!
//! `ConnectionManager` owns the single duplex channel for a session. The
//! socket is split on open: the write half stays in the manager, the read
//! half moves into a reader task that forwards inbound events over an
//! unbounded channel. There is no automatic reconnection; callers observe
//! the close and call `connect()` again.

use futures_util::stream::{SplitSink, StreamExt};
use futures_util::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use solace_core::error::{Result, SolaceError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Lifecycle state of the session's streaming channel. Transitions are
/// owned solely by `ConnectionManager`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Error => write!(f, "error"),
        }
    }
}

/// Inbound events surfaced by the reader task.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// One raw text frame, in arrival order.
    Frame(String),
    /// The peer closed the channel.
    Closed { code: u16, reason: String },
    /// The transport failed mid-stream.
    TransportError(String),
}

struct Link {
    writer: SplitSink<WsStream, Message>,
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
    reader: JoinHandle<()>,
}

/// Owns the session's single WebSocket connection.
pub struct ConnectionManager {
    url: String,
    state: ConnectionState,
    link: Option<Link>,
}

impl ConnectionManager {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            state: ConnectionState::Disconnected,
            link: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected && self.link.is_some()
    }

    /// Open the channel. Idempotent while already open.
    pub async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        self.state = ConnectionState::Connecting;
        debug!(url = %self.url, "Opening streaming connection");

        let (socket, _response) = match connect_async(&self.url).await {
            Ok(ok) => ok,
            Err(e) => {
                self.state = ConnectionState::Error;
                return Err(SolaceError::ConnectionUnreachable(e.to_string()));
            }
        };

        let (writer, mut read) = socket.split();
        let (tx, events) = mpsc::unbounded_channel();

        let reader = tokio::spawn(async move {
            while let Some(item) = read.next().await {
                match item {
                    Ok(Message::Text(text)) => {
                        if tx.send(ConnectionEvent::Frame(text)).is_err() {
                            return;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        let (code, reason) = match frame {
                            Some(CloseFrame { code, reason }) => {
                                (u16::from(code), reason.to_string())
                            }
                            None => (1005, String::new()),
                        };
                        let _ = tx.send(ConnectionEvent::Closed { code, reason });
                        return;
                    }
                    // Binary, ping and pong frames carry nothing for the
                    // chat protocol.
                    Ok(_) => continue,
                    Err(e) => {
                        let _ = tx.send(ConnectionEvent::TransportError(e.to_string()));
                        return;
                    }
                }
            }
            // Stream ended without a close frame.
            let _ = tx.send(ConnectionEvent::Closed {
                code: 1006,
                reason: "connection dropped".to_string(),
            });
        });

        self.link = Some(Link {
            writer,
            events,
            reader,
        });
        self.state = ConnectionState::Connected;
        debug!("Streaming connection open");
        Ok(())
    }

    /// Send one outbound text frame.
    pub async fn send(&mut self, text: String) -> Result<()> {
        let link = self.link.as_mut().ok_or_else(|| {
            SolaceError::ConnectionUnreachable("not connected".to_string())
        })?;
        if let Err(e) = link.writer.send(Message::Text(text)).await {
            self.state = ConnectionState::Error;
            self.link = None;
            return Err(SolaceError::ConnectionUnreachable(e.to_string()));
        }
        Ok(())
    }

    /// Await the next inbound event. Returns `None` once the channel is
    /// fully drained after a close. Terminal events flip the state so the
    /// next `connect()` reopens.
    pub async fn next_event(&mut self) -> Option<ConnectionEvent> {
        let link = self.link.as_mut()?;
        match link.events.recv().await {
            Some(event) => {
                match &event {
                    ConnectionEvent::Closed { code, reason } => {
                        debug!(code, reason = %reason, "Connection closed by peer");
                        self.state = ConnectionState::Disconnected;
                        self.link = None;
                    }
                    ConnectionEvent::TransportError(e) => {
                        warn!(error = %e, "Transport error on streaming connection");
                        self.state = ConnectionState::Error;
                        self.link = None;
                    }
                    ConnectionEvent::Frame(_) => {}
                }
                Some(event)
            }
            None => {
                self.state = ConnectionState::Disconnected;
                self.link = None;
                None
            }
        }
    }

    /// Close deterministically. Pending completions observe the drop
    /// through their event channel.
    pub async fn disconnect(&mut self) {
        if let Some(mut link) = self.link.take() {
            let _ = link.writer.send(Message::Close(None)).await;
            let _ = link.writer.close().await;
            link.reader.abort();
        }
        self.state = ConnectionState::Disconnected;
        debug!("Streaming connection closed");
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(link) = self.link.take() {
            link.reader.abort();
        }
    }
}

/// Map a close code to the error surfaced to callers. Abnormal closures
/// read as "service unreachable"; other non-normal codes keep a distinct
/// message per code so the UI can tell transient from fatal failures.
pub fn close_error(code: u16, reason: &str) -> SolaceError {
    match code {
        1006 => SolaceError::ConnectionUnreachable(
            "the chat service dropped the connection unexpectedly".to_string(),
        ),
        1000 | 1005 => SolaceError::Closed {
            code,
            reason: "the server ended the session before the reply completed".to_string(),
        },
        1001 => SolaceError::Closed {
            code,
            reason: "the chat service is shutting down".to_string(),
        },
        1008 => SolaceError::Closed {
            code,
            reason: "the request was rejected by the chat service".to_string(),
        },
        1011 => SolaceError::Closed {
            code,
            reason: "the chat service hit an internal error".to_string(),
        },
        1012 => SolaceError::Closed {
            code,
            reason: "the chat service is restarting".to_string(),
        },
        1013 => SolaceError::Closed {
            code,
            reason: "the chat service is overloaded, try again shortly".to_string(),
        },
        _ => SolaceError::Closed {
            code,
            reason: if reason.is_empty() {
                format!("connection closed unexpectedly (code {code})")
            } else {
                format!("connection closed unexpectedly: {reason}")
            },
        },
    }
}
