//! Request dispatch with fallback substitution.
//!
//! One logical request at a time: a request-id-keyed route table on the
//! dispatcher admits at most one pending route, so a second `dispatch()`
//! while one is outstanding fails with `RequestInFlight` instead of
//! rebinding the in-flight request's frames. If the channel does not open
//! within the bounded wait, the synchronous HTTP fallback substitutes and
//! its single response is pushed through the same codec as one chunk plus
//! one complete frame. A mid-stream transport failure gets exactly one
//! fallback retry before the error surfaces.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use solace_core::config::BackendConfig;
use solace_core::error::{Result, SolaceError};
use solace_core::types::ChatPayload;

use crate::codec::{CompletedReply, Frame, ReplyAssembler};
use crate::connection::{close_error, ConnectionEvent, ConnectionManager, ConnectionState};
use crate::fallback::FallbackClient;

/// Identifies one logical request on the connection.
pub type RequestId = u64;

/// Incremental events for the UI layer: a cancellable, lazy, finite
/// sequence of text fragments per request, closed by `End` or `Error`.
/// `Reset` marks fragments already delivered for the request as
/// superseded; only the chunks after the last `Reset` concatenate to
/// the final reply text.
#[derive(Clone, Debug)]
pub enum StreamEvent {
    Chunk(String),
    Reset,
    Error(String),
    End,
}

/// Request-id-keyed route table. The single-flight invariant makes its
/// capacity one; registering a second route while one is pending fails
/// loudly rather than rebinding.
#[derive(Debug, Default)]
struct RouteTable {
    pending: HashMap<RequestId, ()>,
}

impl RouteTable {
    fn claim(&mut self, id: RequestId) -> Result<()> {
        if !self.pending.is_empty() {
            return Err(SolaceError::RequestInFlight);
        }
        self.pending.insert(id, ());
        Ok(())
    }

    fn release(&mut self, id: RequestId) {
        self.pending.remove(&id);
    }

    fn in_flight(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Sends one logical request at a time through the streaming channel,
/// substituting the HTTP fallback when streaming is unavailable.
pub struct RequestDispatcher {
    connection: ConnectionManager,
    fallback: FallbackClient,
    connect_timeout: Duration,
    request_timeout: Duration,
    routes: RouteTable,
    next_request_id: RequestId,
    events: mpsc::UnboundedSender<(StreamEvent, RequestId)>,
}

impl RequestDispatcher {
    /// Build a dispatcher plus the receiving end of its event channel.
    pub fn new(
        connection: ConnectionManager,
        fallback: FallbackClient,
        config: &BackendConfig,
    ) -> (Self, mpsc::UnboundedReceiver<(StreamEvent, RequestId)>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                connection,
                fallback,
                connect_timeout: Duration::from_millis(config.connect_timeout_ms),
                request_timeout: Duration::from_millis(config.request_timeout_ms),
                routes: RouteTable::default(),
                next_request_id: 1,
                events,
            },
            rx,
        )
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn in_flight(&self) -> bool {
        self.routes.in_flight()
    }

    /// Close the streaming channel. Any pending completion observes the
    /// drop through its event loop and fails.
    pub async fn disconnect(&mut self) {
        self.connection.disconnect().await;
    }

    /// Send one logical request and drive it to completion.
    pub async fn dispatch(&mut self, payload: &ChatPayload) -> Result<CompletedReply> {
        let id = self.next_request_id;
        self.next_request_id += 1;
        self.routes.claim(id)?;

        let result = self.run(id, payload).await;
        self.routes.release(id);

        match &result {
            Ok(_) => {
                let _ = self.events.send((StreamEvent::End, id));
            }
            Err(e) => {
                let _ = self.events.send((StreamEvent::Error(e.to_string()), id));
            }
        }
        result
    }

    async fn run(&mut self, id: RequestId, payload: &ChatPayload) -> Result<CompletedReply> {
        let connected = match tokio::time::timeout(self.connect_timeout, self.connection.connect())
            .await
        {
            Ok(Ok(())) => true,
            Ok(Err(e)) if e.is_fallback_eligible() => {
                warn!(error = %e, "Streaming connect failed, substituting fallback");
                false
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                warn!(
                    timeout_ms = self.connect_timeout.as_millis() as u64,
                    "Streaming connect timed out, substituting fallback"
                );
                false
            }
        };

        if !connected {
            return self.complete_via_fallback(id, payload).await;
        }

        match self.stream_request(id, payload).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                // The aborted reply may still be arriving; drop the channel
                // so its late frames cannot be consumed by the next request.
                if self.connection.is_connected() {
                    self.connection.disconnect().await;
                }
                if e.is_fallback_eligible() {
                    // Exactly one fallback retry for a mid-stream failure.
                    warn!(error = %e, "Stream failed mid-request, retrying once via fallback");
                    let _ = self.events.send((StreamEvent::Reset, id));
                    self.complete_via_fallback(id, payload).await
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn stream_request(
        &mut self,
        id: RequestId,
        payload: &ChatPayload,
    ) -> Result<CompletedReply> {
        let outbound = serde_json::to_string(payload)?;
        self.connection.send(outbound).await?;
        debug!(request_id = id, "Request sent on streaming channel");

        let mut assembler = ReplyAssembler::new();
        let deadline = tokio::time::Instant::now() + self.request_timeout;

        loop {
            let event = tokio::time::timeout_at(deadline, self.connection.next_event())
                .await
                .map_err(|_| SolaceError::Timeout {
                    ms: self.request_timeout.as_millis() as u64,
                    context: "streaming response".to_string(),
                })?;

            match event {
                Some(ConnectionEvent::Frame(raw)) => {
                    let frame = Frame::parse(&raw)?;
                    if let Frame::Chunk { content } = &frame {
                        // Arrival order, synchronously, for incremental
                        // rendering.
                        let _ = self.events.send((StreamEvent::Chunk(content.clone()), id));
                    }
                    if let Some(reply) = assembler.apply(frame)? {
                        return Ok(reply);
                    }
                }
                Some(ConnectionEvent::Closed { code, reason }) => {
                    return Err(close_error(code, &reason));
                }
                Some(ConnectionEvent::TransportError(e)) => {
                    return Err(SolaceError::ConnectionUnreachable(e));
                }
                None => {
                    return Err(SolaceError::ConnectionUnreachable(
                        "connection dropped before the reply completed".to_string(),
                    ));
                }
            }
        }
    }

    /// Treat the fallback's single response as one `complete` frame
    /// through the same codec, so rendering and metadata handling stay
    /// identical on both paths.
    async fn complete_via_fallback(
        &mut self,
        id: RequestId,
        payload: &ChatPayload,
    ) -> Result<CompletedReply> {
        let text = self.fallback.complete(payload).await?;

        let _ = self.events.send((StreamEvent::Chunk(text.clone()), id));

        let mut assembler = ReplyAssembler::new();
        assembler.apply(Frame::Chunk { content: text })?;
        assembler
            .apply(Frame::Complete)?
            .ok_or_else(|| SolaceError::Protocol("fallback reply did not resolve".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_table_is_single_flight() {
        let mut routes = RouteTable::default();
        routes.claim(1).unwrap();
        assert!(routes.in_flight());

        let err = routes.claim(2).unwrap_err();
        assert!(matches!(err, SolaceError::RequestInFlight));

        routes.release(1);
        assert!(!routes.in_flight());
        routes.claim(2).unwrap();
    }

    #[test]
    fn test_route_release_is_id_scoped() {
        let mut routes = RouteTable::default();
        routes.claim(7).unwrap();
        // Releasing an id that never claimed leaves the route intact.
        routes.release(8);
        assert!(routes.in_flight());
        routes.release(7);
        assert!(!routes.in_flight());
    }

    fn test_dispatcher() -> (
        RequestDispatcher,
        mpsc::UnboundedReceiver<(StreamEvent, RequestId)>,
    ) {
        // Both endpoints unreachable; only used for paths that fail fast.
        let config = BackendConfig {
            stream_url: "ws://127.0.0.1:9/chat/stream".to_string(),
            chat_url: "http://127.0.0.1:9/chat".to_string(),
            connect_timeout_ms: 200,
            request_timeout_ms: 500,
        };
        let connection = ConnectionManager::new(config.stream_url.clone());
        let fallback = FallbackClient::new(
            reqwest::Client::new(),
            config.chat_url.clone(),
            Duration::from_millis(200),
        );
        RequestDispatcher::new(connection, fallback, &config)
    }

    fn payload() -> ChatPayload {
        ChatPayload {
            message: "hello".to_string(),
            session_data: solace_core::types::Session::new(),
            semantic_context: Vec::new(),
            problem_category: None,
            assessment_progress: None,
        }
    }

    #[tokio::test]
    async fn test_dispatch_with_both_paths_down_surfaces_error() {
        let (mut dispatcher, mut rx) = test_dispatcher();
        let result = dispatcher.dispatch(&payload()).await;
        assert!(result.is_err());
        assert!(!dispatcher.in_flight());

        // The event stream closes the request with an error marker.
        let (event, id) = rx.try_recv().unwrap();
        assert_eq!(id, 1);
        assert!(matches!(event, StreamEvent::Error(_)));
    }

    #[tokio::test]
    async fn test_request_ids_are_monotonic() {
        let (mut dispatcher, mut rx) = test_dispatcher();
        let _ = dispatcher.dispatch(&payload()).await;
        let _ = dispatcher.dispatch(&payload()).await;

        let (_, first) = rx.try_recv().unwrap();
        let (_, second) = rx.try_recv().unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }
}
