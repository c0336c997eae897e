//! Streaming transport for the Solace conversational engine.
//!
//! Owns the duplex WebSocket channel to the AI backend, decodes the
//! incremental chunk-based response protocol, and substitutes a synchronous
//! HTTP call when streaming is unavailable. One logical request at a time:
//! the dispatcher enforces single-flight through a request-id-keyed route
//! table so an in-flight request's frames can never be rebound.

pub mod codec;
pub mod connection;
pub mod dispatch;
pub mod fallback;
pub mod render;

pub use codec::{CompletedReply, Frame, ReplyAssembler};
pub use connection::{close_error, ConnectionEvent, ConnectionManager, ConnectionState};
pub use dispatch::{RequestDispatcher, RequestId, StreamEvent};
pub use fallback::FallbackClient;
pub use render::render_markdown;
