//! Streaming protocol codec.
//!
//! Inbound frames are JSON objects: `{"type":"chunk","content":...}`,
//! `{"type":"complete"}`, `{"type":"error","message":...}` or an untyped
//! metadata object (sentiment, crisis flag, category, suggestions,
//! assessment question, context analysis). `ReplyAssembler` accumulates
//! one logical reply: chunks append in arrival order, metadata frames
//! merge additively, and completion renders the accumulated markdown
//! exactly once.

use serde_json::{Map, Value};

use solace_core::error::{Result, SolaceError};
use solace_core::types::ReplyMetadata;

use crate::render::render_markdown;

/// One decoded protocol frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Chunk { content: String },
    Complete,
    Error { message: String },
    Metadata(Map<String, Value>),
}

impl Frame {
    /// Parse a raw text frame. Anything that is not a JSON object with a
    /// recognized shape is a protocol error.
    pub fn parse(raw: &str) -> Result<Frame> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| SolaceError::Protocol(format!("malformed frame: {e}")))?;
        let object = match value {
            Value::Object(object) => object,
            other => {
                return Err(SolaceError::Protocol(format!(
                    "frame is not an object: {other}"
                )))
            }
        };

        match object.get("type").and_then(Value::as_str) {
            Some("chunk") => {
                let content = object
                    .get("content")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        SolaceError::Protocol("chunk frame without string content".to_string())
                    })?
                    .to_string();
                Ok(Frame::Chunk { content })
            }
            Some("complete") => Ok(Frame::Complete),
            Some("error") => {
                let message = object
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unspecified server error")
                    .to_string();
                Ok(Frame::Error { message })
            }
            Some(other) => Err(SolaceError::Protocol(format!(
                "unknown frame type: {other}"
            ))),
            // No "type" key: an untyped metadata object.
            None => Ok(Frame::Metadata(object)),
        }
    }
}

/// The resolved outcome of one logical request.
#[derive(Debug, Clone)]
pub struct CompletedReply {
    /// Ordered concatenation of chunk contents, unrendered.
    pub raw_text: String,
    /// The raw text rendered through markdown, exactly once.
    pub text: String,
    /// Typed view of the merged metadata snapshot.
    pub metadata: ReplyMetadata,
}

/// Accumulates frames for exactly one logical request.
///
/// One-shot: once a `complete` or `error` frame resolves the assembler,
/// any further frame is a protocol violation.
#[derive(Debug, Default)]
pub struct ReplyAssembler {
    buffer: String,
    metadata: Map<String, Value>,
    resolved: bool,
}

impl ReplyAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text accumulated so far, in arrival order.
    pub fn accumulated(&self) -> &str {
        &self.buffer
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Apply one frame.
    ///
    /// Returns `Ok(Some(reply))` when a `complete` frame resolves the
    /// request, `Ok(None)` while still accumulating, and an error for an
    /// `error` frame or a protocol violation.
    pub fn apply(&mut self, frame: Frame) -> Result<Option<CompletedReply>> {
        if self.resolved {
            return Err(SolaceError::Protocol(
                "frame received after the request resolved".to_string(),
            ));
        }

        match frame {
            Frame::Chunk { content } => {
                self.buffer.push_str(&content);
                Ok(None)
            }
            Frame::Metadata(map) => {
                // Additive union: a later snapshot updates the keys it
                // carries but never erases keys it does not.
                for (key, value) in map {
                    self.metadata.insert(key, value);
                }
                Ok(None)
            }
            Frame::Complete => {
                self.resolved = true;
                let raw_text = std::mem::take(&mut self.buffer);
                let text = render_markdown(&raw_text);
                let metadata = ReplyMetadata::from_map(&self.metadata);
                Ok(Some(CompletedReply {
                    raw_text,
                    text,
                    metadata,
                }))
            }
            Frame::Error { message } => {
                self.resolved = true;
                Err(SolaceError::Upstream(message))
            }
        }
    }
}
