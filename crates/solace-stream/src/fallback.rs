//! Synchronous HTTP fallback for the streaming channel.
//!
//! When the duplex connection cannot be opened within the bounded wait, one
//! `POST {messages, stream:false}` call substitutes for the whole streaming
//! exchange. Backends differ in where they put the reply text, so the first
//! present of `message`, `response`, `content` or
//! `choices[0].message.content` is accepted.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use solace_core::error::{Result, SolaceError};
use solace_core::types::ChatPayload;

#[derive(Serialize)]
struct RoleMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct FallbackRequest {
    messages: Vec<RoleMessage>,
    stream: bool,
}

/// Client for the non-streaming chat endpoint.
#[derive(Clone)]
pub struct FallbackClient {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl FallbackClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http,
            url: url.into(),
            timeout,
        }
    }

    /// Issue the fallback request and return the reply text. Runs to
    /// completion or its own timeout; no cooperative cancellation.
    pub async fn complete(&self, payload: &ChatPayload) -> Result<String> {
        debug!(url = %self.url, "Dispatching via HTTP fallback");

        let request = FallbackRequest {
            messages: vec![RoleMessage {
                role: "user".to_string(),
                content: payload.message.clone(),
            }],
            stream: false,
        };

        let response = self
            .http
            .post(&self.url)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SolaceError::Timeout {
                        ms: self.timeout.as_millis() as u64,
                        context: "fallback request".to_string(),
                    }
                } else if e.is_connect() {
                    SolaceError::ConnectionUnreachable(e.to_string())
                } else {
                    SolaceError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SolaceError::Upstream(format!(
                "fallback endpoint returned {status}: {body}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SolaceError::Http(e.to_string()))?;

        extract_reply_text(&body).ok_or_else(|| {
            SolaceError::Protocol("fallback response carried no recognizable reply field".to_string())
        })
    }
}

/// Pull the reply text out of a fallback response body.
pub fn extract_reply_text(body: &Value) -> Option<String> {
    body.get("message")
        .and_then(Value::as_str)
        .or_else(|| body.get("response").and_then(Value::as_str))
        .or_else(|| body.get("content").and_then(Value::as_str))
        .or_else(|| {
            body.pointer("/choices/0/message/content")
                .and_then(Value::as_str)
        })
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_prefers_message_field() {
        let body = json!({"message": "a", "response": "b", "content": "c"});
        assert_eq!(extract_reply_text(&body).as_deref(), Some("a"));
    }

    #[test]
    fn test_extract_each_fallback_field() {
        assert_eq!(
            extract_reply_text(&json!({"response": "r"})).as_deref(),
            Some("r")
        );
        assert_eq!(
            extract_reply_text(&json!({"content": "c"})).as_deref(),
            Some("c")
        );
        assert_eq!(
            extract_reply_text(&json!({
                "choices": [{"message": {"content": "openai-shaped"}}]
            }))
            .as_deref(),
            Some("openai-shaped")
        );
    }

    #[test]
    fn test_extract_none_when_no_known_field() {
        assert!(extract_reply_text(&json!({"status": "ok"})).is_none());
        assert!(extract_reply_text(&json!({"choices": []})).is_none());
        // Known key with a non-string value does not count.
        assert!(extract_reply_text(&json!({"message": 42})).is_none());
    }

    #[test]
    fn test_request_body_shape() {
        let request = FallbackRequest {
            messages: vec![RoleMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            stream: false,
        };
        let v = serde_json::to_value(&request).unwrap();
        assert_eq!(v["messages"][0]["role"], "user");
        assert_eq!(v["messages"][0]["content"], "hi");
        assert_eq!(v["stream"], false);
    }
}
