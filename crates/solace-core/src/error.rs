use thiserror::Error;

/// Top-level error type for the Solace engine.
///
/// Each variant corresponds to one failure class in the conversational
/// pipeline. Subsystem crates return `SolaceError` directly so that the
/// `?` operator works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SolaceError {
    /// The streaming backend could not be reached (abnormal close, refused
    /// connection, no route). Callers with a fallback path substitute it
    /// transparently on this variant.
    #[error("Chat service unreachable: {0}")]
    ConnectionUnreachable(String),

    /// The connection closed with a non-normal close code. The message is
    /// specific to the code so the UI can distinguish transient from fatal.
    #[error("Connection closed ({code}): {reason}")]
    Closed { code: u16, reason: String },

    /// A frame arrived that does not match the streaming protocol.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A bounded wait elapsed before the operation finished.
    #[error("Timed out after {ms}ms: {context}")]
    Timeout { ms: u64, context: String },

    /// Caller-supplied input was rejected before any state changed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The server reported a failure for the current request.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// The semantic-search collaborator failed. Non-fatal: the enrichment
    /// pipeline swallows this and substitutes an empty context.
    #[error("Semantic search unavailable: {0}")]
    SearchUnavailable(String),

    /// A second logical request was issued while one is outstanding.
    #[error("A request is already in flight on this connection")]
    RequestInFlight,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SolaceError {
    /// Whether the dispatcher may substitute the HTTP fallback for this
    /// failure instead of surfacing it.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(
            self,
            SolaceError::ConnectionUnreachable(_)
                | SolaceError::Timeout { .. }
                | SolaceError::Closed { .. }
        )
    }
}

impl From<toml::de::Error> for SolaceError {
    fn from(err: toml::de::Error) -> Self {
        SolaceError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for SolaceError {
    fn from(err: toml::ser::Error) -> Self {
        SolaceError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for SolaceError {
    fn from(err: serde_json::Error) -> Self {
        SolaceError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Solace operations.
pub type Result<T> = std::result::Result<T, SolaceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SolaceError::ConnectionUnreachable("connection refused".to_string());
        assert_eq!(
            err.to_string(),
            "Chat service unreachable: connection refused"
        );

        let err = SolaceError::Closed {
            code: 1011,
            reason: "internal error".to_string(),
        };
        assert_eq!(err.to_string(), "Connection closed (1011): internal error");

        let err = SolaceError::Timeout {
            ms: 5000,
            context: "connect".to_string(),
        };
        assert_eq!(err.to_string(), "Timed out after 5000ms: connect");
    }

    #[test]
    fn test_fallback_eligibility() {
        assert!(SolaceError::ConnectionUnreachable("x".into()).is_fallback_eligible());
        assert!(SolaceError::Timeout {
            ms: 1,
            context: "x".into()
        }
        .is_fallback_eligible());
        assert!(SolaceError::Closed {
            code: 1006,
            reason: "x".into()
        }
        .is_fallback_eligible());

        assert!(!SolaceError::Upstream("x".into()).is_fallback_eligible());
        assert!(!SolaceError::Protocol("x".into()).is_fallback_eligible());
        assert!(!SolaceError::Validation("x".into()).is_fallback_eligible());
        assert!(!SolaceError::RequestInFlight.is_fallback_eligible());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SolaceError = io_err.into();
        assert!(matches!(err, SolaceError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let bad = serde_json::from_str::<serde_json::Value>("{ nope }");
        let err: SolaceError = bad.unwrap_err().into();
        assert!(matches!(err, SolaceError::Serialization(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let bad: std::result::Result<toml::Value, _> = toml::from_str("broken = [[[");
        let err: SolaceError = bad.unwrap_err().into();
        assert!(matches!(err, SolaceError::Config(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(7);
            let _value = io_result?;
            Ok("ok".to_string())
        }
        assert_eq!(inner().unwrap(), "ok");
    }
}
