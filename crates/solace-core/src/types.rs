use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// =============================================================================
// Session identity
// =============================================================================

/// Client-lifetime identity pairing a session id with a conversation id.
///
/// Created once per engine instance and never mutated. The conversation id
/// is reused across reconnects so the backend can stitch the transcript
/// back together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    pub conversation_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Messages
// =============================================================================

/// Who authored a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Ai,
}

/// One entry in the ordered conversation log.
///
/// Appended in insertion order and never mutated once `streaming` is false.
/// Metadata fields are populated from the final merged metadata snapshot of
/// the streaming response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_crisis: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem_category: Option<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment_question: Option<AssessmentQuestion>,
    pub streaming: bool,
}

impl ChatMessage {
    /// A completed user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            sender: Sender::User,
            timestamp: Utc::now(),
            sentiment: None,
            is_crisis: None,
            problem_category: None,
            suggestions: Vec::new(),
            assessment_question: None,
            streaming: false,
        }
    }

    /// A completed AI message carrying the reply's merged metadata.
    pub fn ai(text: impl Into<String>, metadata: ReplyMetadata) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            sender: Sender::Ai,
            timestamp: Utc::now(),
            sentiment: metadata.sentiment,
            is_crisis: metadata.is_crisis,
            problem_category: metadata.problem_category,
            suggestions: metadata.suggestions,
            assessment_question: metadata.assessment_question,
            streaming: false,
        }
    }
}

/// Typed view of the merged metadata snapshot accumulated during streaming.
///
/// Every field is optional because metadata frames are untyped JSON objects
/// and may carry any subset of these keys.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyMetadata {
    pub sentiment: Option<String>,
    pub is_crisis: Option<bool>,
    pub problem_category: Option<String>,
    pub suggestions: Vec<String>,
    pub assessment_question: Option<AssessmentQuestion>,
    pub context_analysis: Option<Value>,
}

impl ReplyMetadata {
    /// Extract the typed fields from a merged metadata map. Unknown keys
    /// are ignored rather than rejected.
    pub fn from_map(map: &serde_json::Map<String, Value>) -> Self {
        serde_json::from_value(Value::Object(map.clone())).unwrap_or_default()
    }
}

// =============================================================================
// Assessment
// =============================================================================

/// One question of the diagnostic questionnaire, as delivered by the
/// assessment backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssessmentQuestion {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<u32>,
}

/// A recorded answer. Keyed by question id in `AssessmentProgress`;
/// written at most once per question.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub question: String,
    pub answer: String,
    pub timestamp: DateTime<Utc>,
}

/// Snapshot of the questionnaire's progress, attached to every outgoing
/// chat payload while an assessment is active.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessmentProgress {
    pub is_active: bool,
    pub current_question: Option<AssessmentQuestion>,
    pub completed_questions: Vec<String>,
    pub total_questions: Option<u32>,
    pub current_step: u32,
    pub session_id: Option<Uuid>,
    /// Append-only; a given question id is written at most once.
    pub responses: BTreeMap<String, QuestionResponse>,
}

// =============================================================================
// Outbound payload
// =============================================================================

/// The enriched payload sent to the AI backend for one logical request
/// (streaming and fallback paths share this shape).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatPayload {
    pub message: String,
    pub session_data: Session,
    /// Semantic-search results, opaque to the engine. Empty when the
    /// search collaborator was unavailable.
    #[serde(default)]
    pub semantic_context: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment_progress: Option<AssessmentProgress>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_ids_are_unique() {
        let a = Session::new();
        let b = Session::new();
        assert_ne!(a.session_id, b.session_id);
        assert_ne!(a.conversation_id, b.conversation_id);
    }

    #[test]
    fn test_user_message_defaults() {
        let msg = ChatMessage::user("hello");
        assert_eq!(msg.sender, Sender::User);
        assert_eq!(msg.text, "hello");
        assert!(!msg.streaming);
        assert!(msg.sentiment.is_none());
        assert!(msg.suggestions.is_empty());
    }

    #[test]
    fn test_ai_message_carries_metadata() {
        let meta = ReplyMetadata {
            sentiment: Some("anxious".to_string()),
            is_crisis: Some(false),
            problem_category: Some("anxiety".to_string()),
            suggestions: vec!["breathing exercise".to_string()],
            assessment_question: None,
            context_analysis: None,
        };
        let msg = ChatMessage::ai("take a slow breath", meta);
        assert_eq!(msg.sender, Sender::Ai);
        assert_eq!(msg.sentiment.as_deref(), Some("anxious"));
        assert_eq!(msg.is_crisis, Some(false));
        assert_eq!(msg.problem_category.as_deref(), Some("anxiety"));
        assert_eq!(msg.suggestions.len(), 1);
    }

    #[test]
    fn test_reply_metadata_from_map_partial() {
        let value = json!({
            "sentiment": "calm",
            "suggestions": ["journal", "walk"],
            "unknown_key": 42
        });
        let map = value.as_object().unwrap();
        let meta = ReplyMetadata::from_map(map);
        assert_eq!(meta.sentiment.as_deref(), Some("calm"));
        assert_eq!(meta.suggestions, vec!["journal", "walk"]);
        assert!(meta.is_crisis.is_none());
        assert!(meta.assessment_question.is_none());
    }

    #[test]
    fn test_reply_metadata_from_map_bad_types_falls_back() {
        // A metadata frame with the wrong type for a known key must not
        // panic; the typed view falls back to defaults.
        let value = json!({ "suggestions": "not-a-list" });
        let meta = ReplyMetadata::from_map(value.as_object().unwrap());
        assert!(meta.suggestions.is_empty());
    }

    #[test]
    fn test_assessment_question_deserializes_wire_shape() {
        let q: AssessmentQuestion = serde_json::from_value(json!({
            "id": "phq9-1",
            "text": "Little interest or pleasure in doing things?",
            "options": ["Not at all", "Several days"]
        }))
        .unwrap();
        assert_eq!(q.id, "phq9-1");
        assert_eq!(q.options.len(), 2);
        assert!(q.step.is_none());
    }

    #[test]
    fn test_chat_payload_serializes_snake_case() {
        let payload = ChatPayload {
            message: "hi".to_string(),
            session_data: Session::new(),
            semantic_context: vec![json!({"content": "prior note"})],
            problem_category: Some("stress".to_string()),
            assessment_progress: None,
        };
        let v = serde_json::to_value(&payload).unwrap();
        assert_eq!(v["message"], "hi");
        assert!(v["session_data"]["session_id"].is_string());
        assert_eq!(v["semantic_context"][0]["content"], "prior note");
        assert_eq!(v["problem_category"], "stress");
        assert!(v.get("assessment_progress").is_none());
    }

    #[test]
    fn test_assessment_progress_roundtrip() {
        let mut progress = AssessmentProgress {
            is_active: true,
            total_questions: Some(9),
            current_step: 2,
            ..Default::default()
        };
        progress.responses.insert(
            "q1".to_string(),
            QuestionResponse {
                question: "Sleep quality?".to_string(),
                answer: "Poor".to_string(),
                timestamp: Utc::now(),
            },
        );
        let json = serde_json::to_string(&progress).unwrap();
        let back: AssessmentProgress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, progress);
    }
}
