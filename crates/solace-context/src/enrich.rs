//! Assembles the enriched outbound payload for one message.

use std::sync::Arc;

use tracing::{debug, warn};

use solace_core::types::{AssessmentProgress, ChatPayload, Session};

use crate::search::SearchBackend;

/// Builds the outgoing payload: semantic context, session snapshot,
/// active problem category and assessment progress.
pub struct ContextEnricher {
    search: Arc<dyn SearchBackend>,
    limit: usize,
}

impl ContextEnricher {
    pub fn new(search: Arc<dyn SearchBackend>, limit: usize) -> Self {
        Self { search, limit }
    }

    /// Enrich one outgoing message.
    ///
    /// The semantic search is keyed on the raw user text and attached
    /// regardless of outcome: a failed search yields an empty list and is
    /// logged, never surfaced.
    pub async fn enrich(
        &self,
        message: &str,
        session: &Session,
        problem_category: Option<String>,
        assessment_progress: Option<AssessmentProgress>,
    ) -> ChatPayload {
        let semantic_context = match self.search.search(message, self.limit).await {
            Ok(results) => {
                debug!(hits = results.len(), "Semantic context attached");
                results
            }
            Err(e) => {
                warn!(error = %e, "Semantic search failed, continuing with empty context");
                Vec::new()
            }
        };

        ChatPayload {
            message: message.to_string(),
            session_data: session.clone(),
            semantic_context,
            problem_category,
            assessment_progress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::search::StaticSearch;

    #[tokio::test]
    async fn test_enrich_attaches_search_results() {
        let search = Arc::new(StaticSearch::with_results(vec![json!({
            "content": "previous conversation about sleep",
            "score": 0.91
        })]));
        let enricher = ContextEnricher::new(search.clone(), 5);
        let session = Session::new();

        let payload = enricher
            .enrich("I can't sleep", &session, Some("insomnia".to_string()), None)
            .await;

        assert_eq!(payload.message, "I can't sleep");
        assert_eq!(payload.semantic_context.len(), 1);
        assert_eq!(payload.problem_category.as_deref(), Some("insomnia"));
        assert_eq!(payload.session_data, session);
        // The search is keyed on the raw user text.
        assert_eq!(search.queries(), vec!["I can't sleep"]);
    }

    #[tokio::test]
    async fn test_search_failure_is_swallowed_with_empty_context() {
        let enricher = ContextEnricher::new(Arc::new(StaticSearch::failing()), 5);
        let session = Session::new();

        let payload = enricher.enrich("hello", &session, None, None).await;
        assert!(payload.semantic_context.is_empty());
        assert_eq!(payload.message, "hello");
    }

    #[tokio::test]
    async fn test_assessment_snapshot_is_attached() {
        let enricher = ContextEnricher::new(Arc::new(StaticSearch::default()), 5);
        let session = Session::new();
        let progress = AssessmentProgress {
            is_active: true,
            current_step: 3,
            ..Default::default()
        };

        let payload = enricher
            .enrich("answer", &session, None, Some(progress.clone()))
            .await;
        assert_eq!(payload.assessment_progress, Some(progress));
    }

    #[tokio::test]
    async fn test_limit_caps_attached_results() {
        let search = Arc::new(StaticSearch::with_results(vec![
            json!({"content": "a"}),
            json!({"content": "b"}),
            json!({"content": "c"}),
        ]));
        let enricher = ContextEnricher::new(search, 2);
        let payload = enricher.enrich("q", &Session::new(), None, None).await;
        assert_eq!(payload.semantic_context.len(), 2);
    }
}
