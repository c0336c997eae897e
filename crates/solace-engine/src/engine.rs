//! The conversation engine.
//!
//! One engine owns one session: its identity, its ordered message log,
//! the streaming dispatcher and the assessment flow. Outgoing messages
//! are enriched with semantic context before dispatch; exactly one
//! request may be in flight at a time and a second send is rejected,
//! never queued behind or rebound onto the first.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use solace_assessment::{AssessmentEngine, AssessmentState};
use solace_context::ContextEnricher;
use solace_core::error::{Result, SolaceError};
use solace_core::types::{AssessmentProgress, ChatMessage, Session};
use solace_stream::RequestDispatcher;
use solace_voice::ConversationHandle;

use crate::session::SessionManager;

pub struct ChatEngine {
    sessions: Mutex<SessionManager>,
    enricher: ContextEnricher,
    dispatcher: AsyncMutex<RequestDispatcher>,
    assessment: AsyncMutex<AssessmentEngine>,
    messages: Mutex<Vec<ChatMessage>>,
    problem_category: Mutex<Option<String>>,
}

impl ChatEngine {
    pub fn new(
        enricher: ContextEnricher,
        dispatcher: RequestDispatcher,
        assessment: AssessmentEngine,
    ) -> Self {
        Self {
            sessions: Mutex::new(SessionManager::new()),
            enricher,
            dispatcher: AsyncMutex::new(dispatcher),
            assessment: AsyncMutex::new(assessment),
            messages: Mutex::new(Vec::new()),
            problem_category: Mutex::new(None),
        }
    }

    pub fn session(&self) -> Session {
        self.sessions.lock().unwrap().current()
    }

    /// The message log in arrival order.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn problem_category(&self) -> Option<String> {
        self.problem_category.lock().unwrap().clone()
    }

    pub fn set_problem_category(&self, category: Option<String>) {
        *self.problem_category.lock().unwrap() = category;
    }

    /// Send one user message and wait for the completed reply.
    ///
    /// Empty input is rejected before anything is touched. While a
    /// request is in flight a second send fails with `RequestInFlight`
    /// and leaves the log unchanged.
    pub async fn send(&self, text: &str) -> Result<ChatMessage> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(SolaceError::Validation(
                "message cannot be empty".to_string(),
            ));
        }

        let mut dispatcher = self
            .dispatcher
            .try_lock()
            .map_err(|_| SolaceError::RequestInFlight)?;

        let session = self.session();
        let progress = self.assessment.lock().await.snapshot();
        let category = self.problem_category();
        let payload = self.enricher.enrich(trimmed, &session, category, progress).await;

        self.messages.lock().unwrap().push(ChatMessage::user(trimmed));

        let reply = dispatcher.dispatch(&payload).await?;
        debug!(chars = reply.text.len(), "reply completed");

        // The backend's category classification sticks for later sends.
        if reply.metadata.problem_category.is_some() {
            *self.problem_category.lock().unwrap() = reply.metadata.problem_category.clone();
        }

        let message = ChatMessage::ai(reply.text.clone(), reply.metadata);
        self.messages.lock().unwrap().push(message.clone());
        Ok(message)
    }

    // ===== Assessment passthrough =====

    pub async fn start_assessment(
        &self,
        problem_category: &str,
        sub_category_id: &str,
    ) -> Result<AssessmentProgress> {
        let session = self.session();
        let mut assessment = self.assessment.lock().await;
        let progress = assessment
            .start(problem_category, sub_category_id, &session)
            .await?
            .clone();
        *self.problem_category.lock().unwrap() = Some(problem_category.to_string());
        Ok(progress)
    }

    pub async fn respond_assessment(&self, answer: &str) -> Result<AssessmentProgress> {
        let mut assessment = self.assessment.lock().await;
        Ok(assessment.respond(answer).await?.clone())
    }

    pub async fn cancel_assessment(&self) {
        self.assessment.lock().await.cancel().await;
    }

    pub async fn assessment_state(&self) -> AssessmentState {
        self.assessment.lock().await.state()
    }

    // ===== Lifecycle =====

    /// Abandon the current session: fresh identifiers, empty log, no
    /// category, no assessment.
    pub async fn restart_session(&self) -> Session {
        self.assessment.lock().await.cancel().await;
        self.messages.lock().unwrap().clear();
        *self.problem_category.lock().unwrap() = None;
        self.sessions.lock().unwrap().restart()
    }

    /// Tear down the streaming channel.
    pub async fn disconnect(&self) {
        self.dispatcher.lock().await.disconnect().await;
    }
}

#[async_trait]
impl ConversationHandle for ChatEngine {
    async fn submit(&self, text: &str) -> Result<String> {
        self.send(text).await.map(|message| message.text)
    }
}
