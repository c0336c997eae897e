//! Assessment flow state machine.
//!
//! Enforces valid lifecycle transitions:
//! - Idle -> Active (start accepted by the backend)
//! - Active -> Active (answer accepted, next question issued)
//! - Active -> Complete (final answer accepted)
//! - Active -> Cancelled (explicit cancel)
//! - Complete/Cancelled -> Active (a fresh flow starts)
//!
//! Every mutation happens only after the backend has accepted the
//! corresponding call. A failed network round trip leaves the progress
//! snapshot byte-for-byte identical to what it was before the call.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use solace_core::error::{Result, SolaceError};
use solace_core::types::{AssessmentProgress, QuestionResponse, Session};
use tracing::{debug, warn};

use crate::client::{AssessmentBackend, RespondOutcome};

/// Lifecycle state of an assessment flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssessmentState {
    /// No flow started. Ready to begin.
    Idle,
    /// A question is outstanding and awaiting an answer.
    Active,
    /// Every question was answered.
    Complete,
    /// The flow was abandoned before completion.
    Cancelled,
}

impl fmt::Display for AssessmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssessmentState::Idle => write!(f, "Idle"),
            AssessmentState::Active => write!(f, "Active"),
            AssessmentState::Complete => write!(f, "Complete"),
            AssessmentState::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl AssessmentState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &AssessmentState) -> bool {
        matches!(
            (self, target),
            (AssessmentState::Idle, AssessmentState::Active)
                | (AssessmentState::Active, AssessmentState::Active)
                | (AssessmentState::Active, AssessmentState::Complete)
                | (AssessmentState::Active, AssessmentState::Cancelled)
                // Restart transitions
                | (AssessmentState::Complete, AssessmentState::Active)
                | (AssessmentState::Cancelled, AssessmentState::Active)
        )
    }

    /// States from which a new flow may be started.
    pub fn can_start(&self) -> bool {
        self.can_transition_to(&AssessmentState::Active) && *self != AssessmentState::Active
    }
}

/// Drives a question/answer flow against an [`AssessmentBackend`].
///
/// Holds the single authoritative [`AssessmentProgress`] snapshot that is
/// attached to outgoing chat payloads while the flow is active.
pub struct AssessmentEngine {
    backend: Arc<dyn AssessmentBackend>,
    state: AssessmentState,
    progress: AssessmentProgress,
}

impl AssessmentEngine {
    pub fn new(backend: Arc<dyn AssessmentBackend>) -> Self {
        Self {
            backend,
            state: AssessmentState::Idle,
            progress: AssessmentProgress::default(),
        }
    }

    pub fn state(&self) -> AssessmentState {
        self.state
    }

    pub fn progress(&self) -> &AssessmentProgress {
        &self.progress
    }

    /// Progress snapshot for payload enrichment, present only while a
    /// question is outstanding.
    pub fn snapshot(&self) -> Option<AssessmentProgress> {
        (self.state == AssessmentState::Active).then(|| self.progress.clone())
    }

    /// Begin a new flow. Valid from Idle, Complete and Cancelled; starting
    /// while a flow is active is a validation error.
    pub async fn start(
        &mut self,
        problem_category: &str,
        sub_category_id: &str,
        session: &Session,
    ) -> Result<&AssessmentProgress> {
        if !self.state.can_start() {
            return Err(SolaceError::Validation(format!(
                "cannot start an assessment from state {}",
                self.state
            )));
        }

        let started = self
            .backend
            .start(problem_category, sub_category_id, session)
            .await?;

        debug!(
            question = %started.question.id,
            total = ?started.total_questions,
            "assessment started"
        );
        self.progress = AssessmentProgress {
            is_active: true,
            current_question: Some(started.question),
            completed_questions: Vec::new(),
            total_questions: started.total_questions,
            current_step: 1,
            session_id: Some(session.session_id),
            responses: Default::default(),
        };
        self.state = AssessmentState::Active;
        Ok(&self.progress)
    }

    /// Submit the answer to the outstanding question.
    ///
    /// With no outstanding question this is a validation error and nothing
    /// is mutated. The backend call happens before any local mutation, so a
    /// transport failure also leaves the snapshot untouched and the same
    /// answer can simply be retried.
    pub async fn respond(&mut self, answer: &str) -> Result<&AssessmentProgress> {
        let question = match (&self.state, &self.progress.current_question) {
            (AssessmentState::Active, Some(q)) => q.clone(),
            _ => {
                return Err(SolaceError::Validation(
                    "no active assessment question to respond to".to_string(),
                ))
            }
        };
        if answer.trim().is_empty() {
            return Err(SolaceError::Validation(
                "assessment answer cannot be empty".to_string(),
            ));
        }

        let outcome = self.backend.respond(&question.id, answer).await?;

        // Accepted by the backend; record the answer exactly once.
        self.progress.responses.entry(question.id.clone()).or_insert(
            QuestionResponse {
                question: question.text.clone(),
                answer: answer.to_string(),
                timestamp: Utc::now(),
            },
        );
        self.progress.completed_questions.push(question.id.clone());

        match outcome {
            RespondOutcome::Next(next) => {
                debug!(from = %question.id, to = %next.id, "assessment advanced");
                self.progress.current_step += 1;
                self.progress.current_question = Some(next);
            }
            RespondOutcome::Complete => {
                debug!(answered = self.progress.completed_questions.len(), "assessment complete");
                self.progress.current_question = None;
                self.progress.is_active = false;
                self.state = AssessmentState::Complete;
            }
        }
        Ok(&self.progress)
    }

    /// Abandon the flow. The backend is notified best-effort; local state
    /// is cleared regardless of whether that notification succeeds.
    pub async fn cancel(&mut self) {
        if let Err(e) = self.backend.cancel().await {
            warn!("assessment cancel notification failed: {e}");
        }
        if self.state == AssessmentState::Active {
            self.state = AssessmentState::Cancelled;
        } else {
            self.state = AssessmentState::Idle;
        }
        self.progress = AssessmentProgress::default();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ScriptedAssessment;
    use solace_core::types::AssessmentQuestion;

    fn question(id: &str) -> AssessmentQuestion {
        AssessmentQuestion {
            id: id.to_string(),
            text: format!("Question {id}"),
            options: vec!["Rarely".to_string(), "Often".to_string()],
            step: None,
        }
    }

    fn engine_with(questions: Vec<AssessmentQuestion>) -> (AssessmentEngine, Arc<ScriptedAssessment>) {
        let backend = Arc::new(ScriptedAssessment::new(questions));
        (AssessmentEngine::new(backend.clone()), backend)
    }

    #[test]
    fn test_valid_transitions() {
        assert!(AssessmentState::Idle.can_transition_to(&AssessmentState::Active));
        assert!(AssessmentState::Active.can_transition_to(&AssessmentState::Active));
        assert!(AssessmentState::Active.can_transition_to(&AssessmentState::Complete));
        assert!(AssessmentState::Active.can_transition_to(&AssessmentState::Cancelled));
        assert!(AssessmentState::Complete.can_transition_to(&AssessmentState::Active));
        assert!(AssessmentState::Cancelled.can_transition_to(&AssessmentState::Active));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!AssessmentState::Idle.can_transition_to(&AssessmentState::Complete));
        assert!(!AssessmentState::Idle.can_transition_to(&AssessmentState::Cancelled));
        assert!(!AssessmentState::Complete.can_transition_to(&AssessmentState::Idle));
        assert!(!AssessmentState::Complete.can_transition_to(&AssessmentState::Complete));
        assert!(!AssessmentState::Cancelled.can_transition_to(&AssessmentState::Cancelled));
    }

    #[tokio::test]
    async fn test_full_flow_to_completion() {
        let (mut engine, _) = engine_with(vec![question("q1"), question("q2")]);
        let session = Session::new();

        let progress = engine.start("anxiety", "general", &session).await.unwrap();
        assert!(progress.is_active);
        assert_eq!(progress.current_step, 1);
        assert_eq!(
            progress.current_question.as_ref().map(|q| q.id.as_str()),
            Some("q1")
        );
        assert_eq!(progress.session_id, Some(session.session_id));

        let progress = engine.respond("Often").await.unwrap();
        assert_eq!(progress.current_step, 2);
        assert_eq!(
            progress.current_question.as_ref().map(|q| q.id.as_str()),
            Some("q2")
        );
        assert_eq!(progress.completed_questions, vec!["q1"]);

        let progress = engine.respond("Rarely").await.unwrap();
        assert!(!progress.is_active);
        assert!(progress.current_question.is_none());
        assert_eq!(progress.completed_questions, vec!["q1", "q2"]);
        assert_eq!(engine.state(), AssessmentState::Complete);

        // Every answered question has exactly one recorded response.
        assert_eq!(engine.progress().responses.len(), 2);
        assert_eq!(engine.progress().responses["q1"].answer, "Often");
        assert_eq!(engine.progress().responses["q2"].answer, "Rarely");
    }

    #[tokio::test]
    async fn test_respond_without_active_question_mutates_nothing() {
        let (mut engine, _) = engine_with(vec![question("q1")]);

        let before = engine.progress().clone();
        let result = engine.respond("Often").await;
        assert!(matches!(result, Err(SolaceError::Validation(_))));
        assert_eq!(engine.state(), AssessmentState::Idle);
        assert_eq!(*engine.progress(), before);
    }

    #[tokio::test]
    async fn test_empty_answer_is_rejected() {
        let (mut engine, _) = engine_with(vec![question("q1")]);
        let session = Session::new();
        engine.start("anxiety", "general", &session).await.unwrap();

        let before = engine.progress().clone();
        let result = engine.respond("   ").await;
        assert!(matches!(result, Err(SolaceError::Validation(_))));
        assert_eq!(*engine.progress(), before);
    }

    #[tokio::test]
    async fn test_network_failure_leaves_progress_untouched() {
        let (mut engine, backend) = engine_with(vec![question("q1"), question("q2")]);
        let session = Session::new();
        engine.start("anxiety", "general", &session).await.unwrap();

        let before = engine.progress().clone();
        backend.fail_next_respond();
        let result = engine.respond("Often").await;
        assert!(matches!(result, Err(SolaceError::ConnectionUnreachable(_))));
        assert_eq!(engine.state(), AssessmentState::Active);
        assert_eq!(*engine.progress(), before);

        // The same answer retries cleanly once the backend recovers.
        let progress = engine.respond("Often").await.unwrap();
        assert_eq!(progress.completed_questions, vec!["q1"]);
    }

    #[tokio::test]
    async fn test_start_while_active_is_rejected() {
        let (mut engine, _) = engine_with(vec![question("q1"), question("q2")]);
        let session = Session::new();
        engine.start("anxiety", "general", &session).await.unwrap();

        let before = engine.progress().clone();
        let result = engine.start("stress", "work", &session).await;
        assert!(matches!(result, Err(SolaceError::Validation(_))));
        assert_eq!(*engine.progress(), before);
    }

    #[tokio::test]
    async fn test_cancel_notifies_backend_and_clears_state() {
        let (mut engine, backend) = engine_with(vec![question("q1")]);
        let session = Session::new();
        engine.start("anxiety", "general", &session).await.unwrap();

        engine.cancel().await;
        assert_eq!(engine.state(), AssessmentState::Cancelled);
        assert_eq!(*engine.progress(), AssessmentProgress::default());
        assert_eq!(*backend.cancels.lock().unwrap(), 1);
        assert!(engine.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_restart_after_cancel() {
        let (mut engine, _) = engine_with(vec![question("q1"), question("q2")]);
        let session = Session::new();
        engine.start("anxiety", "general", &session).await.unwrap();
        engine.cancel().await;

        let progress = engine.start("stress", "work", &session).await.unwrap();
        assert_eq!(progress.current_step, 1);
        assert!(progress.completed_questions.is_empty());
        assert_eq!(engine.state(), AssessmentState::Active);
    }

    #[tokio::test]
    async fn test_snapshot_only_while_active() {
        let (mut engine, _) = engine_with(vec![question("q1")]);
        let session = Session::new();
        assert!(engine.snapshot().is_none());

        engine.start("anxiety", "general", &session).await.unwrap();
        assert!(engine.snapshot().is_some());

        engine.respond("Often").await.unwrap();
        assert!(engine.snapshot().is_none());
    }
}
