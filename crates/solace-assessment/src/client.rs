//! Assessment service client.
//!
//! The engine talks to the backend through [`AssessmentBackend`] so tests
//! can script flows without a server. [`HttpAssessmentClient`] is the real
//! implementation over the four assessment endpoints.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use solace_core::config::AssessmentConfig;
use solace_core::error::{Result, SolaceError};
use solace_core::types::{AssessmentQuestion, Session};

/// What the backend hands out when a flow starts.
#[derive(Debug, Clone, Deserialize)]
pub struct StartedAssessment {
    pub question: AssessmentQuestion,
    #[serde(default)]
    pub total_questions: Option<u32>,
}

/// Result of submitting one answer.
#[derive(Debug, Clone)]
pub enum RespondOutcome {
    /// The flow continues with this question.
    Next(AssessmentQuestion),
    /// The answered question was the last one.
    Complete,
}

#[async_trait]
pub trait AssessmentBackend: Send + Sync {
    async fn start(
        &self,
        problem_category: &str,
        sub_category_id: &str,
        session: &Session,
    ) -> Result<StartedAssessment>;

    async fn respond(&self, question_id: &str, answer: &str) -> Result<RespondOutcome>;

    async fn status(&self) -> Result<Value>;

    async fn cancel(&self) -> Result<()>;
}

// ===== HTTP client =====

#[derive(Debug, Serialize)]
struct StartRequest<'a> {
    problem_category: &'a str,
    sub_category_id: &'a str,
    session_data: &'a Session,
}

#[derive(Debug, Serialize)]
struct RespondRequest<'a> {
    response: &'a str,
    question_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct RespondResponse {
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    next_question: Option<AssessmentQuestion>,
}

/// Client for the remote assessment service.
pub struct HttpAssessmentClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpAssessmentClient {
    pub fn new(http: reqwest::Client, config: &AssessmentConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(config.request_timeout_ms),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/assessment/{path}", self.base_url)
    }

    async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<Value> {
        let response = self
            .http
            .post(self.endpoint(path))
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SolaceError::Upstream(format!(
                "assessment {path} returned {status}: {body}"
            )));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| SolaceError::Serialization(format!("assessment {path} body: {e}")))
    }
}

fn map_transport_error(err: reqwest::Error) -> SolaceError {
    if err.is_timeout() {
        SolaceError::Timeout {
            ms: 0,
            context: "assessment request".to_string(),
        }
    } else if err.is_connect() {
        SolaceError::ConnectionUnreachable(err.to_string())
    } else {
        SolaceError::Http(err.to_string())
    }
}

#[async_trait]
impl AssessmentBackend for HttpAssessmentClient {
    async fn start(
        &self,
        problem_category: &str,
        sub_category_id: &str,
        session: &Session,
    ) -> Result<StartedAssessment> {
        let body = StartRequest {
            problem_category,
            sub_category_id,
            session_data: session,
        };
        let value = self.post_json("start", &body).await?;
        serde_json::from_value(value)
            .map_err(|e| SolaceError::Serialization(format!("assessment start body: {e}")))
    }

    async fn respond(&self, question_id: &str, answer: &str) -> Result<RespondOutcome> {
        let body = RespondRequest {
            response: answer,
            question_id,
        };
        let value = self.post_json("respond", &body).await?;
        let parsed: RespondResponse = serde_json::from_value(value)
            .map_err(|e| SolaceError::Serialization(format!("assessment respond body: {e}")))?;
        match parsed.next_question {
            Some(question) if !parsed.completed => Ok(RespondOutcome::Next(question)),
            _ => Ok(RespondOutcome::Complete),
        }
    }

    async fn status(&self) -> Result<Value> {
        let response = self
            .http
            .get(self.endpoint("status"))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SolaceError::Upstream(format!(
                "assessment status returned {status}"
            )));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| SolaceError::Serialization(format!("assessment status body: {e}")))
    }

    async fn cancel(&self) -> Result<()> {
        self.post_json("cancel", &serde_json::json!({})).await?;
        Ok(())
    }
}

// ===== Scripted backend for tests =====

/// In-memory backend that plays a fixed question script.
///
/// `fail_next_respond` makes the following `respond` call fail with a
/// transport error, which is how tests exercise the no-mutation-on-failure
/// guarantee.
pub struct ScriptedAssessment {
    script: Mutex<VecDeque<AssessmentQuestion>>,
    total: u32,
    fail_next_respond: Mutex<bool>,
    pub cancels: Mutex<u32>,
}

impl ScriptedAssessment {
    pub fn new(questions: Vec<AssessmentQuestion>) -> Self {
        let total = questions.len() as u32;
        Self {
            script: Mutex::new(questions.into()),
            total,
            fail_next_respond: Mutex::new(false),
            cancels: Mutex::new(0),
        }
    }

    pub fn fail_next_respond(&self) {
        *self.fail_next_respond.lock().unwrap() = true;
    }
}

#[async_trait]
impl AssessmentBackend for ScriptedAssessment {
    async fn start(
        &self,
        _problem_category: &str,
        _sub_category_id: &str,
        _session: &Session,
    ) -> Result<StartedAssessment> {
        let question = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| SolaceError::Upstream("no questions scripted".to_string()))?;
        Ok(StartedAssessment {
            question,
            total_questions: Some(self.total),
        })
    }

    async fn respond(&self, _question_id: &str, _answer: &str) -> Result<RespondOutcome> {
        let mut fail = self.fail_next_respond.lock().unwrap();
        if *fail {
            *fail = false;
            return Err(SolaceError::ConnectionUnreachable(
                "scripted transport failure".to_string(),
            ));
        }
        match self.script.lock().unwrap().pop_front() {
            Some(question) => Ok(RespondOutcome::Next(question)),
            None => Ok(RespondOutcome::Complete),
        }
    }

    async fn status(&self) -> Result<Value> {
        Ok(serde_json::json!({ "remaining": self.script.lock().unwrap().len() }))
    }

    async fn cancel(&self) -> Result<()> {
        *self.cancels.lock().unwrap() += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str) -> AssessmentQuestion {
        AssessmentQuestion {
            id: id.to_string(),
            text: format!("Question {id}"),
            options: vec!["Yes".to_string(), "No".to_string()],
            step: None,
        }
    }

    #[tokio::test]
    async fn test_scripted_backend_plays_in_order() {
        let backend = ScriptedAssessment::new(vec![question("q1"), question("q2")]);
        let session = Session::new();

        let started = backend.start("anxiety", "general", &session).await.unwrap();
        assert_eq!(started.question.id, "q1");
        assert_eq!(started.total_questions, Some(2));

        match backend.respond("q1", "Yes").await.unwrap() {
            RespondOutcome::Next(q) => assert_eq!(q.id, "q2"),
            RespondOutcome::Complete => panic!("expected a second question"),
        }
        assert!(matches!(
            backend.respond("q2", "No").await.unwrap(),
            RespondOutcome::Complete
        ));
    }

    #[tokio::test]
    async fn test_scripted_failure_is_one_shot() {
        let backend = ScriptedAssessment::new(vec![question("q1"), question("q2")]);
        let session = Session::new();
        backend.start("anxiety", "general", &session).await.unwrap();

        backend.fail_next_respond();
        assert!(backend.respond("q1", "Yes").await.is_err());
        assert!(backend.respond("q1", "Yes").await.is_ok());
    }
}
