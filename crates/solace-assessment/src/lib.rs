//! Guided assessment flows: a validated question/answer state machine
//! backed by a remote assessment service.

pub mod client;
pub mod engine;

pub use client::{
    AssessmentBackend, HttpAssessmentClient, RespondOutcome, ScriptedAssessment, StartedAssessment,
};
pub use engine::{AssessmentEngine, AssessmentState};
