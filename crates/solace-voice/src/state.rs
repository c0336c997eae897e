//! Voice mode and phase state machines.
//!
//! Valid phase transitions:
//! - Idle -> Listening (arm capture)
//! - Idle -> Speaking (scripted prompt)
//! - Listening -> Processing (utterance captured)
//! - Processing -> Speaking (reply ready)
//! - Speaking -> Listening (scripted prompt flows into capture)
//! - Speaking -> Idle (playback finished)
//! - Listening -> Idle (mute/cancel)
//! - Processing -> Idle (mute/cancel)
//!
//! A single phase value means listening, speaking and processing are
//! mutually exclusive by construction.

use std::fmt;

/// How voice exchanges are initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoiceMode {
    /// The user triggers each exchange explicitly.
    Manual,
    /// Listening re-arms automatically after each reply.
    Fluid,
    /// A fixed feedback questionnaire is read out and answered.
    TestScript,
}

impl fmt::Display for VoiceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceMode::Manual => write!(f, "Manual"),
            VoiceMode::Fluid => write!(f, "Fluid"),
            VoiceMode::TestScript => write!(f, "TestScript"),
        }
    }
}

/// What the voice pipeline is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoicePhase {
    /// Nothing in flight.
    Idle,
    /// Capturing an utterance from the microphone.
    Listening,
    /// Waiting on the conversation backend for a reply.
    Processing,
    /// Playing a synthesized reply.
    Speaking,
}

impl fmt::Display for VoicePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoicePhase::Idle => write!(f, "Idle"),
            VoicePhase::Listening => write!(f, "Listening"),
            VoicePhase::Processing => write!(f, "Processing"),
            VoicePhase::Speaking => write!(f, "Speaking"),
        }
    }
}

impl VoicePhase {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &VoicePhase) -> bool {
        matches!(
            (self, target),
            (VoicePhase::Idle, VoicePhase::Listening)
                | (VoicePhase::Idle, VoicePhase::Speaking)
                | (VoicePhase::Listening, VoicePhase::Processing)
                | (VoicePhase::Processing, VoicePhase::Speaking)
                | (VoicePhase::Speaking, VoicePhase::Listening)
                | (VoicePhase::Speaking, VoicePhase::Idle)
                // Cancel transitions
                | (VoicePhase::Listening, VoicePhase::Idle)
                | (VoicePhase::Processing, VoicePhase::Idle)
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
