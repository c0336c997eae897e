//! Voice conversation orchestrator.
//!
//! Drives the listen -> process -> speak cycle across three modes:
//! manual (one cycle per explicit trigger), fluid (listening re-arms
//! automatically after each reply, up to a conversation cap), and
//! test-script (a fixed feedback questionnaire is spoken and answered).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use solace_core::config::VoiceConfig;
use solace_core::error::{Result, SolaceError};
use solace_core::types::Sender;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::speech::{SpeechRecognizer, SpeechSynthesizer};
use crate::state::{VoiceMode, VoicePhase};

/// Something that can turn a user utterance into a reply. The chat engine
/// implements this so voice exchanges flow through the same pipeline as
/// typed messages.
#[async_trait]
pub trait ConversationHandle: Send + Sync {
    async fn submit(&self, text: &str) -> Result<String>;
}

/// One line of a voice transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptLine {
    pub sender: Sender,
    pub text: String,
}

/// Cloneable mute control, shared with the orchestrator. Muting from any
/// holder stops capture, cancels playback and resolves the orchestrator's
/// in-flight listen or speak immediately, even while a cycle is running
/// on another task.
#[derive(Clone)]
pub struct MuteSwitch {
    muted: Arc<watch::Sender<bool>>,
    recognizer: Arc<dyn SpeechRecognizer>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
}

impl MuteSwitch {
    pub fn set(&self, muted: bool) {
        if self.muted.send_replace(muted) == muted {
            return;
        }
        if muted {
            self.recognizer.stop();
            self.synthesizer.cancel();
        }
    }

    pub fn is_muted(&self) -> bool {
        *self.muted.borrow()
    }
}

/// Coordinates the speech devices, the conversation backend and the voice
/// state machines. Each mode keeps its own transcript; entering a mode
/// starts that transcript fresh. The mute flag lives behind a watch
/// channel so a [`MuteSwitch`] can flip it mid-cycle.
pub struct VoiceOrchestrator {
    recognizer: Arc<dyn SpeechRecognizer>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    conversation: Arc<dyn ConversationHandle>,
    config: VoiceConfig,
    mode: VoiceMode,
    phase: VoicePhase,
    mute: MuteSwitch,
    conversation_count: u32,
    script_index: usize,
    transcripts: HashMap<VoiceMode, Vec<TranscriptLine>>,
}

impl VoiceOrchestrator {
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        conversation: Arc<dyn ConversationHandle>,
        config: VoiceConfig,
    ) -> Self {
        let (muted, _) = watch::channel(false);
        let mute = MuteSwitch {
            muted: Arc::new(muted),
            recognizer: recognizer.clone(),
            synthesizer: synthesizer.clone(),
        };
        Self {
            recognizer,
            synthesizer,
            conversation,
            config,
            mode: VoiceMode::Manual,
            phase: VoicePhase::Idle,
            mute,
            conversation_count: 0,
            script_index: 0,
            transcripts: HashMap::new(),
        }
    }

    pub fn mode(&self) -> VoiceMode {
        self.mode
    }

    pub fn phase(&self) -> VoicePhase {
        self.phase
    }

    pub fn is_muted(&self) -> bool {
        self.mute.is_muted()
    }

    /// A handle for muting from another task, e.g. a hotkey listener,
    /// while a cycle or the fluid loop holds the orchestrator.
    pub fn mute_switch(&self) -> MuteSwitch {
        self.mute.clone()
    }

    /// Completed fluid exchanges since fluid mode was last entered.
    pub fn conversation_count(&self) -> u32 {
        self.conversation_count
    }

    pub fn transcript(&self, mode: VoiceMode) -> &[TranscriptLine] {
        self.transcripts.get(&mode).map_or(&[], Vec::as_slice)
    }

    /// Switch modes. Stops whatever is in flight, clears the target mode's
    /// transcript and resets that mode's counters.
    pub fn set_mode(&mut self, mode: VoiceMode) {
        if mode == self.mode {
            return;
        }
        self.recognizer.stop();
        self.synthesizer.cancel();
        self.phase = VoicePhase::Idle;
        self.transcripts.insert(mode, Vec::new());
        match mode {
            VoiceMode::Fluid => self.conversation_count = 0,
            VoiceMode::TestScript => self.script_index = 0,
            VoiceMode::Manual => {}
        }
        info!("voice mode: {} -> {}", self.mode, mode);
        self.mode = mode;
    }

    /// Mute or unmute. Muting stops capture and cancels playback
    /// immediately; unmuting in fluid mode waits out the re-arm delay so
    /// the microphone does not pick up trailing audio.
    pub async fn toggle_mute(&mut self, muted: bool) {
        if muted == self.is_muted() {
            return;
        }
        self.mute.set(muted);
        if muted {
            self.phase = VoicePhase::Idle;
            info!("voice muted");
        } else {
            info!("voice unmuted");
            if self.mode == VoiceMode::Fluid {
                tokio::time::sleep(Duration::from_millis(self.config.unmute_rearm_delay_ms)).await;
            }
        }
    }

    /// Run one listen -> process -> speak exchange.
    ///
    /// A no-op (`Ok(None)`) while muted, while another cycle is in flight,
    /// or when the captured utterance is empty. Returns the spoken reply
    /// otherwise.
    pub async fn run_cycle(&mut self) -> Result<Option<String>> {
        if self.is_muted() {
            return Ok(None);
        }
        if self.phase != VoicePhase::Idle {
            debug!("voice cycle already in flight, ignoring trigger");
            return Ok(None);
        }

        self.set_phase(VoicePhase::Listening)?;
        let recognizer = Arc::clone(&self.recognizer);
        let mut mute_signal = self.mute.muted.subscribe();
        let heard = tokio::select! {
            captured = recognizer.listen_once() => match captured {
                Ok(text) => text,
                Err(e) => {
                    self.phase = VoicePhase::Idle;
                    return Err(e);
                }
            },
            _ = mute_signal.wait_for(|&muted| muted) => {
                // The switch already stopped capture.
                self.phase = VoicePhase::Idle;
                return Ok(None);
            }
        };
        if heard.trim().is_empty() {
            self.phase = VoicePhase::Idle;
            return Ok(None);
        }

        self.set_phase(VoicePhase::Processing)?;
        self.push_line(Sender::User, &heard);
        let reply = match self.conversation.submit(&heard).await {
            Ok(reply) => reply,
            Err(e) => {
                self.phase = VoicePhase::Idle;
                return Err(e);
            }
        };
        self.push_line(Sender::Ai, &reply);

        self.set_phase(VoicePhase::Speaking)?;
        let synthesizer = Arc::clone(&self.synthesizer);
        let mut mute_signal = self.mute.muted.subscribe();
        let spoke = tokio::select! {
            outcome = synthesizer.speak(&reply) => outcome,
            // Muting cuts the playback short; the exchange itself stands.
            _ = mute_signal.wait_for(|&muted| muted) => Ok(()),
        };
        self.phase = VoicePhase::Idle;
        spoke?;
        Ok(Some(reply))
    }

    /// Run the fluid loop until the mode changes or the conversation cap
    /// forces test-script mode. While muted the loop pauses rather than
    /// exits; unmuting re-arms listening after the re-arm delay.
    pub async fn run_fluid(&mut self) -> Result<()> {
        if self.mode != VoiceMode::Fluid {
            return Err(SolaceError::Validation(format!(
                "fluid loop requested in {} mode",
                self.mode
            )));
        }

        let mut mute_signal = self.mute.muted.subscribe();
        while self.mode == VoiceMode::Fluid {
            if self.is_muted() {
                if mute_signal.wait_for(|&muted| !muted).await.is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(self.config.unmute_rearm_delay_ms)).await;
                continue;
            }
            if self.run_cycle().await?.is_some() {
                self.conversation_count += 1;
                if self.conversation_count >= self.config.max_conversations {
                    info!(
                        count = self.conversation_count,
                        "conversation cap reached, switching to test script"
                    );
                    self.set_mode(VoiceMode::TestScript);
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(self.config.fluid_rearm_delay_ms)).await;
        }
        Ok(())
    }

    /// Speak the next scripted feedback question and capture one answer.
    ///
    /// Returns `Ok(false)` once the script is exhausted (or while muted),
    /// `Ok(true)` after a question/answer pair was recorded.
    pub async fn script_step(&mut self) -> Result<bool> {
        if self.mode != VoiceMode::TestScript {
            return Err(SolaceError::Validation(format!(
                "script step requested in {} mode",
                self.mode
            )));
        }
        if self.is_muted() || self.phase != VoicePhase::Idle {
            return Ok(false);
        }
        let Some(question) = self.config.feedback_questions.get(self.script_index).cloned() else {
            return Ok(false);
        };

        self.set_phase(VoicePhase::Speaking)?;
        let synthesizer = Arc::clone(&self.synthesizer);
        let mut mute_signal = self.mute.muted.subscribe();
        tokio::select! {
            outcome = synthesizer.speak(&question) => {
                if let Err(e) = outcome {
                    self.phase = VoicePhase::Idle;
                    return Err(e);
                }
            }
            _ = mute_signal.wait_for(|&muted| muted) => {
                self.phase = VoicePhase::Idle;
                return Ok(false);
            }
        }

        self.set_phase(VoicePhase::Listening)?;
        let recognizer = Arc::clone(&self.recognizer);
        let answer = tokio::select! {
            captured = recognizer.listen_once() => match captured {
                Ok(text) => text,
                Err(e) => {
                    self.phase = VoicePhase::Idle;
                    return Err(e);
                }
            },
            _ = mute_signal.wait_for(|&muted| muted) => {
                self.phase = VoicePhase::Idle;
                return Ok(false);
            }
        };
        self.phase = VoicePhase::Idle;

        self.push_line(Sender::Ai, &question);
        self.push_line(Sender::User, &answer);
        self.script_index += 1;
        debug!(step = self.script_index, "feedback question answered");
        Ok(true)
    }

    /// Run the feedback questionnaire to the end of the script.
    pub async fn run_test_script(&mut self) -> Result<()> {
        while self.script_step().await? {}
        Ok(())
    }

    fn set_phase(&mut self, target: VoicePhase) -> Result<()> {
        if self.phase.can_transition_to(&target) {
            debug!("voice phase: {} -> {}", self.phase, target);
            self.phase = target;
            Ok(())
        } else {
            Err(SolaceError::Validation(format!(
                "invalid voice phase transition: {} -> {}",
                self.phase, target
            )))
        }
    }

    fn push_line(&mut self, sender: Sender, text: &str) {
        self.transcripts
            .entry(self.mode)
            .or_default()
            .push(TranscriptLine {
                sender,
                text: text.to_string(),
            });
    }
}

// =============================================================================
// Tests
// =============================================================================
