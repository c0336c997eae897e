//! Voice conversation layer: speech device abstractions, the voice phase
//! state machine, and the orchestrator that turns captured utterances into
//! chat exchanges.

pub mod orchestrator;
pub mod speech;
pub mod state;

pub use orchestrator::{ConversationHandle, MuteSwitch, TranscriptLine, VoiceOrchestrator};
pub use speech::{RecordingSynthesizer, ScriptedRecognizer, SpeechRecognizer, SpeechSynthesizer};
pub use state::{VoiceMode, VoicePhase};
