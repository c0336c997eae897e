//! Speech device abstractions.
//!
//! The orchestrator talks to the microphone and the speaker through these
//! traits so the conversation logic can be exercised without real audio
//! hardware. The scripted/recording implementations are the test doubles.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use solace_core::error::{Result, SolaceError};

/// Captures speech and returns transcripts, one utterance at a time.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Capture a single utterance and return its transcript.
    async fn listen_once(&self) -> Result<String>;

    /// Stop capturing and release the input device.
    fn stop(&self);
}

/// Plays synthesized speech.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Speak `text` to completion.
    async fn speak(&self, text: &str) -> Result<()>;

    /// Cancel any in-flight playback and release the output device.
    fn cancel(&self);
}

// =============================================================================
// Test doubles
// =============================================================================

/// Recognizer that plays back a fixed list of utterances.
///
/// Errors once the script is exhausted, which is how tests bound loops that
/// would otherwise listen forever.
pub struct ScriptedRecognizer {
    utterances: Mutex<VecDeque<String>>,
    pub stops: Mutex<u32>,
}

impl ScriptedRecognizer {
    pub fn new<I, S>(utterances: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            utterances: Mutex::new(utterances.into_iter().map(Into::into).collect()),
            stops: Mutex::new(0),
        }
    }
}

#[async_trait]
impl SpeechRecognizer for ScriptedRecognizer {
    async fn listen_once(&self) -> Result<String> {
        self.utterances
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| SolaceError::Upstream("no scripted utterances left".to_string()))
    }

    fn stop(&self) {
        *self.stops.lock().unwrap() += 1;
    }
}

/// Synthesizer that records what it was asked to speak.
pub struct RecordingSynthesizer {
    pub spoken: Mutex<Vec<String>>,
    pub cancels: Mutex<u32>,
}

impl RecordingSynthesizer {
    pub fn new() -> Self {
        Self {
            spoken: Mutex::new(Vec::new()),
            cancels: Mutex::new(0),
        }
    }
}

impl Default for RecordingSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechSynthesizer for RecordingSynthesizer {
    async fn speak(&self, text: &str) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn cancel(&self) {
        *self.cancels.lock().unwrap() += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_recognizer_plays_in_order() {
        let recognizer = ScriptedRecognizer::new(["hello", "goodbye"]);
        assert_eq!(recognizer.listen_once().await.unwrap(), "hello");
        assert_eq!(recognizer.listen_once().await.unwrap(), "goodbye");
        assert!(recognizer.listen_once().await.is_err());
    }

    #[tokio::test]
    async fn test_recording_synthesizer_tracks_playback() {
        let synthesizer = RecordingSynthesizer::new();
        synthesizer.speak("take a breath").await.unwrap();
        synthesizer.cancel();

        assert_eq!(*synthesizer.spoken.lock().unwrap(), vec!["take a breath"]);
        assert_eq!(*synthesizer.cancels.lock().unwrap(), 1);
    }
}
