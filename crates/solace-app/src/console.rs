//! Console stand-ins for the speech devices.
//!
//! Voice mode on the terminal: "listening" reads a line from the shared
//! stdin reader and "speaking" prints the reply with a voice marker. The
//! conversation flow is the real one, only the audio endpoints are text.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use solace_core::error::Result;
use solace_voice::{SpeechRecognizer, SpeechSynthesizer};

pub type SharedStdin = Arc<Mutex<Lines<BufReader<Stdin>>>>;

pub fn shared_stdin() -> SharedStdin {
    Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines()))
}

/// Reads one line per utterance from the shared stdin reader.
pub struct ConsoleRecognizer {
    stdin: SharedStdin,
}

impl ConsoleRecognizer {
    pub fn new(stdin: SharedStdin) -> Self {
        Self { stdin }
    }
}

#[async_trait]
impl SpeechRecognizer for ConsoleRecognizer {
    async fn listen_once(&self) -> Result<String> {
        print!("[listening] ");
        let _ = std::io::stdout().flush();
        let line = self.stdin.lock().await.next_line().await?;
        Ok(line.unwrap_or_default())
    }

    fn stop(&self) {
        tracing::debug!("console recognizer stopped");
    }
}

/// Prints replies with a voice marker instead of playing audio.
pub struct ConsoleSynthesizer;

#[async_trait]
impl SpeechSynthesizer for ConsoleSynthesizer {
    async fn speak(&self, text: &str) -> Result<()> {
        println!("[voice] {text}");
        Ok(())
    }

    fn cancel(&self) {
        tracing::debug!("console synthesizer cancelled");
    }
}
