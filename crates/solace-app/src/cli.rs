//! CLI argument definitions for the Solace console.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Solace — a supportive conversation console with streaming replies,
/// guided assessments and a voice mode.
#[derive(Parser, Debug)]
#[command(name = "solace", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// WebSocket URL of the streaming chat endpoint.
    #[arg(long = "stream-url")]
    pub stream_url: Option<String>,

    /// HTTP URL of the non-streaming chat fallback endpoint.
    #[arg(long = "chat-url")]
    pub chat_url: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > SOLACE_CONFIG env var > ~/.solace/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("SOLACE_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the streaming endpoint URL.
    ///
    /// Priority: --stream-url flag > SOLACE_STREAM_URL env var > config file value.
    pub fn resolve_stream_url(&self, config_url: &str) -> String {
        if let Some(ref url) = self.stream_url {
            return url.clone();
        }
        if let Ok(url) = std::env::var("SOLACE_STREAM_URL") {
            return url;
        }
        config_url.to_string()
    }

    /// Resolve the fallback endpoint URL.
    ///
    /// Priority: --chat-url flag > SOLACE_CHAT_URL env var > config file value.
    pub fn resolve_chat_url(&self, config_url: &str) -> String {
        if let Some(ref url) = self.chat_url {
            return url.clone();
        }
        if let Ok(url) = std::env::var("SOLACE_CHAT_URL") {
            return url;
        }
        config_url.to_string()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".solace").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".solace").join("config.toml");
    }
    PathBuf::from("config.toml")
}
