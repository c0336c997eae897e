use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;

/// Top-level configuration for the Solace engine.
///
/// Loaded from `~/.solace/config.toml` by default. Each section corresponds
/// to one subsystem of the conversational pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SolaceConfig {
    pub general: GeneralConfig,
    pub backend: BackendConfig,
    pub search: SearchConfig,
    pub assessment: AssessmentConfig,
    pub voice: VoiceConfig,
}

impl SolaceConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SolaceConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration, falling back to defaults if the file does not
    /// exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Streaming backend and HTTP fallback endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// WebSocket URL of the streaming chat endpoint.
    pub stream_url: String,
    /// HTTP URL of the non-streaming chat endpoint used as fallback.
    pub chat_url: String,
    /// Bounded wait for the connection to open before falling back.
    pub connect_timeout_ms: u64,
    /// Bounded wait for one logical request to complete.
    pub request_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            stream_url: "ws://127.0.0.1:8900/chat/stream".to_string(),
            chat_url: "http://127.0.0.1:8900/chat".to_string(),
            connect_timeout_ms: 5000,
            request_timeout_ms: 60_000,
        }
    }
}

/// Semantic-search collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// HTTP URL of the vector search endpoint.
    pub search_url: String,
    /// Collection queried for semantic context.
    pub collection: String,
    /// Maximum number of results attached to a payload.
    pub limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            search_url: "http://127.0.0.1:8900/vector/search".to_string(),
            collection: "conversations".to_string(),
            limit: 5,
        }
    }
}

/// Assessment backend endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessmentConfig {
    /// Base URL; `/assessment/start`, `/assessment/respond`,
    /// `/assessment/status` and `/assessment/cancel` are appended.
    pub base_url: String,
    pub request_timeout_ms: u64,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8900".to_string(),
            request_timeout_ms: 15_000,
        }
    }
}

/// Voice conversation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Delay before fluid mode re-arms listening after a reply.
    pub fluid_rearm_delay_ms: u64,
    /// Delay before unmuting re-arms the fluid loop.
    pub unmute_rearm_delay_ms: u64,
    /// Fluid exchanges before the orchestrator forces test-script mode.
    pub max_conversations: u32,
    /// Ordered feedback questions for test-script mode.
    pub feedback_questions: Vec<String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            fluid_rearm_delay_ms: 1500,
            unmute_rearm_delay_ms: 500,
            max_conversations: 10,
            feedback_questions: vec![
                "How helpful did you find this conversation?".to_string(),
                "Was the pace of the conversation comfortable?".to_string(),
                "Would you use voice mode again?".to_string(),
            ],
        }
    }
}
