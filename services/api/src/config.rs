//! Environment-backed configuration for the turn service.

use secrecy::SecretString;
use std::env;
use tracing::Level;

#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: SecretString,
    pub chat_model: String,
    pub stt_model: String,
    pub tts_voice: String,
    pub bind_addr: String,
    pub log_level: Level,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `OPENAI_API_KEY`: Required. Key for the transcription, completion and speech endpoints.
    // *   `CHAT_MODEL`: (Optional) Completion model for patient replies. Defaults to "gpt-4o".
    // *   `STT_MODEL`: (Optional) Transcription model. Defaults to "whisper-1".
    // *   `TTS_VOICE`: (Optional) Voice for synthesized replies. Defaults to "alloy".
    // *   `BIND_ADDR`: (Optional) Listen address. Defaults to "0.0.0.0:3000".
    // *   `RUST_LOG`: (Optional) Logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. Useful for local development, ignored if not present.
        dotenvy::dotenv().ok();

        let openai_api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;

        let chat_model = env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let stt_model = env::var("STT_MODEL").unwrap_or_else(|_| "whisper-1".to_string());
        let tts_voice = env::var("TTS_VOICE").unwrap_or_else(|_| "alloy".to_string());
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let log_level_str = env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            openai_api_key: openai_api_key.into(),
            chat_model,
            stt_model,
            tts_voice,
            bind_addr,
            log_level,
        })
    }
}
