use crate::convo::Turn;
use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

// Each external AI capability sits behind its own single-method trait so the
// pipeline can be driven by substitutable fakes in tests, the same way the
// OpenAI-backed client is swapped in at runtime.

/// Turns one recorded staff utterance into text.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> Result<String>;
}

/// Produces the next patient line given the grounding instructions and the
/// transcript so far.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, instructions: &str, history: &[Turn]) -> Result<String>;
}

/// Speaks a patient line, returning compressed audio bytes.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait SpeechSynthesis: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}
