//! OpenAI-backed implementations of the three AI capabilities.
//!
//! One client covers all three endpoints; each trait impl is a single HTTP
//! round trip. Every request carries the client-wide timeout, and nothing is
//! retried: a failed call fails the whole turn.

use crate::capabilities::{ReplyGenerator, SpeechSynthesis, SpeechToText};
use crate::convo::{Speaker, Turn};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, multipart};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const TTS_MODEL: &str = "tts-1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Moderate creativity: replies should vary between runs without wandering
/// off the persona.
const REPLY_TEMPERATURE: f64 = 0.8;

#[derive(Debug, Deserialize)]
struct LlmResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: SecretString,
    base_url: String,
    chat_model: String,
    stt_model: String,
    voice: String,
}

impl OpenAiClient {
    pub fn new(
        api_key: SecretString,
        chat_model: String,
        stt_model: String,
        voice: String,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            chat_model,
            stt_model,
            voice,
        })
    }

    /// Points the client at a different API root, e.g. a local gateway.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

/// Maps transcript speakers onto the chat roles the completion API expects:
/// the trainee is the `user`, the simulated patient is the `assistant`.
fn chat_messages(instructions: &str, history: &[Turn]) -> Vec<serde_json::Value> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(json!({ "role": "system", "content": instructions }));
    for turn in history {
        let role = match turn.speaker {
            Speaker::Staff => "user",
            Speaker::Patient => "assistant",
        };
        messages.push(json!({ "role": role, "content": turn.text }));
    }
    messages
}

#[async_trait]
impl SpeechToText for OpenAiClient {
    async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        let part = multipart::Part::bytes(audio.to_vec())
            .file_name("turn.wav")
            .mime_str("audio/wav")?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("model", self.stt_model.clone());

        let resp = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .context("Transcription request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("transcription error {status}: {body}");
        }

        let out: TranscriptionResponse = resp
            .json()
            .await
            .context("Transcription response was not valid JSON")?;
        Ok(out.text)
    }
}

#[async_trait]
impl ReplyGenerator for OpenAiClient {
    async fn generate(&self, instructions: &str, history: &[Turn]) -> Result<String> {
        let body = json!({
            "model": self.chat_model,
            "messages": chat_messages(instructions, history),
            "temperature": REPLY_TEMPERATURE,
        });

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .context("Completion request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("completion error {status}: {body}");
        }

        let out: LlmResponse = resp
            .json()
            .await
            .context("Completion response was not valid JSON")?;
        let reply = out
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("completion returned no choices"))?
            .message
            .content;
        Ok(reply)
    }
}

#[async_trait]
impl SpeechSynthesis for OpenAiClient {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let body = json!({
            "model": TTS_MODEL,
            "voice": self.voice,
            "input": text,
            "response_format": "mp3",
        });

        let resp = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .context("Speech synthesis request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("speech synthesis error {status}: {body}");
        }

        let bytes = resp
            .bytes()
            .await
            .context("Failed to read synthesized audio body")?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staff_turns_become_user_messages_and_patient_turns_assistant() {
        let history = vec![
            Turn::staff("Thanks for calling, how can I help?"),
            Turn::patient("How much is a first visit?"),
        ];
        let messages = chat_messages("be a patient", &history);

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "be a patient");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[2]["content"], "How much is a first visit?");
    }

    // Live API test, run with `cargo test -- --ignored` and a real key.
    #[tokio::test]
    #[ignore]
    async fn generate_produces_a_reply_against_the_live_api() {
        dotenvy::dotenv_override().ok();
        let api_key = std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY not set");
        let client = OpenAiClient::new(
            api_key.into(),
            "gpt-4o".to_string(),
            "whisper-1".to_string(),
            "alloy".to_string(),
        )
        .unwrap();

        let history = vec![Turn::staff("Hi, thanks for calling Lakeside Spine!")];
        let reply = client
            .generate("You are a prospective patient. Reply in one sentence.", &history)
            .await
            .unwrap();
        assert!(!reply.trim().is_empty());
    }
}
