//! HTTP access to the turn endpoint.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use intake_core::{ClinicProfile, Mode, Turn, TurnOutcome};
use reqwest::multipart;
use serde::Deserialize;
use std::time::Duration;

/// Generous: the server runs three sequential AI calls per turn.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// One completed exchange as the client sees it, reply audio already
/// decoded from its base64 transport form.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReply {
    pub staff_text: String,
    pub patient_text: String,
    pub audio: Vec<u8>,
    pub turns: Vec<Turn>,
}

#[async_trait]
pub trait TurnApi: Send + Sync {
    async fn advance(
        &self,
        audio_wav: Vec<u8>,
        mode: Mode,
        profile: &ClinicProfile,
        turns: &[Turn],
    ) -> Result<TurnReply>;
}

pub struct HttpTurnApi {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpTurnApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        let base_url = base_url.into();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl TurnApi for HttpTurnApi {
    async fn advance(
        &self,
        audio_wav: Vec<u8>,
        mode: Mode,
        profile: &ClinicProfile,
        turns: &[Turn],
    ) -> Result<TurnReply> {
        let audio = multipart::Part::bytes(audio_wav)
            .file_name("turn.wav")
            .mime_str("audio/wav")?;
        let form = multipart::Form::new()
            .part("audio", audio)
            .text("mode", mode.id())
            .text("clinicConfig", serde_json::to_string(profile)?)
            .text("turns", serde_json::to_string(turns)?);

        let resp = self
            .client
            .post(format!("{}/api/turn", self.base_url))
            .multipart(form)
            .send()
            .await
            .context("Turn request failed to reach the server")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            anyhow::bail!("turn request failed ({status}): {message}");
        }

        let outcome: TurnOutcome = resp
            .json()
            .await
            .context("Turn response was not valid JSON")?;
        let audio = base64::engine::general_purpose::STANDARD
            .decode(&outcome.audio_base64)
            .context("Reply audio was not valid base64")?;

        Ok(TurnReply {
            staff_text: outcome.staff_text,
            patient_text: outcome.patient_text,
            audio,
            turns: outcome.turns,
        })
    }
}
