mod config;
mod routes;

use crate::config::Config;
use anyhow::{Context, Result};
use intake_core::{OpenAiClient, TurnPipeline};
use std::sync::Arc;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load API configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    let openai = OpenAiClient::new(
        config.openai_api_key.clone(),
        config.chat_model.clone(),
        config.stt_model.clone(),
        config.tts_voice.clone(),
    )
    .context("Failed to build OpenAI client")?;

    // The same client backs all three stages; each request drives them in
    // sequence and shares nothing across requests.
    let pipeline = Arc::new(TurnPipeline::new(openai.clone(), openai.clone(), openai));
    let app = routes::app(pipeline);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!("intake api listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
