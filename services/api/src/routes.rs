//! The turn endpoint: one multipart POST that advances a training call by a
//! single staff/patient exchange.

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use intake_core::{
    ClinicProfile, Mode, ReplyGenerator, SpeechSynthesis, SpeechToText, Turn, TurnError,
    TurnOutcome, TurnPipeline,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Uploaded audio segments stay comfortably under this; it matches the
/// transcription endpoint's own file limit.
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid {0} payload")]
    InvalidField(&'static str),
    #[error("malformed multipart body")]
    MalformedBody,
    #[error(transparent)]
    Turn(#[from] TurnError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::MissingField(_) | ApiError::InvalidField(_) | ApiError::MalformedBody => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            ApiError::Turn(err) if err.is_client_input() => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            // Stage and cause were already logged where the failure happened;
            // the caller only learns that the simulation is unavailable.
            ApiError::Turn(_) => (
                StatusCode::BAD_GATEWAY,
                "the simulated patient is unavailable right now; please try again".to_string(),
            ),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub fn app<S, G, V>(pipeline: Arc<TurnPipeline<S, G, V>>) -> Router
where
    S: SpeechToText + 'static,
    G: ReplyGenerator + 'static,
    V: SpeechSynthesis + 'static,
{
    // Permissive CORS so a browser frontend on another origin can call us.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/turn", post(advance_turn::<S, G, V>))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .with_state(pipeline)
}

async fn healthz() -> &'static str {
    "ok"
}

struct TurnRequest {
    audio: Bytes,
    mode: Mode,
    profile: ClinicProfile,
    turns: Vec<Turn>,
}

/// Pulls the form fields out of the multipart stream, validating shape
/// before any of it reaches pipeline logic. Unknown fields are ignored.
async fn read_request(multipart: &mut Multipart) -> Result<TurnRequest, ApiError> {
    let mut audio: Option<Bytes> = None;
    let mut mode = Mode::default();
    let mut profile: Option<ClinicProfile> = None;
    let mut turns: Option<Vec<Turn>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::MalformedBody)?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("audio") => {
                audio = Some(field.bytes().await.map_err(|_| ApiError::MalformedBody)?);
            }
            Some("mode") => {
                let value = field.text().await.map_err(|_| ApiError::MalformedBody)?;
                mode = Mode::parse(&value);
            }
            Some("clinicConfig") => {
                let value = field.text().await.map_err(|_| ApiError::MalformedBody)?;
                profile = Some(
                    serde_json::from_str(&value)
                        .map_err(|_| ApiError::InvalidField("clinicConfig"))?,
                );
            }
            Some("turns") => {
                let value = field.text().await.map_err(|_| ApiError::MalformedBody)?;
                turns =
                    Some(serde_json::from_str(&value).map_err(|_| ApiError::InvalidField("turns"))?);
            }
            _ => {}
        }
    }

    Ok(TurnRequest {
        audio: audio.ok_or(ApiError::MissingField("audio"))?,
        mode,
        profile: profile.ok_or(ApiError::MissingField("clinicConfig"))?,
        turns: turns.ok_or(ApiError::MissingField("turns"))?,
    })
}

async fn advance_turn<S, G, V>(
    State(pipeline): State<Arc<TurnPipeline<S, G, V>>>,
    mut multipart: Multipart,
) -> Result<Json<TurnOutcome>, ApiError>
where
    S: SpeechToText,
    G: ReplyGenerator,
    V: SpeechSynthesis,
{
    let request = read_request(&mut multipart).await?;
    tracing::info!(
        mode = request.mode.id(),
        prior_turns = request.turns.len(),
        audio_bytes = request.audio.len(),
        "advancing turn"
    );

    let outcome = pipeline
        .advance_turn(
            &request.audio,
            &request.turns,
            &request.profile,
            request.mode,
        )
        .await?;
    Ok(Json(outcome))
}
