use std::fmt;
use thiserror::Error;

/// The external call a failed turn died in. Logged server-side; never shown
/// to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Transcription,
    Generation,
    Synthesis,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Transcription => "transcription",
            Stage::Generation => "generation",
            Stage::Synthesis => "synthesis",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum TurnError {
    /// The caller submitted no audio. A client error, not a service failure.
    #[error("audio payload is empty")]
    EmptyAudio,

    /// One of the three external capabilities failed. The turn is discarded
    /// whole; callers see only that the service was unavailable.
    #[error("{stage} stage failed")]
    Service {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },
}

impl TurnError {
    /// True for errors caused by the request itself rather than a backend.
    pub fn is_client_input(&self) -> bool {
        matches!(self, TurnError::EmptyAudio)
    }
}
