use serde::{Deserialize, Serialize};

/// Who produced an utterance in the training call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Staff,
    Patient,
}

/// One utterance in the call transcript.
///
/// The full transcript travels with every request; the server keeps nothing
/// between turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

impl Turn {
    pub fn staff(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Staff,
            text: text.into(),
        }
    }

    pub fn patient(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Patient,
            text: text.into(),
        }
    }
}
