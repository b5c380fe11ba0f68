pub mod capabilities;
pub mod clinic;
pub mod convo;
pub mod error;
pub mod instructions;
pub mod openai;
pub mod pipeline;

pub use capabilities::{ReplyGenerator, SpeechSynthesis, SpeechToText};
pub use clinic::{ClinicProfile, Mode};
pub use convo::{Speaker, Turn};
pub use error::{Stage, TurnError};
pub use openai::OpenAiClient;
pub use pipeline::{TurnOutcome, TurnPipeline};
