//! The turn pipeline: one complete staff → patient exchange.
//!
//! Stateless per invocation. The caller supplies the whole transcript and
//! gets the whole updated transcript back; a failure at any stage discards
//! everything, so a turn either lands in full or not at all.

use crate::capabilities::{ReplyGenerator, SpeechSynthesis, SpeechToText};
use crate::clinic::{ClinicProfile, Mode};
use crate::convo::Turn;
use crate::error::{Stage, TurnError};
use crate::instructions::system_instructions;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Spoken by the patient when the generator comes back with nothing; the
/// transcript must never contain an empty patient line.
pub const EMPTY_REPLY_FILLER: &str = "Sorry, could you repeat that?";

/// Everything one successful exchange produces. Serializes camelCase, which
/// is also the HTTP response body of the turn endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnOutcome {
    pub staff_text: String,
    pub patient_text: String,
    pub audio_base64: String,
    pub turns: Vec<Turn>,
}

pub struct TurnPipeline<S, G, V> {
    stt: S,
    generator: G,
    synth: V,
}

impl<S, G, V> TurnPipeline<S, G, V>
where
    S: SpeechToText,
    G: ReplyGenerator,
    V: SpeechSynthesis,
{
    pub fn new(stt: S, generator: G, synth: V) -> Self {
        Self {
            stt,
            generator,
            synth,
        }
    }

    /// Advances the conversation by exactly one staff/patient exchange.
    ///
    /// The three external calls run strictly in sequence, each feeding the
    /// next. The returned history is the input history plus one staff turn
    /// and one patient turn; the input itself is never mutated.
    pub async fn advance_turn(
        &self,
        staff_audio: &[u8],
        history: &[Turn],
        profile: &ClinicProfile,
        mode: Mode,
    ) -> Result<TurnOutcome, TurnError> {
        if staff_audio.is_empty() {
            return Err(TurnError::EmptyAudio);
        }

        let staff_text = self
            .stt
            .transcribe(staff_audio)
            .await
            .map_err(|e| stage_failure(Stage::Transcription, e))?
            .trim()
            .to_owned();

        let mut turns = history.to_vec();
        turns.push(Turn::staff(staff_text.clone()));

        let instructions = system_instructions(profile, mode);
        let raw_reply = self
            .generator
            .generate(&instructions, &turns)
            .await
            .map_err(|e| stage_failure(Stage::Generation, e))?;
        let patient_text = match raw_reply.trim() {
            "" => EMPTY_REPLY_FILLER.to_owned(),
            reply => reply.to_owned(),
        };
        turns.push(Turn::patient(patient_text.clone()));

        let audio = self
            .synth
            .synthesize(&patient_text)
            .await
            .map_err(|e| stage_failure(Stage::Synthesis, e))?;
        let audio_base64 = base64::engine::general_purpose::STANDARD.encode(&audio);

        tracing::debug!(
            staff = %staff_text,
            patient = %patient_text,
            turns = turns.len(),
            "turn advanced"
        );

        Ok(TurnOutcome {
            staff_text,
            patient_text,
            audio_base64,
            turns,
        })
    }
}

fn stage_failure(stage: Stage, source: anyhow::Error) -> TurnError {
    tracing::error!(stage = stage.as_str(), error = ?source, "turn pipeline stage failed");
    TurnError::Service { stage, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{MockReplyGenerator, MockSpeechSynthesis, MockSpeechToText};
    use crate::convo::Speaker;

    fn profile() -> ClinicProfile {
        ClinicProfile {
            clinic_name: "Lakeside Spine".into(),
            practitioner_name: "Dr. Alvarez".into(),
            first_visit_cost: 75.0,
            address: "12 Shore Rd".into(),
            office_hours: "Mon-Fri 9-5".into(),
            decompression: true,
            class_iv_laser: false,
            shockwave: false,
        }
    }

    fn pipeline(
        stt: MockSpeechToText,
        generator: MockReplyGenerator,
        synth: MockSpeechSynthesis,
    ) -> TurnPipeline<MockSpeechToText, MockReplyGenerator, MockSpeechSynthesis> {
        TurnPipeline::new(stt, generator, synth)
    }

    fn happy_synth() -> MockSpeechSynthesis {
        let mut synth = MockSpeechSynthesis::new();
        synth
            .expect_synthesize()
            .returning(|_| Box::pin(async { Ok(vec![0x1d, 0x2e, 0x3f]) }));
        synth
    }

    #[tokio::test]
    async fn appends_exactly_one_staff_and_one_patient_turn() {
        let mut stt = MockSpeechToText::new();
        stt.expect_transcribe()
            .returning(|_| Box::pin(async { Ok("  Hi, we'd love to get you scheduled  ".to_string()) }));

        let mut generator = MockReplyGenerator::new();
        generator
            .expect_generate()
            .withf(|instructions, history| {
                // The end-to-end scenario: grounding facts present, disabled
                // services absent, and the history already carries the new
                // staff turn when generation runs.
                instructions.contains("$75")
                    && instructions.contains("decompression")
                    && !instructions.contains("laser")
                    && !instructions.contains("shockwave")
                    && history.len() == 1
                    && history[0].text == "Hi, we'd love to get you scheduled"
            })
            .returning(|_, _| Box::pin(async { Ok("What would that cost me?".to_string()) }));

        let existing: Vec<Turn> = vec![];
        let outcome = pipeline(stt, generator, happy_synth())
            .advance_turn(b"RIFF...", &existing, &profile(), Mode::Skeptical)
            .await
            .unwrap();

        assert_eq!(outcome.staff_text, "Hi, we'd love to get you scheduled");
        assert_eq!(outcome.patient_text, "What would that cost me?");
        assert_eq!(outcome.turns.len(), 2);
        assert_eq!(outcome.turns[0].speaker, Speaker::Staff);
        assert_eq!(outcome.turns[1].speaker, Speaker::Patient);
        assert_eq!(
            outcome.audio_base64,
            base64::engine::general_purpose::STANDARD.encode([0x1d, 0x2e, 0x3f])
        );
    }

    #[tokio::test]
    async fn grows_a_prior_history_by_two_without_validating_alternation() {
        let mut stt = MockSpeechToText::new();
        stt.expect_transcribe()
            .returning(|_| Box::pin(async { Ok("Does Tuesday work?".to_string()) }));
        let mut generator = MockReplyGenerator::new();
        generator
            .expect_generate()
            .returning(|_, _| Box::pin(async { Ok("Tuesday is fine.".to_string()) }));

        // Deliberately odd history: two staff turns in a row. The pipeline
        // continues from whatever it is given.
        let existing = vec![Turn::staff("Hello?"), Turn::staff("Anyone there?")];
        let outcome = pipeline(stt, generator, happy_synth())
            .advance_turn(b"audio", &existing, &profile(), Mode::Cooperative)
            .await
            .unwrap();

        assert_eq!(outcome.turns.len(), existing.len() + 2);
        assert_eq!(outcome.turns[..2], existing[..]);
    }

    #[tokio::test]
    async fn empty_generation_becomes_the_filler_phrase() {
        let mut stt = MockSpeechToText::new();
        stt.expect_transcribe()
            .returning(|_| Box::pin(async { Ok("Hello!".to_string()) }));
        let mut generator = MockReplyGenerator::new();
        generator
            .expect_generate()
            .returning(|_, _| Box::pin(async { Ok("   ".to_string()) }));

        let mut synth = MockSpeechSynthesis::new();
        synth
            .expect_synthesize()
            .withf(|text| text == EMPTY_REPLY_FILLER)
            .returning(|_| Box::pin(async { Ok(vec![1]) }));

        let outcome = pipeline(stt, generator, synth)
            .advance_turn(b"audio", &[], &profile(), Mode::Cooperative)
            .await
            .unwrap();

        assert_eq!(outcome.patient_text, EMPTY_REPLY_FILLER);
    }

    #[tokio::test]
    async fn unrecognized_mode_matches_the_default_instruction_text() {
        let p = profile();
        assert_eq!(
            system_instructions(&p, Mode::parse("definitely-not-a-mode")),
            system_instructions(&p, Mode::Cooperative)
        );
    }

    #[tokio::test]
    async fn empty_audio_is_a_client_error_and_calls_no_services() {
        let stt = MockSpeechToText::new();
        let generator = MockReplyGenerator::new();
        let synth = MockSpeechSynthesis::new();

        let err = pipeline(stt, generator, synth)
            .advance_turn(b"", &[], &profile(), Mode::Cooperative)
            .await
            .unwrap_err();

        assert!(matches!(err, TurnError::EmptyAudio));
        assert!(err.is_client_input());
    }

    #[tokio::test]
    async fn generation_failure_discards_the_transcription() {
        let mut stt = MockSpeechToText::new();
        stt.expect_transcribe()
            .returning(|_| Box::pin(async { Ok("Hi there".to_string()) }));
        let mut generator = MockReplyGenerator::new();
        generator
            .expect_generate()
            .returning(|_, _| Box::pin(async { Err(anyhow::anyhow!("quota exhausted")) }));
        let synth = MockSpeechSynthesis::new();

        let existing = vec![Turn::staff("Hello?"), Turn::patient("Hi.")];
        let err = pipeline(stt, generator, synth)
            .advance_turn(b"audio", &existing, &profile(), Mode::Challenging)
            .await
            .unwrap_err();

        match err {
            TurnError::Service { stage, .. } => assert_eq!(stage, Stage::Generation),
            other => panic!("expected a service error, got {other:?}"),
        }
        // The caller's history is untouched; no partial turn escaped.
        assert_eq!(existing.len(), 2);
    }

    #[tokio::test]
    async fn synthesis_failure_fails_the_whole_turn() {
        let mut stt = MockSpeechToText::new();
        stt.expect_transcribe()
            .returning(|_| Box::pin(async { Ok("Hi".to_string()) }));
        let mut generator = MockReplyGenerator::new();
        generator
            .expect_generate()
            .returning(|_, _| Box::pin(async { Ok("Hello.".to_string()) }));
        let mut synth = MockSpeechSynthesis::new();
        synth
            .expect_synthesize()
            .returning(|_| Box::pin(async { Err(anyhow::anyhow!("voice backend down")) }));

        let err = pipeline(stt, generator, synth)
            .advance_turn(b"audio", &[], &profile(), Mode::Cooperative)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TurnError::Service {
                stage: Stage::Synthesis,
                ..
            }
        ));
    }
}
