//! The recording state machine.
//!
//! A pure core: inputs arrive as method calls, side effects leave as
//! [`Action`]s for the runtime to execute. `Busy` is the only mutual
//! exclusion needed: while a turn is in flight the machine refuses to
//! start another capture, and there is exactly one capture control per
//! session.

use crate::turn_client::TurnReply;
use intake_core::{ClinicProfile, Mode, Turn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Recording,
    /// A turn has been submitted and its result is still pending.
    Busy,
}

/// What the runtime must do next.
#[derive(Debug, PartialEq)]
pub enum Action {
    /// Start buffering microphone samples.
    StartCapture,
    /// Stop buffering and submit the captured segment as one turn.
    SubmitTurn,
    /// Play the patient's reply.
    Play(Vec<u8>),
    /// Surface a non-fatal message; the session is ready to retry.
    Notify(String),
    /// No profile is configured; send the user to configuration before any
    /// microphone access.
    RedirectToSetup,
}

pub struct CallSession {
    state: CaptureState,
    profile: Option<ClinicProfile>,
    mode: Mode,
    turns: Vec<Turn>,
}

impl CallSession {
    pub fn new(profile: Option<ClinicProfile>, mode: Mode) -> Self {
        Self {
            state: CaptureState::Idle,
            profile,
            mode,
            turns: Vec::new(),
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn profile(&self) -> Option<&ClinicProfile> {
        self.profile.as_ref()
    }

    /// The transcript as of the last completed turn.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// User asked to start talking. Refused without a configured profile,
    /// and a no-op unless the session is idle.
    pub fn begin_capture(&mut self) -> Option<Action> {
        if self.profile.is_none() {
            return Some(Action::RedirectToSetup);
        }
        match self.state {
            CaptureState::Idle => {
                self.state = CaptureState::Recording;
                Some(Action::StartCapture)
            }
            CaptureState::Recording | CaptureState::Busy => None,
        }
    }

    /// User finished talking; the buffered segment becomes one turn.
    pub fn end_capture(&mut self) -> Option<Action> {
        match self.state {
            CaptureState::Recording => {
                self.state = CaptureState::Busy;
                Some(Action::SubmitTurn)
            }
            CaptureState::Idle | CaptureState::Busy => None,
        }
    }

    /// User abandoned the capture before submitting; the buffer is dropped.
    pub fn cancel_capture(&mut self) -> bool {
        if self.state == CaptureState::Recording {
            self.state = CaptureState::Idle;
            true
        } else {
            false
        }
    }

    /// The pipeline came back: adopt the server's transcript wholesale and
    /// hand the reply audio to the runtime.
    pub fn turn_succeeded(&mut self, reply: TurnReply) -> Action {
        self.state = CaptureState::Idle;
        self.turns = reply.turns;
        Action::Play(reply.audio)
    }

    /// The pipeline failed. The transcript is left exactly as it was (the
    /// failed turn never happened) and the session is immediately ready
    /// for another attempt.
    pub fn turn_failed(&mut self, message: impl Into<String>) -> Action {
        self.state = CaptureState::Idle;
        Action::Notify(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    fn reply() -> TurnReply {
        TurnReply {
            staff_text: "Hi!".into(),
            patient_text: "Hello.".into(),
            audio: vec![9, 9, 9],
            turns: vec![Turn::staff("Hi!"), Turn::patient("Hello.")],
        }
    }

    #[test]
    fn capture_is_refused_without_a_profile_before_anything_else() {
        let mut session = CallSession::new(None, Mode::Cooperative);
        assert_eq!(session.begin_capture(), Some(Action::RedirectToSetup));
        assert_eq!(session.state(), CaptureState::Idle);
    }

    #[test]
    fn a_turn_runs_through_idle_recording_busy_and_back() {
        let mut session = CallSession::new(Some(profile()), Mode::Skeptical);

        assert_eq!(session.begin_capture(), Some(Action::StartCapture));
        assert_eq!(session.state(), CaptureState::Recording);

        assert_eq!(session.end_capture(), Some(Action::SubmitTurn));
        assert_eq!(session.state(), CaptureState::Busy);

        let action = session.turn_succeeded(reply());
        assert_eq!(action, Action::Play(vec![9, 9, 9]));
        assert_eq!(session.state(), CaptureState::Idle);
        assert_eq!(session.turns().len(), 2);
    }

    #[test]
    fn begin_capture_while_busy_has_no_effect() {
        let mut session = CallSession::new(Some(profile()), Mode::Cooperative);
        session.begin_capture();
        session.end_capture();
        assert_eq!(session.state(), CaptureState::Busy);

        assert_eq!(session.begin_capture(), None);
        assert_eq!(session.state(), CaptureState::Busy);
        assert!(session.turns().is_empty());
    }

    #[test]
    fn begin_capture_while_recording_has_no_effect() {
        let mut session = CallSession::new(Some(profile()), Mode::Cooperative);
        session.begin_capture();
        assert_eq!(session.begin_capture(), None);
        assert_eq!(session.state(), CaptureState::Recording);
    }

    #[test]
    fn end_capture_while_idle_is_a_no_op() {
        let mut session = CallSession::new(Some(profile()), Mode::Cooperative);
        assert_eq!(session.end_capture(), None);
        assert_eq!(session.state(), CaptureState::Idle);
    }

    #[test]
    fn a_failed_turn_leaves_the_transcript_unchanged() {
        let mut session = CallSession::new(Some(profile()), Mode::Challenging);
        session.begin_capture();
        session.end_capture();
        session.turn_succeeded(reply());

        // Second turn fails mid-flight.
        session.begin_capture();
        session.end_capture();
        let action = session.turn_failed("patient simulator unavailable");

        assert_eq!(
            action,
            Action::Notify("patient simulator unavailable".into())
        );
        assert_eq!(session.state(), CaptureState::Idle);
        assert_eq!(session.turns().len(), 2);

        // And the session is immediately usable again.
        assert_eq!(session.begin_capture(), Some(Action::StartCapture));
    }

    #[test]
    fn cancel_discards_only_an_active_recording() {
        let mut session = CallSession::new(Some(profile()), Mode::Cooperative);
        assert!(!session.cancel_capture());

        session.begin_capture();
        assert!(session.cancel_capture());
        assert_eq!(session.state(), CaptureState::Idle);
    }
}
