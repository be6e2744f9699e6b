//! Turn orchestration
//!
//! One turn runs capture, transcription, interpretation, and speech in
//! sequence. Arithmetic transcripts are handled locally; everything else
//! goes to the remote responder. Failures anywhere in the pipeline become
//! a short spoken apology instead of an error surface a child would see.

use std::sync::Arc;

use crate::actions::apply_actions;
use crate::levels::format_plain;
use crate::numeral::{self, Interpretation};
use crate::state::{TurnPhase, VisualizationState};
use crate::voice::recorder::AudioClip;
use crate::voice::{Recorder, Responder, SpeechOutput, Transcriber};
use crate::{Error, Result};

/// Spoken when no usable audio or transcript came out of the turn
pub const APOLOGY_DID_NOT_HEAR: &str = "我没听清，再说一次～";

/// Spoken when the microphone cannot be opened
pub const APOLOGY_MIC_PERMISSION: &str = "我需要麦克风权限";

/// Spoken for any other pipeline failure
pub const APOLOGY_GENERIC: &str = "出错了，等一下再试试";

/// Drives one voice turn at a time against the visualization state
pub struct TurnOrchestrator {
    recorder: Recorder,
    transcriber: Arc<dyn Transcriber>,
    responder: Arc<dyn Responder>,
    speech: SpeechOutput,
    state: VisualizationState,
    phase: TurnPhase,
    busy: bool,
}

impl TurnOrchestrator {
    #[must_use]
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        responder: Arc<dyn Responder>,
        speech: SpeechOutput,
    ) -> Self {
        Self {
            recorder: Recorder::new(),
            transcriber,
            responder,
            speech,
            state: VisualizationState::default(),
            phase: TurnPhase::Idle,
            busy: false,
        }
    }

    /// Begin listening; press is ignored while a turn is still running
    pub async fn press_mic(&mut self) {
        if self.busy {
            tracing::debug!("turn in progress, ignoring mic press");
            return;
        }

        self.speech.cancel();
        match self.recorder.start() {
            Ok(()) => {
                self.phase = TurnPhase::Listening;
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not start recording");
                self.speak_now(APOLOGY_MIC_PERMISSION).await;
                self.phase = TurnPhase::Idle;
            }
        }
    }

    /// Stop listening and run the turn on whatever was captured
    pub async fn release_mic(&mut self) {
        if self.phase != TurnPhase::Listening {
            return;
        }

        let clip = match self.recorder.stop() {
            Ok(clip) => Some(clip),
            Err(Error::NoAudio) => {
                tracing::debug!("clip too short, nothing captured");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "recording failed");
                None
            }
        };

        self.complete_turn(clip).await;
    }

    /// Run the rest of the turn for an already-finalized clip
    ///
    /// Pipeline errors are spoken as an apology; the turn always ends back
    /// in the idle phase.
    pub async fn complete_turn(&mut self, clip: Option<AudioClip>) {
        self.busy = true;
        if let Err(e) = self.run_turn(clip).await {
            tracing::warn!(error = %e, "turn failed");
            let apology = apology_for(&e);
            self.speak_now(apology).await;
        }
        self.phase = TurnPhase::Idle;
        self.busy = false;
    }

    async fn run_turn(&mut self, clip: Option<AudioClip>) -> Result<()> {
        let clip = clip.ok_or(Error::NoAudio)?;
        tracing::debug!(
            duration_ms = clip.duration_ms,
            sample_rate = clip.sample_rate,
            "turn started"
        );

        self.phase = TurnPhase::Transcribing;
        let transcript = self.transcriber.transcribe(&clip).await?;
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return Err(Error::EmptyTranscript);
        }

        self.phase = TurnPhase::Interpreting;
        match numeral::interpret(transcript, self.state.current_value()) {
            Some(Interpretation::Expression(expr)) => {
                tracing::info!(equation = %expr.equation, "local arithmetic");
                self.state.set_custom(expr.result, expr.equation.clone());
                let spoken = format_plain(expr.result);
                self.speak_now(&spoken).await;
            }
            Some(Interpretation::Error(message)) => {
                tracing::info!(message = %message, "arithmetic error");
                self.speak_now(&message).await;
            }
            None => {
                self.phase = TurnPhase::Thinking;
                let snapshot = self.state.snapshot();
                let reply = self.responder.respond(transcript, &snapshot).await?;
                let applied = apply_actions(&mut self.state, &reply.actions);
                tracing::debug!(
                    level_changes = applied.level_changes,
                    sparkles = applied.sparkles,
                    skipped = applied.skipped,
                    "actions applied"
                );
                self.speak_now(&reply.say_text).await;
            }
        }

        Ok(())
    }

    async fn speak_now(&mut self, text: &str) {
        self.phase = TurnPhase::Speaking;
        let muted = self.state.is_muted();
        self.speech.speak(text, muted).await;
    }

    /// Say the current count phrase again
    pub async fn repeat_current(&mut self) {
        let phrase = self.state.current_phrase();
        self.speak_now(&phrase).await;
        self.phase = TurnPhase::Idle;
    }

    /// Step to the next canonical level and announce it
    pub async fn next_level(&mut self) {
        self.state.next_level();
        self.repeat_current().await;
    }

    /// Step to the previous canonical level and announce it
    pub async fn prev_level(&mut self) {
        self.state.prev_level();
        self.repeat_current().await;
    }

    /// Toggle mute; muting also cuts off speech already sounding
    pub async fn toggle_mute(&mut self) {
        let muted = self.state.toggle_muted();
        if muted {
            self.speech.cancel();
            tracing::debug!("muted");
        } else {
            tracing::debug!("unmuted");
            self.repeat_current().await;
        }
    }

    /// Adjust the display zoom
    pub fn set_zoom(&mut self, zoom: f64) {
        self.state.set_zoom(zoom);
    }

    #[must_use]
    pub const fn state(&self) -> &VisualizationState {
        &self.state
    }

    #[must_use]
    pub const fn phase(&self) -> TurnPhase {
        self.phase
    }

    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.busy
    }
}

/// Pick the apology phrase for a pipeline error
#[must_use]
pub const fn apology_for(error: &Error) -> &'static str {
    match error {
        Error::NoAudio | Error::EmptyTranscript => APOLOGY_DID_NOT_HEAR,
        Error::Permission(_) => APOLOGY_MIC_PERMISSION,
        _ => APOLOGY_GENERIC,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apologies_match_failure_class() {
        assert_eq!(apology_for(&Error::NoAudio), APOLOGY_DID_NOT_HEAR);
        assert_eq!(apology_for(&Error::EmptyTranscript), APOLOGY_DID_NOT_HEAR);
        assert_eq!(
            apology_for(&Error::Permission("denied".to_string())),
            APOLOGY_MIC_PERMISSION
        );
        assert_eq!(apology_for(&Error::Asr("boom".to_string())), APOLOGY_GENERIC);
        assert_eq!(
            apology_for(&Error::Responder("boom".to_string())),
            APOLOGY_GENERIC
        );
    }
}
