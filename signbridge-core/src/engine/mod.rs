//! `Orchestrator`: the interpretation pipeline.
//!
//! ## Lanes
//!
//! ```text
//! sign:  Idle ─► Capturing ─► Interpreting ─► Committed | Failed ─► Idle
//! voice: Idle ─► Listening ─► Interpreting ─► Committed | Failed ─► Idle
//! ```
//!
//! Both lanes share one processing flag, taken with `compare_exchange`: a
//! trigger arriving while any interpretation is in flight is refused with
//! [`BridgeError::Busy`], never queued. The flag is released by a guard, so a
//! dropped future also returns the pipeline to idle.
//!
//! A stale result that lands after `clear_session` is still committed.
//!
//! ## Threading
//!
//! `Orchestrator` is `Send + Sync`; wrap it in `Arc` and drive it from any
//! task. No lock is held across an `.await`.

pub mod diagnostics;
pub mod hold;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::capture::{CameraStatus, CaptureAdapter, Frame};
use crate::conversation::{ConversationState, Message};
use crate::error::{BridgeError, Result};
use crate::interpret::{AvatarResponse, InterpretationClient};
use crate::ipc::events::{
    ActiveGlossEvent, Lane, LaneEvent, LaneState, Notification, ProcessingEvent, UiEvent,
};
use crate::lexicon::{Language, SignEntry, SignSystem};
use crate::speech::{SpeechInput, SpeechOutput};

pub use diagnostics::{DiagnosticsSnapshot, OrchestratorDiagnostics};
pub use hold::HoldTrigger;

/// UI event channel capacity.
const BROADCAST_CAP: usize = 256;

const MSG_SIGN_FAILED: &str = "L'IA n'a pas pu décoder la structure du signe.";
const MSG_CAPTURE_FAILED: &str = "Capture impossible : la caméra n'est pas disponible.";
const MSG_AVATAR_FALLBACK: &str = "Erreur d'interprétation linguistique.";
const MSG_NO_RECOGNITION: &str = "La reconnaissance vocale n'est pas disponible sur cet appareil.";
const MSG_LISTEN_FAILED: &str = "Écoute interrompue, réessayez.";

/// Language and sign system of the running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettings {
    pub language: Language,
    pub sign_system: SignSystem,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            language: Language::FrCa,
            sign_system: SignSystem::Lsq,
        }
    }
}

/// Point-in-time view of the pipeline for status displays.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub language: Language,
    pub sign_system: SignSystem,
    pub processing: bool,
    pub speaking: bool,
    pub muted: bool,
    pub camera: CameraStatus,
    pub simulated_capture: bool,
    pub speech_recognition: bool,
    pub sign_lane: LaneState,
    pub voice_lane: LaneState,
    pub message_count: usize,
    pub active_gloss: Vec<String>,
    pub last_avatar_response: Option<AvatarResponse>,
    pub backend: String,
}

struct Projection {
    sign_lane: LaneState,
    voice_lane: LaneState,
    active_gloss: Vec<String>,
    last_avatar: Option<AvatarResponse>,
}

pub struct Orchestrator {
    client: InterpretationClient,
    conversation: Mutex<ConversationState>,
    capture: Arc<CaptureAdapter>,
    speech: Arc<SpeechOutput>,
    input: SpeechInput,
    settings: Mutex<SessionSettings>,
    processing: AtomicBool,
    projection: Mutex<Projection>,
    events: broadcast::Sender<UiEvent>,
    diagnostics: Arc<OrchestratorDiagnostics>,
}

/// Holds the processing flag for one interpretation.
struct ProcessingGuard<'a> {
    orchestrator: &'a Orchestrator,
    lane: Lane,
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.orchestrator.set_lane(self.lane, LaneState::Idle);
        self.orchestrator.processing.store(false, Ordering::SeqCst);
        self.orchestrator
            .emit(UiEvent::ProcessingChanged(ProcessingEvent { processing: false }));
    }
}

impl Orchestrator {
    pub fn new(
        client: InterpretationClient,
        conversation: ConversationState,
        capture: Arc<CaptureAdapter>,
        speech: Arc<SpeechOutput>,
        input: SpeechInput,
        settings: SessionSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(BROADCAST_CAP);
        Self {
            client,
            conversation: Mutex::new(conversation),
            capture,
            speech,
            input,
            settings: Mutex::new(settings),
            processing: AtomicBool::new(false),
            projection: Mutex::new(Projection {
                sign_lane: LaneState::Idle,
                voice_lane: LaneState::Idle,
                active_gloss: Vec::new(),
                last_avatar: None,
            }),
            events,
            diagnostics: Arc::new(OrchestratorDiagnostics::default()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.events.subscribe()
    }

    // ── Sign-capture lane ────────────────────────────────────────────────────

    /// Capture a frame and interpret it.
    ///
    /// `Ok(Some)` when a message was committed, `Ok(None)` when the model had
    /// nothing to say. Errors other than `Busy` have already been notified.
    pub async fn capture_and_interpret(&self) -> Result<Option<Message>> {
        let _guard = self.begin(Lane::Sign)?;
        self.set_lane(Lane::Sign, LaneState::Capturing);
        let frame = match self.capture.capture() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "frame capture failed");
                self.fail(Lane::Sign, MSG_CAPTURE_FAILED);
                return Err(e);
            }
        };
        self.interpret_frame_inner(frame).await
    }

    /// Interpret a frame the host obtained itself.
    pub async fn handle_frame(&self, frame: Frame) -> Result<Option<Message>> {
        let _guard = self.begin(Lane::Sign)?;
        self.interpret_frame_inner(frame).await
    }

    async fn interpret_frame_inner(&self, frame: Frame) -> Result<Option<Message>> {
        self.set_lane(Lane::Sign, LaneState::Interpreting);
        let settings = self.settings();
        let history = self
            .conversation
            .lock()
            .recent(self.client.history_window())
            .to_vec();

        let result = match self
            .client
            .try_interpret_frame(&frame, settings.language, settings.sign_system, &history)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!(backend = self.client.backend_name(), error = %e, "frame interpretation failed");
                OrchestratorDiagnostics::bump(&self.diagnostics.fallbacks);
                self.fail(Lane::Sign, MSG_SIGN_FAILED);
                return Err(e);
            }
        };
        OrchestratorDiagnostics::bump(&self.diagnostics.frames_interpreted);

        if !result.has_translation() {
            debug!(translation = %result.translation, "no usable translation, nothing committed");
            OrchestratorDiagnostics::bump(&self.diagnostics.no_op_results);
            return Ok(None);
        }

        let message = Message::from_interpretation(&result);
        self.commit(message.clone());
        self.projection.lock().active_gloss = result.gloss.clone();
        self.emit(UiEvent::ActiveGloss(ActiveGlossEvent {
            gloss: result.gloss.clone(),
        }));
        self.speech.speak(&result.translation, settings.language);
        self.set_lane(Lane::Sign, LaneState::Committed);
        Ok(Some(message))
    }

    // ── Voice-to-avatar lane ─────────────────────────────────────────────────

    /// Listen once and answer through the avatar.
    pub async fn listen_and_respond(&self) -> Result<Option<Message>> {
        let _guard = self.begin(Lane::Voice)?;
        self.set_lane(Lane::Voice, LaneState::Listening);
        let language = self.settings().language;
        match self.input.listen(language).await {
            Ok(Some(transcript)) => self.respond_inner(&transcript).await,
            Ok(None) => {
                debug!("nothing heard");
                Ok(None)
            }
            Err(BridgeError::SpeechRecognitionUnavailable) => {
                self.notify(Notification::warning(MSG_NO_RECOGNITION));
                Err(BridgeError::SpeechRecognitionUnavailable)
            }
            Err(e) => {
                warn!(error = %e, "speech recognition failed");
                self.fail(Lane::Voice, MSG_LISTEN_FAILED);
                Err(e)
            }
        }
    }

    /// Answer a transcript delivered by the host.
    pub async fn handle_transcript(&self, transcript: &str) -> Result<Option<Message>> {
        let _guard = self.begin(Lane::Voice)?;
        self.respond_inner(transcript).await
    }

    async fn respond_inner(&self, transcript: &str) -> Result<Option<Message>> {
        let transcript = transcript.trim();
        if transcript.is_empty() {
            OrchestratorDiagnostics::bump(&self.diagnostics.no_op_results);
            return Ok(None);
        }
        self.set_lane(Lane::Voice, LaneState::Interpreting);
        let settings = self.settings();

        let response = match self
            .client
            .try_interpret_speech(transcript, settings.language, settings.sign_system)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(backend = self.client.backend_name(), error = %e, "avatar response failed, echoing transcript");
                OrchestratorDiagnostics::bump(&self.diagnostics.fallbacks);
                self.notify(Notification::warning(MSG_AVATAR_FALLBACK));
                AvatarResponse::echo(transcript)
            }
        };
        OrchestratorDiagnostics::bump(&self.diagnostics.transcripts_interpreted);

        let message = Message::from_avatar(&response);
        self.commit(message.clone());
        self.set_avatar(response);
        self.set_lane(Lane::Voice, LaneState::Committed);
        Ok(Some(message))
    }

    // ── Session controls ─────────────────────────────────────────────────────

    /// Show a dictionary sign on the avatar without adding a message.
    pub fn show_sign(&self, entry: &SignEntry) {
        self.set_avatar(AvatarResponse {
            text: entry.name.clone(),
            sign_instruction: entry.instruction.clone(),
        });
    }

    /// Empty the conversation and its persisted snapshot.
    pub fn clear_session(&self) {
        self.conversation.lock().clear();
        {
            let mut projection = self.projection.lock();
            projection.active_gloss.clear();
            projection.last_avatar = None;
        }
        info!("session cleared");
        self.emit(UiEvent::SessionCleared);
    }

    pub fn set_language(&self, language: Language) {
        self.settings.lock().language = language;
    }

    pub fn set_sign_system(&self, sign_system: SignSystem) {
        self.settings.lock().sign_system = sign_system;
    }

    pub fn set_muted(&self, muted: bool) {
        self.speech.set_muted(muted);
    }

    /// Turn the camera on or off. Reports a fallback to simulated frames.
    pub fn set_camera_enabled(&self, enabled: bool) -> CameraStatus {
        let status = self.capture.set_enabled(enabled);
        if enabled && self.capture.is_simulated() {
            if let Some(message) = self.capture.failure_message() {
                self.notify(Notification::warning(message));
            }
        }
        status
    }

    /// Broadcast a host-originated notice.
    pub fn notify(&self, notification: Notification) {
        self.emit(UiEvent::Notification(notification));
    }

    // ── Read side ────────────────────────────────────────────────────────────

    pub fn settings(&self) -> SessionSettings {
        *self.settings.lock()
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Conversation, newest first.
    pub fn messages(&self) -> Vec<Message> {
        self.conversation.lock().messages().to_vec()
    }

    pub fn last_avatar_response(&self) -> Option<AvatarResponse> {
        self.projection.lock().last_avatar.clone()
    }

    pub fn active_gloss(&self) -> Vec<String> {
        self.projection.lock().active_gloss.clone()
    }

    pub fn lane_state(&self, lane: Lane) -> LaneState {
        let projection = self.projection.lock();
        match lane {
            Lane::Sign => projection.sign_lane,
            Lane::Voice => projection.voice_lane,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let settings = self.settings();
        let message_count = self.conversation.lock().len();
        let projection = self.projection.lock();
        SessionSnapshot {
            language: settings.language,
            sign_system: settings.sign_system,
            processing: self.is_processing(),
            speaking: self.speech.is_speaking(),
            muted: self.speech.is_muted(),
            camera: self.capture.status(),
            simulated_capture: self.capture.is_simulated(),
            speech_recognition: self.input.is_available(),
            sign_lane: projection.sign_lane,
            voice_lane: projection.voice_lane,
            message_count,
            active_gloss: projection.active_gloss.clone(),
            last_avatar_response: projection.last_avatar.clone(),
            backend: self.client.backend_name().to_string(),
        }
    }

    pub fn diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn begin(&self, lane: Lane) -> Result<ProcessingGuard<'_>> {
        if self
            .processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            OrchestratorDiagnostics::bump(&self.diagnostics.triggers_refused);
            debug!(?lane, "trigger refused, interpretation already in flight");
            return Err(BridgeError::Busy);
        }
        self.emit(UiEvent::ProcessingChanged(ProcessingEvent { processing: true }));
        Ok(ProcessingGuard {
            orchestrator: self,
            lane,
        })
    }

    fn commit(&self, message: Message) {
        self.conversation.lock().push(message.clone());
        OrchestratorDiagnostics::bump(&self.diagnostics.messages_committed);
        self.emit(UiEvent::MessageCommitted(message));
    }

    fn set_avatar(&self, response: AvatarResponse) {
        self.projection.lock().last_avatar = Some(response.clone());
        self.emit(UiEvent::AvatarResponse(response));
    }

    fn fail(&self, lane: Lane, message: &str) {
        self.set_lane(lane, LaneState::Failed);
        self.notify(Notification::error(message));
    }

    fn set_lane(&self, lane: Lane, state: LaneState) {
        {
            let mut projection = self.projection.lock();
            let slot = match lane {
                Lane::Sign => &mut projection.sign_lane,
                Lane::Voice => &mut projection.voice_lane,
            };
            if *slot == state {
                return;
            }
            *slot = state;
        }
        self.emit(UiEvent::LaneChanged(LaneEvent { lane, state }));
    }

    fn emit(&self, event: UiEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
