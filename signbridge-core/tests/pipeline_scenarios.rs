use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use signbridge_core::capture::{CaptureAdapter, CaptureConfig, FrameSource, NoCamera};
use signbridge_core::conversation::{ConversationState, Sender, HISTORY_KEY};
use signbridge_core::interpret::{
    ClientConfig, GenerationRequest, InterpretationBackend, InterpretationClient,
    InterpretationResult, RequestPart, ResponseKind,
};
use signbridge_core::ipc::events::{Lane, LaneState, NotificationKind, UiEvent};
use signbridge_core::lexicon::{Intent, Language, LexiconStore, SignSystem};
use signbridge_core::speech::output::{Utterance, UtteranceSink, Voice};
use signbridge_core::speech::{SpeechInput, SpeechOutput, SpeechSynthesizer};
use signbridge_core::storage::{KeyValueStore, MemoryStore};
use signbridge_core::{BridgeError, Frame, Orchestrator, SessionSettings};
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::{broadcast, Notify};

const MAISON: &str =
    r#"{"gloss":["MAISON"],"intent":"LIEUX","translation":"Je vais à la maison","slots":{},"confidence":0.9}"#;
const BONJOUR_AVATAR: &str =
    r#"{"text":"Bonjour, comment ça va ?","signInstruction":"Main plate du front vers l'avant"}"#;

/// Replies per request kind; `None` fails the call.
struct Scripted {
    frame: Option<String>,
    avatar: Option<String>,
    seen: Mutex<Vec<GenerationRequest>>,
}

impl Scripted {
    fn new(frame: Option<&str>, avatar: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            frame: frame.map(str::to_string),
            avatar: avatar.map(str::to_string),
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl InterpretationBackend for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &GenerationRequest) -> signbridge_core::Result<String> {
        self.seen.lock().push(request.clone());
        let reply = match request.kind {
            ResponseKind::Interpretation => &self.frame,
            ResponseKind::Avatar => &self.avatar,
        };
        reply
            .clone()
            .ok_or_else(|| BridgeError::BackendTransport("connection reset".into()))
    }
}

/// Blocks every call until the test opens the gate.
struct Gated {
    entered: Arc<Notify>,
    gate: Arc<Notify>,
}

#[async_trait]
impl InterpretationBackend for Gated {
    fn name(&self) -> &str {
        "gated"
    }

    async fn generate(&self, _request: &GenerationRequest) -> signbridge_core::Result<String> {
        self.entered.notify_one();
        self.gate.notified().await;
        Ok(MAISON.to_string())
    }
}

#[derive(Default)]
struct Recorder {
    spoken: Mutex<Vec<String>>,
    sinks: Mutex<Vec<UtteranceSink>>,
}

impl SpeechSynthesizer for Recorder {
    fn voices(&self) -> Vec<Voice> {
        Vec::new()
    }

    fn speak(&self, utterance: &Utterance, sink: UtteranceSink) -> signbridge_core::Result<()> {
        self.spoken.lock().push(utterance.text.clone());
        self.sinks.lock().push(sink);
        Ok(())
    }

    fn cancel(&self) {}

    fn is_speaking(&self) -> bool {
        true
    }
}

struct Harness {
    orchestrator: Arc<Orchestrator>,
    synth: Arc<Recorder>,
    store: Arc<MemoryStore>,
    events: broadcast::Receiver<UiEvent>,
}

fn harness_with_store(backend: Arc<dyn InterpretationBackend>, store: Arc<MemoryStore>) -> Harness {
    let client = InterpretationClient::new(backend, ClientConfig::default());
    let capture = Arc::new(CaptureAdapter::new(Arc::new(NoCamera), CaptureConfig::default()));
    capture.start();
    let synth = Arc::new(Recorder::default());
    let speech = Arc::new(SpeechOutput::new(synth.clone()));
    let orchestrator = Arc::new(Orchestrator::new(
        client,
        ConversationState::rehydrate(store.clone()),
        capture,
        speech,
        SpeechInput::unavailable(),
        SessionSettings::default(),
    ));
    let events = orchestrator.subscribe();
    Harness {
        orchestrator,
        synth,
        store,
        events,
    }
}

fn harness(backend: Arc<dyn InterpretationBackend>) -> Harness {
    harness_with_store(backend, Arc::new(MemoryStore::new()))
}

fn drain(rx: &mut broadcast::Receiver<UiEvent>) -> Vec<UiEvent> {
    let mut out = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => out.push(event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => return out,
        }
    }
}

fn notifications(events: &[UiEvent]) -> Vec<NotificationKind> {
    events
        .iter()
        .filter_map(|e| match e {
            UiEvent::Notification(n) => Some(n.kind),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn captured_sign_is_committed_highlighted_and_spoken() {
    let backend = Scripted::new(Some(MAISON), None);
    let mut h = harness(backend.clone());

    let message = h
        .orchestrator
        .capture_and_interpret()
        .await
        .expect("interpretation succeeds")
        .expect("message committed");

    assert_eq!(message.sender, Sender::User);
    assert_eq!(message.text, "Je vais à la maison");
    assert_eq!(message.gloss, ["MAISON"]);
    assert_eq!(message.intent, Some(Intent::Lieux));
    assert!(message.slots.is_empty());

    let messages = h.orchestrator.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0], message);
    assert_eq!(h.orchestrator.active_gloss(), ["MAISON"]);
    assert_eq!(*h.synth.spoken.lock(), ["Je vais à la maison"]);
    assert!(h.store.contains(HISTORY_KEY));

    let events = drain(&mut h.events);
    assert!(events.contains(&UiEvent::MessageCommitted(message)));
    assert!(matches!(events.last(), Some(UiEvent::ProcessingChanged(p)) if !p.processing));
    assert_eq!(h.orchestrator.lane_state(Lane::Sign), LaneState::Idle);
    assert!(!h.orchestrator.is_processing());
}

#[tokio::test]
async fn camera_failure_still_feeds_a_synthetic_frame_to_the_model() {
    let backend = Scripted::new(Some(MAISON), None);
    let h = harness(backend.clone());
    assert!(h.orchestrator.snapshot().simulated_capture);

    h.orchestrator
        .capture_and_interpret()
        .await
        .expect("synthetic capture is interpreted");

    let seen = backend.seen.lock();
    match &seen[0].parts[0] {
        RequestPart::Image {
            mime_type,
            data_base64,
        } => {
            assert_eq!(mime_type, "image/jpeg");
            assert!(data_base64.starts_with("/9j/"));
        }
        other => panic!("expected an image part, got {other:?}"),
    }
}

#[tokio::test]
async fn spoken_transcript_updates_avatar_and_conversation() {
    let backend = Scripted::new(None, Some(BONJOUR_AVATAR));
    let mut h = harness(backend);

    let message = h
        .orchestrator
        .handle_transcript("Bonjour")
        .await
        .expect("avatar path succeeds")
        .expect("message committed");

    assert_eq!(message.sender, Sender::Interlocutor);
    assert_eq!(message.text, "Bonjour, comment ça va ?");
    assert_eq!(
        message.sign_description.as_deref(),
        Some("Main plate du front vers l'avant")
    );
    let avatar = h.orchestrator.last_avatar_response().expect("projection set");
    assert_eq!(avatar.text, "Bonjour, comment ça va ?");
    assert_eq!(avatar.sign_instruction, "Main plate du front vers l'avant");
    // interlocutor turns are not voiced
    assert!(h.synth.spoken.lock().is_empty());
    assert!(notifications(&drain(&mut h.events)).is_empty());
}

#[tokio::test]
async fn failed_frame_interpretation_notifies_without_committing() {
    let backend = Scripted::new(None, None);
    let mut h = harness(backend.clone());

    let err = h.orchestrator.capture_and_interpret().await.unwrap_err();
    assert!(matches!(err, BridgeError::BackendTransport(_)));
    assert!(h.orchestrator.messages().is_empty());
    assert!(h.synth.spoken.lock().is_empty());

    let events = drain(&mut h.events);
    assert_eq!(notifications(&events), [NotificationKind::Error]);
    assert!(events.iter().any(|e| matches!(
        e,
        UiEvent::LaneChanged(l) if l.lane == Lane::Sign && l.state == LaneState::Failed
    )));
    assert_eq!(h.orchestrator.lane_state(Lane::Sign), LaneState::Idle);
    assert_eq!(h.orchestrator.diagnostics_snapshot().fallbacks, 1);

    // the total client boundary still yields the zero-confidence fallback
    let client = InterpretationClient::new(backend, ClientConfig::default());
    let frame = Frame::new(vec![0xFF, 0xD8, 0xFF, 0xD9], 640, 480, FrameSource::Camera);
    let result = client
        .interpret_frame(&frame, Language::FrCa, SignSystem::Lsq, &[])
        .await;
    assert_eq!(result, InterpretationResult::fallback());
    assert_eq!(result.confidence, 0.0);
}

#[tokio::test]
async fn failed_avatar_response_echoes_transcript_with_warning() {
    let mut h = harness(Scripted::new(None, None));

    let message = h
        .orchestrator
        .handle_transcript("Où est la gare ?")
        .await
        .unwrap()
        .expect("echo is committed");
    assert_eq!(message.text, "Où est la gare ?");
    assert_eq!(
        message.sign_description.as_deref(),
        Some("Adaptation syntaxique...")
    );
    assert_eq!(
        notifications(&drain(&mut h.events)),
        [NotificationKind::Warning]
    );
}

#[tokio::test]
async fn sentinel_translations_are_silent_no_ops() {
    for raw in [
        r#"{"gloss":[],"intent":"UNKNOWN","translation":"...","confidence":0.1}"#,
        r#"{"gloss":[],"intent":"UNKNOWN","translation":"","confidence":0.0}"#,
    ] {
        let mut h = harness(Scripted::new(Some(raw), None));
        let outcome = h.orchestrator.capture_and_interpret().await.unwrap();
        assert!(outcome.is_none());
        assert!(h.orchestrator.messages().is_empty());
        assert!(h.synth.spoken.lock().is_empty());
        assert!(!h.store.contains(HISTORY_KEY));
        assert!(notifications(&drain(&mut h.events)).is_empty());
        assert_eq!(h.orchestrator.diagnostics_snapshot().no_op_results, 1);
    }
}

#[tokio::test]
async fn second_trigger_is_refused_while_interpreting() {
    let entered = Arc::new(Notify::new());
    let gate = Arc::new(Notify::new());
    let h = harness(Arc::new(Gated {
        entered: entered.clone(),
        gate: gate.clone(),
    }));

    let orchestrator = h.orchestrator.clone();
    let first = tokio::spawn(async move { orchestrator.capture_and_interpret().await });
    entered.notified().await;

    assert!(h.orchestrator.is_processing());
    assert!(matches!(
        h.orchestrator.handle_transcript("Bonjour").await,
        Err(BridgeError::Busy)
    ));
    assert!(matches!(
        h.orchestrator.capture_and_interpret().await,
        Err(BridgeError::Busy)
    ));
    assert_eq!(h.orchestrator.diagnostics_snapshot().triggers_refused, 2);

    gate.notify_one();
    let committed = first.await.expect("task joined").expect("first interpretation");
    assert!(committed.is_some());
    assert!(!h.orchestrator.is_processing());
    assert_eq!(h.orchestrator.messages().len(), 1);
}

#[tokio::test]
async fn clear_session_empties_state_and_persisted_snapshot() {
    let store = Arc::new(MemoryStore::new());
    let h = harness_with_store(Scripted::new(Some(MAISON), Some(BONJOUR_AVATAR)), store.clone());
    h.orchestrator.capture_and_interpret().await.unwrap();
    h.orchestrator.handle_transcript("Bonjour").await.unwrap();
    assert_eq!(ConversationState::rehydrate(store.clone()).len(), 2);

    h.orchestrator.clear_session();
    assert!(h.orchestrator.messages().is_empty());
    assert!(h.orchestrator.last_avatar_response().is_none());
    assert!(h.orchestrator.active_gloss().is_empty());
    assert_eq!(store.get(HISTORY_KEY).unwrap(), None);
    assert!(ConversationState::rehydrate(store).is_empty());
}

#[tokio::test]
async fn rehydrated_history_is_sent_as_context() {
    let store = Arc::new(MemoryStore::new());
    {
        let h = harness_with_store(Scripted::new(None, Some(BONJOUR_AVATAR)), store.clone());
        h.orchestrator.handle_transcript("Bonjour").await.unwrap();
    }

    let backend = Scripted::new(Some(MAISON), None);
    let h = harness_with_store(backend.clone(), store);
    assert_eq!(h.orchestrator.messages().len(), 1);
    h.orchestrator.capture_and_interpret().await.unwrap();

    let seen = backend.seen.lock();
    assert_eq!(
        seen[0].parts[1],
        RequestPart::Text(
            "Historique : Bonjour, comment ça va ?. Quel est ce nouveau signe ?".into()
        )
    );
}

#[tokio::test]
async fn sign_selection_projects_to_avatar_without_message() {
    let h = harness(Scripted::new(None, None));
    let entry = LexiconStore::builtin()
        .search(SignSystem::Lsq, "maison")
        .into_iter()
        .next()
        .expect("lexicon has Maison");

    h.orchestrator.show_sign(entry);
    let avatar = h.orchestrator.last_avatar_response().unwrap();
    assert_eq!(avatar.text, entry.name);
    assert_eq!(avatar.sign_instruction, entry.instruction);
    assert!(h.orchestrator.messages().is_empty());
}

#[tokio::test]
async fn listening_without_recognition_reports_capability_absent() {
    let mut h = harness(Scripted::new(None, Some(BONJOUR_AVATAR)));
    assert!(matches!(
        h.orchestrator.listen_and_respond().await,
        Err(BridgeError::SpeechRecognitionUnavailable)
    ));
    assert_eq!(
        notifications(&drain(&mut h.events)),
        [NotificationKind::Warning]
    );
    assert!(!h.orchestrator.is_processing());
}

#[tokio::test]
async fn muting_cancels_the_spoken_translation() {
    let h = harness(Scripted::new(Some(MAISON), None));
    h.orchestrator.capture_and_interpret().await.unwrap();
    h.synth.sinks.lock()[0].started();
    assert!(h.orchestrator.snapshot().speaking);

    h.orchestrator.set_muted(true);
    let snapshot = h.orchestrator.snapshot();
    assert!(snapshot.muted);
    assert!(!snapshot.speaking);

    h.orchestrator.capture_and_interpret().await.unwrap();
    assert_eq!(h.synth.spoken.lock().len(), 1);
    assert_eq!(h.orchestrator.messages().len(), 2);
}
