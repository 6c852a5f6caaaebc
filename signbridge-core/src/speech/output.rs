//! Text-to-speech output with single-utterance semantics.
//!
//! At most one utterance is active: a new `speak` cancels the previous one.
//! Every utterance receives exactly one [`SpeechEventKind::Ended`], whether
//! it finished, was cancelled, was muted or was never voiced at all. A 50 ms
//! liveness poll covers platforms that stop speaking without reporting it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::Result;
use crate::lexicon::Language;

const LIVENESS_POLL: Duration = Duration::from_millis(50);
const DEFAULT_RATE: f32 = 1.0;
const DEFAULT_PITCH: f32 = 1.1;

/// A voice offered by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voice {
    pub name: String,
    /// BCP-47 tag, e.g. `fr-CA`.
    pub lang: String,
    pub local_service: bool,
    pub default: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub id: u64,
    pub text: String,
    pub lang: String,
    pub voice: Option<Voice>,
    pub rate: f32,
    pub pitch: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpeechEventKind {
    Started,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechEvent {
    pub utterance_id: u64,
    pub kind: SpeechEventKind,
}

/// Platform speech synthesis.
///
/// `speak` must not block until playback ends; lifecycle is reported through
/// the sink, from any thread.
pub trait SpeechSynthesizer: Send + Sync + 'static {
    fn voices(&self) -> Vec<Voice>;

    fn speak(&self, utterance: &Utterance, sink: UtteranceSink) -> Result<()>;

    /// Stop whatever is playing. Idempotent.
    fn cancel(&self);

    fn is_speaking(&self) -> bool;
}

/// Synthesizer for hosts without audio output: every utterance ends at once.
#[derive(Debug, Default)]
pub struct SilentSynthesizer;

impl SpeechSynthesizer for SilentSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        Vec::new()
    }

    fn speak(&self, _utterance: &Utterance, sink: UtteranceSink) -> Result<()> {
        sink.started();
        sink.finished();
        Ok(())
    }

    fn cancel(&self) {}

    fn is_speaking(&self) -> bool {
        false
    }
}

/// Lifecycle callbacks for one utterance. Stale sinks are ignored.
#[derive(Clone)]
pub struct UtteranceSink {
    id: u64,
    shared: Arc<Shared>,
}

impl UtteranceSink {
    pub fn utterance_id(&self) -> u64 {
        self.id
    }

    pub fn started(&self) {
        self.shared.on_started(self.id);
    }

    /// Normal end or platform error.
    pub fn finished(&self) {
        self.shared.finish(self.id);
    }
}

#[derive(Default)]
struct OutputState {
    current: Option<u64>,
    muted: bool,
    poll: Option<JoinHandle<()>>,
}

struct Shared {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    state: Mutex<OutputState>,
    events: broadcast::Sender<SpeechEvent>,
    runtime: Option<Handle>,
}

impl Shared {
    fn emit(&self, utterance_id: u64, kind: SpeechEventKind) {
        // No subscribers is fine.
        let _ = self.events.send(SpeechEvent { utterance_id, kind });
    }

    fn on_started(self: &Arc<Self>, id: u64) {
        let mut state = self.state.lock();
        if state.current != Some(id) {
            return;
        }
        if let Some(old) = state.poll.take() {
            old.abort();
        }
        state.poll = self.runtime.as_ref().map(|rt| {
            let shared = Arc::clone(self);
            rt.spawn(async move {
                let mut ticker = tokio::time::interval(LIVENESS_POLL);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    if shared.state.lock().current != Some(id) {
                        break;
                    }
                    if !shared.synthesizer.is_speaking() {
                        debug!(utterance = id, "platform went quiet without an end event");
                        shared.finish(id);
                        break;
                    }
                }
            })
        });
        drop(state);
        self.emit(id, SpeechEventKind::Started);
    }

    /// Fire `Ended` for `id` if it is still the current utterance.
    fn finish(&self, id: u64) -> bool {
        let mut state = self.state.lock();
        if state.current != Some(id) {
            return false;
        }
        state.current = None;
        if let Some(poll) = state.poll.take() {
            poll.abort();
        }
        drop(state);
        self.emit(id, SpeechEventKind::Ended);
        true
    }

    /// Stop the current utterance, if any, and report its end.
    fn interrupt(&self) {
        let current = self.state.lock().current;
        if let Some(id) = current {
            self.synthesizer.cancel();
            self.finish(id);
        }
    }
}

/// Owned speech output. Constructed once by the host and injected into the
/// orchestrator.
pub struct SpeechOutput {
    shared: Arc<Shared>,
    next_id: AtomicU64,
}

impl SpeechOutput {
    /// Call from within a tokio runtime to enable the liveness poll.
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        let (events, _) = broadcast::channel(64);
        let runtime = Handle::try_current().ok();
        if runtime.is_none() {
            debug!("no tokio runtime, speech liveness poll disabled");
        }
        Self {
            shared: Arc::new(Shared {
                synthesizer,
                state: Mutex::new(OutputState::default()),
                events,
                runtime,
            }),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SpeechEvent> {
        self.shared.events.subscribe()
    }

    pub fn is_muted(&self) -> bool {
        self.shared.state.lock().muted
    }

    /// Muting cancels the current utterance.
    pub fn set_muted(&self, muted: bool) {
        self.shared.state.lock().muted = muted;
        if muted {
            self.shared.interrupt();
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.shared.state.lock().current.is_some()
    }

    pub fn cancel(&self) {
        self.shared.interrupt();
    }

    /// Speak `text`, replacing any current utterance. Returns the utterance id
    /// its events will carry.
    pub fn speak(&self, text: &str, language: Language) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let text = text.trim();
        if text.is_empty() || self.is_muted() {
            self.shared.emit(id, SpeechEventKind::Ended);
            return id;
        }

        let previous = {
            let mut state = self.shared.state.lock();
            if let Some(poll) = state.poll.take() {
                poll.abort();
            }
            state.current.replace(id)
        };
        if let Some(old) = previous {
            self.shared.synthesizer.cancel();
            self.shared.emit(old, SpeechEventKind::Ended);
        }

        let lang = language.speech_tag();
        let utterance = Utterance {
            id,
            text: text.to_string(),
            lang: lang.to_string(),
            voice: select_voice(&self.shared.synthesizer.voices(), lang),
            rate: DEFAULT_RATE,
            pitch: DEFAULT_PITCH,
        };
        let sink = UtteranceSink {
            id,
            shared: Arc::clone(&self.shared),
        };
        if let Err(e) = self.shared.synthesizer.speak(&utterance, sink) {
            warn!(error = %e, utterance = id, "speech synthesis failed");
            self.shared.finish(id);
        }
        id
    }
}

/// Language match first preferring a default or local voice, then any voice
/// for the language.
pub fn select_voice(voices: &[Voice], lang: &str) -> Option<Voice> {
    let matching: Vec<&Voice> = voices
        .iter()
        .filter(|v| lang_matches(&v.lang, lang))
        .collect();
    matching
        .iter()
        .find(|v| v.default || v.local_service)
        .or_else(|| matching.first())
        .map(|v| (*v).clone())
}

fn lang_matches(voice_lang: &str, wanted: &str) -> bool {
    let voice_lang = voice_lang.replace('_', "-");
    voice_lang
        .get(..wanted.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(wanted))
}
