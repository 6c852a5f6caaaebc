//! Interpretation client.
//!
//! The `InterpretationBackend` trait decouples prompt construction and
//! response validation from the model transport (Gemini REST, the offline
//! heuristic responder, scripted test doubles).
//!
//! ```text
//! Frame + history + lexicon hints ─► prompt ─► backend.generate ─► schema check
//!                                                                     │
//!                                               InterpretationResult ◄┘ (or fallback)
//! ```
//!
//! `interpret_frame` / `interpret_speech` are total: every transport, timeout
//! or validation failure resolves to a well-formed fallback value.

#[cfg(feature = "gemini")]
pub mod gemini;
pub mod offline;
pub mod prompt;
pub mod schema;

#[cfg(feature = "gemini")]
pub use gemini::{GeminiBackend, GeminiConfig};
pub use offline::OfflineBackend;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::capture::Frame;
use crate::conversation::Message;
use crate::error::{BridgeError, Result};
use crate::lexicon::{Intent, Language, LexiconStore, SignSystem};

/// Translation value meaning "no usable result yet".
pub const NO_RESULT_SENTINEL: &str = "...";
/// Translation value of the frame-path fallback.
pub const ERROR_SENTINEL: &str = "Erreur";
/// Instruction shown when the avatar path falls back to echoing the transcript.
pub const ADAPTING_INSTRUCTION: &str = "Adaptation syntaxique...";

/// The model's structured answer to "what sign is this".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpretationResult {
    pub gloss: Vec<String>,
    pub translation: String,
    pub intent: Intent,
    #[serde(default)]
    pub slots: BTreeMap<String, String>,
    /// Advisory only, never gated on.
    pub confidence: f32,
}

impl InterpretationResult {
    /// Zero-confidence result returned when interpretation fails.
    pub fn fallback() -> Self {
        Self {
            gloss: Vec::new(),
            translation: ERROR_SENTINEL.to_string(),
            intent: Intent::Unknown,
            slots: BTreeMap::new(),
            confidence: 0.0,
        }
    }

    /// Whether the translation may be surfaced as a message.
    pub fn has_translation(&self) -> bool {
        let t = self.translation.trim();
        !t.is_empty() && t != NO_RESULT_SENTINEL
    }
}

/// Avatar reply to a spoken transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarResponse {
    pub text: String,
    pub sign_instruction: String,
}

impl AvatarResponse {
    /// Fallback: echo the transcript with a generic instruction.
    pub fn echo(transcript: &str) -> Self {
        Self {
            text: transcript.to_string(),
            sign_instruction: ADAPTING_INSTRUCTION.to_string(),
        }
    }
}

/// Which response shape a request expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Interpretation,
    Avatar,
}

/// One content part of a model request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestPart {
    Text(String),
    Image { mime_type: String, data_base64: String },
}

/// Fully built request handed to a backend.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub kind: ResponseKind,
    pub system_instruction: String,
    pub parts: Vec<RequestPart>,
    pub language: Language,
    pub sign_system: SignSystem,
    /// Raw transcript for avatar requests.
    pub transcript: Option<String>,
}

/// Contract for model transports.
#[async_trait]
pub trait InterpretationBackend: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Run one request and return the raw JSON text of the answer.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Client tuning.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Most recent messages sent as conversational context. Default: 5.
    pub history_window: usize,
    /// Upper bound on a single backend call. Default: 30 s.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            history_window: 5,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Builds prompts, calls the backend and validates its answers.
#[derive(Clone)]
pub struct InterpretationClient {
    backend: Arc<dyn InterpretationBackend>,
    lexicon: &'static LexiconStore,
    config: ClientConfig,
}

impl InterpretationClient {
    pub fn new(backend: Arc<dyn InterpretationBackend>, config: ClientConfig) -> Self {
        Self {
            backend,
            lexicon: LexiconStore::builtin(),
            config,
        }
    }

    pub fn with_lexicon(mut self, lexicon: &'static LexiconStore) -> Self {
        self.lexicon = lexicon;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Number of recent messages sent as context.
    pub fn history_window(&self) -> usize {
        self.config.history_window
    }

    /// Interpret a captured frame, or explain why it could not be.
    ///
    /// `history` is the conversation newest-first, as held by
    /// [`ConversationState`](crate::conversation::ConversationState).
    pub async fn try_interpret_frame(
        &self,
        frame: &Frame,
        language: Language,
        sign_system: SignSystem,
        history: &[Message],
    ) -> Result<InterpretationResult> {
        let recent = &history[..history.len().min(self.config.history_window)];
        let request = GenerationRequest {
            kind: ResponseKind::Interpretation,
            system_instruction: prompt::frame_instruction(self.lexicon, sign_system, language),
            parts: vec![
                RequestPart::Image {
                    mime_type: frame.mime_type().to_string(),
                    data_base64: frame.to_base64(),
                },
                RequestPart::Text(prompt::frame_query(recent)),
            ],
            language,
            sign_system,
            transcript: None,
        };
        let raw = self.call(&request).await?;
        let result = schema::parse_interpretation(&raw)?;
        debug!(
            backend = self.backend.name(),
            gloss = ?result.gloss,
            intent = %result.intent,
            confidence = result.confidence,
            "frame interpreted"
        );
        Ok(result)
    }

    /// Total variant of [`try_interpret_frame`](Self::try_interpret_frame).
    pub async fn interpret_frame(
        &self,
        frame: &Frame,
        language: Language,
        sign_system: SignSystem,
        history: &[Message],
    ) -> InterpretationResult {
        self.try_interpret_frame(frame, language, sign_system, history)
            .await
            .unwrap_or_else(|e| {
                warn!(backend = self.backend.name(), error = %e, "frame interpretation failed");
                InterpretationResult::fallback()
            })
    }

    /// Ask the model for the avatar rendering of a spoken transcript.
    pub async fn try_interpret_speech(
        &self,
        transcript: &str,
        language: Language,
        sign_system: SignSystem,
    ) -> Result<AvatarResponse> {
        let request = GenerationRequest {
            kind: ResponseKind::Avatar,
            system_instruction: prompt::avatar_instruction(sign_system, language),
            parts: vec![RequestPart::Text(prompt::avatar_query(transcript))],
            language,
            sign_system,
            transcript: Some(transcript.to_string()),
        };
        let raw = self.call(&request).await?;
        schema::parse_avatar(&raw)
    }

    /// Total variant of [`try_interpret_speech`](Self::try_interpret_speech):
    /// falls back to echoing the transcript.
    pub async fn interpret_speech(
        &self,
        transcript: &str,
        language: Language,
        sign_system: SignSystem,
    ) -> AvatarResponse {
        self.try_interpret_speech(transcript, language, sign_system)
            .await
            .unwrap_or_else(|e| {
                warn!(backend = self.backend.name(), error = %e, "avatar response failed");
                AvatarResponse::echo(transcript)
            })
    }

    async fn call(&self, request: &GenerationRequest) -> Result<String> {
        match tokio::time::timeout(self.config.timeout, self.backend.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(BridgeError::BackendTransport(format!(
                "no answer within {:?}",
                self.config.timeout
            ))),
        }
    }
}
