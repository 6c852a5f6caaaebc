//! # signbridge-core
//!
//! Host-agnostic interpretation pipeline for sign-language conversation.
//!
//! ## Architecture
//!
//! ```text
//! CaptureAdapter ─► Frame ─┐                         ┌─► ConversationState (persisted)
//!                          ├─► Orchestrator ─► InterpretationClient ─► backend (Gemini | offline)
//! SpeechInput ─► transcript┘        │                └─► SpeechOutput (user signs)
//!                                   └─► broadcast::Sender<UiEvent>
//! ```
//!
//! Every host capability (camera, speech synthesis, speech recognition,
//! durable storage) is a trait; absent capabilities degrade gracefully.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod capture;
pub mod conversation;
pub mod engine;
pub mod error;
pub mod interpret;
pub mod ipc;
pub mod lexicon;
pub mod speech;
pub mod storage;

// Convenience re-exports for downstream crates
pub use capture::{CameraBackend, CameraStatus, CaptureAdapter, CaptureConfig, Frame, FrameSource};
pub use conversation::{ConversationState, Message, Sender};
pub use engine::{HoldTrigger, Orchestrator, SessionSettings, SessionSnapshot};
pub use error::{BridgeError, Result};
pub use interpret::{
    AvatarResponse, ClientConfig, InterpretationBackend, InterpretationClient,
    InterpretationResult, OfflineBackend,
};
pub use ipc::events::{Lane, LaneState, Notification, NotificationKind, UiEvent};
pub use lexicon::{Intent, Language, LexiconStore, SignEntry, SignSystem};
pub use speech::{SpeechInput, SpeechOutput, SpeechRecognizer, SpeechSynthesizer};
pub use storage::{KeyValueStore, MemoryStore};

#[cfg(feature = "gemini")]
pub use interpret::{GeminiBackend, GeminiConfig};
