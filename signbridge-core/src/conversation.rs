//! Conversation log: newest-first, append-only, mirrored to durable storage.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::interpret::{AvatarResponse, InterpretationResult};
use crate::lexicon::Intent;
use crate::storage::KeyValueStore;

/// Storage key holding the serialized conversation.
pub const HISTORY_KEY: &str = "signbridge_history";

static MESSAGE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// The signing user; text comes from frame interpretation.
    User,
    /// The hearing interlocutor; text comes from the voice lane.
    Interlocutor,
}

/// One turn of the conversation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub sender: Sender,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gloss: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(default)]
    pub slots: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_description: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// User message built from a frame interpretation.
    pub fn from_interpretation(result: &InterpretationResult) -> Self {
        let timestamp = Utc::now();
        Self {
            id: next_message_id(timestamp),
            sender: Sender::User,
            text: result.translation.clone(),
            gloss: result.gloss.clone(),
            intent: Some(result.intent),
            slots: result.slots.clone(),
            sign_description: None,
            timestamp,
        }
    }

    /// Interlocutor message built from an avatar response.
    pub fn from_avatar(response: &AvatarResponse) -> Self {
        let timestamp = Utc::now();
        Self {
            id: next_message_id(timestamp),
            sender: Sender::Interlocutor,
            text: response.text.clone(),
            gloss: Vec::new(),
            intent: None,
            slots: BTreeMap::new(),
            sign_description: Some(response.sign_instruction.clone()),
            timestamp,
        }
    }
}

fn next_message_id(at: DateTime<Utc>) -> String {
    let seq = MESSAGE_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}-{seq}", at.timestamp_millis())
}

/// Ordered message log, newest first.
pub struct ConversationState {
    messages: Vec<Message>,
    store: Arc<dyn KeyValueStore>,
}

impl ConversationState {
    /// Empty conversation that persists into `store`. Does not read it.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            messages: Vec::new(),
            store,
        }
    }

    /// Load the persisted snapshot.
    ///
    /// A missing key, unreadable store or malformed snapshot all yield an empty
    /// conversation; the failure is logged and never surfaced.
    pub fn rehydrate(store: Arc<dyn KeyValueStore>) -> Self {
        let messages = match store.get(HISTORY_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Message>>(&raw) {
                Ok(messages) => {
                    debug!(count = messages.len(), "conversation rehydrated");
                    messages
                }
                Err(e) => {
                    warn!(error = %e, "persisted conversation is malformed, starting empty");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "persisted conversation could not be read, starting empty");
                Vec::new()
            }
        };
        Self { messages, store }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The `n` most recent messages, newest first.
    pub fn recent(&self, n: usize) -> &[Message] {
        &self.messages[..n.min(self.messages.len())]
    }

    /// Prepend `message` and mirror the log to storage.
    pub fn push(&mut self, message: Message) {
        self.messages.insert(0, message);
        if let Err(e) = self.persist() {
            warn!(error = %e, "failed to persist conversation");
        }
    }

    /// Empty the log and delete the persisted snapshot.
    pub fn clear(&mut self) {
        self.messages.clear();
        if let Err(e) = self.store.remove(HISTORY_KEY) {
            warn!(error = %e, "failed to remove persisted conversation");
        }
    }

    fn persist(&self) -> Result<()> {
        let json = serde_json::to_string(&self.messages)?;
        self.store.set(HISTORY_KEY, &json)
    }
}
