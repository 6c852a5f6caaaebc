//! Events the orchestrator broadcasts to the UI layer.
//!
//! Every event serializes as `{"type": "...", "payload": {...}}` with
//! camelCase names, so a web or terminal front end can consume the same
//! stream.

use serde::{Deserialize, Serialize};

use crate::conversation::Message;
use crate::interpret::AvatarResponse;

/// How long a notification stays on screen.
pub const NOTIFICATION_DISMISS_MS: u64 = 5000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum UiEvent {
    /// A message was prepended to the conversation.
    MessageCommitted(Message),
    /// Gloss tokens to highlight for the latest interpreted sign.
    ActiveGloss(ActiveGlossEvent),
    /// The "last avatar response" projection changed.
    AvatarResponse(AvatarResponse),
    Notification(Notification),
    LaneChanged(LaneEvent),
    ProcessingChanged(ProcessingEvent),
    SessionCleared,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveGlossEvent {
    pub gloss: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingEvent {
    pub processing: bool,
}

/// The two interaction lanes sharing the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    /// Camera frame → interpretation → user message.
    Sign,
    /// Spoken transcript → avatar response → interlocutor message.
    Voice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LaneState {
    Idle,
    Capturing,
    Listening,
    Interpreting,
    Committed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaneEvent {
    pub lane: Lane,
    pub state: LaneState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Error,
    Warning,
    Success,
    Info,
}

/// Transient, auto-dismissing user notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub message: String,
    pub kind: NotificationKind,
    pub dismiss_after_ms: u64,
}

impl Notification {
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            dismiss_after_ms: NOTIFICATION_DISMISS_MS,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Warning, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Info, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_serializes_with_camel_case_and_default_dismissal() {
        let event = UiEvent::Notification(Notification::error("Erreur d'interprétation"));

        let json = serde_json::to_value(&event).expect("serialize notification");
        assert_eq!(json["type"], "notification");
        assert_eq!(json["payload"]["message"], "Erreur d'interprétation");
        assert_eq!(json["payload"]["kind"], "error");
        assert_eq!(json["payload"]["dismissAfterMs"], 5000);

        let round_trip: UiEvent = serde_json::from_value(json).expect("deserialize notification");
        assert_eq!(round_trip, event);
    }

    #[test]
    fn lane_event_uses_lowercase_lane_and_camel_case_state() {
        let event = UiEvent::LaneChanged(LaneEvent {
            lane: Lane::Voice,
            state: LaneState::Interpreting,
        });

        let json = serde_json::to_value(&event).expect("serialize lane event");
        assert_eq!(json["type"], "laneChanged");
        assert_eq!(json["payload"]["lane"], "voice");
        assert_eq!(json["payload"]["state"], "interpreting");
    }

    #[test]
    fn avatar_and_unit_events_serialize() {
        let json = serde_json::to_value(UiEvent::AvatarResponse(AvatarResponse {
            text: "Bonjour".into(),
            sign_instruction: "Main au front".into(),
        }))
        .expect("serialize avatar event");
        assert_eq!(json["payload"]["signInstruction"], "Main au front");

        let json = serde_json::to_value(UiEvent::SessionCleared).expect("serialize unit event");
        assert_eq!(json["type"], "sessionCleared");
    }

    #[test]
    fn notification_kind_rejects_non_lowercase_values() {
        let err = serde_json::from_str::<NotificationKind>(r#""Error""#);
        assert!(err.is_err(), "expected invalid casing to fail");
    }
}
