//! Response schemas and strict validation at the client boundary.
//!
//! The backend hands back raw JSON text. It becomes either a fully typed
//! value or a `BridgeError::InvalidResponse`; nothing partially typed leaks
//! past this module.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};

use super::{AvatarResponse, InterpretationResult, ResponseKind};
use crate::error::{BridgeError, Result};
use crate::lexicon::Intent;

impl ResponseKind {
    /// JSON schema the model is asked to conform to (OpenAPI subset used by
    /// the Gemini `responseSchema` field).
    pub fn schema(self) -> Value {
        match self {
            ResponseKind::Interpretation => json!({
                "type": "OBJECT",
                "properties": {
                    "gloss": { "type": "ARRAY", "items": { "type": "STRING" } },
                    "intent": { "type": "STRING" },
                    "translation": { "type": "STRING" },
                    "confidence": { "type": "NUMBER" }
                },
                "required": ["gloss", "intent", "translation", "confidence"]
            }),
            ResponseKind::Avatar => json!({
                "type": "OBJECT",
                "properties": {
                    "text": { "type": "STRING" },
                    "signInstruction": { "type": "STRING" }
                },
                "required": ["text", "signInstruction"]
            }),
        }
    }
}

#[derive(Deserialize)]
struct RawInterpretation {
    gloss: Vec<String>,
    intent: Intent,
    translation: String,
    confidence: f64,
    #[serde(default)]
    slots: Option<BTreeMap<String, String>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAvatar {
    text: String,
    sign_instruction: String,
}

/// Validate a frame-path answer.
pub fn parse_interpretation(raw: &str) -> Result<InterpretationResult> {
    let parsed: RawInterpretation = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| BridgeError::InvalidResponse(e.to_string()))?;

    if !parsed.confidence.is_finite() || !(0.0..=1.0).contains(&parsed.confidence) {
        return Err(BridgeError::InvalidResponse(format!(
            "confidence {} outside [0, 1]",
            parsed.confidence
        )));
    }

    Ok(InterpretationResult {
        gloss: parsed
            .gloss
            .into_iter()
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .collect(),
        translation: parsed.translation.trim().to_string(),
        intent: parsed.intent,
        slots: parsed.slots.unwrap_or_default(),
        confidence: parsed.confidence as f32,
    })
}

/// Validate an avatar-path answer.
pub fn parse_avatar(raw: &str) -> Result<AvatarResponse> {
    let parsed: RawAvatar = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| BridgeError::InvalidResponse(e.to_string()))?;
    let text = parsed.text.trim();
    if text.is_empty() {
        return Err(BridgeError::InvalidResponse("empty avatar text".into()));
    }
    Ok(AvatarResponse {
        text: text.to_string(),
        sign_instruction: parsed.sign_instruction.trim().to_string(),
    })
}

/// Models occasionally wrap JSON mode output in a markdown fence.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = body.strip_prefix("json").unwrap_or(body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn accepts_complete_interpretation_and_defaults_slots() {
        let r = parse_interpretation(
            r#"{"gloss":[" MAISON ",""],"intent":"LIEUX","translation":"Je vais à la maison","confidence":0.9}"#,
        )
        .expect("valid");
        assert_eq!(r.gloss, ["MAISON"]);
        assert_eq!(r.intent, Intent::Lieux);
        assert!(r.slots.is_empty());
        assert_relative_eq!(r.confidence, 0.9, epsilon = 1e-6);
    }

    #[test]
    fn keeps_slots_when_present_and_maps_unknown_intent() {
        let r = parse_interpretation(
            r#"{"gloss":["PAIN"],"intent":"ACHETER","translation":"Deux pains","confidence":1,
                "slots":{"quantite":"2"}}"#,
        )
        .expect("valid");
        assert_eq!(r.intent, Intent::Unknown);
        assert_eq!(r.slots.get("quantite").map(String::as_str), Some("2"));
    }

    #[test]
    fn rejects_missing_fields_and_bad_confidence() {
        for raw in [
            r#"{"gloss":[],"intent":"SALUER","translation":"Salut"}"#,
            r#"{"intent":"SALUER","translation":"Salut","confidence":0.5}"#,
            r#"{"gloss":"SALUT","intent":"SALUER","translation":"Salut","confidence":0.5}"#,
            r#"{"gloss":[],"intent":"SALUER","translation":"Salut","confidence":95}"#,
            "",
            "Désolé, je ne peux pas répondre.",
        ] {
            let err = parse_interpretation(raw).expect_err(raw);
            assert!(matches!(err, BridgeError::InvalidResponse(_)), "{raw}: {err}");
        }
    }

    #[test]
    fn strips_markdown_fences() {
        let raw = "```json\n{\"text\":\"Salut\",\"signInstruction\":\"Main au front\"}\n```";
        let r = parse_avatar(raw).expect("fenced json");
        assert_eq!(r.text, "Salut");
    }

    #[test]
    fn avatar_requires_both_fields_and_text() {
        assert!(parse_avatar(r#"{"text":"Salut"}"#).is_err());
        assert!(parse_avatar(r#"{"text":"  ","signInstruction":"x"}"#).is_err());
    }

    #[test]
    fn schemas_list_required_fields() {
        let s = ResponseKind::Interpretation.schema();
        assert_eq!(s["required"].as_array().map(Vec::len), Some(4));
        let s = ResponseKind::Avatar.schema();
        assert_eq!(s["required"][1], "signInstruction");
    }
}
