//! Gemini REST backend (`models/{model}:generateContent`).
//!
//! Requests JSON mode with a response schema so the model's text is already
//! the structured answer; validation still happens in [`super::schema`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{GenerationRequest, InterpretationBackend, RequestPart};
use crate::error::{BridgeError, Result};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// HTTP-level timeout. The client applies its own bound on top.
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

pub struct GeminiBackend {
    client: Client,
    config: GeminiConfig,
}

impl GeminiBackend {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BridgeError::BackendTransport(format!("http client: {e}")))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl InterpretationBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let body = GenerateContentRequest::from_request(request);
        debug!(model = %self.config.model, kind = ?request.kind, "gemini request");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BridgeError::BackendTransport(format!("gemini request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read gemini error body".to_string());
            return Err(map_http_error(status, &text));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| BridgeError::InvalidResponse(format!("gemini response: {e}")))?;
        extract_text(parsed)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    system_instruction: Content,
    generation_config: GenerationConfig,
}

impl GenerateContentRequest {
    fn from_request(request: &GenerationRequest) -> Self {
        let parts = request
            .parts
            .iter()
            .map(|part| match part {
                RequestPart::Text(text) => Part::Text { text: text.clone() },
                RequestPart::Image {
                    mime_type,
                    data_base64,
                } => Part::InlineData {
                    inline_data: InlineData {
                        mime_type: mime_type.clone(),
                        data: data_base64.clone(),
                    },
                },
            })
            .collect();
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            system_instruction: Content {
                role: None,
                parts: vec![Part::Text {
                    text: request.system_instruction.clone(),
                }],
            },
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: request.kind.schema(),
            },
        }
    }
}

#[derive(Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: serde_json::Value,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

fn extract_text(response: GenerateContentResponse) -> Result<String> {
    response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| BridgeError::InvalidResponse("gemini returned no candidate text".into()))
}

fn map_http_error(status: StatusCode, body: &str) -> BridgeError {
    let message = serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| {
            let msg = wrapper.error.message.unwrap_or_else(|| body.to_string());
            match wrapper.error.status {
                Some(s) if !s.is_empty() => format!("{s}: {msg}"),
                _ => msg,
            }
        })
        .unwrap_or_else(|_| body.to_string());
    BridgeError::BackendStatus {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpret::ResponseKind;
    use crate::lexicon::{Language, SignSystem};

    fn request() -> GenerationRequest {
        GenerationRequest {
            kind: ResponseKind::Interpretation,
            system_instruction: "Tu es l'IA interprète".into(),
            parts: vec![
                RequestPart::Image {
                    mime_type: "image/jpeg".into(),
                    data_base64: "/9j/2Q==".into(),
                },
                RequestPart::Text("Historique : . Quel est ce nouveau signe ?".into()),
            ],
            language: Language::FrCa,
            sign_system: SignSystem::Lsq,
            transcript: None,
        }
    }

    #[test]
    fn body_uses_gemini_wire_names() {
        let body = serde_json::to_value(GenerateContentRequest::from_request(&request())).unwrap();
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(body["contents"][0]["parts"][0]["inlineData"]["data"], "/9j/2Q==");
        assert_eq!(
            body["contents"][0]["parts"][1]["text"],
            "Historique : . Quel est ce nouveau signe ?"
        );
        assert!(body["systemInstruction"].get("role").is_none());
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "OBJECT");
    }

    #[test]
    fn extracts_concatenated_candidate_text() {
        let parsed: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"text\":"},{"text":"\"ok\"}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(parsed).unwrap(), r#"{"text":"ok"}"#);
    }

    #[test]
    fn empty_candidates_are_invalid() {
        let parsed: GenerateContentResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(matches!(extract_text(parsed), Err(BridgeError::InvalidResponse(_))));
        let parsed: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(extract_text(parsed).is_err());
    }

    #[test]
    fn http_error_prefers_structured_message() {
        let err = map_http_error(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#,
        );
        match err {
            BridgeError::BackendStatus { status, message } => {
                assert_eq!(status, 429);
                assert_eq!(message, "RESOURCE_EXHAUSTED: Quota exceeded");
            }
            other => panic!("unexpected {other:?}"),
        }

        let err = map_http_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(err.to_string().contains("upstream down"));
    }

    #[test]
    fn endpoint_joins_model_name() {
        let backend = GeminiBackend::new(GeminiConfig {
            base_url: "http://localhost:9/v1beta/models/".into(),
            ..GeminiConfig::new("k")
        })
        .unwrap();
        assert_eq!(
            backend.endpoint(),
            "http://localhost:9/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }
}
