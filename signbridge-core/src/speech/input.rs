//! One-shot speech recognition.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{BridgeError, Result};
use crate::lexicon::Language;

/// Platform speech-to-text. One call listens for one utterance and returns
/// its final transcript, or `None` when nothing was heard.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync + 'static {
    async fn listen(&self, language: Language) -> Result<Option<String>>;
}

/// Speech input capability, possibly absent.
#[derive(Clone, Default)]
pub struct SpeechInput {
    recognizer: Option<Arc<dyn SpeechRecognizer>>,
}

impl SpeechInput {
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        Self {
            recognizer: Some(recognizer),
        }
    }

    /// The platform offers no recognition; `listen` always reports it.
    pub fn unavailable() -> Self {
        Self { recognizer: None }
    }

    pub fn is_available(&self) -> bool {
        self.recognizer.is_some()
    }

    /// Listen once. Blank transcripts count as silence.
    pub async fn listen(&self, language: Language) -> Result<Option<String>> {
        let recognizer = self
            .recognizer
            .as_ref()
            .ok_or(BridgeError::SpeechRecognitionUnavailable)?;
        let transcript = recognizer.listen(language).await?;
        let transcript = transcript
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        debug!(heard = transcript.is_some(), "speech recognition finished");
        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Option<&'static str>);

    #[async_trait]
    impl SpeechRecognizer for Fixed {
        async fn listen(&self, _language: Language) -> Result<Option<String>> {
            Ok(self.0.map(str::to_string))
        }
    }

    #[tokio::test]
    async fn absent_capability_is_reported_not_panicked() {
        let input = SpeechInput::unavailable();
        assert!(!input.is_available());
        assert!(matches!(
            input.listen(Language::FrCa).await,
            Err(BridgeError::SpeechRecognitionUnavailable)
        ));
    }

    #[tokio::test]
    async fn transcript_is_trimmed_and_blank_is_silence() {
        let input = SpeechInput::new(Arc::new(Fixed(Some("  Bonjour "))));
        assert_eq!(
            input.listen(Language::FrCa).await.unwrap().as_deref(),
            Some("Bonjour")
        );
        let input = SpeechInput::new(Arc::new(Fixed(Some("   "))));
        assert_eq!(input.listen(Language::FrCa).await.unwrap(), None);
    }
}
