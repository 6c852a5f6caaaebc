//! `OfflineBackend`: heuristic responder used without network or API key.
//!
//! It does not look at the image. Frame requests answer with one of a few
//! common signs at low confidence so the whole capture → commit → speak path
//! stays exercisable; avatar requests acknowledge the transcript.

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde_json::json;
use tracing::debug;

use super::{GenerationRequest, InterpretationBackend, ResponseKind};
use crate::error::Result;
use crate::lexicon::{Intent, Language};

const OFFLINE_CONFIDENCE: f32 = 0.35;

const COMMON_SIGNS_FR: [(&str, Intent); 5] = [
    ("Bonjour", Intent::Saluer),
    ("Merci", Intent::Remercier),
    ("Aide", Intent::ExprimerBesoin),
    ("Oui", Intent::ConfirmerInfirmer),
    ("Non", Intent::ConfirmerInfirmer),
];

const COMMON_SIGNS_EN: [(&str, Intent); 5] = [
    ("Hello", Intent::Saluer),
    ("Thank you", Intent::Remercier),
    ("Help", Intent::ExprimerBesoin),
    ("Yes", Intent::ConfirmerInfirmer),
    ("No", Intent::ConfirmerInfirmer),
];

pub struct OfflineBackend {
    rng: Mutex<StdRng>,
}

impl OfflineBackend {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic sign selection, for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn pick_sign(&self, language: Language) -> (&'static str, Intent) {
        let table = if language.is_french() {
            &COMMON_SIGNS_FR
        } else {
            &COMMON_SIGNS_EN
        };
        *table
            .choose(&mut *self.rng.lock())
            .unwrap_or(&table[0])
    }
}

impl Default for OfflineBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InterpretationBackend for OfflineBackend {
    fn name(&self) -> &str {
        "offline"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let french = request.language.is_french();
        let answer = match request.kind {
            ResponseKind::Interpretation => {
                let (sign, intent) = self.pick_sign(request.language);
                debug!(sign, "offline responder picked a common sign");
                json!({
                    "gloss": [sign.to_uppercase()],
                    "intent": intent.as_str(),
                    "translation": sign,
                    "confidence": OFFLINE_CONFIDENCE,
                })
            }
            ResponseKind::Avatar => {
                let transcript = request.transcript.as_deref().unwrap_or_default();
                let (text, instruction) = if french {
                    (
                        format!(
                            "(Mode Hors-ligne) Reçu : \"{transcript}\". Je ne peux pas raisonner \
                             sans connexion, mais je reste à votre écoute."
                        ),
                        "L'avatar hoche la tête avec empathie.",
                    )
                } else {
                    (
                        format!(
                            "(Offline Mode) Received: \"{transcript}\". I cannot process complex \
                             requests without a connection, but I am still active."
                        ),
                        "The avatar nods with empathy.",
                    )
                };
                json!({ "text": text, "signInstruction": instruction })
            }
        };
        Ok(answer.to_string())
    }
}
