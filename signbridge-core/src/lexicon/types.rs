//! Closed vocabularies shared by the lexicon, the interpretation client and
//! the conversation log.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Supported national/regional sign languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignSystem {
    /// Langue des signes québécoise.
    Lsq,
    /// American Sign Language.
    Asl,
    /// Langue des signes française.
    Lsf,
}

impl SignSystem {
    pub const ALL: [SignSystem; 3] = [SignSystem::Lsq, SignSystem::Asl, SignSystem::Lsf];

    pub fn code(self) -> &'static str {
        match self {
            SignSystem::Lsq => "LSQ",
            SignSystem::Asl => "ASL",
            SignSystem::Lsf => "LSF",
        }
    }

    /// Lenient parse used by settings and host commands.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "lsq" | "quebec" => Some(SignSystem::Lsq),
            "asl" | "american" => Some(SignSystem::Asl),
            "lsf" | "france" | "french" => Some(SignSystem::Lsf),
            _ => None,
        }
    }
}

impl fmt::Display for SignSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Spoken/written target language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "FR-CA")]
    FrCa,
    #[serde(rename = "EN-CA")]
    EnCa,
    #[serde(rename = "FR-FR")]
    FrFr,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::FrCa => "FR-CA",
            Language::EnCa => "EN-CA",
            Language::FrFr => "FR-FR",
        }
    }

    /// BCP-47 tag handed to speech synthesis and recognition.
    pub fn speech_tag(self) -> &'static str {
        match self {
            Language::FrCa => "fr-CA",
            Language::EnCa => "en-CA",
            Language::FrFr => "fr-FR",
        }
    }

    pub fn is_french(self) -> bool {
        matches!(self, Language::FrCa | Language::FrFr)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "fr-ca" | "fr" | "quebec" => Some(Language::FrCa),
            "en-ca" | "en" | "english" => Some(Language::EnCa),
            "fr-fr" | "france" => Some(Language::FrFr),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

macro_rules! intents {
    ($($variant:ident => $tag:literal,)*) => {
        /// Coarse communicative-purpose classification of an utterance.
        ///
        /// Serialized as the upper-case tag. Any tag outside the enumeration
        /// deserializes to [`Intent::Unknown`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Intent {
            $($variant,)*
            Unknown,
        }

        impl Intent {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Intent::$variant => $tag,)*
                    Intent::Unknown => "UNKNOWN",
                }
            }

            pub fn parse(raw: &str) -> Self {
                match raw.trim().to_ascii_uppercase().as_str() {
                    $($tag => Intent::$variant,)*
                    _ => Intent::Unknown,
                }
            }
        }
    };
}

intents! {
    Saluer => "SALUER",
    SePresentaer => "SE_PRESENTAER",
    AttirerAttention => "ATTIRER_ATTENTION",
    Comprendre => "COMPRENDRE",
    ConfirmerInfirmer => "CONFIRMER_INFIRMER",
    QuestionGenerale => "QUESTION_GENERALE",
    DemanderInfo => "DEMANDER_INFO",
    DonnerInfo => "DONNER_INFO",
    DemanderClarification => "DEMANDER_CLARIFICATION",
    Remercier => "REMERCIER",
    SExcuser => "S_EXCUSER",
    SouhaitPositif => "SOUHAIT_POSITIF",
    ExprimerSentiment => "EXPRIMER_SENTIMENT",
    ExprimerBesoin => "EXPRIMER_BESOIN",
    DemanderDirection => "DEMANDER_DIRECTION",
    TempsMoment => "TEMPS_MOMENT",
    PrixQuantite => "PRIX_QUANTITE",
    Sante => "SANTE",
    Urgence => "URGENCE",
    Stop => "STOP",
    Meteo => "METEO",
    Lieux => "LIEUX",
    SportsLoisirs => "SPORTS_LOISIRS",
    Alimentation => "ALIMENTATION",
    Animaux => "ANIMAUX",
    Transports => "TRANSPORTS",
    Vetements => "VETEMENTS",
    Maison => "MAISON",
    Couleurs => "COULEURS",
    Chiffres => "CHIFFRES",
    Travail => "TRAVAIL",
}

/// Display grouping used to colour intent badges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentTone {
    Alert,
    Attention,
    Positive,
    Understanding,
    Neutral,
}

impl Intent {
    pub fn tone(self) -> IntentTone {
        match self {
            Intent::Urgence | Intent::Stop | Intent::Sante => IntentTone::Alert,
            Intent::AttirerAttention | Intent::ExprimerBesoin | Intent::PrixQuantite => {
                IntentTone::Attention
            }
            Intent::Saluer | Intent::Remercier | Intent::SouhaitPositif => IntentTone::Positive,
            Intent::ConfirmerInfirmer | Intent::Comprendre | Intent::SePresentaer => {
                IntentTone::Understanding
            }
            _ => IntentTone::Neutral,
        }
    }

    pub fn is_unknown(self) -> bool {
        self == Intent::Unknown
    }
}

impl Default for Intent {
    fn default() -> Self {
        Intent::Unknown
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Intent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Intent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Intent::parse(&raw))
    }
}

/// Topic of a learning module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModuleCategory {
    Alphabet,
    Grammaire,
    Structure,
    Conversation,
    Quotidien,
    Emotions,
    Temps,
    Travail,
    Sante,
    Meteo,
    Lieux,
    SportsLoisirs,
    Alimentation,
    Animaux,
    Transports,
    Vetements,
    Maison,
    Couleurs,
    Chiffres,
}

impl ModuleCategory {
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(raw.trim().to_ascii_uppercase())).ok()
    }
}

/// Learner progress on a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleStatus {
    #[serde(rename = "Appris")]
    Learned,
    #[serde(rename = "En cours")]
    InProgress,
    #[serde(rename = "Recommandé")]
    Recommended,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_round_trips_known_tags_and_collapses_unknown_ones() {
        let parsed: Intent = serde_json::from_str(r#""S_EXCUSER""#).expect("known tag");
        assert_eq!(parsed, Intent::SExcuser);
        assert_eq!(serde_json::to_string(&parsed).unwrap(), r#""S_EXCUSER""#);

        let lower: Intent = serde_json::from_str(r#""saluer""#).expect("case-insensitive");
        assert_eq!(lower, Intent::Saluer);

        let unknown: Intent = serde_json::from_str(r#""DANSER""#).expect("unknown tag");
        assert_eq!(unknown, Intent::Unknown);
        assert_eq!(unknown.as_str(), "UNKNOWN");
    }

    #[test]
    fn intent_tone_groups_match_badge_colours() {
        assert_eq!(Intent::Urgence.tone(), IntentTone::Alert);
        assert_eq!(Intent::PrixQuantite.tone(), IntentTone::Attention);
        assert_eq!(Intent::Remercier.tone(), IntentTone::Positive);
        assert_eq!(Intent::SePresentaer.tone(), IntentTone::Understanding);
        assert_eq!(Intent::Meteo.tone(), IntentTone::Neutral);
        assert_eq!(Intent::Unknown.tone(), IntentTone::Neutral);
    }

    #[test]
    fn language_and_system_codes() {
        assert_eq!(serde_json::to_string(&Language::FrFr).unwrap(), r#""FR-FR""#);
        assert_eq!(Language::parse("en_ca"), Some(Language::EnCa));
        assert_eq!(Language::FrFr.speech_tag(), "fr-FR");
        assert_eq!(serde_json::to_string(&SignSystem::Lsq).unwrap(), r#""LSQ""#);
        assert_eq!(SignSystem::parse(" asl "), Some(SignSystem::Asl));
        assert_eq!(SignSystem::parse("bsl"), None);
    }

    #[test]
    fn module_category_parses_snake_case_tags() {
        assert_eq!(
            ModuleCategory::parse("sports_loisirs"),
            Some(ModuleCategory::SportsLoisirs)
        );
        assert_eq!(ModuleCategory::parse("nope"), None);
    }
}
