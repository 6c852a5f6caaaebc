//! Static, read-only sign-language reference data.
//!
//! Each sign system ships an embedded JSON table with its syntax rules, the
//! visual patterns used to ground the interpretation prompt, the searchable
//! dictionary and the learning-hub modules. The tables are parsed once and
//! never mutated.

pub mod types;

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::error;

pub use types::{Intent, IntentTone, Language, ModuleCategory, ModuleStatus, SignSystem};

use crate::error::Result;

const LSQ_JSON: &str = include_str!("../../data/lsq.json");
const ASL_JSON: &str = include_str!("../../data/asl.json");
const LSF_JSON: &str = include_str!("../../data/lsf.json");

/// Visual description of a sign, used as grounding context for the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualPattern {
    pub sign: String,
    pub pattern: String,
    pub intent: Intent,
}

/// Dictionary record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignEntry {
    pub id: String,
    pub name: String,
    pub category: String,
    pub instruction: String,
    pub system: SignSystem,
}

/// Learning-hub resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningModule {
    pub title: String,
    pub category: ModuleCategory,
    pub source: String,
    /// Video identifier, or `external-*` for link-only resources.
    pub id: String,
    pub status: ModuleStatus,
    pub date: String,
    pub learned: Vec<String>,
    /// `None` means the module applies to every sign system.
    #[serde(default)]
    pub system: Option<SignSystem>,
}

/// How a learning module is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Presentation {
    Video,
    ExternalLink,
}

impl LearningModule {
    pub fn presentation(&self) -> Presentation {
        if self.id.starts_with("external-") {
            Presentation::ExternalLink
        } else {
            Presentation::Video
        }
    }

    fn applies_to(&self, system: SignSystem) -> bool {
        self.system.map_or(true, |s| s == system)
    }
}

/// Learning-hub tab filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleFilter {
    All,
    /// The grammar tab shows syntax rules only, never modules.
    Syntax,
    Category(ModuleCategory),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SystemLexicon {
    #[serde(default)]
    syntax_rules: Vec<String>,
    #[serde(default)]
    visual_patterns: Vec<VisualPattern>,
    #[serde(default)]
    dictionary: Vec<SignEntry>,
    #[serde(default)]
    learning_modules: Vec<LearningModule>,
}

/// Lookup tables keyed by sign system.
#[derive(Debug, Clone, Default)]
pub struct LexiconStore {
    systems: HashMap<SignSystem, SystemLexicon>,
}

impl LexiconStore {
    /// The lexicon compiled into the crate.
    pub fn builtin() -> &'static LexiconStore {
        static BUILTIN: OnceLock<LexiconStore> = OnceLock::new();
        BUILTIN.get_or_init(|| {
            Self::from_tables(&[
                (SignSystem::Lsq, LSQ_JSON),
                (SignSystem::Asl, ASL_JSON),
                (SignSystem::Lsf, LSF_JSON),
            ])
            .unwrap_or_else(|e| {
                error!(error = %e, "embedded lexicon failed to parse, using empty lexicon");
                LexiconStore::default()
            })
        })
    }

    /// Build a store from one JSON table per sign system.
    pub fn from_tables(tables: &[(SignSystem, &str)]) -> Result<Self> {
        let mut systems = HashMap::with_capacity(tables.len());
        for (system, raw) in tables {
            let parsed: SystemLexicon = serde_json::from_str(raw)?;
            systems.insert(*system, parsed);
        }
        Ok(Self { systems })
    }

    pub fn syntax_rules(&self, system: SignSystem) -> &[String] {
        self.systems
            .get(&system)
            .map(|s| s.syntax_rules.as_slice())
            .unwrap_or_default()
    }

    pub fn visual_patterns(&self, system: SignSystem) -> &[VisualPattern] {
        self.systems
            .get(&system)
            .map(|s| s.visual_patterns.as_slice())
            .unwrap_or_default()
    }

    pub fn dictionary(&self, system: SignSystem) -> &[SignEntry] {
        self.systems
            .get(&system)
            .map(|s| s.dictionary.as_slice())
            .unwrap_or_default()
    }

    /// Case-insensitive substring search over name and category.
    ///
    /// An empty query returns the whole dictionary of `system`.
    pub fn search(&self, system: SignSystem, query: &str) -> Vec<&SignEntry> {
        let needle = query.trim().to_lowercase();
        self.dictionary(system)
            .iter()
            .filter(|e| e.system == system)
            .filter(|e| {
                needle.is_empty()
                    || e.name.to_lowercase().contains(&needle)
                    || e.category.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Modules applicable to `system`, narrowed by the learning-hub tab.
    pub fn learning_modules(&self, system: SignSystem, filter: ModuleFilter) -> Vec<&LearningModule> {
        if filter == ModuleFilter::Syntax {
            return Vec::new();
        }
        self.systems
            .values()
            .flat_map(|s| s.learning_modules.iter())
            .filter(|m| m.applies_to(system))
            .filter(|m| match filter {
                ModuleFilter::Category(c) => m.category == c,
                _ => true,
            })
            .collect()
    }
}
