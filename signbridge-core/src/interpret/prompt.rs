//! Deterministic prompt construction.

use crate::conversation::Message;
use crate::lexicon::{Language, LexiconStore, SignSystem};

const HISTORY_SEPARATOR: &str = " -> ";

/// System instruction for the frame path: names the active sign system and
/// embeds its syntax rules plus the visual reference catalog.
pub fn frame_instruction(lexicon: &LexiconStore, system: SignSystem, language: Language) -> String {
    let syntax_rules = lexicon.syntax_rules(system).join("\n");
    let references = lexicon
        .visual_patterns(system)
        .iter()
        .map(|p| format!("- RÉFÉRENCE \"{}\": {} (intention {})", p.sign, p.pattern, p.intent))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Tu es l'IA interprète linguistique de SignBridge.\n\
         SYSTÈME ACTUEL : {system}.\n\
         \n\
         CONTEXTE CULTUREL :\n\
         La LSQ (Québec) et la LSF (France) partagent de nombreux signes, mais l'ordre des mots \
         et certaines expressions faciales diffèrent. Respecte strictement le système sélectionné.\n\
         \n\
         RÈGLES GRAMMATICALES POUR {system} :\n\
         {syntax_rules}\n\
         \n\
         BIBLIOTHÈQUE VISUELLE DE RÉFÉRENCE :\n\
         {references}\n\
         \n\
         MÉTHODE :\n\
         1. Analyse l'image pour trouver le pattern visuel correspondant au signe.\n\
         2. Combine avec l'historique des signes pour former une phrase sémantiquement correcte.\n\
         3. Traduis vers une phrase fluide adaptée à la région ({language}).\n\
         \n\
         RÉPONDS EN JSON : gloss (concepts détectés), intent (une intention de la liste ou UNKNOWN), \
         translation (phrase fluide en {language}, \"...\" si aucun signe n'est lisible), \
         slots (paramètres extraits, optionnel), confidence (entre 0 et 1)."
    )
}

/// Flatten the newest-first `recent` slice into oldest-first text.
pub fn flatten_history(recent: &[Message]) -> String {
    recent
        .iter()
        .rev()
        .map(|m| m.text.as_str())
        .collect::<Vec<_>>()
        .join(HISTORY_SEPARATOR)
}

/// Query text accompanying the frame.
pub fn frame_query(recent: &[Message]) -> String {
    format!(
        "Historique : {}. Quel est ce nouveau signe ?",
        flatten_history(recent)
    )
}

/// System instruction for the avatar path.
pub fn avatar_instruction(system: SignSystem, language: Language) -> String {
    format!(
        "Tu es un avatar virtuel Sourd. Traduis la phrase vocale vers la syntaxe {system}.\n\
         Explique les mouvements des mains de manière très pédagogique car l'utilisateur apprend.\n\
         Rédige `text` en {language}. RÉPONDS EN JSON : text, signInstruction."
    )
}

pub fn avatar_query(transcript: &str) -> String {
    format!("Voix : \"{transcript}\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asl_instruction_uses_default_grammar_rule() {
        let text = frame_instruction(LexiconStore::builtin(), SignSystem::Asl, Language::EnCa);
        assert!(text.contains("SYSTÈME ACTUEL : ASL."));
        assert!(text.contains("Time > Topic > Comment"));
        assert!(text.contains(r#"RÉFÉRENCE "Hello": Salute motion from forehead. (intention SALUER)"#));
        assert!(text.contains("(EN-CA)"));
    }

    #[test]
    fn empty_history_flattens_to_empty_text() {
        assert_eq!(flatten_history(&[]), "");
        assert_eq!(frame_query(&[]), "Historique : . Quel est ce nouveau signe ?");
    }

    #[test]
    fn avatar_query_quotes_transcript() {
        assert_eq!(avatar_query("Bonjour"), "Voix : \"Bonjour\"");
    }
}
