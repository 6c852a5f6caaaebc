//! Speech adapters: synthesis out, recognition in.

pub mod input;
pub mod output;

pub use input::{SpeechInput, SpeechRecognizer};
pub use output::{
    SilentSynthesizer, SpeechEvent, SpeechEventKind, SpeechOutput, SpeechSynthesizer, Utterance,
    UtteranceSink, Voice,
};
