//! Line commands read from stdin and the terminal rendering of UI events.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use signbridge_core::capture::{FRAME_HEIGHT, FRAME_WIDTH, JPEG_QUALITY};
use signbridge_core::conversation::HISTORY_KEY;
use signbridge_core::lexicon::{IntentTone, ModuleCategory, ModuleFilter, Presentation};
use signbridge_core::{
    BridgeError, Frame, FrameSource, Language, Message, Notification, NotificationKind, Sender,
    SignSystem, UiEvent,
};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::devices::load_rgb;
use crate::state::AppState;

pub const HELP: &str = "\
capture              interpréter une image de la caméra
frame <chemin>       interpréter une image fixe
say <texte>          réponse de l'avatar à une phrase entendue
listen               écouter une phrase au micro
sign <recherche>     chercher un signe et le montrer sur l'avatar
learn [catégorie]    modules d'apprentissage (syntax pour la grammaire)
hold / release       maintien de 2 s vers le référentiel
mute / unmute        voix de synthèse
camera on|off        caméra
lang <code>          FR-CA, EN-CA, FR-FR
system <code>        LSQ, ASL, LSF
history              conversation
clear                effacer la session
status               état et diagnostics
quit                 quitter";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Capture,
    Frame(PathBuf),
    Say(String),
    Listen,
    Sign(String),
    Learn(Option<String>),
    Hold,
    Release,
    Mute(bool),
    Camera(bool),
    Lang(String),
    System(String),
    History,
    Clear,
    Status,
    Help,
    Quit,
}

impl Command {
    /// Interpretations run beside further input so the processing gate can
    /// refuse an overlapping trigger. Everything else runs in input order.
    pub fn is_interpretation(&self) -> bool {
        matches!(
            self,
            Command::Capture | Command::Frame(_) | Command::Say(_) | Command::Listen
        )
    }
}

/// `Ok(None)` for a blank line.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };
    let required = |what: &str| -> Result<String, String> {
        if rest.is_empty() {
            Err(format!("usage : {verb} <{what}>"))
        } else {
            Ok(rest.to_string())
        }
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "capture" => Command::Capture,
        "frame" => Command::Frame(PathBuf::from(required("chemin")?)),
        "say" => Command::Say(required("texte")?),
        "listen" => Command::Listen,
        "sign" => Command::Sign(rest.to_string()),
        "learn" => Command::Learn(Some(rest.to_string()).filter(|r| !r.is_empty())),
        "hold" => Command::Hold,
        "release" => Command::Release,
        "mute" => Command::Mute(true),
        "unmute" => Command::Mute(false),
        "camera" => match rest.to_ascii_lowercase().as_str() {
            "on" => Command::Camera(true),
            "off" => Command::Camera(false),
            _ => return Err("usage : camera on|off".into()),
        },
        "lang" => Command::Lang(required("code")?),
        "system" => Command::System(required("code")?),
        "history" => Command::History,
        "clear" => Command::Clear,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("commande inconnue : {other} (tapez help)")),
    };
    Ok(Some(command))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Lines(Vec<String>),
    Quit,
}

impl Reply {
    fn none() -> Self {
        Reply::Lines(Vec::new())
    }

    fn line(text: impl Into<String>) -> Self {
        Reply::Lines(vec![text.into()])
    }
}

#[derive(Debug)]
pub enum Dispatched {
    Done,
    Spawned(JoinHandle<()>),
    Quit,
}

/// Run `command` from the input loop: interpretations on their own task,
/// every other command to completion before the next line is read.
pub async fn dispatch(state: &Arc<AppState>, command: Command) -> Dispatched {
    if command.is_interpretation() {
        let state = Arc::clone(state);
        return Dispatched::Spawned(tokio::spawn(async move {
            print_outcome(execute(&state, command).await);
        }));
    }
    if print_outcome(execute(state, command).await) {
        Dispatched::Quit
    } else {
        Dispatched::Done
    }
}

/// Print a command outcome; `true` when it asks to quit.
fn print_outcome(outcome: Result<Reply, String>) -> bool {
    match outcome {
        Ok(Reply::Lines(lines)) => {
            for line in lines {
                println!("{line}");
            }
            false
        }
        Ok(Reply::Quit) => true,
        Err(e) => {
            eprintln!("{e}");
            false
        }
    }
}

/// Run one command. Results that already reached the UI as events are not
/// repeated in the reply.
pub async fn execute(state: &Arc<AppState>, command: Command) -> Result<Reply, String> {
    debug!(?command, "executing command");
    match command {
        Command::Capture => {
            let started = Instant::now();
            let outcome = state.orchestrator.capture_and_interpret().await;
            state
                .perf_metrics
                .lock()
                .record_sign_lane(started.elapsed().as_secs_f64() * 1000.0);
            sign_lane_reply(outcome)
        }
        Command::Frame(path) => {
            let started = Instant::now();
            let image = load_rgb(&path).map_err(|e| e.to_string())?;
            let frame = Frame::encode_rgb(
                &image,
                FRAME_WIDTH,
                FRAME_HEIGHT,
                JPEG_QUALITY,
                FrameSource::Camera,
            )
            .map_err(|e| e.to_string())?;
            let outcome = state.orchestrator.handle_frame(frame).await;
            state
                .perf_metrics
                .lock()
                .record_sign_lane(started.elapsed().as_secs_f64() * 1000.0);
            sign_lane_reply(outcome)
        }
        Command::Say(transcript) => {
            let started = Instant::now();
            let outcome = state.orchestrator.handle_transcript(&transcript).await;
            state
                .perf_metrics
                .lock()
                .record_voice_lane(started.elapsed().as_secs_f64() * 1000.0);
            voice_lane_reply(outcome)
        }
        Command::Listen => {
            let started = Instant::now();
            let outcome = state.orchestrator.listen_and_respond().await;
            state
                .perf_metrics
                .lock()
                .record_voice_lane(started.elapsed().as_secs_f64() * 1000.0);
            voice_lane_reply(outcome)
        }
        Command::Sign(query) => {
            let system = state.orchestrator.settings().sign_system;
            let hits = state.lexicon.search(system, &query);
            let Some(first) = hits.first() else {
                return Err(format!("aucun signe {system} pour « {query} »"));
            };
            state.orchestrator.show_sign(first);
            Ok(Reply::Lines(
                hits.iter()
                    .map(|entry| format!("{} · {} · {}", entry.name, entry.category, entry.instruction))
                    .collect(),
            ))
        }
        Command::Learn(filter) => learn(state, filter.as_deref()),
        Command::Hold => {
            let orchestrator = Arc::clone(&state.orchestrator);
            state.hold.lock().press(move || {
                let system = orchestrator.settings().sign_system;
                info!(%system, "hold completed, opening learning hub");
                orchestrator.notify(Notification::info(format!(
                    "Accès au référentiel {system} activé"
                )));
            });
            Ok(Reply::none())
        }
        Command::Release => {
            if state.hold.lock().release() {
                Ok(Reply::line("maintien annulé"))
            } else {
                Ok(Reply::none())
            }
        }
        Command::Mute(muted) => {
            state.orchestrator.set_muted(muted);
            state.update_settings(|s| s.muted = muted);
            Ok(Reply::line(if muted { "voix coupée" } else { "voix activée" }))
        }
        Command::Camera(enabled) => {
            let status = state.orchestrator.set_camera_enabled(enabled);
            state.update_settings(|s| s.camera_enabled = enabled);
            Ok(Reply::line(format!("caméra : {status:?}")))
        }
        Command::Lang(raw) => {
            let language =
                Language::parse(&raw).ok_or_else(|| format!("langue inconnue : {raw}"))?;
            state.orchestrator.set_language(language);
            state.update_settings(|s| s.language = language.code().into());
            Ok(Reply::line(format!("langue : {language}")))
        }
        Command::System(raw) => {
            let system =
                SignSystem::parse(&raw).ok_or_else(|| format!("système inconnu : {raw}"))?;
            state.orchestrator.set_sign_system(system);
            state.update_settings(|s| s.sign_system = system.code().into());
            Ok(Reply::line(format!("système : {system}")))
        }
        Command::History => {
            let messages = state.orchestrator.messages();
            if messages.is_empty() {
                return Ok(Reply::line("(conversation vide)"));
            }
            Ok(Reply::Lines(messages.iter().map(format_message).collect()))
        }
        Command::Clear => {
            state.orchestrator.clear_session();
            Ok(Reply::none())
        }
        Command::Status => {
            let snapshot = state.orchestrator.snapshot();
            let perf = state.perf_snapshot();
            let mut lines = Vec::new();
            for value in [serde_json::to_string_pretty(&snapshot), serde_json::to_string_pretty(&perf)] {
                lines.push(value.map_err(|e| e.to_string())?);
            }
            if let Some(store) = &state.store {
                lines.push(format!("stockage : {}", store.path().display()));
                match store.updated_at(HISTORY_KEY) {
                    Ok(Some(at)) => lines.push(format!("historique enregistré : {at}")),
                    Ok(None) => lines.push("historique enregistré : jamais".into()),
                    Err(e) => tracing::warn!(error = %e, "history timestamp unavailable"),
                }
            }
            Ok(Reply::Lines(lines))
        }
        Command::Help => Ok(Reply::line(HELP)),
        Command::Quit => Ok(Reply::Quit),
    }
}

fn sign_lane_reply(outcome: signbridge_core::Result<Option<Message>>) -> Result<Reply, String> {
    match outcome {
        Ok(Some(_)) => Ok(Reply::none()),
        Ok(None) => Ok(Reply::line("(aucun signe reconnu)")),
        Err(BridgeError::Busy) => Err("une interprétation est déjà en cours".into()),
        // Already notified.
        Err(_) => Ok(Reply::none()),
    }
}

fn voice_lane_reply(outcome: signbridge_core::Result<Option<Message>>) -> Result<Reply, String> {
    match outcome {
        Ok(Some(_)) => Ok(Reply::none()),
        Ok(None) => Ok(Reply::line("(rien entendu)")),
        Err(BridgeError::Busy) => Err("une interprétation est déjà en cours".into()),
        Err(_) => Ok(Reply::none()),
    }
}

fn learn(state: &AppState, filter: Option<&str>) -> Result<Reply, String> {
    let system = state.orchestrator.settings().sign_system;
    let filter = match filter {
        None => ModuleFilter::All,
        Some(raw) if raw.eq_ignore_ascii_case("syntax") || raw.eq_ignore_ascii_case("syntaxe") => {
            ModuleFilter::Syntax
        }
        Some(raw) => ModuleFilter::Category(
            ModuleCategory::parse(raw).ok_or_else(|| format!("catégorie inconnue : {raw}"))?,
        ),
    };

    if filter == ModuleFilter::Syntax {
        return Ok(Reply::Lines(
            state
                .lexicon
                .syntax_rules(system)
                .iter()
                .map(|rule| format!("• {rule}"))
                .collect(),
        ));
    }
    let modules = state.lexicon.learning_modules(system, filter);
    if modules.is_empty() {
        return Ok(Reply::line("(aucun module)"));
    }
    Ok(Reply::Lines(
        modules
            .iter()
            .map(|m| {
                let link = match m.presentation() {
                    Presentation::Video => format!("vidéo {}", m.id),
                    Presentation::ExternalLink => "lien externe".to_string(),
                };
                format!("{:?} · {} · {} · {link}", m.status, m.title, m.source)
            })
            .collect(),
    ))
}

fn format_message(message: &Message) -> String {
    let who = match message.sender {
        Sender::User => "Moi",
        Sender::Interlocutor => "Interlocuteur",
    };
    let time = message.timestamp.format("%H:%M");
    match message.intent {
        Some(intent) => format!(
            "[{time}] {who} : {} ({intent}{})",
            message.text,
            tone_marker(intent.tone())
        ),
        None => format!("[{time}] {who} : {}", message.text),
    }
}

/// Badge suffix for an intent's tone.
fn tone_marker(tone: IntentTone) -> &'static str {
    match tone {
        IntentTone::Alert => "!",
        IntentTone::Attention => "*",
        IntentTone::Positive => "+",
        IntentTone::Understanding => "~",
        IntentTone::Neutral => "",
    }
}

/// Terminal line for a UI event, `None` for events not worth printing.
pub fn render_event(event: &UiEvent) -> Option<String> {
    match event {
        UiEvent::MessageCommitted(message) => Some(format_message(message)),
        UiEvent::ActiveGloss(active) if !active.gloss.is_empty() => {
            Some(format!("  gloses : {}", active.gloss.join(" ")))
        }
        UiEvent::AvatarResponse(response) => Some(format!(
            "  avatar : {} [{}]",
            response.text, response.sign_instruction
        )),
        UiEvent::Notification(notification) => {
            let tag = match notification.kind {
                NotificationKind::Error => "erreur",
                NotificationKind::Warning => "attention",
                NotificationKind::Success => "ok",
                NotificationKind::Info => "info",
            };
            Some(format!("({tag}) {}", notification.message))
        }
        UiEvent::SessionCleared => Some("(session effacée)".into()),
        UiEvent::ActiveGloss(_) | UiEvent::LaneChanged(_) | UiEvent::ProcessingChanged(_) => None,
    }
}
