//! SignBridge terminal host.
//!
//! Reads line commands on stdin, prints UI events on stdout and logs to
//! stderr (`RUST_LOG`, default `info`).

mod commands;
mod devices;
mod settings;
mod state;
mod storage;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use parking_lot::Mutex;
use signbridge_core::capture::CaptureConfig;
use signbridge_core::speech::SilentSynthesizer;
use signbridge_core::{
    CaptureAdapter, ClientConfig, ConversationState, GeminiBackend, GeminiConfig, HoldTrigger,
    InterpretationBackend, InterpretationClient, KeyValueStore, LexiconStore, MemoryStore,
    OfflineBackend, Orchestrator, SessionSettings, SpeechInput, SpeechOutput, SpeechSynthesizer,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use commands::{dispatch, parse_command, render_event, Dispatched};
use devices::{CommandSynthesizer, DirectoryCamera};
use settings::{default_settings_path, load_settings, AppSettings};
use state::{AppState, PerfMetrics};
use storage::LocalStore;

fn build_backend(settings: &AppSettings) -> anyhow::Result<Arc<dyn InterpretationBackend>> {
    match settings.gemini_api_key.as_deref() {
        Some(key) if !settings.offline_mode => {
            let mut config = GeminiConfig::new(key).with_model(settings.gemini_model.clone());
            config.timeout = settings.request_timeout();
            let backend = GeminiBackend::new(config).context("failed to build Gemini backend")?;
            Ok(Arc::new(backend))
        }
        _ => {
            if !settings.offline_mode {
                warn!("no Gemini API key configured, using the offline responder");
            }
            Ok(Arc::new(OfflineBackend::new()))
        }
    }
}

fn build_synthesizer(settings: &AppSettings) -> Arc<dyn SpeechSynthesizer> {
    match settings
        .tts_command
        .as_deref()
        .and_then(CommandSynthesizer::parse)
    {
        Some(synth) => Arc::new(synth),
        None => {
            info!("no TTS command configured, speech output is silent");
            Arc::new(SilentSynthesizer)
        }
    }
}

fn open_store() -> (Option<Arc<LocalStore>>, Arc<dyn KeyValueStore>) {
    match LocalStore::new(LocalStore::default_db_path()) {
        Ok(store) => {
            let store = Arc::new(store);
            info!(path = %store.path().display(), "local encrypted storage ready");
            let kv: Arc<dyn KeyValueStore> = Arc::clone(&store) as Arc<dyn KeyValueStore>;
            (Some(store), kv)
        }
        Err(e) => {
            warn!(error = %e, "local storage unavailable, history will not persist");
            (None, Arc::new(MemoryStore::new()))
        }
    }
}

fn build_state(app_settings: AppSettings, settings_path: PathBuf) -> anyhow::Result<AppState> {
    let backend = build_backend(&app_settings)?;
    let client = InterpretationClient::new(
        backend,
        ClientConfig {
            timeout: app_settings.request_timeout(),
            ..ClientConfig::default()
        },
    );

    let (store, kv) = open_store();
    let conversation = ConversationState::rehydrate(kv);
    info!(messages = conversation.len(), "conversation rehydrated");

    let camera = DirectoryCamera::new(app_settings.camera_dir.as_ref().map(PathBuf::from));
    let capture = Arc::new(CaptureAdapter::new(
        Arc::new(camera),
        CaptureConfig::default(),
    ));
    let speech = Arc::new(SpeechOutput::new(build_synthesizer(&app_settings)));

    let orchestrator = Arc::new(Orchestrator::new(
        client,
        conversation,
        Arc::clone(&capture),
        speech,
        SpeechInput::unavailable(),
        SessionSettings {
            language: app_settings.language(),
            sign_system: app_settings.sign_system(),
        },
    ));
    orchestrator.set_muted(app_settings.muted);

    Ok(AppState {
        orchestrator,
        settings: Mutex::new(app_settings),
        settings_path,
        store,
        lexicon: LexiconStore::builtin(),
        hold: Mutex::new(HoldTrigger::default()),
        perf_metrics: Mutex::new(PerfMetrics::default()),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("SignBridge starting");

    let settings_path = default_settings_path();
    let mut app_settings = load_settings(&settings_path);
    app_settings.apply_env_overrides();
    info!(
        settings_path = ?settings_path,
        language = %app_settings.language,
        sign_system = %app_settings.sign_system,
        offline = app_settings.use_offline_backend(),
        model = %app_settings.gemini_model,
        "settings loaded"
    );

    let camera_enabled = app_settings.camera_enabled;
    let state = Arc::new(build_state(app_settings, settings_path)?);

    // ── Forward orchestrator events → stdout ──────────────────────────────
    let mut events = state.orchestrator.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(line) = render_event(&event) {
                        println!("{line}");
                    }
                }
                Err(RecvError::Lagged(n)) => warn!("event receiver lagged by {n} events"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Subscribed first so a camera fallback warning reaches the terminal.
    let status = state.orchestrator.set_camera_enabled(camera_enabled);
    info!(?status, backend = %state.orchestrator.snapshot().backend, "pipeline ready");
    println!("SignBridge prêt. Tapez help pour la liste des commandes.");

    // ── Command loop ──────────────────────────────────────────────────────
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };
        if let Dispatched::Quit = dispatch(&state, command).await {
            break;
        }
    }

    let diag = state.orchestrator.diagnostics_snapshot();
    info!(
        frames_interpreted = diag.frames_interpreted,
        transcripts_interpreted = diag.transcripts_interpreted,
        fallbacks = diag.fallbacks,
        messages_committed = diag.messages_committed,
        triggers_refused = diag.triggers_refused,
        no_op_results = diag.no_op_results,
        "diagnostics snapshot on shutdown"
    );
    printer.abort();
    Ok(())
}
