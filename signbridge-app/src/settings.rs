//! Persistent host settings (JSON file in the app data directory).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use signbridge_core::interpret::gemini::DEFAULT_GEMINI_MODEL;
use signbridge_core::{Language, SignSystem};

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub language: String,
    pub sign_system: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub offline_mode: bool,
    pub muted: bool,
    pub camera_enabled: bool,
    /// Directory the image-directory camera reads its latest still from.
    pub camera_dir: Option<String>,
    /// Program invoked with the text to speak as its last argument.
    pub tts_command: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            language: Language::FrCa.code().into(),
            sign_system: SignSystem::Lsq.code().into(),
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.into(),
            offline_mode: false,
            muted: false,
            camera_enabled: true,
            camera_dir: None,
            tts_command: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        self.language = normalize_language(&self.language);
        self.sign_system = normalize_sign_system(&self.sign_system);
        self.gemini_api_key = trimmed(self.gemini_api_key.as_deref());
        self.gemini_model = normalize_gemini_model(&self.gemini_model);
        self.camera_dir = trimmed(self.camera_dir.as_deref());
        self.tts_command = trimmed(self.tts_command.as_deref());
        self.request_timeout_secs = self.request_timeout_secs.clamp(5, 120);
    }

    /// Environment variables win over the file.
    pub fn apply_env_overrides(&mut self) {
        let key = ["SIGNBRIDGE_GEMINI_API_KEY", "GEMINI_API_KEY", "API_KEY"]
            .iter()
            .find_map(|name| trimmed(std::env::var(name).ok().as_deref()));
        if key.is_some() {
            self.gemini_api_key = key;
        }
        if let Some(dir) = trimmed(std::env::var("SIGNBRIDGE_CAMERA_DIR").ok().as_deref()) {
            self.camera_dir = Some(dir);
        }
        if let Ok(raw) = std::env::var("SIGNBRIDGE_OFFLINE") {
            self.offline_mode = parse_flag(&raw);
        }
    }

    pub fn language(&self) -> Language {
        Language::parse(&self.language).unwrap_or(Language::FrCa)
    }

    pub fn sign_system(&self) -> SignSystem {
        SignSystem::parse(&self.sign_system).unwrap_or(SignSystem::Lsq)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The offline responder is used when asked for or when no key is set.
    pub fn use_offline_backend(&self) -> bool {
        self.offline_mode || self.gemini_api_key.is_none()
    }
}

pub fn normalize_language(raw: &str) -> String {
    Language::parse(raw)
        .unwrap_or(Language::FrCa)
        .code()
        .to_string()
}

pub fn normalize_sign_system(raw: &str) -> String {
    SignSystem::parse(raw)
        .unwrap_or(SignSystem::Lsq)
        .code()
        .to_string()
}

pub fn normalize_gemini_model(raw: &str) -> String {
    let model = raw.trim().trim_start_matches("models/");
    if model.is_empty() {
        DEFAULT_GEMINI_MODEL.into()
    } else {
        model.into()
    }
}

fn trimmed(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Lattice Labs")
            .join("SignBridge")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("signbridge")
            .join("settings.json")
    }
}

pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| match serde_json::from_str::<AppSettings>(&raw) {
            Ok(settings) => Some(settings),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring malformed settings file");
                None
            }
        })
        .unwrap_or_default();
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
