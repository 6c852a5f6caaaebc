use thiserror::Error;

/// All errors produced by signbridge-core.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("capture is not available: {0}")]
    CaptureUnavailable(String),

    #[error("camera permission denied")]
    CameraPermissionDenied,

    #[error("no camera hardware found")]
    CameraNotFound,

    #[error("camera error: {0}")]
    Camera(String),

    #[error("frame encoding error: {0}")]
    FrameEncoding(String),

    #[error("speech recognition is not available on this platform")]
    SpeechRecognitionUnavailable,

    #[error("speech recognition error: {0}")]
    SpeechRecognition(String),

    #[error("speech synthesis error: {0}")]
    SpeechSynthesis(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("interpretation backend request failed: {0}")]
    BackendTransport(String),

    #[error("interpretation backend returned HTTP {status}: {message}")]
    BackendStatus { status: u16, message: String },

    #[error("interpretation response rejected: {0}")]
    InvalidResponse(String),

    #[error("an interpretation is already in flight")]
    Busy,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
