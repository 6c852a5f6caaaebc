//! Still-frame capture.
//!
//! `CaptureAdapter` owns the camera stream. Acquisition walks a descending
//! constraint list and stops at the first success, or immediately when the
//! user denies permission. When nothing can be opened it classifies the
//! failure and switches to simulated mode: every later `capture()` returns a
//! synthetic frame, so the pipeline always receives a well-formed JPEG.
//!
//! Hosts plug a real device in through [`CameraBackend`]. `NoCamera` is the
//! in-crate backend for hosts without video hardware.

pub mod synthetic;

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::RgbImage;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{BridgeError, Result};

pub const FRAME_WIDTH: u32 = 640;
pub const FRAME_HEIGHT: u32 = 480;
pub const JPEG_QUALITY: u8 = 80;

/// Where a frame came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FrameSource {
    Camera,
    Synthetic,
}

/// An encoded JPEG still.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub source: FrameSource,
}

impl Frame {
    pub fn new(jpeg: Vec<u8>, width: u32, height: u32, source: FrameSource) -> Self {
        Self {
            jpeg,
            width,
            height,
            source,
        }
    }

    /// Scale `image` to `width`×`height` and JPEG-encode it.
    pub fn encode_rgb(
        image: &RgbImage,
        width: u32,
        height: u32,
        quality: u8,
        source: FrameSource,
    ) -> Result<Self> {
        let scaled;
        let image = if image.dimensions() == (width, height) {
            image
        } else {
            scaled = imageops::resize(image, width, height, FilterType::Triangle);
            &scaled
        };

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, quality)
            .encode_image(image)
            .map_err(|e| BridgeError::FrameEncoding(e.to_string()))?;
        Ok(Self::new(jpeg, width, height, source))
    }

    pub fn mime_type(&self) -> &'static str {
        "image/jpeg"
    }

    pub fn bytes(&self) -> &[u8] {
        &self.jpeg
    }

    pub fn to_base64(&self) -> String {
        BASE64_STANDARD.encode(&self.jpeg)
    }
}

/// Preferred camera orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    User,
    Environment,
}

/// One acquisition attempt. `None` fields leave the choice to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CameraConstraints {
    pub facing: Option<FacingMode>,
    pub ideal_width: Option<u32>,
    pub ideal_height: Option<u32>,
}

impl CameraConstraints {
    /// Ideal 1280×720 front camera, then any front camera, then the default.
    pub fn descending() -> Vec<Self> {
        vec![
            Self {
                facing: Some(FacingMode::User),
                ideal_width: Some(1280),
                ideal_height: Some(720),
            },
            Self {
                facing: Some(FacingMode::User),
                ..Self::default()
            },
            Self::default(),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub constraints: Vec<CameraConstraints>,
    pub frame_width: u32,
    pub frame_height: u32,
    pub jpeg_quality: u8,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            constraints: CameraConstraints::descending(),
            frame_width: FRAME_WIDTH,
            frame_height: FRAME_HEIGHT,
            jpeg_quality: JPEG_QUALITY,
        }
    }
}

/// Camera lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CameraStatus {
    Initializing,
    Active,
    Denied,
    NotFound,
    Off,
}

/// Host camera access.
///
/// `acquire` reports an explicit user refusal as
/// [`BridgeError::CameraPermissionDenied`] and missing hardware as
/// [`BridgeError::CameraNotFound`]; anything else is treated as a weaker
/// failure worth retrying with the next constraint.
pub trait CameraBackend: Send + Sync + 'static {
    fn acquire(&self, constraints: &CameraConstraints) -> Result<Box<dyn CameraStream>>;

    /// Whether any video input is present at all.
    fn has_video_device(&self) -> Result<bool>;
}

/// An open camera. Released explicitly on camera-off and on drop of the adapter.
pub trait CameraStream: Send {
    fn grab(&mut self) -> Result<RgbImage>;

    fn release(&mut self);
}

/// Backend for hosts without video hardware.
#[derive(Debug, Default)]
pub struct NoCamera;

impl CameraBackend for NoCamera {
    fn acquire(&self, _constraints: &CameraConstraints) -> Result<Box<dyn CameraStream>> {
        Err(BridgeError::CameraNotFound)
    }

    fn has_video_device(&self) -> Result<bool> {
        Ok(false)
    }
}

struct CaptureInner {
    status: CameraStatus,
    stream: Option<Box<dyn CameraStream>>,
    simulated: bool,
    failure: Option<String>,
}

pub struct CaptureAdapter {
    backend: Arc<dyn CameraBackend>,
    config: CaptureConfig,
    inner: Mutex<CaptureInner>,
}

impl CaptureAdapter {
    /// The adapter starts in `Initializing`; call [`start`](Self::start).
    pub fn new(backend: Arc<dyn CameraBackend>, config: CaptureConfig) -> Self {
        Self {
            backend,
            config,
            inner: Mutex::new(CaptureInner {
                status: CameraStatus::Initializing,
                stream: None,
                simulated: false,
                failure: None,
            }),
        }
    }

    pub fn status(&self) -> CameraStatus {
        self.inner.lock().status
    }

    pub fn is_simulated(&self) -> bool {
        self.inner.lock().simulated
    }

    /// User-facing explanation of the last acquisition failure.
    pub fn failure_message(&self) -> Option<String> {
        self.inner.lock().failure.clone()
    }

    /// Acquire the camera, falling back to simulated mode.
    pub fn start(&self) -> CameraStatus {
        let mut inner = self.inner.lock();
        if let Some(mut old) = inner.stream.take() {
            old.release();
        }
        inner.status = CameraStatus::Initializing;
        inner.failure = None;

        let mut last_error = None;
        for (attempt, constraints) in self.config.constraints.iter().enumerate() {
            match self.backend.acquire(constraints) {
                Ok(stream) => {
                    info!(attempt, ?constraints, "camera acquired");
                    inner.stream = Some(stream);
                    inner.status = CameraStatus::Active;
                    inner.simulated = false;
                    return inner.status;
                }
                Err(BridgeError::CameraPermissionDenied) => {
                    last_error = Some(BridgeError::CameraPermissionDenied);
                    break;
                }
                Err(e) => {
                    debug!(attempt, error = %e, "camera acquisition attempt failed");
                    last_error = Some(e);
                }
            }
        }

        let (status, message) = self.classify_failure(last_error.as_ref());
        match &last_error {
            Some(e) => warn!(?status, error = %e, "camera unavailable, simulated frames enabled"),
            None => warn!(?status, "no camera constraints to try, simulated frames enabled"),
        }
        inner.status = status;
        inner.simulated = true;
        inner.failure = Some(message);
        status
    }

    /// Tell "no hardware" apart from "permission denied" once every attempt failed.
    fn classify_failure(&self, last_error: Option<&BridgeError>) -> (CameraStatus, String) {
        if matches!(last_error, Some(BridgeError::CameraPermissionDenied)) {
            return (
                CameraStatus::Denied,
                "Accès à la caméra refusé par l'utilisateur ou le système.".to_string(),
            );
        }
        let hardware_present = self.backend.has_video_device().unwrap_or_else(|e| {
            debug!(error = %e, "video device enumeration failed");
            true
        });
        let message = match last_error {
            Some(BridgeError::Camera(detail)) if hardware_present => {
                format!("Échec d'activation : {detail}.")
            }
            _ => "Aucun capteur vidéo physique détecté sur cet appareil.".to_string(),
        };
        (CameraStatus::NotFound, message)
    }

    /// Toggle the camera. Turning it off releases the device.
    pub fn set_enabled(&self, enabled: bool) -> CameraStatus {
        if enabled {
            return self.start();
        }
        let mut inner = self.inner.lock();
        if let Some(mut stream) = inner.stream.take() {
            stream.release();
            info!("camera released");
        }
        inner.status = CameraStatus::Off;
        inner.simulated = false;
        inner.failure = None;
        inner.status
    }

    /// Produce one frame: from the device when active, synthesized in
    /// simulated mode.
    pub fn capture(&self) -> Result<Frame> {
        let mut inner = self.inner.lock();
        if inner.simulated {
            let status = inner.status;
            drop(inner);
            return self.synthetic_frame(status);
        }
        match inner.status {
            CameraStatus::Off => Err(BridgeError::CaptureUnavailable("camera is off".into())),
            CameraStatus::Active => {
                let stream = inner
                    .stream
                    .as_mut()
                    .ok_or_else(|| BridgeError::CaptureUnavailable("no open stream".into()))?;
                let image = stream.grab()?;
                drop(inner);
                Frame::encode_rgb(
                    &image,
                    self.config.frame_width,
                    self.config.frame_height,
                    self.config.jpeg_quality,
                    FrameSource::Camera,
                )
            }
            status => Err(BridgeError::CaptureUnavailable(format!(
                "camera not ready ({status:?})"
            ))),
        }
    }

    fn synthetic_frame(&self, status: CameraStatus) -> Result<Frame> {
        let detail = match status {
            CameraStatus::Denied => "ACCES CAMERA REFUSE - MODE DEMO",
            _ => "MATERIEL NON DETECTE - MODE DEMO",
        };
        let image = synthetic::render(
            self.config.frame_width,
            self.config.frame_height,
            "SIMULATION IA",
            detail,
            synthetic::scan_line_now(self.config.frame_height),
        );
        Frame::encode_rgb(
            &image,
            self.config.frame_width,
            self.config.frame_height,
            self.config.jpeg_quality,
            FrameSource::Synthetic,
        )
    }
}

impl Drop for CaptureAdapter {
    fn drop(&mut self) {
        if let Some(mut stream) = self.inner.get_mut().stream.take() {
            stream.release();
        }
    }
}
