//! Host capabilities for the terminal build: a camera that reads the newest
//! still from a directory, and speech through an external TTS program.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use image::RgbImage;
use parking_lot::Mutex;
use signbridge_core::capture::{CameraConstraints, CameraStream};
use signbridge_core::speech::output::{Utterance, UtteranceSink, Voice};
use signbridge_core::{BridgeError, CameraBackend, Result, SpeechSynthesizer};

const EXIT_POLL: Duration = Duration::from_millis(50);
const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Treats a directory as a video device: each grab decodes the most recently
/// modified image in it. Useful with a webcam tool that dumps stills.
#[derive(Debug, Clone)]
pub struct DirectoryCamera {
    dir: Option<PathBuf>,
}

impl DirectoryCamera {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }
}

impl CameraBackend for DirectoryCamera {
    fn acquire(&self, _constraints: &CameraConstraints) -> Result<Box<dyn CameraStream>> {
        let dir = self.dir.as_ref().ok_or(BridgeError::CameraNotFound)?;
        match std::fs::read_dir(dir) {
            Ok(_) => Ok(Box::new(DirectoryStream { dir: dir.clone() })),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                Err(BridgeError::CameraPermissionDenied)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(BridgeError::CameraNotFound),
            Err(e) => Err(BridgeError::Camera(e.to_string())),
        }
    }

    fn has_video_device(&self) -> Result<bool> {
        Ok(self.dir.as_ref().is_some_and(|d| d.is_dir()))
    }
}

struct DirectoryStream {
    dir: PathBuf,
}

impl CameraStream for DirectoryStream {
    fn grab(&mut self) -> Result<RgbImage> {
        let path = latest_image(&self.dir)?
            .ok_or_else(|| BridgeError::Camera(format!("no image in {}", self.dir.display())))?;
        load_rgb(&path)
    }

    fn release(&mut self) {
        tracing::debug!(dir = %self.dir.display(), "directory camera released");
    }
}

/// Decode any supported still into RGB.
pub fn load_rgb(path: &Path) -> Result<RgbImage> {
    image::open(path)
        .map(|img| img.to_rgb8())
        .map_err(|e| BridgeError::Camera(format!("{}: {e}", path.display())))
}

fn latest_image(dir: &Path) -> Result<Option<PathBuf>> {
    let mut best: Option<(SystemTime, PathBuf)> = None;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if !is_image {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        if best.as_ref().map_or(true, |(t, _)| modified > *t) {
            best = Some((modified, path));
        }
    }
    Ok(best.map(|(_, path)| path))
}

struct Running {
    utterance_id: u64,
    child: Child,
}

/// Speaks by running a program with the text as its last argument, e.g.
/// `espeak-ng -v {lang}`. `{lang}` in an argument becomes the utterance's
/// BCP-47 tag.
pub struct CommandSynthesizer {
    program: String,
    args: Vec<String>,
    running: Arc<Mutex<Option<Running>>>,
}

impl CommandSynthesizer {
    /// `None` when the command line is blank.
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
            running: Arc::new(Mutex::new(None)),
        })
    }

    fn kill_running(&self) {
        if let Some(mut running) = self.running.lock().take() {
            if let Err(e) = running.child.kill() {
                tracing::debug!(error = %e, "tts process already exited");
            }
            let _ = running.child.wait();
        }
    }
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        Vec::new()
    }

    fn speak(&self, utterance: &Utterance, sink: UtteranceSink) -> Result<()> {
        self.kill_running();
        let child = Command::new(&self.program)
            .args(self.args.iter().map(|a| a.replace("{lang}", &utterance.lang)))
            .arg(&utterance.text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| BridgeError::SpeechSynthesis(format!("{}: {e}", self.program)))?;
        *self.running.lock() = Some(Running {
            utterance_id: utterance.id,
            child,
        });
        sink.started();

        let running = Arc::clone(&self.running);
        let utterance_id = utterance.id;
        std::thread::spawn(move || {
            loop {
                std::thread::sleep(EXIT_POLL);
                let mut guard = running.lock();
                let Some(current) = guard.as_mut() else {
                    break;
                };
                if current.utterance_id != utterance_id {
                    break;
                }
                match current.child.try_wait() {
                    Ok(None) => continue,
                    Ok(Some(_)) | Err(_) => {
                        *guard = None;
                        break;
                    }
                }
            }
            sink.finished();
        });
        Ok(())
    }

    fn cancel(&self) {
        self.kill_running();
    }

    fn is_speaking(&self) -> bool {
        self.running
            .lock()
            .as_mut()
            .is_some_and(|r| matches!(r.child.try_wait(), Ok(None)))
    }
}
