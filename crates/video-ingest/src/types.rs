use std::path::{Path, PathBuf};

use anyhow::Error;
use serde::Serialize;
use thiserror::Error;

/// Stream properties of a video file.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub codec: String,
}

/// Pixel dimensions reported by a capture device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
}

/// A readable, non-empty video file shared read-only by every stage.
///
/// Fields are private so an artifact cannot be re-pointed once a provider
/// has handed it out.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VideoArtifact {
    path: PathBuf,
    info: Option<VideoInfo>,
    frames: Option<u64>,
}

impl VideoArtifact {
    pub fn new(path: impl Into<PathBuf>, info: Option<VideoInfo>) -> Self {
        Self {
            path: path.into(),
            info,
            frames: None,
        }
    }

    /// Attach the number of frames known to be in the file.
    pub fn with_frames(mut self, frames: u64) -> Self {
        self.frames = Some(frames);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> Option<&VideoInfo> {
        self.info.as_ref()
    }

    pub fn frames(&self) -> Option<u64> {
        self.frames
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture device {device:?} is unavailable: {reason}")]
    DeviceUnavailable { device: String, reason: String },
    #[error("failed to open video writer at {}", path.display())]
    WriterUnavailable { path: PathBuf },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] Error),
}
