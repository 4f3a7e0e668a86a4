//! Video Source Provider: supplied file passthrough or live recording.

use std::{
    convert::Infallible,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, atomic::AtomicBool},
};

use thiserror::Error;
use tracing::{info, warn};

use crate::{
    probe::probe_video,
    recorder::{FrameSink, FrameSource, PreviewInput, PreviewSurface, record},
    types::{CaptureError, FrameGeometry, VideoArtifact, VideoInfo},
};

/// File name used for live recordings inside the input folder.
pub const RECORDING_FILE_NAME: &str = "recorded_video.avi";
/// Codec written by the recorder.
pub const RECORDING_CODEC: &str = "XVID";

const PREVIEW_TITLE: &str = "Recording";

/// How the pipeline obtains its input video.
#[derive(Clone, Debug, PartialEq)]
pub enum AcquireMode {
    /// Use a file that already exists on disk.
    UseSupplied(PathBuf),
    /// Record from a capture device into `destination`.
    RecordLive {
        device: String,
        destination: PathBuf,
        fps: f64,
    },
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("input video {} does not exist or is not a file", path.display())]
    MissingInput { path: PathBuf },
    #[error("input video {} is empty", path.display())]
    EmptyInput { path: PathBuf },
    #[error("capture device {device:?} is unavailable: {reason}")]
    DeviceUnavailable { device: String, reason: String },
    #[error("recording failed")]
    Capture(#[source] CaptureError),
}

impl From<CaptureError> for SourceError {
    fn from(err: CaptureError) -> Self {
        match err {
            CaptureError::DeviceUnavailable { device, reason } => {
                SourceError::DeviceUnavailable { device, reason }
            }
            other => SourceError::Capture(other),
        }
    }
}

/// Supplies the video artifact a pipeline run works on.
pub trait VideoSource {
    fn acquire(&mut self, mode: &AcquireMode) -> Result<VideoArtifact, SourceError>;
}

/// Opens the three handles a live recording needs.
pub trait CaptureBackend {
    type Frame;
    type Source: FrameSource<Frame = Self::Frame>;
    type Sink: FrameSink<Self::Frame>;
    type Preview: PreviewSurface<Self::Frame>;

    fn open_device(&mut self, device: &str)
    -> Result<(Self::Source, FrameGeometry), CaptureError>;

    fn open_writer(
        &mut self,
        path: &Path,
        fps: f64,
        geometry: FrameGeometry,
    ) -> Result<Self::Sink, CaptureError>;

    fn open_preview(&mut self, title: &str) -> Result<Self::Preview, CaptureError>;
}

/// Backend for builds without camera support; every device is unavailable.
#[derive(Debug, Default)]
pub struct NoCaptureBackend;

/// Handle type that cannot be constructed.
pub enum Unsupported {}

impl FrameSource for Unsupported {
    type Frame = Infallible;

    fn read(&mut self) -> Result<Option<Infallible>, CaptureError> {
        match *self {}
    }
}

impl FrameSink<Infallible> for Unsupported {
    fn write(&mut self, _frame: &Infallible) -> Result<(), CaptureError> {
        match *self {}
    }
}

impl PreviewSurface<Infallible> for Unsupported {
    fn present(&mut self, _frame: &Infallible) -> Result<PreviewInput, CaptureError> {
        match *self {}
    }
}

impl CaptureBackend for NoCaptureBackend {
    type Frame = Infallible;
    type Source = Unsupported;
    type Sink = Unsupported;
    type Preview = Unsupported;

    fn open_device(&mut self, device: &str) -> Result<(Unsupported, FrameGeometry), CaptureError> {
        Err(CaptureError::DeviceUnavailable {
            device: device.to_string(),
            reason: "built without camera support (enable the `opencv` feature)".to_string(),
        })
    }

    fn open_writer(
        &mut self,
        path: &Path,
        _fps: f64,
        _geometry: FrameGeometry,
    ) -> Result<Unsupported, CaptureError> {
        Err(CaptureError::WriterUnavailable {
            path: path.to_path_buf(),
        })
    }

    fn open_preview(&mut self, _title: &str) -> Result<Unsupported, CaptureError> {
        Err(CaptureError::Other(anyhow::anyhow!(
            "preview is not available without camera support"
        )))
    }
}

/// Default [`VideoSource`]: validates supplied files or records through a
/// [`CaptureBackend`].
pub struct VideoSourceProvider<B> {
    backend: B,
    stop: Arc<AtomicBool>,
    probe: fn(&Path) -> Result<VideoInfo, CaptureError>,
}

impl<B: CaptureBackend> VideoSourceProvider<B> {
    /// `stop` is polled once per captured frame; raising it ends a recording.
    pub fn new(backend: B, stop: Arc<AtomicBool>) -> Self {
        Self {
            backend,
            stop,
            probe: probe_video,
        }
    }

    /// Replace the metadata probe used for supplied files.
    pub fn with_probe(mut self, probe: fn(&Path) -> Result<VideoInfo, CaptureError>) -> Self {
        self.probe = probe;
        self
    }

    fn use_supplied(&self, path: &Path) -> Result<VideoArtifact, SourceError> {
        let size = ensure_non_empty(path)?;
        let info = match (self.probe)(path) {
            Ok(info) => Some(info),
            Err(err) => {
                warn!("could not probe {}: {err}", path.display());
                None
            }
        };
        info!(path = %path.display(), bytes = size, "using supplied video");
        Ok(VideoArtifact::new(path, info))
    }

    fn record_live(
        &mut self,
        device: &str,
        destination: &Path,
        fps: f64,
    ) -> Result<VideoArtifact, SourceError> {
        let (source, geometry) = self.backend.open_device(device)?;

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(CaptureError::from)?;
        }
        let sink = self.backend.open_writer(destination, fps, geometry)?;
        let preview = self.backend.open_preview(PREVIEW_TITLE)?;

        info!("Recording from {device}... press 'q' in the preview window to stop");
        let summary = record(source, sink, preview, self.stop.clone())?;

        if summary.frames == 0 {
            return Err(SourceError::EmptyInput {
                path: destination.to_path_buf(),
            });
        }
        ensure_non_empty(destination)?;

        info!(
            frames = summary.frames,
            ended_by = ?summary.ended_by,
            "Video saved at: {}",
            destination.display()
        );

        let info = VideoInfo {
            width: geometry.width,
            height: geometry.height,
            fps,
            codec: RECORDING_CODEC.to_string(),
        };
        Ok(VideoArtifact::new(destination, Some(info)).with_frames(summary.frames))
    }
}

impl<B: CaptureBackend> VideoSource for VideoSourceProvider<B> {
    fn acquire(&mut self, mode: &AcquireMode) -> Result<VideoArtifact, SourceError> {
        match mode {
            AcquireMode::UseSupplied(path) => self.use_supplied(path),
            AcquireMode::RecordLive {
                device,
                destination,
                fps,
            } => self.record_live(device, destination, *fps),
        }
    }
}

fn ensure_non_empty(path: &Path) -> Result<u64, SourceError> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => {
            return Err(SourceError::MissingInput {
                path: path.to_path_buf(),
            });
        }
    };
    if metadata.len() == 0 {
        return Err(SourceError::EmptyInput {
            path: path.to_path_buf(),
        });
    }
    Ok(metadata.len())
}
