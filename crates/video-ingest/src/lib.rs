//! Video acquisition for the motion-capture pipeline.
//!
//! A pipeline run starts from a [`VideoArtifact`]: either a file the operator
//! already has on disk, or a new recording captured from a local camera. The
//! crate is split into:
//! - `types`: the artifact, stream metadata and capture errors.
//! - `recorder`: the blocking read → write → preview capture loop.
//! - `camera`: OpenCV device, writer and preview window (`opencv` feature).
//! - `probe`: `ffprobe`-backed metadata lookup for supplied files.
//! - `source`: the provider that turns an [`AcquireMode`] into an artifact.

pub mod camera;
pub mod probe;
pub mod recorder;
pub mod source;
pub mod types;

pub use camera::parse_device_index;
#[cfg(feature = "opencv")]
pub use camera::OpenCvBackend;
pub use probe::probe_video;
pub use recorder::{
    FrameSink, FrameSource, PreviewInput, PreviewSurface, RecordingSummary, StopReason,
    StopSignal, record,
};
pub use source::{
    AcquireMode, CaptureBackend, NoCaptureBackend, RECORDING_CODEC, RECORDING_FILE_NAME,
    SourceError, VideoSource, VideoSourceProvider,
};
pub use types::{CaptureError, FrameGeometry, VideoArtifact, VideoInfo};
