use std::{io, path::PathBuf};

use thiserror::Error;
use video_ingest::SourceError;

use crate::{orchestrator::PipelineState, stage::StageKind};

/// Fatal pipeline failures. None of these are retried.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no input video: provide --video-path <file> or use --record to capture one")]
    MissingInput,
    #[error("capture device {device:?} is unavailable: {reason}")]
    DeviceUnavailable { device: String, reason: String },
    #[error("failed to acquire input video")]
    Source(#[source] SourceError),
    #[error("failed to prepare folder {}", path.display())]
    Paths {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{stage} stage failed")]
    Stage {
        stage: StageKind,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to write run report to {}", path.display())]
    Report {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("pipeline already ran (state: {state})")]
    AlreadyRan { state: PipelineState },
}

impl From<SourceError> for PipelineError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::DeviceUnavailable { device, reason } => {
                PipelineError::DeviceUnavailable { device, reason }
            }
            other => PipelineError::Source(other),
        }
    }
}

impl PipelineError {
    /// Process exit status for this failure. Always non-zero.
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::MissingInput
            | PipelineError::Source(SourceError::MissingInput { .. })
            | PipelineError::Source(SourceError::EmptyInput { .. }) => 2,
            PipelineError::DeviceUnavailable { .. } => 3,
            PipelineError::Stage { .. } => 4,
            _ => 1,
        }
    }

    /// The stage that failed, if this is a stage failure.
    pub fn failed_stage(&self) -> Option<StageKind> {
        match self {
            PipelineError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use anyhow::anyhow;

    use super::*;

    #[test]
    fn device_errors_surface_as_device_unavailable() {
        let err = PipelineError::from(SourceError::DeviceUnavailable {
            device: "0".into(),
            reason: "busy".into(),
        });
        assert!(matches!(err, PipelineError::DeviceUnavailable { .. }));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn exit_codes_are_non_zero() {
        let errors = [
            PipelineError::MissingInput,
            PipelineError::from(SourceError::MissingInput {
                path: PathBuf::from("/nope.mp4"),
            }),
            PipelineError::Stage {
                stage: StageKind::Pose3d,
                source: anyhow!("cuda oom"),
            },
            PipelineError::Report {
                path: PathBuf::from("/out"),
                source: io::Error::other("disk full"),
            },
        ];
        let codes: Vec<i32> = errors.iter().map(PipelineError::exit_code).collect();
        assert_eq!(codes, vec![2, 2, 4, 1]);
    }

    #[test]
    fn stage_failures_name_the_stage() {
        let err = PipelineError::Stage {
            stage: StageKind::Pose2d,
            source: anyhow!("model not found"),
        };
        assert_eq!(err.failed_stage(), Some(StageKind::Pose2d));
        assert_eq!(err.to_string(), "2D keypoint extraction stage failed");
    }
}
