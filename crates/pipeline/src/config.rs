//! Configuration parsing for the pipeline.
//!
//! This module owns translation of CLI arguments into a `PipelineConfig`
//! which every component receives explicitly; nothing re-reads flags or the
//! environment after startup.

use std::path::{self, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use video_ingest::AcquireMode;

use crate::{
    error::PipelineError, paths::PipelinePaths, stage::CommandLine, telemetry::TelemetryOptions,
};

/// Default frame rate for live recordings.
pub const DEFAULT_RECORD_FPS: f64 = 20.0;

/// Which video the run should use, as requested by the operator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputSelection {
    pub video_path: Option<PathBuf>,
    pub record: bool,
}

/// Live capture settings.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureSettings {
    /// Device index (`0`), `/dev/videoN` path or stream URI.
    pub device: String,
    pub fps: f64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            device: "0".to_string(),
            fps: DEFAULT_RECORD_FPS,
        }
    }
}

impl InputSelection {
    /// Decide how to acquire the video. `record` takes precedence over a
    /// supplied path, which is made absolute against the working directory.
    pub fn resolve(
        &self,
        paths: &PipelinePaths,
        capture: &CaptureSettings,
    ) -> Result<AcquireMode, PipelineError> {
        if self.record {
            return Ok(AcquireMode::RecordLive {
                device: capture.device.clone(),
                destination: paths.recording_destination(),
                fps: capture.fps,
            });
        }
        match &self.video_path {
            Some(video) => path::absolute(video)
                .map(AcquireMode::UseSupplied)
                .map_err(|source| PipelineError::Paths {
                    path: video.clone(),
                    source,
                }),
            None => Err(PipelineError::MissingInput),
        }
    }
}

/// External programs run for each stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageCommands {
    pub pose2d: CommandLine,
    pub pose3d: CommandLine,
    pub fit: CommandLine,
}

/// Canonical configuration shared by every component of a run.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub paths: PipelinePaths,
    pub input: InputSelection,
    pub capture: CaptureSettings,
    pub stages: StageCommands,
    pub telemetry: TelemetryOptions,
}

/// Convert monocular video into SMPL body-model motion.
#[derive(Debug, Parser)]
#[command(name = "mocap", version)]
pub struct PipelineCliArgs {
    /// Path to the input video file.
    #[arg(long = "video-path", value_name = "FILE")]
    pub video_path: Option<PathBuf>,
    /// Folder for the fitted SMPL parameters [default: <data-dir>/output_folder].
    #[arg(long = "output-path", value_name = "DIR")]
    pub output_path: Option<PathBuf>,
    /// Record a video from the webcam instead of reading --video-path.
    #[arg(long = "record", action = clap::ArgAction::SetTrue)]
    pub record: bool,
    /// Root of the input_data/, temp/ and output_folder/ folders.
    #[arg(long = "data-dir", value_name = "DIR", default_value = "data")]
    pub data_dir: PathBuf,
    /// Capture device index or URI used with --record.
    #[arg(long = "camera", value_name = "DEVICE", default_value = "0")]
    pub camera: String,
    /// Frame rate written to recorded videos.
    #[arg(long = "record-fps", value_name = "FPS", default_value_t = DEFAULT_RECORD_FPS)]
    pub record_fps: f64,
    /// 2D keypoint extraction command; receives <video> <temp-folder>.
    #[arg(
        long = "pose2d-cmd",
        env = "MOCAP_POSE2D_CMD",
        value_name = "CMD",
        default_value = "mocap-pose2d"
    )]
    pub pose2d_cmd: String,
    /// 3D pose lifting command; receives <video>.
    #[arg(
        long = "pose3d-cmd",
        env = "MOCAP_POSE3D_CMD",
        value_name = "CMD",
        default_value = "mocap-pose3d"
    )]
    pub pose3d_cmd: String,
    /// SMPL fitting command; receives <output-folder>.
    #[arg(
        long = "fit-cmd",
        env = "MOCAP_FIT_CMD",
        value_name = "CMD",
        default_value = "mocap-fit"
    )]
    pub fit_cmd: String,
    /// Emit Chrome trace JSON for post-mortem analysis.
    #[arg(long = "chrome-trace", value_name = "PATH")]
    pub chrome_trace: Option<PathBuf>,
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long = "verbose", action = clap::ArgAction::SetTrue)]
    pub verbose: bool,
}

impl TryFrom<PipelineCliArgs> for PipelineConfig {
    type Error = anyhow::Error;

    fn try_from(args: PipelineCliArgs) -> Result<Self> {
        let paths = PipelinePaths::resolve(&args.data_dir, args.output_path.as_deref())
            .with_context(|| format!("cannot resolve data dir {}", args.data_dir.display()))?;

        let video_path = match args.video_path {
            Some(video) => Some(
                path::absolute(&video)
                    .with_context(|| format!("cannot resolve video path {}", video.display()))?,
            ),
            None => None,
        };

        if !(args.record_fps.is_finite() && args.record_fps > 0.0) {
            bail!("--record-fps must be a positive number");
        }
        if args.camera.trim().is_empty() {
            bail!("--camera must not be empty");
        }

        let stages = StageCommands {
            pose2d: parse_command("--pose2d-cmd", &args.pose2d_cmd)?,
            pose3d: parse_command("--pose3d-cmd", &args.pose3d_cmd)?,
            fit: parse_command("--fit-cmd", &args.fit_cmd)?,
        };

        Ok(Self {
            paths,
            input: InputSelection {
                video_path,
                record: args.record,
            },
            capture: CaptureSettings {
                device: args.camera,
                fps: args.record_fps,
            },
            stages,
            telemetry: TelemetryOptions {
                chrome_trace_path: args.chrome_trace,
                verbose: args.verbose,
            },
        })
    }
}

fn parse_command(flag: &str, raw: &str) -> Result<CommandLine> {
    CommandLine::parse(raw).ok_or_else(|| anyhow!("{flag} must name a program"))
}
