//! Orchestration for the monocular motion-capture pipeline.
//!
//! A run sources a video, then drives three external compute stages in a
//! fixed order: 2D keypoint extraction, 3D pose lifting and SMPL body-model
//! fitting. Host and accelerator memory is reclaimed between the 2D and 3D
//! stages since both expect exclusive use of the device.
//!
//! - `config`: CLI arguments and the immutable [`PipelineConfig`].
//! - `paths`: absolute input/temp/output folder layout.
//! - `stage`: stage contracts and the external-command runner.
//! - `orchestrator`: the state machine that sequences a run.
//! - `report`: the JSON summary written after a successful run.
//! - `telemetry`: tracing subscriber setup.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod paths;
pub mod report;
pub mod stage;
pub mod telemetry;

pub use config::{CaptureSettings, InputSelection, PipelineCliArgs, PipelineConfig, StageCommands};
pub use error::PipelineError;
pub use orchestrator::{Pipeline, PipelineState, StageSet};
pub use paths::PipelinePaths;
pub use report::{REPORT_FILE_NAME, RunReport, StageTiming};
pub use stage::{BodyModelFitter, CommandLine, CommandStage, KeypointExtractor, PoseLifter, StageKind};
pub use telemetry::{TelemetryGuard, TelemetryOptions};
