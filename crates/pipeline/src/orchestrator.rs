//! Pipeline supervisor sequencing sourcing and the three compute stages.
//!
//! A run moves through
//! `Init → Sourcing → Stage2d → Stage3d → StageFit → Done`, or lands in
//! `Failed` from any state after `Init`. Stages run once each on the calling
//! thread, in that fixed order; a stage that fails ends the run and nothing
//! after it executes. Temp and output artifacts are left in place on failure.

use std::{fmt, time::Instant};

use chrono::Utc;
use gpu_memory::Reclaim;
use serde::Serialize;
use tracing::{error, info, info_span};
use video_ingest::{VideoArtifact, VideoSource};

use crate::{
    config::{CaptureSettings, InputSelection},
    error::PipelineError,
    paths::PipelinePaths,
    report::{RunReport, StageTiming},
    stage::{BodyModelFitter, KeypointExtractor, PoseLifter, StageKind},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Init,
    Sourcing,
    Stage2d,
    Stage3d,
    StageFit,
    Done,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PipelineState::Init => "init",
            PipelineState::Sourcing => "sourcing",
            PipelineState::Stage2d => "stage_2d",
            PipelineState::Stage3d => "stage_3d",
            PipelineState::StageFit => "stage_fit",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// The three compute stages of a run.
pub struct StageSet {
    pub keypoints: Box<dyn KeypointExtractor>,
    pub lifter: Box<dyn PoseLifter>,
    pub fitter: Box<dyn BodyModelFitter>,
}

/// One pipeline invocation. [`Pipeline::run`] may be called once.
pub struct Pipeline {
    paths: PipelinePaths,
    capture: CaptureSettings,
    source: Box<dyn VideoSource>,
    stages: StageSet,
    reclaimer: Box<dyn Reclaim>,
    state: PipelineState,
    reclaim_passes: u32,
}

impl Pipeline {
    pub fn new(
        paths: PipelinePaths,
        capture: CaptureSettings,
        source: Box<dyn VideoSource>,
        stages: StageSet,
        reclaimer: Box<dyn Reclaim>,
    ) -> Self {
        Self {
            paths,
            capture,
            source,
            stages,
            reclaimer,
            state: PipelineState::Init,
            reclaim_passes: 0,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn paths(&self) -> &PipelinePaths {
        &self.paths
    }

    /// Source the video and run every stage. On success the run report has
    /// already been written to the output folder.
    pub fn run(&mut self, input: &InputSelection) -> Result<RunReport, PipelineError> {
        if self.state != PipelineState::Init {
            return Err(PipelineError::AlreadyRan { state: self.state });
        }

        let span = info_span!(
            "pipeline.run",
            record = input.record,
            output = %self.paths.output_folder().display()
        );
        let _span_guard = span.enter();

        let result = self.execute(input);
        match &result {
            Ok(report) => {
                self.transition(PipelineState::Done);
                info!(
                    "Pipeline finished in {:.1}s; results in {}",
                    report.total_seconds(),
                    report.output_folder.display()
                );
            }
            Err(err) => {
                let from = self.state;
                self.transition(PipelineState::Failed);
                error!(state = %from, "Pipeline failed: {err}");
            }
        }
        result
    }

    fn execute(&mut self, input: &InputSelection) -> Result<RunReport, PipelineError> {
        let started_at = Utc::now();
        self.transition(PipelineState::Sourcing);

        let mode = input.resolve(&self.paths, &self.capture)?;
        self.paths.ensure_created()?;
        let video = self.source.acquire(&mode)?;

        info!("Video Path: {}", video.path().display());
        info!("Output Path: {}", self.paths.output_folder().display());

        let mut timings = Vec::with_capacity(3);

        self.transition(PipelineState::Stage2d);
        let temp_folder = self.paths.temp_folder();
        timings.push(run_stage(StageKind::Pose2d, || {
            self.stages.keypoints.extract(&video, temp_folder)
        })?);
        self.reclaim();

        self.transition(PipelineState::Stage3d);
        timings.push(run_stage(StageKind::Pose3d, || {
            self.stages.lifter.lift(&video)
        })?);

        self.transition(PipelineState::StageFit);
        let output_folder = self.paths.output_folder();
        timings.push(run_stage(StageKind::Fit, || {
            self.stages.fitter.fit(output_folder)
        })?);

        let report = self.build_report(started_at, video, timings);
        let report_path = report.write_to(self.paths.output_folder())?;
        info!("Run report written to {}", report_path.display());

        Ok(report)
    }

    fn reclaim(&mut self) {
        let _guard = info_span!("reclaim").entered();
        self.reclaimer.reclaim();
        self.reclaim_passes += 1;
    }

    fn build_report(
        &self,
        started_at: chrono::DateTime<Utc>,
        video: VideoArtifact,
        stages: Vec<StageTiming>,
    ) -> RunReport {
        RunReport {
            started_at,
            finished_at: Utc::now(),
            video,
            temp_folder: self.paths.temp_folder().to_path_buf(),
            output_folder: self.paths.output_folder().to_path_buf(),
            stages,
            reclaim_passes: self.reclaim_passes,
        }
    }

    fn transition(&mut self, next: PipelineState) {
        tracing::debug!(from = %self.state, to = %next, "pipeline state");
        self.state = next;
    }
}

/// Run one stage inside its span, timing it and tagging any failure.
fn run_stage<F>(stage: StageKind, run: F) -> Result<StageTiming, PipelineError>
where
    F: FnOnce() -> anyhow::Result<()>,
{
    let _guard = info_span!("stage", stage = stage.name()).entered();
    info!("Running {stage}");
    let started = Instant::now();

    run().map_err(|source| PipelineError::Stage { stage, source })?;

    let seconds = started.elapsed().as_secs_f64();
    info!("{stage} finished in {seconds:.1}s");
    Ok(StageTiming { stage, seconds })
}

