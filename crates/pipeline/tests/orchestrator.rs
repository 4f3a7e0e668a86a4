use std::{
    cell::RefCell,
    path::{Path, PathBuf},
    rc::Rc,
};

use anyhow::{Result, bail};
use gpu_memory::Reclaim;
use pipeline::{
    BodyModelFitter, CaptureSettings, InputSelection, KeypointExtractor, Pipeline, PipelineError,
    PipelinePaths, PipelineState, PoseLifter, REPORT_FILE_NAME, StageKind, StageSet,
};
use tempfile::TempDir;
use video_ingest::{AcquireMode, SourceError, VideoArtifact, VideoSource};

type Log = Rc<RefCell<Vec<String>>>;

fn push(log: &Log, event: impl Into<String>) {
    log.borrow_mut().push(event.into());
}

enum SourceBehaviour {
    Ok,
    DeviceUnavailable,
}

struct FakeSource {
    log: Log,
    behaviour: SourceBehaviour,
    modes: Rc<RefCell<Vec<AcquireMode>>>,
}

impl VideoSource for FakeSource {
    fn acquire(&mut self, mode: &AcquireMode) -> Result<VideoArtifact, SourceError> {
        push(&self.log, "acquire");
        self.modes.borrow_mut().push(mode.clone());
        match self.behaviour {
            SourceBehaviour::Ok => {
                let path = match mode {
                    AcquireMode::UseSupplied(path) => path.clone(),
                    AcquireMode::RecordLive { destination, .. } => destination.clone(),
                };
                Ok(VideoArtifact::new(path, None))
            }
            SourceBehaviour::DeviceUnavailable => Err(SourceError::DeviceUnavailable {
                device: "0".into(),
                reason: "no camera attached".into(),
            }),
        }
    }
}

struct FakeStage {
    log: Log,
    fail: bool,
}

impl FakeStage {
    fn finish(&self, name: &str) -> Result<()> {
        push(&self.log, name);
        if self.fail {
            bail!("{name} exploded");
        }
        Ok(())
    }
}

impl KeypointExtractor for FakeStage {
    fn extract(&mut self, video: &VideoArtifact, temp_folder: &Path) -> Result<()> {
        assert!(video.path().is_absolute());
        assert!(temp_folder.is_dir(), "temp folder must exist before 2D runs");
        std::fs::write(temp_folder.join("keypoints.json"), b"[]")?;
        self.finish("pose2d")
    }
}

impl PoseLifter for FakeStage {
    fn lift(&mut self, _video: &VideoArtifact) -> Result<()> {
        self.finish("pose3d")
    }
}

impl BodyModelFitter for FakeStage {
    fn fit(&mut self, output_folder: &Path) -> Result<()> {
        assert!(output_folder.is_dir(), "output folder must exist before fitting");
        self.finish("fit")
    }
}

struct FakeReclaimer {
    log: Log,
}

impl Reclaim for FakeReclaimer {
    fn reclaim(&mut self) {
        push(&self.log, "reclaim");
    }
}

struct Harness {
    _dir: TempDir,
    video: PathBuf,
    log: Log,
    modes: Rc<RefCell<Vec<AcquireMode>>>,
    pipeline: Pipeline,
}

fn harness(source: SourceBehaviour, failing: Option<StageKind>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("clip.mp4");
    std::fs::write(&video, b"video").unwrap();
    let paths = PipelinePaths::resolve(&dir.path().join("data"), None).unwrap();

    let log: Log = Rc::default();
    let modes = Rc::default();
    let stage = |kind| FakeStage {
        log: log.clone(),
        fail: failing == Some(kind),
    };

    let pipeline = Pipeline::new(
        paths,
        CaptureSettings::default(),
        Box::new(FakeSource {
            log: log.clone(),
            behaviour: source,
            modes: Rc::clone(&modes),
        }),
        StageSet {
            keypoints: Box::new(stage(StageKind::Pose2d)),
            lifter: Box::new(stage(StageKind::Pose3d)),
            fitter: Box::new(stage(StageKind::Fit)),
        },
        Box::new(FakeReclaimer { log: log.clone() }),
    );

    Harness {
        _dir: dir,
        video,
        log,
        modes,
        pipeline,
    }
}

fn supplied(video: &Path) -> InputSelection {
    InputSelection {
        video_path: Some(video.to_path_buf()),
        record: false,
    }
}

fn events(log: &Log) -> Vec<String> {
    log.borrow().clone()
}

#[test]
fn runs_stages_in_order_with_one_reclaim_between_2d_and_3d() {
    let mut h = harness(SourceBehaviour::Ok, None);

    let report = h.pipeline.run(&supplied(&h.video)).unwrap();

    assert_eq!(
        events(&h.log),
        vec!["acquire", "pose2d", "reclaim", "pose3d", "fit"]
    );
    assert_eq!(h.pipeline.state(), PipelineState::Done);
    assert_eq!(report.reclaim_passes, 1);
    let order: Vec<StageKind> = report.stages.iter().map(|t| t.stage).collect();
    assert_eq!(order, vec![StageKind::Pose2d, StageKind::Pose3d, StageKind::Fit]);
    assert!(
        h.pipeline
            .paths()
            .output_folder()
            .join(REPORT_FILE_NAME)
            .is_file()
    );
}

#[test]
fn missing_input_runs_nothing() {
    let mut h = harness(SourceBehaviour::Ok, None);

    let err = h.pipeline.run(&InputSelection::default()).unwrap_err();

    assert!(matches!(err, PipelineError::MissingInput));
    assert_ne!(err.exit_code(), 0);
    assert!(events(&h.log).is_empty());
    assert_eq!(h.pipeline.state(), PipelineState::Failed);
}

#[test]
fn unavailable_device_runs_no_stage() {
    let mut h = harness(SourceBehaviour::DeviceUnavailable, None);
    let input = InputSelection {
        video_path: None,
        record: true,
    };

    let err = h.pipeline.run(&input).unwrap_err();

    assert!(matches!(err, PipelineError::DeviceUnavailable { .. }));
    assert_eq!(events(&h.log), vec!["acquire"]);
    assert_eq!(h.pipeline.state(), PipelineState::Failed);
}

#[test]
fn failed_2d_stage_skips_3d_and_fit() {
    let mut h = harness(SourceBehaviour::Ok, Some(StageKind::Pose2d));

    let err = h.pipeline.run(&supplied(&h.video)).unwrap_err();

    assert_eq!(err.failed_stage(), Some(StageKind::Pose2d));
    assert_eq!(err.exit_code(), 4);
    assert_eq!(events(&h.log), vec!["acquire", "pose2d"]);
    assert_eq!(h.pipeline.state(), PipelineState::Failed);
    // Intermediate artifacts stay behind for inspection.
    assert!(
        h.pipeline
            .paths()
            .temp_folder()
            .join("keypoints.json")
            .is_file()
    );
}

#[test]
fn failed_3d_stage_skips_fit() {
    let mut h = harness(SourceBehaviour::Ok, Some(StageKind::Pose3d));

    let err = h.pipeline.run(&supplied(&h.video)).unwrap_err();

    assert_eq!(err.failed_stage(), Some(StageKind::Pose3d));
    assert_eq!(events(&h.log), vec!["acquire", "pose2d", "reclaim", "pose3d"]);
    assert!(
        !h.pipeline
            .paths()
            .output_folder()
            .join(REPORT_FILE_NAME)
            .exists()
    );
}

#[test]
fn failed_fit_is_reported() {
    let mut h = harness(SourceBehaviour::Ok, Some(StageKind::Fit));

    let err = h.pipeline.run(&supplied(&h.video)).unwrap_err();

    assert_eq!(err.failed_stage(), Some(StageKind::Fit));
    assert_eq!(
        events(&h.log),
        vec!["acquire", "pose2d", "reclaim", "pose3d", "fit"]
    );
}

#[test]
fn record_flag_overrides_video_path() {
    let mut h = harness(SourceBehaviour::Ok, None);
    let input = InputSelection {
        video_path: Some(h.video.clone()),
        record: true,
    };

    h.pipeline.run(&input).unwrap();

    let modes = h.modes.borrow();
    assert_eq!(modes.len(), 1);
    match &modes[0] {
        AcquireMode::RecordLive {
            destination, fps, ..
        } => {
            assert!(destination.ends_with("data/input_data/recorded_video.avi"));
            assert_eq!(*fps, 20.0);
        }
        other => panic!("expected live recording, got {other:?}"),
    }
}

#[test]
fn a_pipeline_runs_at_most_once() {
    let mut h = harness(SourceBehaviour::Ok, None);
    h.pipeline.run(&supplied(&h.video)).unwrap();

    let err = h.pipeline.run(&supplied(&h.video)).unwrap_err();

    assert!(matches!(
        err,
        PipelineError::AlreadyRan {
            state: PipelineState::Done
        }
    ));
    assert_eq!(events(&h.log).len(), 5);
    assert_eq!(h.pipeline.state(), PipelineState::Done);
}

#[test]
fn relative_video_path_reaches_stages_absolute() {
    let mut h = harness(SourceBehaviour::Ok, None);
    let input = InputSelection {
        video_path: Some(PathBuf::from("rel/clip.mp4")),
        record: false,
    };

    let report = h.pipeline.run(&input).unwrap();

    let expected = std::env::current_dir().unwrap().join("rel/clip.mp4");
    assert_eq!(*h.modes.borrow(), vec![AcquireMode::UseSupplied(expected.clone())]);
    assert_eq!(report.video.path(), expected.as_path());
}
