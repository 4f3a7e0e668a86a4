//! Wiring from a parsed configuration to a runnable pipeline.

use std::sync::{
    Arc, OnceLock,
    atomic::{AtomicBool, Ordering},
};

use gpu_memory::ResourceReclaimer;
use pipeline::{CommandStage, Pipeline, PipelineConfig, StageKind, StageSet};
use tracing::{info, warn};
use video_ingest::VideoSourceProvider;

/// Exit status used when a second Ctrl+C aborts the process.
const INTERRUPTED_EXIT: i32 = 130;

/// Install a Ctrl+C handler and return the flag it raises.
///
/// The first interrupt ends a live recording at the next frame; compute
/// stages are not cancellable, so a second interrupt exits immediately.
pub fn install_interrupt_handler() -> Arc<AtomicBool> {
    static STOP: OnceLock<Arc<AtomicBool>> = OnceLock::new();

    STOP.get_or_init(|| {
        let stop = Arc::new(AtomicBool::new(false));
        let handler_stop = stop.clone();
        if let Err(err) = ctrlc::set_handler(move || {
            if handler_stop.swap(true, Ordering::SeqCst) {
                std::process::exit(INTERRUPTED_EXIT);
            }
        }) {
            warn!("Failed to install Ctrl+C handler: {err}");
        }
        stop
    })
    .clone()
}

/// Assemble the source, stages and reclaimer described by `config`.
pub fn build_pipeline(config: &PipelineConfig, stop: Arc<AtomicBool>) -> Pipeline {
    #[cfg(feature = "opencv")]
    let source = VideoSourceProvider::new(video_ingest::OpenCvBackend, stop);
    #[cfg(not(feature = "opencv"))]
    let source = VideoSourceProvider::new(video_ingest::NoCaptureBackend, stop);

    let reclaimer = ResourceReclaimer::detect();
    info!(
        accelerator = reclaimer.accelerator().unwrap_or("none"),
        pose2d = %config.stages.pose2d,
        pose3d = %config.stages.pose3d,
        fit = %config.stages.fit,
        "pipeline configured"
    );

    let stages = StageSet {
        keypoints: Box::new(CommandStage::new(
            StageKind::Pose2d,
            config.stages.pose2d.clone(),
        )),
        lifter: Box::new(CommandStage::new(
            StageKind::Pose3d,
            config.stages.pose3d.clone(),
        )),
        fitter: Box::new(CommandStage::new(StageKind::Fit, config.stages.fit.clone())),
    };

    Pipeline::new(
        config.paths.clone(),
        config.capture.clone(),
        Box::new(source),
        stages,
        Box::new(reclaimer),
    )
}
