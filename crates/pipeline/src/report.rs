//! Summary of a successful run, written next to the fitted parameters.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use video_ingest::VideoArtifact;

use crate::{error::PipelineError, stage::StageKind};

pub const REPORT_FILE_NAME: &str = "mocap_run.json";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StageTiming {
    pub stage: StageKind,
    pub seconds: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub video: VideoArtifact,
    pub temp_folder: PathBuf,
    pub output_folder: PathBuf,
    pub stages: Vec<StageTiming>,
    pub reclaim_passes: u32,
}

impl RunReport {
    /// Serialize to `<folder>/mocap_run.json` and return the file path.
    pub fn write_to(&self, folder: &Path) -> Result<PathBuf, PipelineError> {
        let path = folder.join(REPORT_FILE_NAME);
        self.write_json(&path)
            .map_err(|source| PipelineError::Report {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    fn write_json(&self, path: &Path) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }

    pub fn total_seconds(&self) -> f64 {
        self.stages.iter().map(|timing| timing.seconds).sum()
    }
}
