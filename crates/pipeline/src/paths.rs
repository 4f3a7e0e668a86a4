//! Folder layout shared by every component of a run.

use std::{
    fs, io,
    path::{self, Path, PathBuf},
};

use serde::Serialize;
use tracing::debug;

use crate::error::PipelineError;
use video_ingest::RECORDING_FILE_NAME;

pub const INPUT_DIR: &str = "input_data";
pub const TEMP_DIR: &str = "temp";
pub const OUTPUT_DIR: &str = "output_folder";

/// Absolute input, temp and output folders, resolved once at startup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PipelinePaths {
    input_folder: PathBuf,
    temp_folder: PathBuf,
    output_folder: PathBuf,
}

impl PipelinePaths {
    /// Lay out the folders under `data_dir`; `output` overrides the output folder.
    pub fn resolve(data_dir: &Path, output: Option<&Path>) -> io::Result<Self> {
        let data_dir = path::absolute(data_dir)?;
        let output_folder = match output {
            Some(output) => path::absolute(output)?,
            None => data_dir.join(OUTPUT_DIR),
        };
        Ok(Self {
            input_folder: data_dir.join(INPUT_DIR),
            temp_folder: data_dir.join(TEMP_DIR),
            output_folder,
        })
    }

    pub fn input_folder(&self) -> &Path {
        &self.input_folder
    }

    pub fn temp_folder(&self) -> &Path {
        &self.temp_folder
    }

    pub fn output_folder(&self) -> &Path {
        &self.output_folder
    }

    /// Where a live recording is written.
    pub fn recording_destination(&self) -> PathBuf {
        self.input_folder.join(RECORDING_FILE_NAME)
    }

    /// Create the temp and output folders if they do not exist yet.
    pub fn ensure_created(&self) -> Result<(), PipelineError> {
        for dir in [&self.temp_folder, &self.output_folder] {
            fs::create_dir_all(dir).map_err(|source| PipelineError::Paths {
                path: dir.clone(),
                source,
            })?;
            debug!("folder ready: {}", dir.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_default_layout_to_absolute_paths() {
        let paths = PipelinePaths::resolve(Path::new("data"), None).unwrap();

        assert!(paths.input_folder().is_absolute());
        assert!(paths.temp_folder().ends_with("data/temp"));
        assert!(paths.output_folder().ends_with("data/output_folder"));
        assert!(paths.recording_destination().ends_with("input_data/recorded_video.avi"));
    }

    #[test]
    fn output_override_wins() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("fits");
        let paths = PipelinePaths::resolve(dir.path(), Some(&out)).unwrap();

        assert_eq!(paths.output_folder(), out.as_path());
        assert_eq!(paths.temp_folder(), dir.path().join(TEMP_DIR).as_path());
    }

    #[test]
    fn ensure_created_builds_missing_folders() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PipelinePaths::resolve(&dir.path().join("nested/data"), None).unwrap();

        paths.ensure_created().unwrap();
        paths.ensure_created().unwrap();

        assert!(paths.temp_folder().is_dir());
        assert!(paths.output_folder().is_dir());
    }

    #[test]
    fn ensure_created_reports_blocked_folder() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("data");
        std::fs::write(&blocker, b"file, not a folder").unwrap();
        let paths = PipelinePaths::resolve(&blocker, None).unwrap();

        let err = paths.ensure_created().unwrap_err();
        assert!(matches!(err, PipelineError::Paths { .. }));
    }
}
