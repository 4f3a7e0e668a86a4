//! Stage contracts and the external-command stage runner.
//!
//! Each compute stage is a black box with a single entry point that either
//! writes its artifacts to disk or fails. The 3D lifter only receives the
//! video: it is not handed the 2D stage's temp folder.

use std::{
    ffi::OsStr,
    fmt,
    path::Path,
    process::{Command, Stdio},
};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::debug;
use video_ingest::VideoArtifact;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Pose2d,
    Pose3d,
    Fit,
}

impl StageKind {
    /// Short identifier used in spans and the run report.
    pub fn name(self) -> &'static str {
        match self {
            StageKind::Pose2d => "pose2d",
            StageKind::Pose3d => "pose3d",
            StageKind::Fit => "fit",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StageKind::Pose2d => "2D keypoint extraction",
            StageKind::Pose3d => "3D pose lifting",
            StageKind::Fit => "SMPL fitting",
        };
        f.write_str(label)
    }
}

/// 2D keypoint extraction: writes per-frame keypoints under `temp_folder`.
pub trait KeypointExtractor {
    fn extract(&mut self, video: &VideoArtifact, temp_folder: &Path) -> Result<()>;
}

/// 3D pose lifting over the raw video.
pub trait PoseLifter {
    fn lift(&mut self, video: &VideoArtifact) -> Result<()>;
}

/// SMPL parameter fitting: writes the final parameters into `output_folder`.
pub trait BodyModelFitter {
    fn fit(&mut self, output_folder: &Path) -> Result<()>;
}

/// Program plus leading arguments, parsed from a whitespace-separated string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `None` when `raw` contains no program.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Runs a stage as a child process.
///
/// Stage inputs are appended as positional arguments: the 2D stage gets
/// `<video> <temp>`, the 3D stage `<video>`, the fit stage `<output>`. The
/// child inherits stdout/stderr and any non-zero exit is a stage failure.
#[derive(Clone, Debug)]
pub struct CommandStage {
    kind: StageKind,
    command: CommandLine,
}

impl CommandStage {
    pub fn new(kind: StageKind, command: CommandLine) -> Self {
        Self { kind, command }
    }

    fn run_with<I, A>(&self, inputs: I) -> Result<()>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<OsStr>,
    {
        let mut cmd = Command::new(&self.command.program);
        cmd.args(&self.command.args)
            .args(inputs)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        debug!(stage = self.kind.name(), "spawning {cmd:?}");
        let status = cmd
            .status()
            .with_context(|| format!("failed to start `{}`", self.command))?;

        if !status.success() {
            match status.code() {
                Some(code) => bail!("`{}` exited with status {code}", self.command),
                None => bail!("`{}` was terminated by a signal", self.command),
            }
        }
        Ok(())
    }
}

impl KeypointExtractor for CommandStage {
    fn extract(&mut self, video: &VideoArtifact, temp_folder: &Path) -> Result<()> {
        self.run_with([video.path().as_os_str(), temp_folder.as_os_str()])
    }
}

impl PoseLifter for CommandStage {
    fn lift(&mut self, video: &VideoArtifact) -> Result<()> {
        self.run_with([video.path().as_os_str()])
    }
}

impl BodyModelFitter for CommandStage {
    fn fit(&mut self, output_folder: &Path) -> Result<()> {
        self.run_with([output_folder.as_os_str()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_program_and_leading_args() {
        let cmd = CommandLine::parse("  python3 scripts/pose_2d.py --fast ").unwrap();
        assert_eq!(cmd.program(), "python3");
        assert_eq!(cmd.to_string(), "python3 scripts/pose_2d.py --fast");
        assert!(CommandLine::parse("   ").is_none());
    }

    #[test]
    fn missing_program_is_a_stage_failure() {
        let mut stage = CommandStage::new(
            StageKind::Fit,
            CommandLine::new("mocap-definitely-not-installed", Vec::new()),
        );
        let err = stage.fit(Path::new("/tmp")).unwrap_err();
        assert!(err.to_string().contains("failed to start"));
    }

    #[cfg(unix)]
    #[test]
    fn keypoint_stage_receives_video_and_temp_folder() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"video").unwrap();
        let artifact = VideoArtifact::new(&video, None);
        let script = r#"printf '%s\n' "$0" "$1" > "$1/args.txt""#;
        let mut stage = CommandStage::new(
            StageKind::Pose2d,
            CommandLine::new("sh", vec!["-c".into(), script.into()]),
        );

        stage.extract(&artifact, dir.path()).unwrap();

        let args = std::fs::read_to_string(dir.path().join("args.txt")).unwrap();
        let expected = format!("{}\n{}\n", video.display(), dir.path().display());
        assert_eq!(args, expected);
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_reported_with_status() {
        let artifact = VideoArtifact::new("/data/clip.mp4", None);
        let mut stage = CommandStage::new(
            StageKind::Pose3d,
            CommandLine::new("sh", vec!["-c".into(), "exit 3".into()]),
        );

        let err = stage.lift(&artifact).unwrap_err();
        assert!(err.to_string().contains("exited with status 3"));
    }
}
