//! Stream metadata lookup through `ffprobe`.

use std::{
    path::Path,
    process::{Command, Stdio},
};

use anyhow::{Context, anyhow};
use serde::Deserialize;

use crate::types::{CaptureError, VideoInfo};

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
}

/// Run `ffprobe` against `path` and describe its first video stream.
pub fn probe_video(path: &Path) -> Result<VideoInfo, CaptureError> {
    let output = Command::new("ffprobe")
        .arg("-v")
        .arg("error")
        .arg("-print_format")
        .arg("json")
        .arg("-show_streams")
        .arg(path)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .context("failed to spawn ffprobe")?;

    if !output.status.success() {
        return Err(CaptureError::Other(anyhow!(
            "ffprobe exited with {} for {}",
            output.status,
            path.display()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_probe_output(&stdout)
}

/// Extract [`VideoInfo`] from `ffprobe -print_format json -show_streams` output.
pub fn parse_probe_output(json: &str) -> Result<VideoInfo, CaptureError> {
    let probe: ProbeOutput = serde_json::from_str(json).context("invalid ffprobe output")?;
    let stream = probe
        .streams
        .into_iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| anyhow!("no video stream found"))?;

    let width = stream.width.ok_or_else(|| anyhow!("video stream has no width"))?;
    let height = stream
        .height
        .ok_or_else(|| anyhow!("video stream has no height"))?;
    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(0.0);

    Ok(VideoInfo {
        width,
        height,
        fps,
        codec: stream.codec_name.unwrap_or_else(|| "unknown".to_string()),
    })
}

/// Parse ffprobe's rational frame rate (`30000/1001`) or a plain number.
fn parse_frame_rate(raw: &str) -> Option<f64> {
    let rate = match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.trim().parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}
