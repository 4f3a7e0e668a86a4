//! OpenCV-backed capture device, AVI writer and preview window.

/// Parse a `/dev/videoX` style URI and return the zero-based index if present.
pub fn parse_device_index(uri: &str) -> Option<i32> {
    if let Ok(index) = uri.parse::<i32>() {
        return Some(index);
    }
    if let Some(stripped) = uri.strip_prefix("/dev/video") {
        if !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(index) = stripped.parse::<i32>() {
                return Some(index);
            }
        }
    }
    None
}

#[cfg(feature = "opencv")]
pub use backend::OpenCvBackend;

#[cfg(feature = "opencv")]
mod backend {
    use std::path::Path;

    use anyhow::anyhow;
    use opencv::{
        core::{Mat, Size},
        highgui,
        prelude::*,
        videoio::{self, VideoCapture, VideoWriter},
    };
    use tracing::{debug, warn};

    use super::parse_device_index;
    use crate::{
        recorder::{FrameSink, FrameSource, PreviewInput, PreviewSurface},
        source::CaptureBackend,
        types::{CaptureError, FrameGeometry},
    };

    const STOP_KEY: i32 = b'q' as i32;

    fn cv_err(err: opencv::Error) -> CaptureError {
        CaptureError::Other(anyhow!("opencv: {err}"))
    }

    /// Opens cameras with V4L (falling back to any backend), writes XVID AVI
    /// files and previews frames in a HighGUI window.
    #[derive(Debug, Default)]
    pub struct OpenCvBackend;

    impl CaptureBackend for OpenCvBackend {
        type Frame = Mat;
        type Source = DeviceCapture;
        type Sink = AviWriter;
        type Preview = WindowPreview;

        fn open_device(
            &mut self,
            device: &str,
        ) -> Result<(DeviceCapture, FrameGeometry), CaptureError> {
            let cap = open_video_capture(device)?;
            let width = cap.get(videoio::CAP_PROP_FRAME_WIDTH).map_err(cv_err)?;
            let height = cap.get(videoio::CAP_PROP_FRAME_HEIGHT).map_err(cv_err)?;
            let geometry = FrameGeometry {
                width: width.max(0.0) as u32,
                height: height.max(0.0) as u32,
            };
            debug!(device, ?geometry, "capture device opened");
            Ok((DeviceCapture { cap }, geometry))
        }

        fn open_writer(
            &mut self,
            path: &Path,
            fps: f64,
            geometry: FrameGeometry,
        ) -> Result<AviWriter, CaptureError> {
            let fourcc = VideoWriter::fourcc('X', 'V', 'I', 'D').map_err(cv_err)?;
            let size = Size::new(geometry.width as i32, geometry.height as i32);
            let filename = path.to_string_lossy();
            let writer = VideoWriter::new(&filename, fourcc, fps, size, true).map_err(cv_err)?;
            if !writer.is_opened().map_err(cv_err)? {
                return Err(CaptureError::WriterUnavailable {
                    path: path.to_path_buf(),
                });
            }
            Ok(AviWriter { writer })
        }

        fn open_preview(&mut self, title: &str) -> Result<WindowPreview, CaptureError> {
            highgui::named_window(title, highgui::WINDOW_AUTOSIZE).map_err(cv_err)?;
            Ok(WindowPreview {
                title: title.to_string(),
            })
        }
    }

    pub struct DeviceCapture {
        cap: VideoCapture,
    }

    impl FrameSource for DeviceCapture {
        type Frame = Mat;

        fn read(&mut self) -> Result<Option<Mat>, CaptureError> {
            let mut frame = Mat::default();
            let grabbed = self.cap.read(&mut frame).map_err(cv_err)?;
            if !grabbed || frame.empty() {
                return Ok(None);
            }
            Ok(Some(frame))
        }
    }

    impl Drop for DeviceCapture {
        fn drop(&mut self) {
            if let Err(err) = self.cap.release() {
                warn!("failed to release capture device: {err}");
            }
        }
    }

    pub struct AviWriter {
        writer: VideoWriter,
    }

    impl FrameSink<Mat> for AviWriter {
        fn write(&mut self, frame: &Mat) -> Result<(), CaptureError> {
            self.writer.write(frame).map_err(cv_err)
        }
    }

    impl Drop for AviWriter {
        fn drop(&mut self) {
            if let Err(err) = self.writer.release() {
                warn!("failed to finalise video writer: {err}");
            }
        }
    }

    pub struct WindowPreview {
        title: String,
    }

    impl PreviewSurface<Mat> for WindowPreview {
        fn present(&mut self, frame: &Mat) -> Result<PreviewInput, CaptureError> {
            highgui::imshow(&self.title, frame).map_err(cv_err)?;
            let key = highgui::wait_key(1).map_err(cv_err)?;
            if key >= 0 && (key & 0xFF) == STOP_KEY {
                return Ok(PreviewInput::Stop);
            }
            Ok(PreviewInput::Continue)
        }
    }

    impl Drop for WindowPreview {
        fn drop(&mut self) {
            if let Err(err) = highgui::destroy_window(&self.title) {
                warn!("failed to close preview window: {err}");
            }
        }
    }

    /// Attempt to open a camera input either by index or URI.
    fn open_video_capture(uri: &str) -> Result<VideoCapture, CaptureError> {
        if let Some(index) = parse_device_index(uri) {
            for backend in [videoio::CAP_V4L, videoio::CAP_ANY] {
                match VideoCapture::new(index, backend) {
                    Ok(cap) => {
                        if cap.is_opened().map_err(cv_err)? {
                            return Ok(cap);
                        }
                    }
                    Err(err) => {
                        warn!("failed to open device #{index} with backend {backend}: {err}");
                    }
                }
            }
        } else {
            for backend in [videoio::CAP_V4L, videoio::CAP_ANY] {
                match VideoCapture::from_file(uri, backend) {
                    Ok(cap) => {
                        if cap.is_opened().map_err(cv_err)? {
                            return Ok(cap);
                        }
                    }
                    Err(err) => {
                        warn!("failed to open {uri} with backend {backend}: {err}");
                    }
                }
            }
        }

        Err(CaptureError::DeviceUnavailable {
            device: uri.to_string(),
            reason: "no backend could open the device".to_string(),
        })
    }
}
