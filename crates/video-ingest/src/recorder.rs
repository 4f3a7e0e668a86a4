//! Blocking live-capture loop.
//!
//! Each iteration reads one frame, appends it to the output video and hands
//! it to the preview surface. The loop owns every handle it is given, so the
//! device, the writer and the preview window are all dropped (and therefore
//! released) before [`record`] returns, whether it finished cleanly or not.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tracing::{debug, info};

use crate::types::CaptureError;

/// Ordered frame producer, typically a camera.
pub trait FrameSource {
    type Frame;

    /// Read the next frame. `Ok(None)` marks end of stream.
    fn read(&mut self) -> Result<Option<Self::Frame>, CaptureError>;
}

/// Destination that persists frames, typically a video file writer.
pub trait FrameSink<F> {
    fn write(&mut self, frame: &F) -> Result<(), CaptureError>;
}

/// What the operator asked for after a frame was shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreviewInput {
    Continue,
    Stop,
}

/// Live preview that can also carry an operator stop request back.
pub trait PreviewSurface<F> {
    fn present(&mut self, frame: &F) -> Result<PreviewInput, CaptureError>;
}

/// Out-of-band cancellation polled once per loop iteration.
pub trait StopSignal {
    fn should_stop(&self) -> bool;
}

impl StopSignal for AtomicBool {
    fn should_stop(&self) -> bool {
        self.load(Ordering::SeqCst)
    }
}

impl<T: StopSignal + ?Sized> StopSignal for Arc<T> {
    fn should_stop(&self) -> bool {
        (**self).should_stop()
    }
}

impl<T: StopSignal + ?Sized> StopSignal for &T {
    fn should_stop(&self) -> bool {
        (**self).should_stop()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The device produced no more frames.
    EndOfStream,
    /// The operator asked to stop from the preview surface.
    Operator,
    /// The external stop signal was raised (e.g. Ctrl+C).
    Interrupted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordingSummary {
    pub frames: u64,
    pub ended_by: StopReason,
}

/// Run the capture loop until end of stream or a stop request.
pub fn record<S, W, P, X>(
    mut source: S,
    mut sink: W,
    mut preview: P,
    stop: X,
) -> Result<RecordingSummary, CaptureError>
where
    S: FrameSource,
    W: FrameSink<S::Frame>,
    P: PreviewSurface<S::Frame>,
    X: StopSignal,
{
    let mut frames: u64 = 0;

    let ended_by = loop {
        if stop.should_stop() {
            break StopReason::Interrupted;
        }

        let Some(frame) = source.read()? else {
            break StopReason::EndOfStream;
        };

        sink.write(&frame)?;
        frames += 1;

        if preview.present(&frame)? == PreviewInput::Stop {
            break StopReason::Operator;
        }
    };

    drop(source);
    drop(sink);
    drop(preview);

    debug!(frames, ?ended_by, "capture loop finished");
    info!("Recorded {frames} frames");

    Ok(RecordingSummary { frames, ended_by })
}
