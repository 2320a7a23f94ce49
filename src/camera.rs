use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio;

use crate::CaptureError;

/// Webcam handle. Owned exclusively by the capture loop for its lifetime;
/// other components only toggle the running flag that tells the loop to
/// release it.
pub struct CameraSource {
    capture: videoio::VideoCapture,
}

impl CameraSource {
    pub fn new(index: i32) -> Result<Self, CaptureError> {
        let capture = videoio::VideoCapture::new(index, videoio::CAP_ANY)?;
        if !videoio::VideoCapture::is_opened(&capture)? {
            return Err(CaptureError::DeviceUnavailable { index });
        }
        Ok(Self { capture })
    }

    /// Blocks until the next frame is available. A failed read is fatal to
    /// the current capture loop instance, not retried.
    pub fn next_frame(&mut self) -> Result<Mat, CaptureError> {
        let mut frame = Mat::default();
        let grabbed = self.capture.read(&mut frame)?;
        if !grabbed || frame.size()?.width == 0 {
            return Err(CaptureError::FrameCapture);
        }
        Ok(frame)
    }

    pub fn release(&mut self) -> Result<(), CaptureError> {
        self.capture.release()?;
        Ok(())
    }
}
