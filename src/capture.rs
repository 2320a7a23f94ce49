use std::path::PathBuf;

use opencv::core::{Mat, Point};
use opencv::{highgui, imgproc};
use tracing::info;

use crate::camera::CameraSource;
use crate::detector::{Detection, EmotionDetector, FerDetector};
use crate::state::{FrameStats, SharedState};

const WINDOW: &str = "Facial Expression Analysis";
const QUIT_KEY: i32 = 'q' as i32;

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub camera_index: i32,
    /// Haar cascade for face localization. Falls back to the cascade shipped
    /// with OpenCV when unset.
    pub cascade: Option<PathBuf>,
    /// 7-class emotion classifier in ONNX format.
    pub model: PathBuf,
    /// Gated off for headless use; without a preview there is no key poll
    /// either, so the loop is stopped purely through the running flag.
    pub show_preview: bool,
}

/// Runs one capture loop instance to completion. The caller must have
/// claimed the running flag via [`SharedState::claim_start`] before spawning
/// this; the flag is cleared on every exit path so a later `start` can claim
/// it again.
pub fn run(config: &CaptureConfig, state: &SharedState) -> anyhow::Result<()> {
    let result = run_inner(config, state);
    state.request_stop();
    if config.show_preview {
        let _ = highgui::destroy_all_windows();
    }
    result
}

fn run_inner(config: &CaptureConfig, state: &SharedState) -> anyhow::Result<()> {
    let mut camera = CameraSource::new(config.camera_index)?;
    let mut detector = FerDetector::new(config.cascade.as_deref(), &config.model)?;

    if config.show_preview {
        highgui::named_window_def(WINDOW)?;
    }
    info!("capture loop started on device {}", config.camera_index);

    // Exit is flag-driven. The key poll below is non-blocking, so a stop
    // request is observed within one frame interval.
    while state.is_running() {
        let mut frame = camera.next_frame()?;
        let detections = detector.detect(&frame)?;
        state.publish(FrameStats::from_detections(&detections));

        if config.show_preview {
            annotate(&mut frame, &detections)?;
            highgui::imshow(WINDOW, &frame)?;
            if highgui::poll_key()? == QUIT_KEY {
                state.request_stop();
            }
        }
    }

    camera.release()?;
    info!("capture loop stopped");
    Ok(())
}

/// Draws a bounding box and the winning emotion label for each detection.
pub fn annotate(frame: &mut Mat, detections: &[Detection]) -> anyhow::Result<()> {
    for detection in detections {
        let label = detection.scores.dominant().as_str();
        imgproc::rectangle(
            frame,
            detection.bounds,
            (255, 0, 255).into(),
            2,
            imgproc::LINE_8,
            0,
        )?;
        let origin = Point::new(detection.bounds.x, detection.bounds.y - 10);
        imgproc::put_text(
            frame,
            label,
            origin,
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.9,
            (255, 255, 0).into(),
            2,
            imgproc::LINE_8,
            false,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::EmotionScores;
    use opencv::core::{self, Rect, Scalar, Vec3b};
    use opencv::prelude::*;

    #[test]
    fn test_annotate_draws_bounding_box() {
        let mut frame =
            Mat::new_rows_cols_with_default(480, 640, core::CV_8UC3, Scalar::all(0.0)).unwrap();
        let detections = vec![Detection {
            bounds: Rect::new(40, 40, 100, 100),
            scores: EmotionScores::new([0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]),
        }];

        annotate(&mut frame, &detections).unwrap();

        let corner = *frame.at_2d::<Vec3b>(40, 40).unwrap();
        assert_ne!(corner, Vec3b::from([0, 0, 0]));
    }

    #[test]
    fn test_annotate_empty_frame_is_noop() {
        let mut frame =
            Mat::new_rows_cols_with_default(120, 160, core::CV_8UC3, Scalar::all(0.0)).unwrap();
        annotate(&mut frame, &[]).unwrap();
        let pixel = *frame.at_2d::<Vec3b>(60, 80).unwrap();
        assert_eq!(pixel, Vec3b::from([0, 0, 0]));
    }

    #[test]
    fn test_run_with_missing_device_clears_flag() {
        let state = SharedState::new();
        assert!(state.claim_start());

        let config = CaptureConfig {
            camera_index: 99,
            cascade: None,
            model: PathBuf::from("does-not-exist.onnx"),
            show_preview: false,
        };
        let result = run(&config, &state);

        assert!(result.is_err());
        assert!(!state.is_running());
    }
}
