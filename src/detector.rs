use std::path::Path;

use anyhow::Context;
use ndarray::Array4;
use opencv::core::{self, Mat, Rect, Size};
use opencv::prelude::*;
use opencv::types::VectorOfRect;
use opencv::{imgproc, objdetect, types};

/// Emotion model input resolution (fer2013-style models take 64x64 grayscale).
const MODEL_INPUT_SIZE: i32 = 64;

/// The closed set of emotion labels, in fer2013 class order. Score indexing
/// and histogram iteration both follow this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmotionLabel {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl EmotionLabel {
    pub const ALL: [EmotionLabel; 7] = [
        EmotionLabel::Angry,
        EmotionLabel::Disgust,
        EmotionLabel::Fear,
        EmotionLabel::Happy,
        EmotionLabel::Sad,
        EmotionLabel::Surprise,
        EmotionLabel::Neutral,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EmotionLabel::Angry => "angry",
            EmotionLabel::Disgust => "disgust",
            EmotionLabel::Fear => "fear",
            EmotionLabel::Happy => "happy",
            EmotionLabel::Sad => "sad",
            EmotionLabel::Surprise => "surprise",
            EmotionLabel::Neutral => "neutral",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Per-emotion confidence in [0, 1], indexed in fer2013 order.
#[derive(Debug, Clone, Default)]
pub struct EmotionScores([f32; 7]);

impl EmotionScores {
    pub fn new(scores: [f32; 7]) -> Self {
        Self(scores)
    }

    pub fn get(&self, label: EmotionLabel) -> f32 {
        self.0[label.index()]
    }

    /// Label with the maximum score. Ties go to the first label in order.
    pub fn dominant(&self) -> EmotionLabel {
        let mut best = EmotionLabel::Angry;
        for label in EmotionLabel::ALL {
            if self.0[label.index()] > self.0[best.index()] {
                best = label;
            }
        }
        best
    }
}

/// A single face found in a frame. Not retained beyond the frame.
#[derive(Debug, Clone)]
pub struct Detection {
    pub bounds: Rect,
    pub scores: EmotionScores,
}

/// Seam for the detection capability. The capture loop only depends on this
/// trait, not on any particular face or emotion model.
pub trait EmotionDetector {
    fn detect(&mut self, frame: &Mat) -> anyhow::Result<Vec<Detection>>;
}

/// Haar-cascade face localization feeding a 7-class emotion classifier
/// backed by an ONNX Runtime session.
pub struct FerDetector {
    classifier: objdetect::CascadeClassifier,
    session: ort::session::Session,
}

impl FerDetector {
    pub fn new(cascade: Option<&Path>, model: &Path) -> anyhow::Result<Self> {
        let xml = match cascade {
            Some(path) => path.to_string_lossy().into_owned(),
            None => core::find_file_def("haarcascades/haarcascade_frontalface_alt.xml")?,
        };
        let classifier = objdetect::CascadeClassifier::new(&xml)?;
        let session = ort::session::Session::builder()?.commit_from_file(model)?;
        Ok(Self {
            classifier,
            session,
        })
    }

    fn detect_faces(&mut self, gray: &Mat) -> anyhow::Result<VectorOfRect> {
        let mut faces = types::VectorOfRect::new();

        self.classifier.detect_multi_scale(
            &gray,
            &mut faces,
            1.1,
            2,
            objdetect::CASCADE_SCALE_IMAGE,
            core::Size {
                width: 30,
                height: 30,
            },
            core::Size {
                width: 0,
                height: 0,
            },
        )?;
        Ok(faces)
    }

    fn classify(&mut self, face: &Mat) -> anyhow::Result<EmotionScores> {
        let mut resized = Mat::default();
        imgproc::resize(
            face,
            &mut resized,
            Size::new(MODEL_INPUT_SIZE, MODEL_INPUT_SIZE),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )?;
        let mut scaled = Mat::default();
        resized.convert_to(&mut scaled, core::CV_32F, 1.0 / 255.0, 0.0)?;

        let pixels = scaled.data_typed::<f32>()?.to_vec();
        let input = Array4::from_shape_vec(
            (1, 1, MODEL_INPUT_SIZE as usize, MODEL_INPUT_SIZE as usize),
            pixels,
        )?;

        let input_value = ort::value::Tensor::from_array(input)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        let logits = outputs[0].try_extract_array::<f32>()?;
        let logits = logits
            .as_slice()
            .context("emotion model output is not contiguous")?;
        anyhow::ensure!(
            logits.len() == EmotionLabel::ALL.len(),
            "emotion model produced {} outputs, expected {}",
            logits.len(),
            EmotionLabel::ALL.len()
        );

        Ok(EmotionScores::new(softmax(logits)))
    }
}

impl EmotionDetector for FerDetector {
    fn detect(&mut self, frame: &Mat) -> anyhow::Result<Vec<Detection>> {
        let gray = convert_to_grayscale(frame)?;
        let faces = self.detect_faces(&gray)?;

        let mut detections = Vec::with_capacity(faces.len());
        for bounds in &faces {
            let roi = Mat::roi(&gray, bounds)?;
            let scores = self.classify(&roi)?;
            detections.push(Detection { bounds, scores });
        }
        Ok(detections)
    }
}

fn softmax(logits: &[f32]) -> [f32; 7] {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut out = [0.0f32; 7];
    let mut sum = 0.0;
    for (slot, &logit) in out.iter_mut().zip(logits) {
        *slot = (logit - max).exp();
        sum += *slot;
    }
    for slot in &mut out {
        *slot /= sum;
    }
    out
}

pub fn convert_to_grayscale(image: &Mat) -> anyhow::Result<Mat> {
    let mut gray: Mat = Mat::default();
    imgproc::cvt_color_def(&image, &mut gray, imgproc::COLOR_BGR2GRAY)?;
    Ok(gray)
}
