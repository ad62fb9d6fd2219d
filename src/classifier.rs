use std::path::Path;

use image::GrayImage;
use log::info;
use ndarray::Array4;

use crate::analyzer::EmotionClassifier;
use crate::emotion::EmotionScores;
use crate::error::AnalysisError;
use crate::onnx::{self, OnnxPlan};

pub const EMOTION_INPUT_SIZE: u32 = 48;

/// Facial expression model taking a `[1, 48, 48, 1]` grayscale batch and
/// producing one score per [`crate::emotion::Emotion`].
pub struct OnnxEmotionClassifier {
    plan: OnnxPlan,
}

impl OnnxEmotionClassifier {
    pub fn load(path: &Path) -> Result<Self, AnalysisError> {
        let size = EMOTION_INPUT_SIZE as usize;
        let plan = onnx::load_plan(path, [1, size, size, 1])?;
        info!("loaded emotion model from {}", path.display());
        Ok(OnnxEmotionClassifier { plan })
    }
}

/// Scales grayscale pixels to `[0, 1]` in NHWC layout.
pub fn preprocess(face: &GrayImage) -> Array4<f32> {
    let (width, height) = face.dimensions();
    let mut input = Array4::zeros((1, height as usize, width as usize, 1));
    for (x, y, pixel) in face.enumerate_pixels() {
        input[[0, y as usize, x as usize, 0]] = pixel[0] as f32 / 255.0;
    }
    input
}

impl EmotionClassifier for OnnxEmotionClassifier {
    fn input_size(&self) -> u32 {
        EMOTION_INPUT_SIZE
    }

    fn classify(&self, face: &GrayImage) -> Result<EmotionScores, AnalysisError> {
        check_face_size(face)?;
        let outputs = onnx::run(&self.plan, preprocess(face))?;
        scores_from_outputs(outputs)
    }
}

fn check_face_size(face: &GrayImage) -> Result<(), AnalysisError> {
    if face.dimensions() != (EMOTION_INPUT_SIZE, EMOTION_INPUT_SIZE) {
        return Err(AnalysisError::InvalidOutput(format!(
            "face input must be {0}x{0}, got {1}x{2}",
            EMOTION_INPUT_SIZE,
            face.width(),
            face.height()
        )));
    }
    Ok(())
}

fn scores_from_outputs(outputs: Vec<(Vec<usize>, Vec<f32>)>) -> Result<EmotionScores, AnalysisError> {
    let (_, scores) = outputs
        .into_iter()
        .next()
        .ok_or_else(|| AnalysisError::InvalidOutput("model returned no outputs".to_string()))?;
    EmotionScores::from_model_output(&scores)
}
