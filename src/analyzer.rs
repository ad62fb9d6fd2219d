use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, RgbImage};
use log::{debug, info};
use serde::Serialize;

use crate::emotion::{Emotion, EmotionScores};
use crate::error::AnalysisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Emotion,
}

/// Flags passed to an [`EmotionAnalyzer`] for one call.
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    pub actions: Vec<Action>,
    /// Fail when no face is found instead of falling back to the whole frame.
    pub enforce_detection: bool,
    pub silent: bool,
}

impl AnalyzeOptions {
    /// Emotion only, best effort, no per-face logging.
    pub fn emotion_only() -> Self {
        AnalyzeOptions {
            actions: vec![Action::Emotion],
            enforce_detection: false,
            silent: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl FaceRegion {
    pub fn whole(image: &RgbImage) -> Self {
        FaceRegion {
            x: 0,
            y: 0,
            w: image.width(),
            h: image.height(),
        }
    }
}

/// A located face and the detector's confidence in it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub region: FaceRegion,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct FaceAnalysis {
    pub emotion: EmotionScores,
    pub dominant_emotion: Emotion,
    pub region: FaceRegion,
    pub face_confidence: f32,
}

pub trait EmotionAnalyzer: Send + Sync {
    fn analyze(&self, image: &RgbImage, options: &AnalyzeOptions) -> Result<Vec<FaceAnalysis>, AnalysisError>;
}

pub trait FaceDetector: Send + Sync {
    /// Faces found in `image`, most confident first.
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, AnalysisError>;
}

pub trait EmotionClassifier: Send + Sync {
    /// Side length of the square grayscale input the classifier expects.
    fn input_size(&self) -> u32;

    fn classify(&self, face: &GrayImage) -> Result<EmotionScores, AnalysisError>;
}

/// Detects faces, then classifies the expression of each one.
pub struct FaceEmotionAnalyzer {
    detector: Option<Box<dyn FaceDetector>>,
    classifier: Box<dyn EmotionClassifier>,
}

impl FaceEmotionAnalyzer {
    pub fn new(detector: Option<Box<dyn FaceDetector>>, classifier: Box<dyn EmotionClassifier>) -> Self {
        FaceEmotionAnalyzer { detector, classifier }
    }

    fn locate_faces(&self, image: &RgbImage, enforce_detection: bool) -> Result<Vec<Detection>, AnalysisError> {
        let mut detections = match &self.detector {
            Some(detector) => detector.detect(image)?,
            None => Vec::new(),
        };
        detections.retain(|d| d.region.w > 0 && d.region.h > 0);

        if detections.is_empty() {
            if enforce_detection && self.detector.is_some() {
                return Err(AnalysisError::FaceNotDetected);
            }
            debug!("no face located, analyzing the whole frame");
            return Ok(vec![Detection {
                region: FaceRegion::whole(image),
                score: 0.0,
            }]);
        }

        detections.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(detections)
    }

    fn face_input(&self, image: &RgbImage, region: &FaceRegion) -> GrayImage {
        let face = imageops::crop_imm(image, region.x, region.y, region.w, region.h).to_image();
        let gray = DynamicImage::ImageRgb8(face).to_luma8();
        let size = self.classifier.input_size();
        imageops::resize(&gray, size, size, FilterType::Triangle)
    }
}

impl EmotionAnalyzer for FaceEmotionAnalyzer {
    fn analyze(&self, image: &RgbImage, options: &AnalyzeOptions) -> Result<Vec<FaceAnalysis>, AnalysisError> {
        if !options.actions.contains(&Action::Emotion) {
            return Err(AnalysisError::NoActions);
        }

        let detections = self.locate_faces(image, options.enforce_detection)?;
        let mut results = Vec::with_capacity(detections.len());

        for detection in detections {
            let input = self.face_input(image, &detection.region);
            let scores = self.classifier.classify(&input)?;
            let (dominant_emotion, score) = scores
                .dominant()
                .ok_or_else(|| AnalysisError::InvalidOutput("no emotion scores".to_string()))?;

            if !options.silent {
                info!(
                    "face at ({}, {}, {}x{}) confidence {:.2}: {} {:.2}",
                    detection.region.x,
                    detection.region.y,
                    detection.region.w,
                    detection.region.h,
                    detection.score,
                    dominant_emotion,
                    score
                );
            }

            results.push(FaceAnalysis {
                emotion: scores,
                dominant_emotion,
                region: detection.region,
                face_confidence: detection.score,
            });
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct FixedDetector(Vec<Detection>);

    impl FaceDetector for FixedDetector {
        fn detect(&self, _image: &RgbImage) -> Result<Vec<Detection>, AnalysisError> {
            Ok(self.0.clone())
        }
    }

    /// Returns the same scores for every face and records the inputs it saw.
    struct RecordingClassifier {
        raw: [f32; 7],
        seen: Arc<Mutex<Vec<(u32, u32)>>>,
    }

    impl RecordingClassifier {
        fn new(raw: [f32; 7]) -> Self {
            RecordingClassifier {
                raw,
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl EmotionClassifier for RecordingClassifier {
        fn input_size(&self) -> u32 {
            48
        }

        fn classify(&self, face: &GrayImage) -> Result<EmotionScores, AnalysisError> {
            self.seen.lock().unwrap().push(face.dimensions());
            EmotionScores::from_model_output(&self.raw)
        }
    }

    fn happy() -> Box<RecordingClassifier> {
        Box::new(RecordingClassifier::new([0.05, 0.0, 0.0, 0.8, 0.05, 0.0, 0.1]))
    }

    fn region(x: u32, y: u32, w: u32, h: u32) -> FaceRegion {
        FaceRegion { x, y, w, h }
    }

    #[test]
    fn test_without_detector_uses_whole_frame() {
        let analyzer = FaceEmotionAnalyzer::new(None, happy());
        let image = RgbImage::new(64, 40);

        let results = analyzer.analyze(&image, &AnalyzeOptions::emotion_only()).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].region, region(0, 0, 64, 40));
        assert_eq!(results[0].face_confidence, 0.0);
        assert_eq!(results[0].dominant_emotion, Emotion::Happy);
    }

    #[test]
    fn test_no_face_falls_back_when_not_enforced() {
        let analyzer = FaceEmotionAnalyzer::new(Some(Box::new(FixedDetector(vec![]))), happy());
        let image = RgbImage::new(32, 32);

        let results = analyzer.analyze(&image, &AnalyzeOptions::emotion_only()).unwrap();
        assert_eq!(results[0].region, region(0, 0, 32, 32));
    }

    #[test]
    fn test_no_face_fails_when_enforced() {
        let analyzer = FaceEmotionAnalyzer::new(Some(Box::new(FixedDetector(vec![]))), happy());
        let options = AnalyzeOptions {
            enforce_detection: true,
            ..AnalyzeOptions::emotion_only()
        };

        let err = analyzer.analyze(&RgbImage::new(32, 32), &options).unwrap_err();
        assert!(matches!(err, AnalysisError::FaceNotDetected));
    }

    #[test]
    fn test_faces_ordered_by_confidence() {
        let detector = FixedDetector(vec![
            Detection { region: region(0, 0, 10, 10), score: 0.75 },
            Detection { region: region(20, 20, 12, 12), score: 0.98 },
        ]);
        let analyzer = FaceEmotionAnalyzer::new(Some(Box::new(detector)), happy());

        let results = analyzer.analyze(&RgbImage::new(40, 40), &AnalyzeOptions::emotion_only()).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].region, region(20, 20, 12, 12));
        assert_eq!(results[0].face_confidence, 0.98);
    }

    #[test]
    fn test_faces_resized_to_classifier_input() {
        let detector = FixedDetector(vec![Detection { region: region(5, 5, 20, 30), score: 0.9 }]);
        let classifier = happy();
        let seen = Arc::clone(&classifier.seen);
        let analyzer = FaceEmotionAnalyzer::new(Some(Box::new(detector)), classifier);

        analyzer.analyze(&RgbImage::new(64, 64), &AnalyzeOptions::emotion_only()).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![(48, 48)]);
    }

    #[test]
    fn test_requires_emotion_action() {
        let analyzer = FaceEmotionAnalyzer::new(None, happy());
        let options = AnalyzeOptions {
            actions: vec![],
            ..AnalyzeOptions::emotion_only()
        };

        let err = analyzer.analyze(&RgbImage::new(8, 8), &options).unwrap_err();
        assert!(matches!(err, AnalysisError::NoActions));
    }
}
