use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbImage;
use log::{debug, info};
use ndarray::Array4;

use crate::analyzer::{Detection, FaceDetector, FaceRegion};
use crate::error::AnalysisError;
use crate::onnx::{self, OnnxPlan};

pub const DETECTOR_WIDTH: u32 = 320;
pub const DETECTOR_HEIGHT: u32 = 240;

const PIXEL_MEAN: f32 = 127.0;
const PIXEL_SCALE: f32 = 128.0;

/// UltraFace (RFB-320) face detector.
pub struct UltraFaceDetector {
    plan: OnnxPlan,
    score_threshold: f32,
    iou_threshold: f32,
}

impl UltraFaceDetector {
    pub fn load(path: &Path, score_threshold: f32, iou_threshold: f32) -> Result<Self, AnalysisError> {
        let plan = onnx::load_plan(
            path,
            [1, 3, DETECTOR_HEIGHT as usize, DETECTOR_WIDTH as usize],
        )?;
        info!("loaded face detector from {}", path.display());
        Ok(UltraFaceDetector {
            plan,
            score_threshold,
            iou_threshold,
        })
    }
}

impl FaceDetector for UltraFaceDetector {
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, AnalysisError> {
        let outputs = onnx::run(&self.plan, preprocess(image))?;
        let faces = postprocess(
            &outputs,
            image.width(),
            image.height(),
            self.score_threshold,
            self.iou_threshold,
        )?;
        debug!("face detector kept {} faces", faces.len());
        Ok(faces)
    }
}

/// Decodes the `(scores, boxes)` output pair and suppresses overlapping faces.
pub fn postprocess(
    outputs: &[(Vec<usize>, Vec<f32>)],
    width: u32,
    height: u32,
    score_threshold: f32,
    iou_threshold: f32,
) -> Result<Vec<Detection>, AnalysisError> {
    if outputs.len() < 2 {
        return Err(AnalysisError::InvalidOutput(format!(
            "face detector returned {} outputs, expected 2",
            outputs.len()
        )));
    }

    let (_, scores) = &outputs[0];
    let (_, boxes) = &outputs[1];
    let candidates = decode(scores, boxes, width, height, score_threshold)?;
    Ok(nms(candidates, iou_threshold))
}

/// Resizes to the detector input and normalizes to `(p - 127) / 128`, NCHW.
pub fn preprocess(image: &RgbImage) -> Array4<f32> {
    let resized = imageops::resize(image, DETECTOR_WIDTH, DETECTOR_HEIGHT, FilterType::Triangle);
    let mut input = Array4::zeros((1, 3, DETECTOR_HEIGHT as usize, DETECTOR_WIDTH as usize));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            input[[0, c, y as usize, x as usize]] = (pixel[c] as f32 - PIXEL_MEAN) / PIXEL_SCALE;
        }
    }
    input
}

/// Turns raw `[N, 2]` class scores and `[N, 4]` normalized corner boxes into
/// detections in image coordinates.
pub fn decode(
    scores: &[f32],
    boxes: &[f32],
    width: u32,
    height: u32,
    threshold: f32,
) -> Result<Vec<Detection>, AnalysisError> {
    if scores.len() % 2 != 0 || boxes.len() % 4 != 0 || scores.len() / 2 != boxes.len() / 4 {
        return Err(AnalysisError::InvalidOutput(format!(
            "mismatched detector outputs: {} scores, {} box values",
            scores.len(),
            boxes.len()
        )));
    }

    let (w, h) = (width as f32, height as f32);
    let detections = scores
        .chunks_exact(2)
        .zip(boxes.chunks_exact(4))
        .filter(|(score, _)| score[1] > threshold)
        .filter_map(|(score, b)| {
            let x1 = (b[0] * w).clamp(0.0, w);
            let y1 = (b[1] * h).clamp(0.0, h);
            let x2 = (b[2] * w).clamp(0.0, w);
            let y2 = (b[3] * h).clamp(0.0, h);
            if x2 - x1 < 1.0 || y2 - y1 < 1.0 {
                return None;
            }
            Some(Detection {
                region: FaceRegion {
                    x: x1 as u32,
                    y: y1 as u32,
                    w: (x2 - x1) as u32,
                    h: (y2 - y1) as u32,
                },
                score: score[1],
            })
        })
        .collect();
    Ok(detections)
}

fn iou(a: &FaceRegion, b: &FaceRegion) -> f32 {
    let xx1 = a.x.max(b.x) as f32;
    let yy1 = a.y.max(b.y) as f32;
    let xx2 = (a.x + a.w).min(b.x + b.w) as f32;
    let yy2 = (a.y + a.h).min(b.y + b.h) as f32;

    let inter = (xx2 - xx1).max(0.0) * (yy2 - yy1).max(0.0);
    let union = (a.w * a.h) as f32 + (b.w * b.h) as f32 - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// Greedy non-maximum suppression. Returns survivors, highest score first.
pub fn nms(mut detections: Vec<Detection>, thresh: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<Detection> = Vec::new();
    for candidate in detections {
        if keep.iter().all(|kept| iou(&kept.region, &candidate.region) <= thresh) {
            keep.push(candidate);
        }
    }
    keep
}
