pub mod analyzer;
pub mod classifier;
pub mod config;
pub mod detector;
pub mod emotion;
pub mod error;
pub mod handlers;
pub mod logger;
pub mod models;
pub mod onnx;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::web;
use log::info;

use crate::analyzer::{EmotionAnalyzer, FaceDetector, FaceEmotionAnalyzer};
use crate::classifier::OnnxEmotionClassifier;
use crate::config::Model;
use crate::detector::UltraFaceDetector;
use crate::error::AnalysisError;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(handlers::health)))
        .service(web::resource("/analyze").route(web::post().to(handlers::analyze)));
}

pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allow_any_method()
        .allow_any_header()
}

/// Loads the configured models once so every worker shares the same handle.
pub fn build_analyzer(model: &Model) -> Result<Arc<dyn EmotionAnalyzer>, AnalysisError> {
    let classifier = OnnxEmotionClassifier::load(&model.emotion_path)?;

    let detector: Option<Box<dyn FaceDetector>> = match &model.detector_path {
        Some(path) => Some(Box::new(UltraFaceDetector::load(
            path,
            model.detector_score_threshold,
            model.detector_iou_threshold,
        )?)),
        None => {
            info!("no face detector configured, analyzing whole frames");
            None
        }
    };

    Ok(Arc::new(FaceEmotionAnalyzer::new(detector, Box::new(classifier))))
}
