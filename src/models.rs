use serde::Serialize;

use crate::emotion::{Emotion, EmotionScores};

pub const HEALTH_MESSAGE: &str = "AuraSense AI Backend is running";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub message: &'static str,
    pub status: &'static str,
}

impl Default for HealthResponse {
    fn default() -> Self {
        HealthResponse {
            message: HEALTH_MESSAGE,
            status: "healthy",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalysisResult {
    pub mood: Emotion,
    pub confidence: f64,
    pub all_emotions: EmotionScores,
}

impl AnalysisResult {
    pub fn new(mood: Emotion, score: f64, all_emotions: EmotionScores) -> Self {
        AnalysisResult {
            mood,
            confidence: round2(score),
            all_emotions,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Rounds to two decimal places, half away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
