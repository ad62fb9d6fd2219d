use std::sync::Arc;

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures_util::StreamExt;
use image::RgbImage;
use log::{error, info, warn};
use uuid::Uuid;

use crate::analyzer::{AnalyzeOptions, EmotionAnalyzer};
use crate::error::ServiceError;
use crate::models::{AnalysisResult, HealthResponse};

pub const FILE_FIELD: &str = "file";

/// Shared, read-only handles used by the handlers.
pub struct AppState {
    pub analyzer: Arc<dyn EmotionAnalyzer>,
    pub max_upload_bytes: usize,
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse::default())
}

pub async fn analyze(state: web::Data<AppState>, payload: Multipart) -> Result<HttpResponse, ServiceError> {
    let request_id = Uuid::new_v4();
    info!("[{request_id}] received analyze request");

    match run_analysis(&state, payload).await {
        Ok(result) => {
            info!("[{request_id}] mood {} ({:.2})", result.mood, result.confidence);
            Ok(HttpResponse::Ok().json(result))
        }
        Err(e @ ServiceError::InvalidImage(_)) => {
            warn!("[{request_id}] rejected upload: {}", e);
            Err(e)
        }
        Err(e) => {
            error!("[{request_id}] {}", e);
            Err(e)
        }
    }
}

async fn run_analysis(state: &AppState, payload: Multipart) -> Result<AnalysisResult, ServiceError> {
    let contents = read_file_field(payload, state.max_upload_bytes).await?;
    let image = decode_image(&contents)?;
    drop(contents);

    let analyzer = Arc::clone(&state.analyzer);
    let faces = web::block(move || analyzer.analyze(&image, &AnalyzeOptions::emotion_only()))
        .await
        .map_err(|e| ServiceError::Blocking(e.to_string()))??;

    let face = faces.into_iter().next().ok_or(ServiceError::NoFaces)?;
    let mood = face.dominant_emotion;
    let confidence = face.emotion.get(mood).ok_or(ServiceError::MissingScore(mood))?;

    Ok(AnalysisResult::new(mood, confidence, face.emotion))
}

/// Collects the bytes of the first `file` field. Other fields, and any later
/// `file` fields, are drained and ignored; a missing field yields an empty buffer.
async fn read_file_field(mut payload: Multipart, limit: usize) -> Result<Vec<u8>, ServiceError> {
    let mut contents = Vec::new();
    let mut file_seen = false;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| ServiceError::Upload(e.to_string()))?;
        let collect = !file_seen && field.content_disposition().get_name() == Some(FILE_FIELD);
        file_seen |= collect;

        while let Some(chunk) = field.next().await {
            let data = chunk.map_err(|e| ServiceError::Upload(e.to_string()))?;
            if !collect {
                continue;
            }
            if contents.len() + data.len() > limit {
                return Err(ServiceError::Upload(format!("upload exceeds {} bytes", limit)));
            }
            contents.extend_from_slice(&data);
        }
    }

    Ok(contents)
}

pub fn decode_image(contents: &[u8]) -> Result<RgbImage, ServiceError> {
    if contents.is_empty() {
        return Err(ServiceError::InvalidImage(None));
    }
    let image = image::load_from_memory(contents).map_err(|e| ServiceError::InvalidImage(Some(e)))?;
    Ok(image.to_rgb8())
}
