use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

use crate::emotion::Emotion;
use crate::models::ErrorResponse;

/// Failures raised while running the detection and classification models.
#[derive(thiserror::Error, Debug)]
pub enum AnalysisError {
    #[error("failed to load model {path}: {source}")]
    ModelLoad {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("inference failed: {0}")]
    Inference(#[source] anyhow::Error),

    #[error("unexpected model output: {0}")]
    InvalidOutput(String),

    #[error("Face could not be detected. Please confirm that the picture is a face photo or consider to set enforce_detection param to False.")]
    FaceNotDetected,

    #[error("no analysis action requested")]
    NoActions,
}

/// Failures of a single `/analyze` request.
///
/// Every variant is reported to the client as `{"error": <message>}` with a
/// `200 OK` status.
#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("Invalid image data")]
    InvalidImage(#[source] Option<image::ImageError>),

    #[error("Analysis failed: {0}")]
    Upload(String),

    #[error("Analysis failed: {0}")]
    Blocking(String),

    #[error("Analysis failed: no face record returned")]
    NoFaces,

    #[error("Analysis failed: missing score for '{0}'")]
    MissingScore(Emotion),

    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalysisError),
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        StatusCode::OK
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}
