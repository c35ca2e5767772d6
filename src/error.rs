use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::decode::DecodeError;
use crate::models::ErrorBody;

/// Every per-request failure the service can report.
///
/// The `Display` text is what the client sees in `{"error": ...}`; the
/// underlying cause stays in the source chain and is only logged.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    BadRequest(&'static str),

    #[error("decoding base64 image failed")]
    Decode(#[from] DecodeError),

    #[error("Image Processing Failed!")]
    ImageDecode(#[from] image::ImageError),

    #[error("Image not found")]
    NotFound(i64),

    #[error("Database unavailable")]
    ServiceUnavailable(#[source] sqlx::Error),

    #[error("Inference failed")]
    Inference(#[source] anyhow::Error),
}

impl ServiceError {
    /// Full cause chain, for logs.
    pub fn detail(&self) -> String {
        match self {
            Self::BadRequest(msg) => (*msg).to_string(),
            Self::Decode(err) => format!("{self}: {err}"),
            Self::ImageDecode(err) => format!("{self}: {err}"),
            Self::NotFound(id) => format!("no stored image with id {id}"),
            Self::ServiceUnavailable(err) => format!("{self}: {err}"),
            Self::Inference(err) => format!("{self}: {err:#}"),
        }
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Decode(_) | Self::ImageDecode(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        tracing::warn!(status = %self.status_code(), "request failed: {}", self.detail());
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
        })
    }
}
