use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::inference::InferenceError;
use crate::storage::StorageError;

/// Every way a prediction request can fail, as seen by the client.
#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error("No file uploaded or file is invalid.")]
    InvalidUpload,
    #[error("Error saving file.")]
    StorageFailure(#[source] StorageError),
    #[error("Error reading image: the uploaded file could not be decoded.")]
    DecodeFailure(#[source] InferenceError),
    #[error("Error running prediction.")]
    InferenceFailure(#[source] InferenceError),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl From<StorageError> for PredictError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::EmptyFilename => PredictError::InvalidUpload,
            other => PredictError::StorageFailure(other),
        }
    }
}

impl From<InferenceError> for PredictError {
    fn from(err: InferenceError) -> Self {
        if err.is_decode_failure() {
            PredictError::DecodeFailure(err)
        } else {
            PredictError::InferenceFailure(err)
        }
    }
}

impl PredictError {
    pub fn json_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}

impl ResponseError for PredictError {
    fn status_code(&self) -> StatusCode {
        match self {
            PredictError::InvalidUpload => StatusCode::BAD_REQUEST,
            PredictError::DecodeFailure(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PredictError::StorageFailure(_) | PredictError::InferenceFailure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .content_type("text/plain; charset=utf-8")
            .body(self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn storage_errors_map_to_kinds() {
        assert!(matches!(
            PredictError::from(StorageError::EmptyFilename),
            PredictError::InvalidUpload
        ));
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        assert!(matches!(
            PredictError::from(StorageError::Io(io)),
            PredictError::StorageFailure(_)
        ));
    }

    #[test]
    fn inference_errors_map_to_kinds() {
        let unreadable = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(
            PredictError::from(InferenceError::Unreadable(unreadable)),
            PredictError::DecodeFailure(_)
        ));
        assert!(matches!(
            PredictError::from(InferenceError::EmptyOutput),
            PredictError::InferenceFailure(_)
        ));
    }

    #[actix_web::test]
    async fn responses_carry_plain_text_messages() {
        let response = PredictError::InvalidUpload.error_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body()).await.unwrap();
        assert_eq!(body, "No file uploaded or file is invalid.");

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let response = PredictError::StorageFailure(StorageError::Io(io)).error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body()).await.unwrap();
        assert_eq!(body, "Error saving file.");
    }

    #[actix_web::test]
    async fn json_responses_wrap_the_message() {
        let response = PredictError::InferenceFailure(InferenceError::EmptyOutput).json_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "Error running prediction.");
    }
}
