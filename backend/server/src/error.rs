use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload")]
    MalformedPayload,

    #[error("Invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("{message}")]
    Provider { message: String, code: Option<i64> },

    #[error("Error generating CSV")]
    Csv(#[from] csv::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::MalformedPayload
            | AppError::InvalidInput { .. }
            | AppError::MissingField { .. } => StatusCode::BAD_REQUEST,
            AppError::Provider { .. } | AppError::Csv { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        match self {
            AppError::Csv(_) => (status, self.to_string()).into_response(),
            AppError::Provider { ref message, code } => {
                (status, Json(json!({ "error": message, "code": code }))).into_response()
            }
            _ => (status, Json(json!({ "error": self.to_string() }))).into_response(),
        }
    }
}
