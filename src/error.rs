use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::{config::BrokerSummary, producer::PublishError, views};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Missing required fields")]
    Validation,

    #[error("failed to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("{source}")]
    Publish {
        source: PublishError,
        broker: BrokerSummary,
    },
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation => (StatusCode::BAD_REQUEST, self.to_string()).into_response(),
            AppError::Encode(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
            }
            AppError::Publish { source, broker } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(views::error_page(&source.to_string(), &broker)),
            )
                .into_response(),
        }
    }
}
