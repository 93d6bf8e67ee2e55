use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use stork_core::prelude::*;
use tracing::error;

pub struct ApiError(anyhow::Error);

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

fn storage_status(err: &StorageError) -> StatusCode {
    match err {
        StorageError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        if let Some(err) = self.0.downcast_ref::<BundleError>() {
            return match err {
                BundleError::Validation(_) => StatusCode::BAD_REQUEST,
                BundleError::NotFound(_) => StatusCode::NOT_FOUND,
                BundleError::AlreadyExists(_) => StatusCode::CONFLICT,
                BundleError::Storage(storage_err) => storage_status(storage_err),
                BundleError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
        }

        self.0
            .downcast_ref::<AuthError>()
            .map(|_| StatusCode::UNAUTHORIZED)
            .or_else(|| self.0.downcast_ref::<StorageError>().map(storage_status))
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {:#}", self.0);
        }

        let message = match status {
            StatusCode::UNAUTHORIZED => format!("Unauthorized: {}", self.0),
            _ => self.0.to_string(),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
