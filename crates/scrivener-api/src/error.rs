use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::error;

use scrivener_core::CoreError;
use scrivener_types::api::{ErrorBody, ErrorDetail};

/// HTTP face of [`CoreError`].
#[derive(Debug)]
pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(CoreError::Validation(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(CoreError::Validation(rejection.body_text()))
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            CoreError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            CoreError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
            CoreError::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
            CoreError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            CoreError::DuplicateIdentity => (StatusCode::CONFLICT, "duplicate_identity"),
            CoreError::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, "cancelled"),
            CoreError::TransientProvider(_) => (StatusCode::SERVICE_UNAVAILABLE, "provider_unavailable"),
            CoreError::FatalProvider(_) => (StatusCode::BAD_GATEWAY, "provider_failed"),
            CoreError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }

    /// The JSON error body. Storage faults are logged here and reach the
    /// client only as a generic message.
    pub fn body(&self) -> ErrorBody {
        let (_, code) = self.status_and_code();
        let message = match &self.0 {
            CoreError::Storage(err) => {
                error!("Storage failure: {:#}", err);
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, _) = self.status_and_code();
        let mut response = (status, Json(self.body())).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"scrivener\""),
            );
        }
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Run a blocking store call off the async runtime.
pub async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> Result<T, CoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError(CoreError::Storage(anyhow::anyhow!("blocking task failed")))
        })?
        .map_err(ApiError)
}
