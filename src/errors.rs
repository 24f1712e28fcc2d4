use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::services::mls::MlsError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("MLS error: {0}")]
    Mls(#[from] MlsError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Mls(_) => StatusCode::BAD_GATEWAY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let res = err.into_response();
        let status = res.status();
        let body = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_query_failure_is_internal() {
        let err: AppError = anyhow::anyhow!("no such table: saved_searches").into();
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "no such table: saved_searches");
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let upstream = AppError::from(MlsError::Status {
            status: 503,
            body: "down".into(),
        });
        assert_eq!(render(upstream).await.0, StatusCode::BAD_GATEWAY);
        assert_eq!(render(AppError::Unauthorized).await.0, StatusCode::UNAUTHORIZED);
        assert_eq!(
            render(AppError::NotFound("listing K1".into())).await.0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            render(AppError::Config("missing EMAIL_FROM".into())).await.0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
