use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("core error: {0}")]
    Core(#[from] mssql_core::CoreError),
}

#[cfg(feature = "http")]
impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!(error = %self, "request failed");
        (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            self.to_string(),
        )
            .into_response()
    }
}
