use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, header::CONTENT_TYPE},
    response::IntoResponse,
    routing::get,
};
use mssql_core::TEXT_FORMAT;
use tracing::{debug, warn};

use crate::{error::ApiError, handler::MetricsHandler};

const X_ERROR: HeaderName = HeaderName::from_static("x-error");

/// HTTP API service builder.
pub struct HttpApi<H> {
    handler: Arc<H>,
}

impl<H> HttpApi<H>
where
    H: MetricsHandler,
{
    /// Create new HTTP API with the given handler.
    pub fn new(handler: Arc<H>) -> Self {
        Self { handler }
    }

    /// Build axum router with mounted endpoints.
    ///
    /// Routes:
    /// - GET /metrics - Scrape and render the exposition
    /// - GET /catalog - Registered queries and series as JSON
    /// - GET /health - Exporter process liveness
    pub fn router(self) -> Router {
        Router::new()
            .route("/metrics", get(metrics::<H>))
            .route("/catalog", get(catalog::<H>))
            .route("/health", get(health))
            .with_state(self.handler)
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /metrics
///
/// A failed scrape still answers 200 with whatever the handler rendered; the
/// reason travels in the `X-Error` header.
async fn metrics<H>(State(handler): State<Arc<H>>) -> Result<impl IntoResponse, ApiError>
where
    H: MetricsHandler,
{
    let exposition = handler.scrape().await?;

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_FORMAT));

    match exposition.error {
        Some(reason) => {
            warn!(%reason, "serving degraded exposition");
            if let Ok(value) = HeaderValue::from_str(&header_safe(&reason)) {
                headers.insert(X_ERROR, value);
            }
        }
        None => debug!(bytes = exposition.body.len(), "scrape served"),
    }

    Ok((headers, exposition.body))
}

/// GET /catalog
async fn catalog<H>(State(handler): State<Arc<H>>) -> impl IntoResponse
where
    H: MetricsHandler,
{
    Json(handler.catalog())
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

fn header_safe(reason: &str) -> String {
    reason
        .chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { ' ' })
        .collect()
}
