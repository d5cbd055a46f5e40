use async_trait::async_trait;
use mssql_core::docs::Catalog;

use crate::error::ApiError;

/// Rendered scrape body plus the reason it is incomplete, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exposition {
    pub body: String,
    pub error: Option<String>,
}

impl Exposition {
    pub fn complete(body: String) -> Self {
        Self { body, error: None }
    }

    pub fn degraded(body: String, error: impl Into<String>) -> Self {
        Self {
            body,
            error: Some(error.into()),
        }
    }
}

/// Scrape API handler.
///
/// Implement it directly to put something other than a live
/// [`Collector`](mssql_core::Collector) behind the endpoint.
#[async_trait]
pub trait MetricsHandler: Send + Sync + 'static {
    /// Run one collection pass and render the exposition.
    async fn scrape(&self) -> Result<Exposition, ApiError>;

    /// Registered queries and series, without touching the database.
    fn catalog(&self) -> Catalog;
}
