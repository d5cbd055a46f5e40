use std::sync::Arc;

use async_trait::async_trait;
use mssql_core::{Collector, DataSource, docs::Catalog};

use crate::{
    error::ApiError,
    handler::{Exposition, MetricsHandler},
};

/// Adapter that bridges [`Collector`] to [`MetricsHandler`].
///
/// A failed scrape exposes only `up` and the self-health series, and a
/// skipped query drops out of that scrape; stale readings are never served.
pub struct CollectorAdapter<S> {
    collector: Arc<Collector<S>>,
}

impl<S: DataSource> CollectorAdapter<S> {
    pub fn new(collector: Arc<Collector<S>>) -> Self {
        Self { collector }
    }
}

#[async_trait]
impl<S: DataSource> MetricsHandler for CollectorAdapter<S> {
    async fn scrape(&self) -> Result<Exposition, ApiError> {
        let registry = self.collector.registry();

        match self.collector.scrape().await {
            Ok(report) if report.skipped.is_empty() => Ok(Exposition::complete(registry.render()?)),
            Ok(report) => {
                let skipped: Vec<&str> = report.skipped.iter().map(|(q, _)| q.as_str()).collect();
                let reason = report
                    .skipped
                    .iter()
                    .map(|(query, err)| format!("{query}: {err}"))
                    .collect::<Vec<_>>()
                    .join("; ");
                Ok(Exposition::degraded(registry.render_without(&skipped)?, reason))
            }
            Err(e) => Ok(Exposition::degraded(registry.render_liveness()?, e.to_string())),
        }
    }

    fn catalog(&self) -> Catalog {
        Catalog::from_registry(self.collector.registry())
    }
}
