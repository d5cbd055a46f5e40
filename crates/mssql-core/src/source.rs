use async_trait::async_trait;

use crate::{error::SourceError, row::RawRow};

/// Database boundary consumed by the [`Collector`](crate::Collector).
///
/// A fresh [`Session`] is opened for every scrape and dropped afterwards.
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    async fn connect(&self) -> Result<Box<dyn Session>, SourceError>;
}

/// One open connection able to run plain SQL text.
#[async_trait]
pub trait Session: Send {
    async fn query(&mut self, sql: &str) -> Result<Vec<RawRow>, SourceError>;
}
