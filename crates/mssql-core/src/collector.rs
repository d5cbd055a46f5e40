use std::{
    str::FromStr,
    sync::Arc,
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};

use crate::{
    error::{CoreError, SourceError},
    query::QueryDefinition,
    registry::Registry,
    source::{DataSource, Session},
};

/// What a failing query does to the rest of the scrape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapePolicy {
    /// Abort the scrape and report `up 0`.
    #[default]
    FailScrape,
    /// Log the failure, keep going with the remaining queries.
    SkipQuery,
}

impl FromStr for ScrapePolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" | "fail_scrape" | "fail-scrape" => Ok(ScrapePolicy::FailScrape),
            "skip" | "skip_query" | "skip-query" => Ok(ScrapePolicy::SkipQuery),
            _ => Err(CoreError::InvalidPolicy(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub policy: ScrapePolicy,
    pub query_timeout: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            policy: ScrapePolicy::FailScrape,
            query_timeout: Duration::from_secs(15),
        }
    }
}

/// Outcome of a scrape that reached the database.
#[derive(Debug, Clone, Default)]
pub struct ScrapeReport {
    pub collected: usize,
    /// `(query, error)` pairs skipped under [`ScrapePolicy::SkipQuery`].
    pub skipped: Vec<(String, String)>,
    pub elapsed: Duration,
}

/// Runs every registered query against the source and folds the rows into the gauges.
pub struct Collector<S> {
    registry: Arc<Registry>,
    source: Arc<S>,
    config: CollectorConfig,
}

impl<S> Collector<S>
where
    S: DataSource,
{
    pub fn new(registry: Arc<Registry>, source: Arc<S>, config: CollectorConfig) -> Self {
        Self {
            registry,
            source,
            config,
        }
    }

    #[inline]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    #[inline]
    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// One sequential pass over the registry.
    ///
    /// `up` is set to 1 once the pass completes and to 0 when the source is
    /// unreachable or a query fails under [`ScrapePolicy::FailScrape`].
    #[instrument(level = "debug", skip(self), fields(policy = ?self.config.policy))]
    pub async fn scrape(&self) -> Result<ScrapeReport, CoreError> {
        let started = Instant::now();
        let up = self.registry.up();

        let mut session = match self.source.connect().await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "database unreachable");
                up.set(&[], 0.0)?;
                return Err(e.into());
            }
        };

        let mut report = ScrapeReport::default();
        for def in self.registry.queries() {
            match self.run(session.as_mut(), def).await {
                Ok(()) => report.collected += 1,
                Err(e) => match self.config.policy {
                    ScrapePolicy::FailScrape => {
                        error!(query = def.name(), error = %e, "scrape aborted");
                        up.set(&[], 0.0)?;
                        return Err(e.in_query(def.name()));
                    }
                    ScrapePolicy::SkipQuery => {
                        warn!(query = def.name(), error = %e, "query skipped");
                        report.skipped.push((def.name().to_string(), e.to_string()));
                    }
                },
            }
        }

        up.set(&[], 1.0)?;
        report.elapsed = started.elapsed();
        debug!(
            collected = report.collected,
            skipped = report.skipped.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "scrape finished"
        );
        Ok(report)
    }

    async fn run(
        &self,
        session: &mut dyn Session,
        def: &dyn QueryDefinition,
    ) -> Result<(), CoreError> {
        let limit = self.config.query_timeout;
        let rows = tokio::time::timeout(limit, session.query(def.query()))
            .await
            .map_err(|_| SourceError::Timeout(limit.as_millis() as u64))??;

        debug!(query = def.name(), rows = rows.len(), "query returned");
        def.collect(&rows)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{Cell, RawRow, row};

    #[derive(Clone)]
    enum Reply {
        Rows(Vec<RawRow>),
        Fail,
        Hang,
    }

    #[derive(Default)]
    struct FakeSource {
        replies: HashMap<&'static str, Reply>,
        unreachable: bool,
        connects: AtomicUsize,
    }

    struct FakeSession(HashMap<&'static str, Reply>);

    #[async_trait]
    impl DataSource for FakeSource {
        async fn connect(&self) -> Result<Box<dyn Session>, SourceError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.unreachable {
                return Err(SourceError::Connect("connection refused".into()));
            }
            Ok(Box::new(FakeSession(self.replies.clone())))
        }
    }

    #[async_trait]
    impl Session for FakeSession {
        async fn query(&mut self, sql: &str) -> Result<Vec<RawRow>, SourceError> {
            match self.0.get(sql).cloned().unwrap_or(Reply::Rows(Vec::new())) {
                Reply::Rows(rows) => Ok(rows),
                Reply::Fail => Err(SourceError::Query("deadlock victim".into())),
                Reply::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Vec::new())
                }
            }
        }
    }

    fn sql_of(registry: &Registry, name: &str) -> &'static str {
        registry
            .queries()
            .find(|q| q.name() == name)
            .map(|q| q.query())
            .unwrap()
    }

    fn healthy(registry: &Registry) -> FakeSource {
        let mut source = FakeSource::default();
        source.replies.insert(
            sql_of(registry, "mssql_instance_local_time"),
            Reply::Rows(vec![row![1_700_000_000_i64]]),
        );
        source.replies.insert(
            sql_of(registry, "mssql_connections"),
            Reply::Rows(vec![row!["master", 4_i64]]),
        );
        source.replies.insert(
            sql_of(registry, "mssql_io_stall"),
            Reply::Rows(vec![row!["master", 1_i64, 2_i64, 3_i64, 4_i64, 5_i64]]),
        );
        source
    }

    fn collector(source: FakeSource, policy: ScrapePolicy) -> (Collector<FakeSource>, Arc<FakeSource>) {
        let registry = Arc::new(Registry::with_defaults().unwrap());
        let source = Arc::new(source);
        let config = CollectorConfig {
            policy,
            query_timeout: Duration::from_millis(100),
        };
        (
            Collector::new(registry, Arc::clone(&source), config),
            source,
        )
    }

    #[tokio::test]
    async fn successful_scrape_sets_up() {
        let registry = Registry::with_defaults().unwrap();
        let (c, _) = collector(healthy(&registry), ScrapePolicy::FailScrape);

        let report = c.scrape().await.unwrap();
        assert_eq!(report.collected, 3);
        assert!(report.skipped.is_empty());
        assert_eq!(c.registry().up().value(&[]), Some(1.0));

        let text = c.registry().render().unwrap();
        assert!(text.contains("mssql_io_stall_total{database=\"master\"} 3"));
    }

    #[tokio::test]
    async fn background_sessions_do_not_fail_the_scrape() {
        let registry = Registry::with_defaults().unwrap();
        let mut source = healthy(&registry);
        source.replies.insert(
            sql_of(&registry, "mssql_connections"),
            Reply::Rows(vec![
                row!["master", 4_i64],
                RawRow::new(vec![Cell::Null, Cell::Int(22)]),
            ]),
        );
        let (c, _) = collector(source, ScrapePolicy::default());

        let report = c.scrape().await.unwrap();
        assert_eq!(report.collected, 3);
        assert_eq!(c.registry().up().value(&[]), Some(1.0));

        let text = c.registry().render().unwrap();
        assert!(text.contains("mssql_connections{database=\"master\",state=\"current\"} 4"));
    }

    #[tokio::test]
    async fn unreachable_source_sets_up_zero() {
        let source = FakeSource {
            unreachable: true,
            ..Default::default()
        };
        let (c, source) = collector(source, ScrapePolicy::FailScrape);

        let err = c.scrape().await.unwrap_err();
        assert!(matches!(err, CoreError::Source(SourceError::Connect(_))));
        assert_eq!(c.registry().up().value(&[]), Some(0.0));
        assert_eq!(source.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_query_aborts_under_fail_scrape() {
        let registry = Registry::with_defaults().unwrap();
        let mut source = healthy(&registry);
        source
            .replies
            .insert(sql_of(&registry, "mssql_connections"), Reply::Fail);
        let (c, _) = collector(source, ScrapePolicy::FailScrape);

        let err = c.scrape().await.unwrap_err();
        assert!(matches!(err, CoreError::Query { query: "mssql_connections", .. }));
        assert_eq!(c.registry().up().value(&[]), Some(0.0));

        // io_stall runs after the failing query and is never reached
        let stall = c.registry().queries().nth(2).unwrap();
        assert!(stall.metrics().get("mssql_io_stall").unwrap().observed().is_empty());
    }

    #[tokio::test]
    async fn failing_query_is_skipped_under_skip_query() {
        let registry = Registry::with_defaults().unwrap();
        let mut source = healthy(&registry);
        source.replies.insert(
            sql_of(&registry, "mssql_instance_local_time"),
            Reply::Rows(Vec::new()),
        );
        let (c, _) = collector(source, ScrapePolicy::SkipQuery);

        let report = c.scrape().await.unwrap();
        assert_eq!(report.collected, 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].0, "mssql_instance_local_time");
        assert_eq!(c.registry().up().value(&[]), Some(1.0));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_query_times_out() {
        let registry = Registry::with_defaults().unwrap();
        let mut source = healthy(&registry);
        source
            .replies
            .insert(sql_of(&registry, "mssql_io_stall"), Reply::Hang);
        let (c, _) = collector(source, ScrapePolicy::FailScrape);

        let err = c.scrape().await.unwrap_err();
        match err {
            CoreError::Query { source, .. } => {
                assert!(matches!(*source, CoreError::Source(SourceError::Timeout(100))))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn policy_from_str() {
        assert_eq!("fail".parse::<ScrapePolicy>().unwrap(), ScrapePolicy::FailScrape);
        assert_eq!(" Skip ".parse::<ScrapePolicy>().unwrap(), ScrapePolicy::SkipQuery);
        assert!("retry".parse::<ScrapePolicy>().is_err());
    }
}
