use std::marker::PhantomData;

use crate::{
    error::CoreError,
    metric::MetricGauge,
    row::{FromRow, RawRow},
};

/// Gauges owned by one query, keyed by a local name, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    entries: Vec<(&'static str, MetricGauge)>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a gauge under `key`. Keys are unique within one query.
    pub fn with(mut self, key: &'static str, gauge: MetricGauge) -> Self {
        debug_assert!(
            self.entries.iter().all(|(k, _)| *k != key),
            "duplicate metric key `{key}`"
        );
        self.entries.push((key, gauge));
        self
    }

    pub fn get(&self, key: &'static str) -> Result<&MetricGauge, CoreError> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, g)| g)
            .ok_or(CoreError::UnknownMetric(key))
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricGauge> {
        self.entries.iter().map(|(_, g)| g)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Row projection: writes gauge readings for a batch of typed rows.
pub type Project<R> = fn(&[R], &Metrics) -> Result<(), CoreError>;

/// Object-safe view of a query definition, as stored in the registry.
pub trait QueryDefinition: Send + Sync + 'static {
    fn name(&self) -> &'static str;
    fn query(&self) -> &'static str;
    fn metrics(&self) -> &Metrics;

    /// Decode `rows` and fold them into the gauges.
    fn collect(&self, rows: &[RawRow]) -> Result<(), CoreError>;
}

/// A SQL statement bound to its gauges and a typed projection.
pub struct Query<R> {
    name: &'static str,
    sql: &'static str,
    metrics: Metrics,
    project: Project<R>,
    _row: PhantomData<fn() -> R>,
}

impl<R: FromRow> Query<R> {
    pub fn new(name: &'static str, sql: &'static str, metrics: Metrics, project: Project<R>) -> Self {
        Self {
            name,
            sql,
            metrics,
            project,
            _row: PhantomData,
        }
    }

    /// Run the projection on already typed rows.
    pub fn apply(&self, rows: &[R]) -> Result<(), CoreError> {
        (self.project)(rows, &self.metrics)
    }
}

impl<R: FromRow> QueryDefinition for Query<R> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn query(&self) -> &'static str {
        self.sql
    }

    fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn collect(&self, rows: &[RawRow]) -> Result<(), CoreError> {
        // decode everything first so a bad row leaves the gauges untouched
        let typed = rows
            .iter()
            .map(R::from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.in_query(self.name))?;

        self.apply(&typed).map_err(|e| e.in_query(self.name))
    }
}
