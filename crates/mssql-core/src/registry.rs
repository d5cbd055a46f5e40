use std::collections::HashSet;

use prometheus::TextEncoder;
use tracing::{debug, instrument};

use crate::{
    builtin,
    error::CoreError,
    metric::{MetricDescriptor, MetricGauge},
    query::QueryDefinition,
};

pub const UP: &str = "up";
const UP_HELP: &str = "UP Status";

/// Every exported series of the process, assembled once at startup.
///
/// Query gauges and the exporter's own health series live in separate
/// prometheus registries so a failed scrape can expose the latter alone.
pub struct Registry {
    series: prometheus::Registry,
    health: prometheus::Registry,
    names: HashSet<String>,
    up: MetricGauge,
    queries: Vec<Box<dyn QueryDefinition>>,
}

impl Registry {
    /// Registry holding only the `up` gauge.
    pub fn new() -> Result<Self, CoreError> {
        let up = MetricGauge::new(UP, UP_HELP, &[])?;
        let health = prometheus::Registry::new();
        health.register(up.collector())?;
        register_self_health(&health)?;

        Ok(Self {
            series: prometheus::Registry::new(),
            health,
            names: HashSet::from([UP.to_string()]),
            up,
            queries: Vec::new(),
        })
    }

    /// Registry with the built-in queries.
    pub fn with_defaults() -> Result<Self, CoreError> {
        let mut registry = Self::new()?;
        for def in builtin::defaults()? {
            registry.register_boxed(def)?;
        }
        Ok(registry)
    }

    pub fn register<Q: QueryDefinition>(&mut self, def: Q) -> Result<(), CoreError> {
        self.register_boxed(Box::new(def))
    }

    /// Appends `def`; nothing is registered if any of its names is taken.
    #[instrument(level = "debug", skip(self, def), fields(query = def.name()))]
    pub fn register_boxed(&mut self, def: Box<dyn QueryDefinition>) -> Result<(), CoreError> {
        let mut fresh = HashSet::new();
        for gauge in def.metrics().iter() {
            let name = gauge.name();
            if self.names.contains(name) || !fresh.insert(name.to_string()) {
                return Err(CoreError::DuplicateMetricName(name.to_string()));
            }
        }
        for gauge in def.metrics().iter() {
            self.series.register(gauge.collector())?;
        }

        debug!(metrics = def.metrics().len(), "query registered");
        self.names.extend(fresh);
        self.queries.push(def);
        Ok(())
    }

    #[inline]
    pub fn up(&self) -> &MetricGauge {
        &self.up
    }

    pub fn queries(&self) -> impl Iterator<Item = &dyn QueryDefinition> {
        self.queries.iter().map(|q| q.as_ref())
    }

    /// Query descriptors in registration order, then `up`.
    pub fn descriptors(&self) -> impl Iterator<Item = &MetricDescriptor> {
        self.queries
            .iter()
            .flat_map(|q| q.metrics().iter().map(MetricGauge::descriptor))
            .chain(std::iter::once(self.up.descriptor()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Full text exposition.
    pub fn render(&self) -> Result<String, CoreError> {
        let mut families = self.series.gather();
        families.extend(self.health.gather());
        Ok(TextEncoder::new().encode_to_string(&families)?)
    }

    /// Full exposition minus the series of the named queries.
    pub fn render_without(&self, queries: &[&str]) -> Result<String, CoreError> {
        let mut out = String::new();
        for def in self.queries.iter().filter(|q| !queries.contains(&q.name())) {
            for gauge in def.metrics().iter() {
                out.push_str(&gauge.render()?);
            }
        }
        out.push_str(&self.render_liveness()?);
        Ok(out)
    }

    /// Exposition of `up` and the self-health series only.
    pub fn render_liveness(&self) -> Result<String, CoreError> {
        Ok(TextEncoder::new().encode_to_string(&self.health.gather())?)
    }
}

#[cfg(all(feature = "process", target_os = "linux"))]
fn register_self_health(health: &prometheus::Registry) -> Result<(), CoreError> {
    use prometheus::process_collector::ProcessCollector;
    health.register(Box::new(ProcessCollector::for_self()))?;
    Ok(())
}

#[cfg(not(all(feature = "process", target_os = "linux")))]
fn register_self_health(_health: &prometheus::Registry) -> Result<(), CoreError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        query::{Metrics, Query},
        row::{FromRow, RawRow},
    };

    struct One(f64);

    impl FromRow for One {
        const COLUMNS: usize = 1;

        fn decode(row: &RawRow) -> Result<Self, CoreError> {
            Ok(Self(row.f64_at(0)?))
        }
    }

    fn single(name: &'static str) -> Query<One> {
        let metrics = Metrics::new().with("g", MetricGauge::new(name, "help", &[]).unwrap());
        Query::new(name, "SELECT 1", metrics, |_, _| Ok(()))
    }

    #[test]
    fn defaults_have_unique_names() {
        let registry = Registry::with_defaults().unwrap();
        let names: Vec<_> = registry.descriptors().map(|d| d.name.clone()).collect();
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(names.len(), unique.len());
        assert_eq!(
            names,
            [
                "mssql_instance_local_time",
                "mssql_connections",
                "mssql_io_stall",
                "mssql_io_stall_total",
                "up",
            ]
        );
    }

    #[test]
    fn duplicate_name_fails() {
        let mut registry = Registry::with_defaults().unwrap();
        let err = registry.register(single("mssql_connections")).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateMetricName(n) if n == "mssql_connections"));
        assert_eq!(registry.queries().count(), 3);
    }

    #[test]
    fn up_is_reserved() {
        let mut registry = Registry::new().unwrap();
        let err = registry.register(single("up")).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateMetricName(n) if n == "up"));
    }

    #[test]
    fn duplicate_within_one_definition_fails() {
        let metrics = Metrics::new()
            .with("a", MetricGauge::new("twice", "help", &[]).unwrap())
            .with("b", MetricGauge::new("twice", "help", &[]).unwrap());
        let q: Query<One> = Query::new("twice", "SELECT 1", metrics, |_, _| Ok(()));

        let mut registry = Registry::new().unwrap();
        assert!(matches!(
            registry.register(q),
            Err(CoreError::DuplicateMetricName(_))
        ));
        assert!(!registry.contains("twice"));
    }

    #[test]
    fn liveness_excludes_query_series() {
        let registry = Registry::with_defaults().unwrap();
        let conn = registry.queries().nth(1).unwrap();
        conn.metrics()
            .get("mssql_connections")
            .unwrap()
            .set(&["db1", "current"], 3.0)
            .unwrap();
        registry.up().set(&[], 0.0).unwrap();

        let full = registry.render().unwrap();
        assert!(full.contains("mssql_connections{database=\"db1\",state=\"current\"} 3"));
        assert!(full.contains("up 0"));

        let live = registry.render_liveness().unwrap();
        assert!(live.contains("up 0"));
        assert!(!live.contains("mssql_connections"));
    }

    #[test]
    fn render_without_drops_only_the_named_query() {
        let registry = Registry::with_defaults().unwrap();
        let mut queries = registry.queries();
        let local = queries.next().unwrap();
        let conn = queries.next().unwrap();
        local
            .metrics()
            .get("mssql_instance_local_time")
            .unwrap()
            .set(&[], 1_700_000_000.0)
            .unwrap();
        conn.metrics()
            .get("mssql_connections")
            .unwrap()
            .set(&["db1", "current"], 9.0)
            .unwrap();
        registry.up().set(&[], 1.0).unwrap();

        let text = registry.render_without(&["mssql_connections"]).unwrap();
        assert!(text.contains("mssql_instance_local_time 1700000000"));
        assert!(!text.contains("mssql_connections"));
        assert!(text.contains("up 1"));
    }
}
