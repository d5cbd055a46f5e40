use tracing::debug;

use crate::{
    error::CoreError,
    metric::MetricGauge,
    query::{Metrics, Query},
    row::{FromRow, RawRow},
};

const NAME: &str = "mssql_instance_local_time";
const SQL: &str = "SELECT DATEDIFF(second, '19700101', GETUTCDATE())";

/// Server clock, seconds since the unix epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalTimeRow {
    pub seconds: f64,
}

impl FromRow for LocalTimeRow {
    const COLUMNS: usize = 1;

    fn decode(row: &RawRow) -> Result<Self, CoreError> {
        Ok(Self {
            seconds: row.f64_at(0)?,
        })
    }
}

pub fn local_time() -> Result<Query<LocalTimeRow>, CoreError> {
    let metrics = Metrics::new().with(
        NAME,
        MetricGauge::new(NAME, "Number of seconds since epoch on local instance", &[])?,
    );
    Ok(Query::new(NAME, SQL, metrics, project))
}

fn project(rows: &[LocalTimeRow], metrics: &Metrics) -> Result<(), CoreError> {
    let row = rows.first().ok_or(CoreError::MissingRow {
        query: NAME,
        index: 0,
    })?;
    debug!(seconds = row.seconds, "fetched instance local time");
    metrics.get(NAME)?.set(&[], row.seconds)
}
