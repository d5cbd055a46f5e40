use tracing::debug;

use crate::{
    error::CoreError,
    metric::MetricGauge,
    query::{Metrics, Query},
    row::{FromRow, RawRow},
};

const NAME: &str = "mssql_connections";
const SQL: &str = "SELECT DB_NAME(sP.dbid)
        , COUNT(sP.spid)
FROM sys.sysprocesses sP
GROUP BY DB_NAME(sP.dbid)";

/// Session count of one database.
///
/// Background sessions have `dbid = 0`, for which `DB_NAME` yields `NULL`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionsRow {
    pub database: Option<String>,
    pub sessions: f64,
}

impl FromRow for ConnectionsRow {
    const COLUMNS: usize = 2;

    fn decode(row: &RawRow) -> Result<Self, CoreError> {
        Ok(Self {
            database: row.opt_text_at(0)?,
            sessions: row.f64_at(1)?,
        })
    }
}

pub fn connections() -> Result<Query<ConnectionsRow>, CoreError> {
    let metrics = Metrics::new().with(
        NAME,
        MetricGauge::new(NAME, "Number of active connections", &["database", "state"])?,
    );
    Ok(Query::new(NAME, SQL, metrics, project))
}

// Databases missing from the result keep their last reading.
fn project(rows: &[ConnectionsRow], metrics: &Metrics) -> Result<(), CoreError> {
    let gauge = metrics.get(NAME)?;
    for row in rows {
        let Some(database) = row.database.as_deref() else {
            debug!(sessions = row.sessions, "skipping sessions without a database");
            continue;
        };
        debug!(database, sessions = row.sessions, "fetched connections");
        gauge.set(&[database, "current"], row.sessions)?;
    }
    Ok(())
}
