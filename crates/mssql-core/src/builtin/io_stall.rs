use tracing::debug;

use crate::{
    error::CoreError,
    metric::MetricGauge,
    query::{Metrics, Query},
    row::{FromRow, RawRow},
};

const NAME: &str = "mssql_io_stall";
const TOTAL: &str = "mssql_io_stall_total";
const HELP: &str = "Wait time (ms) of stall since last restart";
const SQL: &str = "SELECT
cast(DB_Name(a.database_id) as varchar) as name,
    max(io_stall_read_ms),
    max(io_stall_write_ms),
    max(io_stall),
    max(io_stall_queued_read_ms),
    max(io_stall_queued_write_ms)
FROM
sys.dm_io_virtual_file_stats(null, null) a
INNER JOIN sys.master_files b ON a.database_id = b.database_id and a.file_id = b.file_id
group by a.database_id";

/// Cumulative stall times of one database, milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct IoStallRow {
    pub database: String,
    pub read: f64,
    pub write: f64,
    pub total: f64,
    pub queued_read: f64,
    pub queued_write: f64,
}

impl FromRow for IoStallRow {
    const COLUMNS: usize = 6;

    fn decode(row: &RawRow) -> Result<Self, CoreError> {
        Ok(Self {
            database: row.text_at(0)?,
            read: row.f64_at(1)?,
            write: row.f64_at(2)?,
            total: row.f64_at(3)?,
            queued_read: row.f64_at(4)?,
            queued_write: row.f64_at(5)?,
        })
    }
}

pub fn io_stall() -> Result<Query<IoStallRow>, CoreError> {
    let metrics = Metrics::new()
        .with(NAME, MetricGauge::new(NAME, HELP, &["database", "type"])?)
        .with(TOTAL, MetricGauge::new(TOTAL, HELP, &["database"])?);
    Ok(Query::new(NAME, SQL, metrics, project))
}

fn project(rows: &[IoStallRow], metrics: &Metrics) -> Result<(), CoreError> {
    let by_type = metrics.get(NAME)?;
    let total = metrics.get(TOTAL)?;

    for row in rows {
        let db = row.database.as_str();
        debug!(database = db, "fetched io stalls");

        total.set(&[db], row.total)?;
        for (kind, value) in [
            ("read", row.read),
            ("write", row.write),
            ("queued_read", row.queued_read),
            ("queued_write", row.queued_write),
        ] {
            by_type.set(&[db, kind], value)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{QueryDefinition, row};

    #[test]
    fn fans_out_one_row_into_five_series() {
        let q = io_stall().unwrap();
        q.collect(&[row!["db1", 10_i64, 20_i64, 30_i64, 1_i64, 2_i64]])
            .unwrap();

        let total = q.metrics().get(TOTAL).unwrap();
        let typed = q.metrics().get(NAME).unwrap();
        assert_eq!(total.value(&["db1"]), Some(30.0));
        assert_eq!(typed.value(&["db1", "read"]), Some(10.0));
        assert_eq!(typed.value(&["db1", "write"]), Some(20.0));
        assert_eq!(typed.value(&["db1", "queued_read"]), Some(1.0));
        assert_eq!(typed.value(&["db1", "queued_write"]), Some(2.0));
        assert_eq!(typed.observed().len(), 4);
    }

    #[test]
    fn short_row_is_missing_column() {
        let q = io_stall().unwrap();
        let err = q.collect(&[row!["db1", 10_i64, 20_i64]]).unwrap_err();
        match err {
            CoreError::Query { source, .. } => {
                assert!(matches!(*source, CoreError::MissingColumn { index: 3 }))
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
