//! Declarative mapping from SQL Server queries to prometheus gauges.
//!
//! A [`Registry`] holds an ordered list of [`QueryDefinition`]s plus the `up`
//! liveness gauge. On every scrape the [`Collector`] opens one session on a
//! [`DataSource`], runs each query in order and hands the rows to the
//! query's projection, which only ever calls [`MetricGauge::set`].
//!
//! ## Metrics
//! - `mssql_instance_local_time` - Gauge
//! - `mssql_connections{database, state}` - Gauge
//! - `mssql_io_stall{database, type}` - Gauge
//! - `mssql_io_stall_total{database}` - Gauge
//! - `up` - Gauge, set by the collector
//!
//! ## Example
//! ```rust
//! use mssql_core::{QueryDefinition, Registry, row};
//!
//! # fn main() -> Result<(), mssql_core::CoreError> {
//! let registry = Registry::with_defaults()?;
//! let conn = registry.queries().nth(1).unwrap();
//! conn.collect(&[row!["master", 3_i64]])?;
//!
//! assert!(registry.render()?.contains(r#"mssql_connections{database="master",state="current"} 3"#));
//! # Ok(())
//! # }
//! ```

pub mod builtin;
pub mod docs;

mod collector;
pub use collector::{Collector, CollectorConfig, ScrapePolicy, ScrapeReport};

mod error;
pub use error::{CoreError, SourceError};

mod metric;
pub use metric::{MetricDescriptor, MetricGauge};

mod query;
pub use query::{Metrics, Project, Query, QueryDefinition};

mod registry;
pub use registry::{Registry, UP};

mod row;
pub use row::{Cell, FromRow, RawRow};

mod source;
pub use source::{DataSource, Session};

pub use prometheus::{Encoder, TEXT_FORMAT, TextEncoder};
