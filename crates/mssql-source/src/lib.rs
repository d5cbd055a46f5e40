//! SQL Server [`DataSource`](mssql_core::DataSource) over TDS.
//!
//! Every scrape opens a new connection and closes it when the session is
//! dropped; no pool is kept between scrapes.

mod config;
pub use config::SourceConfig;

mod tds;
pub use tds::TdsSource;
