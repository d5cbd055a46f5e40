//! Scrape endpoint of the exporter.
//!
//! [`MetricsHandler`] abstracts what a scrape does; [`CollectorAdapter`] is
//! the ready-made implementation over [`mssql_core::Collector`].

mod error;
pub use error::ApiError;

mod handler;
pub use handler::{Exposition, MetricsHandler};

mod adapter;
pub use adapter::CollectorAdapter;

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::HttpApi;

#[cfg(feature = "http")]
pub use axum;
