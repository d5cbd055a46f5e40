//! Queryless description of what the exporter collects, aimed at DBAs.

use std::fmt::Write;

use serde::Serialize;

use crate::{metric::MetricDescriptor, registry::Registry};

/// Every query with its SQL, followed by a summary of all series.
///
/// ```text
/// -- mssql_connections Number of active connections
/// SELECT ...;
///
/// /*
/// *  mssql_connections{database,state} Number of active connections
/// */
/// ```
pub fn render(registry: &Registry) -> String {
    let mut out = String::new();

    for q in registry.queries() {
        for d in q.metrics().iter().map(|g| g.descriptor()) {
            let _ = writeln!(out, "-- {} {}", d.name, d.help);
        }
        let _ = writeln!(out, "{};", q.query());
        out.push('\n');
    }

    out.push_str("/*\n");
    for d in registry.descriptors() {
        let _ = writeln!(out, "*  {} {}", d.signature(), d.help);
    }
    out.push_str("*/\n");
    out
}

/// Serializable form of the registry contents.
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    pub queries: Vec<CatalogQuery>,
    pub up: MetricDescriptor,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogQuery {
    pub name: String,
    pub query: String,
    pub metrics: Vec<MetricDescriptor>,
}

impl Catalog {
    pub fn from_registry(registry: &Registry) -> Self {
        let queries = registry
            .queries()
            .map(|q| CatalogQuery {
                name: q.name().to_string(),
                query: q.query().to_string(),
                metrics: q.metrics().iter().map(|g| g.descriptor().clone()).collect(),
            })
            .collect();

        Self {
            queries,
            up: registry.up().descriptor().clone(),
        }
    }
}
