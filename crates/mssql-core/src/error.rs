use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("metric '{0}' is already registered")]
    DuplicateMetricName(String),

    #[error("metric '{metric}' expects {expected} label values, got {got}")]
    LabelArityMismatch {
        metric: String,
        expected: usize,
        got: usize,
    },

    #[error("query '{query}' returned no row at index {index}")]
    MissingRow { query: &'static str, index: usize },

    #[error("row has no column at index {index}")]
    MissingColumn { index: usize },

    #[error("row has {got} columns, expected {expected}")]
    UnexpectedColumns { expected: usize, got: usize },

    #[error("column {index}: expected {expected}, found {found}")]
    ColumnType {
        index: usize,
        expected: &'static str,
        found: String,
    },

    #[error("unknown metric key: {0}")]
    UnknownMetric(&'static str),

    #[error("invalid metric definition: {0}")]
    InvalidMetric(String),

    #[error("invalid scrape policy: {0} (expected: fail|skip)")]
    InvalidPolicy(String),

    #[error("query '{query}' failed: {source}")]
    Query {
        query: &'static str,
        #[source]
        source: Box<CoreError>,
    },

    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

impl CoreError {
    /// Attach the failing query name to an error raised while collecting it.
    pub fn in_query(self, query: &'static str) -> Self {
        match self {
            CoreError::Query { .. } => self,
            other => CoreError::Query {
                query,
                source: Box::new(other),
            },
        }
    }
}

/// Errors surfaced by a [`DataSource`](crate::DataSource) implementation.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("timed out after {0} ms")]
    Timeout(u64),
}
