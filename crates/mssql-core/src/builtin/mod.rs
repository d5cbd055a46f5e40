//! Queries shipped with the exporter.
//!
//! Adding a metric means adding one more module here: a typed row, a
//! [`Query`](crate::Query) constructor and its projection, then listing the
//! constructor in [`defaults`]. Prefer deriving several series from one row
//! over issuing one query per series.

mod connections;
mod io_stall;
mod local_time;

pub use connections::{ConnectionsRow, connections};
pub use io_stall::{IoStallRow, io_stall};
pub use local_time::{LocalTimeRow, local_time};

use crate::{error::CoreError, query::QueryDefinition};

/// Built-in definitions in registration order.
pub fn defaults() -> Result<Vec<Box<dyn QueryDefinition>>, CoreError> {
    Ok(vec![
        Box::new(local_time()?),
        Box::new(connections()?),
        Box::new(io_stall()?),
    ])
}
