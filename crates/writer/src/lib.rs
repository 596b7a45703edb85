//! # Writer Crate
//!
//! Persists the analytic views through the [`ResultSink`] upsert contract
//! and keeps the append-only run history.
//!
//! - **sink**: the `ResultSink` trait, `WriteMode`, `ViewBatch`
//! - **sqlite**: SQLite store (sqlx), one transaction per view
//! - **memory**: in-process store with failure injection
//! - **result_writer**: `ResultWriter::persist` and run status rules
//! - **stats**: per-view aggregates over stored rows
//! - **summary**: `RunSummary` / `RunStatus`

pub mod error;
pub mod memory;
pub mod result_writer;
pub mod sink;
pub mod sqlite;
pub mod stats;
pub mod summary;

pub use error::{Result, SinkError};
pub use memory::MemorySink;
pub use result_writer::{ResultWriter, ViewOutcome};
pub use sink::{ResultSink, ViewBatch, WriteMode};
pub use sqlite::SqliteSink;
pub use stats::{StoredSummary, ViewStats};
pub use summary::{RunStatus, RunSummary};

use std::sync::Arc;

/// URL selecting the in-process sink
pub const MEMORY_SINK_URL: &str = "memory";

/// Open the sink named by `url`: `memory` or any SQLite DSN
pub async fn connect(url: &str) -> Result<Arc<dyn ResultSink>> {
    if url == MEMORY_SINK_URL {
        return Ok(Arc::new(MemorySink::new()));
    }
    Ok(Arc::new(SqliteSink::connect(url).await?))
}
