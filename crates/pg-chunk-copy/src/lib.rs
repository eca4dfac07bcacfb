//! # pg-chunk-copy
//!
//! Adaptive chunked bulk-copy engine for PostgreSQL relations.
//!
//! Migrates all rows of one relation into an equivalent relation in a
//! different schema without ever materializing the full table in memory:
//!
//! - **Stats-driven sizing**: rows per batch derived from the relation's
//!   actual on-disk footprint, clamped to sane bounds
//! - **Page-by-page cursor** over a stable `id` ordering
//! - **Idempotent bulk upserts**, so a re-run after a failure is safe
//! - **Structured progress events** through an injected sink
//!
//! ## Example
//!
//! ```rust,no_run
//! use pg_chunk_copy::{Config, PgSourceReader, PgTargetWriter, TracingSink, TransferOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), pg_chunk_copy::CopyError> {
//!     let config = Config::load("config.yaml")?;
//!     let reader = PgSourceReader::connect(&config.source).await?;
//!     let writer = PgTargetWriter::connect(&config.target).await?;
//!     let orchestrator = TransferOrchestrator::new(reader, writer, TracingSink);
//!     let summary = orchestrator.run(None, false).await?;
//!     println!("Copied {} rows", summary.rows_copied);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod plan;
pub mod progress;
pub mod store;
pub mod transfer;

// Re-exports for convenient access
pub use config::{Config, EndpointConfig};
pub use error::{CopyError, Result, StorageError};
pub use orchestrator::{RunStatus, TransferOrchestrator, TransferSummary};
pub use plan::{
    derive_chunk_size, Page, PlanParams, SourceStats, TransferPlan, MAX_CHUNK_ROWS,
    MIN_CHUNK_ROWS, TARGET_BYTES_PER_FETCH,
};
pub use progress::{human_bytes, JsonLineSink, ProgressEvent, ProgressSink, TracingSink};
pub use store::{PgSourceReader, PgTargetWriter, SourceReader, SourceRecord, TargetRecord, TargetWriter};
pub use transfer::{map_record, CopyWorker};
