//! Transfer orchestrator - sequences probe, plan, and the page copy loop.
//!
//! One run walks INIT → stats gathered → planned → copying → done; any
//! storage failure aborts the remaining pages and surfaces as an error with
//! the phase attached. Pages already written stay written — the target may be
//! left partially populated after a mid-run failure, and a re-run is safe
//! only because every page write is an idempotent upsert.

use crate::error::{CopyError, Result};
use crate::plan::{PlanParams, SourceStats, TransferPlan};
use crate::progress::{human_bytes, ProgressEvent, ProgressSink};
use crate::store::{SourceReader, TargetWriter};
use crate::transfer::CopyWorker;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Final status of a run that did not error out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Cancelled,
}

/// Result of a transfer run.
#[derive(Debug, Clone, Serialize)]
pub struct TransferSummary {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status.
    pub status: RunStatus,

    /// Source row count at probe time.
    pub total_rows: i64,

    /// Rows actually copied (0 for a dry run).
    pub rows_copied: i64,

    /// Pages the plan called for.
    pub pages_planned: i32,

    /// Pages whose write completed.
    pub pages_copied: i32,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run finished.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Average throughput (rows/second).
    pub rows_per_second: i64,
}

impl TransferSummary {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Drives one transfer from a source reader to a target writer, reporting
/// through the injected progress sink.
pub struct TransferOrchestrator<R, W, S> {
    reader: R,
    writer: W,
    sink: S,
    params: PlanParams,
}

impl<R, W, S> TransferOrchestrator<R, W, S>
where
    R: SourceReader,
    W: TargetWriter,
    S: ProgressSink,
{
    /// Create an orchestrator with the compiled-in sizing constants.
    pub fn new(reader: R, writer: W, sink: S) -> Self {
        Self {
            reader,
            writer,
            sink,
            params: PlanParams::default(),
        }
    }

    /// Override the sizing parameters (tests and benchmarks).
    pub fn with_params(mut self, params: PlanParams) -> Self {
        self.params = params;
        self
    }

    /// Run the transfer.
    ///
    /// With `dry_run` set, probes and plans but copies nothing. A cancelled
    /// token stops the run between pages; the page in flight always
    /// completes its write first.
    pub async fn run(
        &self,
        cancel: Option<CancellationToken>,
        dry_run: bool,
    ) -> Result<TransferSummary> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!("Starting transfer run: {}", run_id);

        // Probe failures are fatal before any chunking work begins.
        let total_rows = self.reader.count().await.map_err(CopyError::probe)?;
        let total_bytes = self
            .reader
            .physical_size()
            .await
            .map_err(CopyError::probe)?;
        let stats = SourceStats {
            total_rows,
            total_bytes,
        };
        self.sink.emit(&ProgressEvent::Stats {
            total_rows,
            total_bytes,
        });

        let plan = match TransferPlan::derive(stats, &self.params) {
            Some(plan) => plan,
            None => {
                // Zero rows: a valid, already-complete run with zero pages.
                info!("No rows to transfer.");
                self.sink.emit(&ProgressEvent::Complete {
                    total_rows: 0,
                    pages: 0,
                });
                return Ok(self.finish(run_id, RunStatus::Completed, 0, 0, 0, 0, started_at));
            }
        };

        self.sink.emit(&ProgressEvent::Planned {
            avg_row_bytes: plan.avg_row_bytes,
            chunk_size: plan.chunk_size,
            page_count: plan.page_count,
        });
        debug!(
            "Page boundaries fixed from point-in-time stats; rows appended after \
             the probe are not guaranteed to be included in this run."
        );

        if dry_run {
            info!(
                "Dry run: {} pages of {} rows (~{} per fetch), copying nothing",
                plan.page_count,
                plan.chunk_size,
                human_bytes(plan.estimated_chunk_bytes())
            );
            return Ok(self.finish(
                run_id,
                RunStatus::Completed,
                total_rows,
                0,
                plan.page_count,
                0,
                started_at,
            ));
        }

        let worker = CopyWorker::new(&self.reader, &self.writer, &self.sink, plan.avg_row_bytes);
        let mut rows_copied = 0i64;
        let mut pages_copied = 0i32;
        let mut cancelled = false;

        for page in plan.pages() {
            if cancel.as_ref().is_some_and(|token| token.is_cancelled()) {
                warn!(
                    "Cancellation requested after page {} of {}; stopping",
                    pages_copied, plan.page_count
                );
                cancelled = true;
                break;
            }

            rows_copied += worker.copy_page(&page).await?;
            pages_copied += 1;
        }

        let status = if cancelled {
            RunStatus::Cancelled
        } else {
            self.sink.emit(&ProgressEvent::Complete {
                total_rows: rows_copied,
                pages: pages_copied,
            });
            RunStatus::Completed
        };

        Ok(self.finish(
            run_id,
            status,
            total_rows,
            rows_copied,
            plan.page_count,
            pages_copied,
            started_at,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        run_id: String,
        status: RunStatus,
        total_rows: i64,
        rows_copied: i64,
        pages_planned: i32,
        pages_copied: i32,
        started_at: DateTime<Utc>,
    ) -> TransferSummary {
        let completed_at = Utc::now();
        let duration_seconds = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;
        let rows_per_second = if duration_seconds > 0.0 {
            (rows_copied as f64 / duration_seconds) as i64
        } else {
            0
        };

        info!(
            "Transfer {:?}: {} of {} rows in {} of {} pages ({:.2}s)",
            status, rows_copied, total_rows, pages_copied, pages_planned, duration_seconds
        );

        TransferSummary {
            run_id,
            status,
            total_rows,
            rows_copied,
            pages_planned,
            pages_copied,
            started_at,
            completed_at,
            duration_seconds,
            rows_per_second,
        }
    }
}
