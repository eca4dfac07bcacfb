//! Page copy worker: fetch, transform, bulk write.

use crate::error::{CopyError, Result};
use crate::plan::Page;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::store::{SourceReader, SourceRecord, TargetRecord, TargetWriter};
use tracing::debug;

/// Transform one source record into its target counterpart.
///
/// Total, pure, and id-preserving. The mapping is a field-for-field copy
/// today, but keeping it explicit (rather than reflective or implicit) is
/// what makes idempotent re-runs provable and the transform testable with
/// no store at all.
pub fn map_record(record: SourceRecord) -> TargetRecord {
    TargetRecord {
        id: record.id,
        name: record.name,
        value: record.value,
    }
}

/// Copies one page at a time from a reader to a writer.
///
/// Exactly one page's worth of records is live inside
/// [`copy_page`](Self::copy_page); the batch is dropped as soon as the bulk
/// write returns.
pub struct CopyWorker<'a, R, W, S> {
    reader: &'a R,
    writer: &'a W,
    sink: &'a S,
    avg_row_bytes: i64,
}

impl<'a, R, W, S> CopyWorker<'a, R, W, S>
where
    R: SourceReader,
    W: TargetWriter,
    S: ProgressSink,
{
    pub fn new(reader: &'a R, writer: &'a W, sink: &'a S, avg_row_bytes: i64) -> Self {
        Self {
            reader,
            writer,
            sink,
            avg_row_bytes,
        }
    }

    /// Copy one page and return the number of rows actually fetched (the
    /// final page is usually short). The reported byte figure is
    /// `rows * avg_row_bytes` — an estimate for observability, not a
    /// measured value.
    pub async fn copy_page(&self, page: &Page) -> Result<i64> {
        self.sink.emit(&ProgressEvent::PageStart {
            page_index: page.index,
            offset: page.offset,
            limit: page.limit,
        });

        let records = self
            .reader
            .fetch_page(page.offset, page.limit)
            .await
            .map_err(|e| CopyError::fetch(page.index, e))?;
        let rows_in_page = records.len() as i64;

        let batch: Vec<TargetRecord> = records.into_iter().map(map_record).collect();
        self.writer
            .bulk_upsert(&batch)
            .await
            .map_err(|e| CopyError::write(page.index, e))?;

        let estimated_bytes_in_page = rows_in_page * self.avg_row_bytes;
        debug!(
            "page {}: {} rows written (offset {})",
            page.index, rows_in_page, page.offset
        );
        self.sink.emit(&ProgressEvent::PageDone {
            page_index: page.index,
            rows_in_page,
            estimated_bytes_in_page,
        });

        Ok(rows_in_page)
    }
}
