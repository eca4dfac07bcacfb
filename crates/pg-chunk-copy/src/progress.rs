//! Structured progress events emitted by the engine.
//!
//! The orchestrator and copy worker report through an injected
//! [`ProgressSink`] rather than printing directly, so callers can fan events
//! out to logs, metrics, or a machine-readable stream without touching the
//! engine.

use serde::Serialize;
use tracing::{debug, info};

/// One step of a transfer run, in emission order: `stats`, `planned`, then
/// `page_start`/`page_done` per page, then `complete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ProgressEvent {
    Stats {
        total_rows: i64,
        total_bytes: i64,
    },
    Planned {
        avg_row_bytes: i64,
        chunk_size: i32,
        page_count: i32,
    },
    PageStart {
        page_index: i32,
        offset: i64,
        limit: i64,
    },
    PageDone {
        page_index: i32,
        rows_in_page: i64,
        /// `rows_in_page * avg_row_bytes` — an estimate, not a measurement.
        estimated_bytes_in_page: i64,
    },
    Complete {
        total_rows: i64,
        pages: i32,
    },
}

/// Sink for progress events. Implementations must tolerate emission from
/// concurrent workers.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: &ProgressEvent);
}

impl<S: ProgressSink + ?Sized> ProgressSink for Box<S> {
    fn emit(&self, event: &ProgressEvent) {
        (**self).emit(event)
    }
}

/// Default sink: human-readable summary lines through `tracing`.
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn emit(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Stats {
                total_rows,
                total_bytes,
            } => {
                info!(
                    "Source relation: {} rows, {} on disk",
                    total_rows,
                    human_bytes(*total_bytes)
                );
            }
            ProgressEvent::Planned {
                avg_row_bytes,
                chunk_size,
                page_count,
            } => {
                info!(
                    "Chunk size: {} rows ({} B/row est, ~{} per fetch), {} pages planned",
                    chunk_size,
                    avg_row_bytes,
                    human_bytes(*chunk_size as i64 * *avg_row_bytes),
                    page_count
                );
            }
            ProgressEvent::PageStart {
                page_index,
                offset,
                limit,
            } => {
                debug!(
                    "Page {}: fetching up to {} rows from offset {}",
                    page_index, limit, offset
                );
            }
            ProgressEvent::PageDone {
                page_index,
                rows_in_page,
                estimated_bytes_in_page,
            } => {
                info!(
                    "Page {}: copied {} rows (~{} on disk)",
                    page_index,
                    rows_in_page,
                    human_bytes(*estimated_bytes_in_page)
                );
            }
            ProgressEvent::Complete { total_rows, pages } => {
                info!("Transfer complete: {} rows in {} pages", total_rows, pages);
            }
        }
    }
}

/// Machine-readable sink: one JSON object per event on stderr.
pub struct JsonLineSink;

impl ProgressSink for JsonLineSink {
    fn emit(&self, event: &ProgressEvent) {
        if let Ok(line) = serde_json::to_string(event) {
            eprintln!("{}", line);
        }
    }
}

/// Format a byte count for log lines (binary units).
pub fn human_bytes(bytes: i64) -> String {
    const UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_events_serialize_with_phase_tag() {
        let event = ProgressEvent::Stats {
            total_rows: 1_000_000,
            total_bytes: 89_000_000,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"phase": "stats", "total_rows": 1_000_000, "total_bytes": 89_000_000})
        );

        let event = ProgressEvent::PageDone {
            page_index: 3,
            rows_in_page: 45_694,
            estimated_bytes_in_page: 4_066_766,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "phase": "page_done",
                "page_index": 3,
                "rows_in_page": 45_694,
                "estimated_bytes_in_page": 4_066_766
            })
        );
    }

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(0), "0 B");
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(2048), "2.0 KiB");
        assert_eq!(human_bytes(9 * 1024 * 1024), "9.0 MiB");
        assert_eq!(human_bytes(89_000_000), "84.9 MiB");
        assert_eq!(human_bytes(5 * 1024 * 1024 * 1024), "5.0 GiB");
    }
}
