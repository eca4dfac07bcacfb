//! Transfer planning: stats-driven chunk sizing and page partitioning.
//!
//! The plan is derived once per run from the source relation's row count and
//! physical size. Sizing by estimated bytes-per-fetch rather than a fixed row
//! count keeps per-page payloads roughly constant regardless of row width: a
//! table of wide blobs and a table of two short strings converge to
//! comparable fetch sizes. The clamp guards both extremes — micro-batches
//! when rows are huge, jumbo batches when rows are tiny or the store reports
//! a zero size.

/// Target on-disk bytes per fetch (9 MiB).
pub const TARGET_BYTES_PER_FETCH: i64 = 9 * 1024 * 1024;

/// Lower clamp for rows per chunk.
pub const MIN_CHUNK_ROWS: i64 = 5_000;

/// Upper clamp for rows per chunk.
pub const MAX_CHUNK_ROWS: i64 = 300_000;

/// Point-in-time statistics for the source relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceStats {
    /// Exact row count at probe time.
    pub total_rows: i64,
    /// Physical on-disk size including indexes, 0 if the store cannot report it.
    pub total_bytes: i64,
}

/// Tunable sizing inputs. The defaults are the compiled-in engine constants;
/// tests override them to exercise the clamp edges.
#[derive(Debug, Clone, Copy)]
pub struct PlanParams {
    pub target_bytes_per_fetch: i64,
    pub min_rows: i64,
    pub max_rows: i64,
}

impl Default for PlanParams {
    fn default() -> Self {
        Self {
            target_bytes_per_fetch: TARGET_BYTES_PER_FETCH,
            min_rows: MIN_CHUNK_ROWS,
            max_rows: MAX_CHUNK_ROWS,
        }
    }
}

/// Immutable per-run transfer plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPlan {
    pub total_rows: i64,
    pub total_bytes: i64,
    /// Estimated on-disk bytes per row, floored at 1.
    pub avg_row_bytes: i64,
    /// Clamped rows per page.
    pub chunk_size: i32,
    /// `ceil(total_rows / chunk_size)`.
    pub page_count: i32,
}

/// One page of the transfer: a bounded, id-ordered slice of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub index: i32,
    pub offset: i64,
    pub limit: i64,
}

/// Derive the clamped rows-per-chunk value. Pure and deterministic.
pub fn derive_chunk_size(total_rows: i64, total_bytes: i64, params: &PlanParams) -> i32 {
    let avg_row_bytes = (total_bytes / total_rows).max(1);
    let raw_rows_per_chunk = (params.target_bytes_per_fetch / avg_row_bytes).max(1);
    raw_rows_per_chunk.clamp(params.min_rows, params.max_rows) as i32
}

impl TransferPlan {
    /// Derive a plan from probed stats. Returns `None` for an empty source:
    /// zero rows is a valid, already-complete run and no plan is constructed.
    pub fn derive(stats: SourceStats, params: &PlanParams) -> Option<Self> {
        if stats.total_rows <= 0 {
            return None;
        }

        let avg_row_bytes = (stats.total_bytes / stats.total_rows).max(1);
        let chunk_size = derive_chunk_size(stats.total_rows, stats.total_bytes, params);
        let chunk = chunk_size as i64;
        let page_count = ((stats.total_rows + chunk - 1) / chunk) as i32;

        Some(Self {
            total_rows: stats.total_rows,
            total_bytes: stats.total_bytes,
            avg_row_bytes,
            chunk_size,
            page_count,
        })
    }

    /// Lazy, ordered sequence of page descriptors. Pages are disjoint,
    /// strictly ascending by id, and together cover the row set counted at
    /// probe time. The last page may fetch fewer than `chunk_size` rows.
    pub fn pages(&self) -> impl Iterator<Item = Page> {
        let chunk = self.chunk_size as i64;
        (0..self.page_count).map(move |index| Page {
            index,
            offset: index as i64 * chunk,
            limit: chunk,
        })
    }

    /// Estimated on-disk footprint of a full chunk.
    pub fn estimated_chunk_bytes(&self) -> i64 {
        self.chunk_size as i64 * self.avg_row_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(total_rows: i64, total_bytes: i64) -> TransferPlan {
        TransferPlan::derive(
            SourceStats {
                total_rows,
                total_bytes,
            },
            &PlanParams::default(),
        )
        .expect("non-empty source must yield a plan")
    }

    #[test]
    fn test_scenario_a_mid_size_rows() {
        // 1M rows at 89 bytes/row: raw 106,035 rows/chunk sits inside the clamp.
        let p = plan(1_000_000, 89_000_000);
        assert_eq!(p.avg_row_bytes, 89);
        assert_eq!(p.chunk_size, 106_035);
        assert_eq!(p.page_count, 10);

        let rows_before_last = (p.page_count as i64 - 1) * p.chunk_size as i64;
        assert_eq!(p.total_rows - rows_before_last, 45_685);
    }

    #[test]
    fn test_scenario_b_tiny_rows_clamp_down() {
        // Size reported as 0 drives avg_row_bytes to its floor of 1; the raw
        // chunk of 9,437,184 rows is clamped to the max.
        let p = plan(1_000_000, 0);
        assert_eq!(p.avg_row_bytes, 1);
        assert_eq!(p.chunk_size, MAX_CHUNK_ROWS as i32);
    }

    #[test]
    fn test_scenario_c_huge_rows_clamp_up() {
        // 5000-byte rows: raw 1,887 rows/chunk is clamped up to the min.
        let p = plan(100_000, 500_000_000);
        assert_eq!(p.avg_row_bytes, 5_000);
        assert_eq!(
            TARGET_BYTES_PER_FETCH / p.avg_row_bytes,
            1_887,
            "raw chunk below the lower clamp"
        );
        assert_eq!(p.chunk_size, MIN_CHUNK_ROWS as i32);
    }

    #[test]
    fn test_scenario_d_empty_source_yields_no_plan() {
        let none = TransferPlan::derive(
            SourceStats {
                total_rows: 0,
                total_bytes: 12_345,
            },
            &PlanParams::default(),
        );
        assert!(none.is_none());
    }

    #[test]
    fn test_chunk_size_always_within_clamp() {
        let cases = [
            (1, 0),
            (1, i64::MAX / 2),
            (7, 7),
            (1_000_000, 89_000_000),
            (50_000_000, 1),
            (3, 90_000_000_000),
        ];
        for (rows, bytes) in cases {
            let chunk = derive_chunk_size(rows, bytes, &PlanParams::default()) as i64;
            assert!(
                (MIN_CHUNK_ROWS..=MAX_CHUNK_ROWS).contains(&chunk),
                "chunk {} out of clamp for rows={} bytes={}",
                chunk,
                rows,
                bytes
            );
        }
    }

    #[test]
    fn test_page_count_is_ceiling_division() {
        for (rows, bytes) in [(1i64, 10i64), (5_000, 0), (5_001, 0), (1_000_000, 89_000_000)] {
            let p = plan(rows, bytes);
            let chunk = p.chunk_size as i64;
            let pc = p.page_count as i64;
            assert!((pc - 1) * chunk < p.total_rows);
            assert!(p.total_rows <= pc * chunk);
        }
    }

    #[test]
    fn test_pages_are_ordered_disjoint_and_cover_the_relation() {
        let p = plan(1_000_000, 89_000_000);
        let pages: Vec<Page> = p.pages().collect();
        assert_eq!(pages.len(), p.page_count as usize);

        for (i, page) in pages.iter().enumerate() {
            assert_eq!(page.index, i as i32);
            assert_eq!(page.offset, i as i64 * p.chunk_size as i64);
            assert_eq!(page.limit, p.chunk_size as i64);
        }

        // Consecutive pages tile the offset space with no gap or overlap.
        for pair in pages.windows(2) {
            assert_eq!(pair[0].offset + pair[0].limit, pair[1].offset);
        }

        // The final page still reaches past the last row.
        let last = pages.last().unwrap();
        assert!(last.offset < p.total_rows);
        assert!(last.offset + last.limit >= p.total_rows);
    }

    #[test]
    fn test_last_page_rows_positive() {
        for (rows, bytes) in [(5_000i64, 0i64), (5_001, 0), (1_000_000, 89_000_000)] {
            let p = plan(rows, bytes);
            let last_rows = p.total_rows - (p.page_count as i64 - 1) * p.chunk_size as i64;
            assert!(last_rows > 0, "rows={} bytes={}", rows, bytes);
            assert!(last_rows <= p.chunk_size as i64);
        }
    }

    #[test]
    fn test_single_row_source() {
        let p = plan(1, 8192);
        assert_eq!(p.page_count, 1);
        assert_eq!(p.chunk_size, derive_chunk_size(1, 8192, &PlanParams::default()));
        let pages: Vec<Page> = p.pages().collect();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].offset, 0);
    }

    #[test]
    fn test_estimated_chunk_bytes() {
        let p = plan(1_000_000, 89_000_000);
        assert_eq!(p.estimated_chunk_bytes(), 106_035 * 89);
    }
}
