//! Range planning for parallel downloads.
//!
//! A requested byte range is cut into one slice per worker; the slices are
//! fetched concurrently and concatenated back in ascending order by the
//! composite reader. Planning is pure math so the tiling invariant can be
//! tested without any transport.

/// Minimum bytes per worker before parallel download is worthwhile (1 MiB).
pub const MIN_DOWNLOAD_PART_SIZE: u64 = 1024 * 1024;

/// An inclusive slice of the requested range, owned by one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangePart {
    pub start: u64,
    pub end: u64,
}

impl RangePart {
    /// Number of bytes in the slice.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

/// Split `[start, end]` across `concurrency` workers.
///
/// Worker `i` covers `[start + i·P, start + (i+1)·P − 1]` where
/// `P = len / concurrency`; the last worker's end is clamped to `end` and
/// absorbs the remainder. Returns `None` when the range should be fetched
/// as a single stream instead: one worker, or slices below `min_part_size`.
pub fn plan_ranges(
    start: u64,
    end: u64,
    concurrency: usize,
    min_part_size: u64,
) -> Option<Vec<RangePart>> {
    if concurrency <= 1 || end < start {
        return None;
    }

    let length: u64 = end - start + 1;
    let part_size: u64 = length / concurrency as u64;
    if part_size < min_part_size {
        return None;
    }

    let mut parts: Vec<RangePart> = Vec::with_capacity(concurrency);
    for index in 0..concurrency {
        let slice_start: u64 = start + index as u64 * part_size;
        let slice_end: u64 = if index == concurrency - 1 {
            end
        } else {
            slice_start + part_size - 1
        };
        parts.push(RangePart {
            start: slice_start,
            end: slice_end,
        });
    }
    Some(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_five_mebibytes_across_three_workers() {
        let parts: Vec<RangePart> =
            plan_ranges(0, 5_242_879, 3, MIN_DOWNLOAD_PART_SIZE).unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 1_747_626);
        assert_eq!(parts[1].len(), 1_747_626);
        assert_eq!(parts[2].len(), 1_747_628);
    }

    #[test]
    fn test_parts_tile_the_range_exactly() {
        let cases: &[(u64, u64, usize)] = &[
            (0, 5_242_879, 3),
            (100, 10_485_859, 4),
            (0, 4_194_303, 2),
            (7, 16_777_222, 5),
        ];
        for &(start, end, concurrency) in cases {
            let parts: Vec<RangePart> =
                plan_ranges(start, end, concurrency, MIN_DOWNLOAD_PART_SIZE).unwrap();
            assert_eq!(parts.first().unwrap().start, start);
            assert_eq!(parts.last().unwrap().end, end);
            for window in parts.windows(2) {
                assert_eq!(window[0].end + 1, window[1].start, "gap or overlap");
            }
            let total: u64 = parts.iter().map(|part| part.len()).sum();
            assert_eq!(total, end - start + 1);
        }
    }

    #[test]
    fn test_small_ranges_fall_back_to_single_stream() {
        // Per-part size would be below the minimum.
        assert!(plan_ranges(0, 2 * 1024 * 1024 - 1, 3, MIN_DOWNLOAD_PART_SIZE).is_none());
        // A single worker is just a plain ranged GET.
        assert!(plan_ranges(0, 100 * 1024 * 1024, 1, MIN_DOWNLOAD_PART_SIZE).is_none());
        assert!(plan_ranges(0, 100, 0, MIN_DOWNLOAD_PART_SIZE).is_none());
    }

    #[test]
    fn test_exact_division_has_no_remainder() {
        let parts: Vec<RangePart> =
            plan_ranges(0, 6 * 1024 * 1024 - 1, 3, MIN_DOWNLOAD_PART_SIZE).unwrap();
        assert_eq!(parts.len(), 3);
        for part in &parts {
            assert_eq!(part.len(), 2 * 1024 * 1024);
        }
    }
}
