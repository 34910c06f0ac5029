use crate::error::DownloadError;

/// Inclusive byte range within a remote file.
///
/// Both bounds are part of the range, matching HTTP `Range` header semantics,
/// so the smallest possible range `[0, 0]` covers exactly one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Result<Self, DownloadError> {
        if end < start {
            return Err(DownloadError::invalid_argument(format!(
                "range end {end} precedes start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Number of bytes covered, always at least 1.
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the HTTP `Range` request header.
    pub fn to_range_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// Partition `content_length` bytes into an ordered, covering set of ranges.
///
/// Every range is `chunk_size` long except possibly the last. The result is
/// gap-free, overlap-free, and ascending by start offset.
pub fn split_ranges(content_length: u64, chunk_size: u64) -> Result<Vec<ByteRange>, DownloadError> {
    if content_length == 0 {
        return Err(DownloadError::invalid_argument(
            "content length must be positive",
        ));
    }
    if chunk_size == 0 {
        return Err(DownloadError::invalid_argument(
            "chunk size must be positive",
        ));
    }

    let mut ranges = Vec::with_capacity(content_length.div_ceil(chunk_size) as usize);
    let mut start = 0u64;
    while start < content_length {
        let end = (start + chunk_size - 1).min(content_length - 1);
        ranges.push(ByteRange { start, end });
        start = end + 1;
    }
    Ok(ranges)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covering_plan(ranges: &[ByteRange], content_length: u64, chunk_size: u64) {
        assert_eq!(ranges[0].start, 0);
        assert_eq!(ranges[ranges.len() - 1].end, content_length - 1);
        for window in ranges.windows(2) {
            assert_eq!(window[1].start, window[0].end + 1);
        }
        for range in &ranges[..ranges.len() - 1] {
            assert_eq!(range.length(), chunk_size);
        }
        assert!(ranges[ranges.len() - 1].length() <= chunk_size);
        let total: u64 = ranges.iter().map(ByteRange::length).sum();
        assert_eq!(total, content_length);
    }

    #[test]
    fn range_header_uses_inclusive_bounds() {
        let range = ByteRange::new(0, 1023).unwrap();
        assert_eq!(range.to_range_header(), "bytes=0-1023");
        assert_eq!(range.length(), 1024);

        let single = ByteRange::new(4096, 4096).unwrap();
        assert_eq!(single.to_range_header(), "bytes=4096-4096");
        assert_eq!(single.length(), 1);
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert!(matches!(
            ByteRange::new(10, 9),
            Err(DownloadError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn one_byte_file_yields_single_unit_range() {
        let ranges = split_ranges(1, 1024).unwrap();
        assert_eq!(ranges, vec![ByteRange { start: 0, end: 0 }]);
    }

    #[test]
    fn length_equal_to_chunk_size_yields_one_range() {
        let ranges = split_ranges(1024, 1024).unwrap();
        assert_eq!(ranges, vec![ByteRange { start: 0, end: 1023 }]);
    }

    #[test]
    fn one_byte_over_a_multiple_adds_a_short_tail() {
        let ranges = split_ranges(3 * 1024 + 1, 1024).unwrap();
        assert_eq!(ranges.len(), 4);
        assert_eq!(ranges[3], ByteRange { start: 3072, end: 3072 });
        assert_covering_plan(&ranges, 3 * 1024 + 1, 1024);
    }

    #[test]
    fn five_thousand_bytes_split_into_five_ranges() {
        let ranges = split_ranges(5000, 1024).unwrap();
        assert_eq!(
            ranges,
            vec![
                ByteRange { start: 0, end: 1023 },
                ByteRange { start: 1024, end: 2047 },
                ByteRange { start: 2048, end: 3071 },
                ByteRange { start: 3072, end: 4095 },
                ByteRange { start: 4096, end: 4999 },
            ]
        );
    }

    #[test]
    fn plans_cover_without_gaps_or_overlap() {
        for (length, chunk) in [(1, 1), (7, 3), (4999, 1024), (10_000_000, 1_048_576)] {
            let ranges = split_ranges(length, chunk).unwrap();
            assert_covering_plan(&ranges, length, chunk);
        }
    }

    #[test]
    fn zero_arguments_are_rejected_before_planning() {
        assert!(matches!(
            split_ranges(0, 1024),
            Err(DownloadError::InvalidArgument { .. })
        ));
        assert!(matches!(
            split_ranges(1024, 0),
            Err(DownloadError::InvalidArgument { .. })
        ));
    }
}
