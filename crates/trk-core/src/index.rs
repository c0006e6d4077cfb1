//! Offset index: one `(byte offset, point count)` pair per streamline.
//!
//! The index is built by a single forward pass that reads only the 4-byte
//! length prefix of every record and jumps over the payload. Offsets then turn
//! any later access into one positional read.

use std::io::{BufReader, Read, Seek, SeekFrom};
use std::ops::Range;

use crate::cancel::CancelToken;
use crate::error::{Result, TrkError};
use crate::header::TrkHeader;
use crate::layout::{RecordLayout, PREFIX_LEN};
use crate::options::CountPolicy;

/// Read buffer for the prefix scan. Jumps that land inside it cost no syscall.
const SCAN_BUFFER: usize = 1 << 20;

/// Location of one record in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Byte offset of the record's length prefix.
    pub offset: u64,
    pub point_count: u32,
}

/// Immutable table of record locations, built once per open file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetIndex {
    layout: RecordLayout,
    start: u64,
    offsets: Vec<u64>,
    point_counts: Vec<u32>,
}

impl OffsetIndex {
    fn with_capacity(layout: RecordLayout, start: u64, capacity: usize) -> Self {
        Self {
            layout,
            start,
            offsets: Vec::with_capacity(capacity),
            point_counts: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, offset: u64, point_count: u32) {
        self.offsets.push(offset);
        self.point_counts.push(point_count);
    }

    /// Number of indexed streamlines.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<IndexEntry> {
        Some(IndexEntry {
            offset: *self.offsets.get(i)?,
            point_count: self.point_counts[i],
        })
    }

    pub fn layout(&self) -> RecordLayout {
        self.layout
    }

    /// Byte offset of the record stream.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Byte offset just past the last indexed record.
    pub fn end(&self) -> u64 {
        match (self.offsets.last(), self.point_counts.last()) {
            (Some(&offset), Some(&count)) => offset + self.layout.record_len(count),
            _ => self.start,
        }
    }

    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    pub fn point_counts(&self) -> &[u32] {
        &self.point_counts
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = IndexEntry> + '_ {
        self.offsets
            .iter()
            .zip(&self.point_counts)
            .map(|(&offset, &point_count)| IndexEntry {
                offset,
                point_count,
            })
    }

    /// Points summed over every indexed streamline.
    pub fn total_points(&self) -> u64 {
        self.point_counts.iter().map(|&c| u64::from(c)).sum()
    }

    /// Absolute byte range of the payload (after the prefix) of streamline `i`.
    pub fn payload_range(&self, i: usize) -> Option<Range<u64>> {
        let entry = self.get(i)?;
        let begin = entry.offset + PREFIX_LEN;
        Some(begin..begin + self.layout.payload_len(entry.point_count))
    }

    /// Check `i` against the index bounds.
    pub fn check(&self, i: usize) -> Result<IndexEntry> {
        self.get(i).ok_or(TrkError::IndexOutOfRange {
            index: i,
            len: self.len(),
        })
    }
}

/// Where a scan stopped because the file ended inside a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Truncation {
    /// Position of the incomplete record in file order.
    pub index: usize,
    pub offset: u64,
    /// Bytes the record declares, prefix included.
    pub expected: u64,
    /// Bytes left in the file from `offset`.
    pub available: u64,
}

impl From<Truncation> for TrkError {
    fn from(t: Truncation) -> Self {
        TrkError::TruncatedRecord {
            index: t.index,
            offset: t.offset,
            expected: t.expected,
            available: t.available,
        }
    }
}

/// Result of a scan that did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Complete(OffsetIndex),
    /// The stream ended mid-record; `partial` holds every record before it.
    Truncated {
        partial: OffsetIndex,
        truncation: Truncation,
    },
}

impl ScanOutcome {
    /// The complete index, or `TruncatedRecord`.
    pub fn into_result(self) -> Result<OffsetIndex> {
        match self {
            ScanOutcome::Complete(index) => Ok(index),
            ScanOutcome::Truncated { truncation, .. } => Err(truncation.into()),
        }
    }

    /// The gathered index regardless of truncation.
    pub fn index(&self) -> &OffsetIndex {
        match self {
            ScanOutcome::Complete(index) => index,
            ScanOutcome::Truncated { partial, .. } => partial,
        }
    }
}

/// Source of length prefixes for the scan loop.
trait PrefixSource {
    fn read_prefix(&mut self, buf: &mut [u8; 4]) -> Result<()>;
    fn skip(&mut self, bytes: u64) -> Result<()>;
}

struct ReaderSource<R> {
    inner: BufReader<R>,
}

impl<R: Read + Seek> PrefixSource for ReaderSource<R> {
    fn read_prefix(&mut self, buf: &mut [u8; 4]) -> Result<()> {
        self.inner.read_exact(buf)?;
        Ok(())
    }

    fn skip(&mut self, bytes: u64) -> Result<()> {
        let jump = i64::try_from(bytes).map_err(|_| {
            TrkError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "record too large to skip",
            ))
        })?;
        self.inner.seek_relative(jump)?;
        Ok(())
    }
}

struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl PrefixSource for SliceSource<'_> {
    fn read_prefix(&mut self, buf: &mut [u8; 4]) -> Result<()> {
        buf.copy_from_slice(&self.data[self.pos..self.pos + 4]);
        self.pos += 4;
        Ok(())
    }

    fn skip(&mut self, bytes: u64) -> Result<()> {
        self.pos += bytes as usize;
        Ok(())
    }
}

/// Builds an [`OffsetIndex`] with one forward pass over the record stream.
#[derive(Debug, Clone)]
pub struct IndexBuilder<'a> {
    layout: RecordLayout,
    start: u64,
    declared: Option<usize>,
    policy: CountPolicy,
    cancel: Option<&'a CancelToken>,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(header: &TrkHeader) -> Self {
        Self {
            layout: header.layout(),
            start: header.stream_offset(),
            declared: header.declared_count(),
            policy: CountPolicy::default(),
            cancel: None,
        }
    }

    pub fn policy(mut self, policy: CountPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn cancel(mut self, token: &'a CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Scan a seekable source whose record stream ends at absolute byte `stream_end`.
    ///
    /// The reader is rewound to the stream start once; after that it only moves forward.
    pub fn scan_reader<R: Read + Seek>(&self, mut reader: R, stream_end: u64) -> Result<ScanOutcome> {
        reader.seek(SeekFrom::Start(self.start))?;
        let source = ReaderSource {
            inner: BufReader::with_capacity(SCAN_BUFFER, reader),
        };
        self.run(source, stream_end)
    }

    /// Scan an in-memory copy of the record stream (every byte after the header).
    pub fn scan_bytes(&self, stream: &[u8]) -> Result<ScanOutcome> {
        let source = SliceSource { data: stream, pos: 0 };
        self.run(source, self.start + stream.len() as u64)
    }

    fn run<S: PrefixSource>(&self, mut source: S, stream_end: u64) -> Result<ScanOutcome> {
        let limit = match self.policy {
            CountPolicy::Header => self.declared,
            CountPolicy::Scan | CountPolicy::Strict => None,
        };
        let stream_len = stream_end.saturating_sub(self.start);
        // A bogus header count must not trigger a huge up-front allocation.
        let capacity = self
            .declared
            .unwrap_or(0)
            .min((stream_len / PREFIX_LEN) as usize);
        let mut index = OffsetIndex::with_capacity(self.layout, self.start, capacity);

        let mut cursor = self.start;
        let mut prefix = [0u8; 4];
        loop {
            if limit.is_some_and(|limit| index.len() >= limit) {
                break;
            }
            if let Some(token) = self.cancel {
                token.check()?;
            }

            let available = stream_end.saturating_sub(cursor);
            if available < PREFIX_LEN {
                break;
            }

            source.read_prefix(&mut prefix)?;
            let raw = self.layout.endianness.read_i32(&prefix);
            let point_count = u32::try_from(raw).map_err(|_| TrkError::CorruptRecord {
                index: index.len(),
                offset: cursor,
                point_count: raw,
            })?;

            let record_len = self.layout.record_len(point_count);
            if record_len > available {
                let truncation = Truncation {
                    index: index.len(),
                    offset: cursor,
                    expected: record_len,
                    available,
                };
                return Ok(ScanOutcome::Truncated {
                    partial: index,
                    truncation,
                });
            }

            index.push(cursor, point_count);
            source.skip(record_len - PREFIX_LEN)?;
            cursor += record_len;
        }

        if self.policy == CountPolicy::Strict {
            if let Some(declared) = self.declared {
                if declared != index.len() {
                    return Err(TrkError::CountMismatch {
                        declared,
                        found: index.len(),
                    });
                }
            }
        }

        Ok(ScanOutcome::Complete(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::HEADER_SIZE;
    use crate::test_support::{ChunkedReader, TrkBuilder};
    use std::io::Cursor;

    fn scan(bytes: &[u8], policy: CountPolicy) -> Result<ScanOutcome> {
        let header = TrkHeader::from_bytes(bytes).unwrap();
        IndexBuilder::new(&header)
            .policy(policy)
            .scan_reader(Cursor::new(bytes), bytes.len() as u64)
    }

    fn three_records() -> TrkBuilder {
        TrkBuilder::new(1, 2)
            .streamline(&[[0.0, 1.0, 2.0]], &[9.0], &[1.0, 2.0])
            .streamline(
                &[[1.0, 1.0, 1.0], [2.0, 2.0, 2.0]],
                &[8.0, 7.0],
                &[3.0, 4.0],
            )
            .streamline(&[], &[], &[5.0, 6.0])
    }

    #[test]
    fn offsets_follow_record_lengths() {
        let bytes = three_records().declared(3).to_bytes();
        let index = scan(&bytes, CountPolicy::Scan).unwrap().into_result().unwrap();
        let layout = index.layout();

        assert_eq!(index.len(), 3);
        assert_eq!(index.point_counts(), &[1, 2, 0]);
        assert_eq!(index.offsets()[0], HEADER_SIZE as u64);
        for i in 0..2 {
            let next = index.offsets()[i] + layout.record_len(index.point_counts()[i]);
            assert_eq!(index.offsets()[i + 1], next);
        }
        assert_eq!(index.end(), bytes.len() as u64);
        assert_eq!(index.total_points(), 3);
    }

    #[test]
    fn wrong_header_count_is_ignored_by_default() {
        let bytes = three_records().declared(100).to_bytes();
        let index = scan(&bytes, CountPolicy::Scan).unwrap().into_result().unwrap();
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn header_policy_stops_at_declared_count() {
        let bytes = three_records().declared(2).to_bytes();
        let index = scan(&bytes, CountPolicy::Header).unwrap().into_result().unwrap();
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn header_policy_with_unknown_count_scans_to_end() {
        let bytes = three_records().to_bytes();
        let index = scan(&bytes, CountPolicy::Header).unwrap().into_result().unwrap();
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn strict_policy_reports_mismatch() {
        let bytes = three_records().declared(4).to_bytes();
        let result = scan(&bytes, CountPolicy::Strict);
        assert!(matches!(
            result,
            Err(TrkError::CountMismatch {
                declared: 4,
                found: 3
            })
        ));

        let bytes = three_records().declared(3).to_bytes();
        assert!(scan(&bytes, CountPolicy::Strict).is_ok());
    }

    #[test]
    fn empty_stream() {
        let bytes = TrkBuilder::new(0, 0).to_bytes();
        let index = scan(&bytes, CountPolicy::Scan).unwrap().into_result().unwrap();
        assert!(index.is_empty());
        assert_eq!(index.end(), HEADER_SIZE as u64);
    }

    #[test]
    fn short_trailing_prefix_is_clean_end() {
        let bytes = three_records().raw(&[0, 0]).to_bytes();
        let index = scan(&bytes, CountPolicy::Scan).unwrap().into_result().unwrap();
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn truncated_record_keeps_partial_index() {
        let mut bytes = three_records().to_bytes();
        // Drop the property block of the last record.
        bytes.truncate(bytes.len() - 4);
        let outcome = scan(&bytes, CountPolicy::Scan).unwrap();

        match &outcome {
            ScanOutcome::Truncated {
                partial,
                truncation,
            } => {
                assert_eq!(partial.len(), 2);
                assert_eq!(truncation.index, 2);
                assert_eq!(truncation.offset, partial.end());
                assert_eq!(truncation.expected, 12);
                assert_eq!(truncation.available, 8);
            }
            other => panic!("expected truncation, got {other:?}"),
        }
        assert!(matches!(
            outcome.into_result(),
            Err(TrkError::TruncatedRecord { index: 2, .. })
        ));
    }

    #[test]
    fn negative_point_count_is_corrupt() {
        let bytes = three_records().raw(&(-5i32).to_le_bytes()).to_bytes();
        let result = scan(&bytes, CountPolicy::Scan);
        assert!(matches!(
            result,
            Err(TrkError::CorruptRecord {
                index: 3,
                point_count: -5,
                ..
            })
        ));
    }

    #[test]
    fn cancelled_scan_fails() {
        let bytes = three_records().to_bytes();
        let header = TrkHeader::from_bytes(&bytes).unwrap();
        let token = CancelToken::new();
        token.cancel();
        let result = IndexBuilder::new(&header)
            .cancel(&token)
            .scan_reader(Cursor::new(&bytes), bytes.len() as u64);
        assert!(matches!(result, Err(TrkError::Cancelled)));
    }

    #[test]
    fn cancel_stops_a_running_scan() {
        let mut builder = TrkBuilder::new(0, 0);
        for i in 0..50 {
            builder = builder.streamline(&[[i as f32, 1.0, 2.0]], &[], &[]);
        }
        let bytes = builder.to_bytes();
        let header = TrkHeader::from_bytes(&bytes).unwrap();
        let token = CancelToken::new();
        let mut reads = 0;
        let reader = ChunkedReader::new(bytes.clone(), 16, |_| {
            reads += 1;
            if reads == 5 {
                token.cancel();
            }
        });

        let result = IndexBuilder::new(&header)
            .cancel(&token)
            .scan_reader(reader, bytes.len() as u64);
        assert!(matches!(result, Err(TrkError::Cancelled)));
        // One 16-byte read per record: the scan stopped right after the fifth.
        assert_eq!(reads, 5);
    }

    #[test]
    fn slice_scan_matches_reader_scan() {
        let bytes = three_records().big_endian().to_bytes();
        let header = TrkHeader::from_bytes(&bytes).unwrap();
        let builder = IndexBuilder::new(&header);
        let from_reader = builder
            .scan_reader(Cursor::new(&bytes), bytes.len() as u64)
            .unwrap();
        let from_slice = builder.scan_bytes(&bytes[HEADER_SIZE..]).unwrap();
        assert_eq!(from_reader, from_slice);
    }

    #[test]
    fn payload_range_and_bounds() {
        let bytes = three_records().to_bytes();
        let index = scan(&bytes, CountPolicy::Scan).unwrap().into_result().unwrap();
        let range = index.payload_range(1).unwrap();
        assert_eq!(range.start, index.offsets()[1] + 4);
        assert_eq!(range.end - range.start, 2 * 16 + 8);
        assert!(index.payload_range(3).is_none());
        assert!(matches!(
            index.check(3),
            Err(TrkError::IndexOutOfRange { index: 3, len: 3 })
        ));
    }
}
