//! Random access over the streamlines of one TRK file.
//!
//! A [`TrkCollection`] owns the open file, its header and, once built, its
//! offset index. The index is published exactly once through a `OnceLock` and
//! is read-only afterwards, so `&TrkCollection` can be shared across threads.
//! Decoded streamlines are never cached.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use rayon::prelude::*;

use crate::cancel::CancelToken;
use crate::decode::{decode_streamline, Streamline};
use crate::error::{Result, TrkError};
use crate::header::TrkHeader;
use crate::index::{IndexBuilder, IndexEntry, OffsetIndex, ScanOutcome, Truncation};
use crate::io;
use crate::layout::{RecordLayout, PREFIX_LEN};
use crate::options::{OpenOptions, Strategy, StrategyHint};

/// An open TRK file with on-demand streamline access.
#[derive(Debug)]
pub struct TrkCollection {
    path: PathBuf,
    file: File,
    file_len: u64,
    header: TrkHeader,
    layout: RecordLayout,
    options: OpenOptions,
    strategy: Strategy,
    /// `StrategyHint::Auto`: dense batches may load the stream.
    adaptive: bool,
    index: OnceLock<OffsetIndex>,
    truncation: OnceLock<Truncation>,
    /// Record stream bytes, held by the bulk strategy or by `Auto` after a dense batch.
    stream: OnceLock<Vec<u8>>,
}

impl TrkCollection {
    /// Open `path`, parse its header and, with `eager_index`, build the index.
    ///
    /// Either a usable collection is returned or nothing is: any header error,
    /// and any index error when indexing eagerly, fails the open.
    pub fn open(path: impl AsRef<Path>, options: OpenOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;
        let file_len = file.metadata()?.len();
        let header = TrkHeader::read_from(&mut file)?;
        let strategy = options.resolve_strategy();
        let adaptive = options.strategy == StrategyHint::Auto;

        let collection = Self {
            path,
            file,
            file_len,
            layout: header.layout(),
            header,
            strategy,
            adaptive,
            options,
            index: OnceLock::new(),
            truncation: OnceLock::new(),
            stream: OnceLock::new(),
        };

        if collection.options.eager_index {
            collection.build_index()?;
        }
        Ok(collection)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &TrkHeader {
        &self.header
    }

    pub fn layout(&self) -> RecordLayout {
        self.layout
    }

    pub fn options(&self) -> &OpenOptions {
        &self.options
    }

    /// The extraction strategy resolved at open time.
    ///
    /// `Auto` reports `Seek`; `get_many` may still read a dense batch from one
    /// in-memory copy of the stream.
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Bytes from the end of the header to the end of the file.
    pub fn stream_len(&self) -> u64 {
        self.file_len.saturating_sub(self.header.stream_offset())
    }

    pub fn is_indexed(&self) -> bool {
        self.index.get().is_some()
    }

    /// The published index, if any.
    pub fn index(&self) -> Option<&OffsetIndex> {
        self.index.get()
    }

    /// Where the file was found truncated, when a partial index was kept.
    pub fn truncation(&self) -> Option<Truncation> {
        self.truncation.get().copied()
    }

    /// Build and publish the offset index. Returns the existing index when already built.
    ///
    /// A truncated stream always yields `TruncatedRecord` here, on every call;
    /// with `partial_index` the records before the truncation are published
    /// first and serve `len`, `get` and `iter`.
    pub fn build_index(&self) -> Result<&OffsetIndex> {
        self.build(None)
    }

    /// [`build_index`](Self::build_index), checking `token` between records.
    ///
    /// A cancelled build publishes nothing and can be retried.
    pub fn build_index_with(&self, token: &CancelToken) -> Result<&OffsetIndex> {
        self.build(Some(token))
    }

    fn build(&self, token: Option<&CancelToken>) -> Result<&OffsetIndex> {
        if let Some(index) = self.index.get() {
            return self.published(index);
        }

        let stream = match self.strategy {
            Strategy::Bulk => Some(self.stream_bytes()?),
            Strategy::Seek | Strategy::Naive => self.loaded_stream(),
        };
        match stream {
            Some(stream) => {
                let outcome = self.builder(token).scan_bytes(stream)?;
                self.publish(outcome)
            }
            // A private handle keeps the shared file cursor untouched.
            None => self.build_from_reader(File::open(&self.path)?, token),
        }
    }

    /// Scan `reader`, a view of this collection's file, and publish the result.
    pub(crate) fn build_from_reader<R: Read + Seek>(
        &self,
        reader: R,
        token: Option<&CancelToken>,
    ) -> Result<&OffsetIndex> {
        if let Some(index) = self.index.get() {
            return self.published(index);
        }
        let outcome = self.builder(token).scan_reader(reader, self.file_len)?;
        self.publish(outcome)
    }

    fn builder<'t>(&self, token: Option<&'t CancelToken>) -> IndexBuilder<'t> {
        let builder = IndexBuilder::new(&self.header).policy(self.options.count_policy);
        match token {
            Some(token) => builder.cancel(token),
            None => builder,
        }
    }

    fn publish(&self, outcome: ScanOutcome) -> Result<&OffsetIndex> {
        match outcome {
            ScanOutcome::Complete(index) => Ok(self.index.get_or_init(|| index)),
            ScanOutcome::Truncated {
                partial,
                truncation,
            } => {
                if self.options.partial_index {
                    // Truncation first: whoever sees the index also sees why it is partial.
                    self.truncation.get_or_init(|| truncation);
                    self.index.get_or_init(|| partial);
                }
                Err(truncation.into())
            }
        }
    }

    /// An already published index, or the truncation that made it partial.
    fn published<'s>(&'s self, index: &'s OffsetIndex) -> Result<&'s OffsetIndex> {
        match self.truncation.get() {
            Some(&truncation) => Err(truncation.into()),
            None => Ok(index),
        }
    }

    /// The index for accessors: built on first use; a kept partial index counts as built.
    pub(crate) fn ensure_index(&self) -> Result<&OffsetIndex> {
        match self.build_index() {
            Err(e @ TrkError::TruncatedRecord { .. }) if self.options.partial_index => {
                self.index.get().ok_or(e)
            }
            other => other,
        }
    }

    /// The in-memory record stream, read on first use.
    pub(crate) fn stream_bytes(&self) -> Result<&[u8]> {
        if let Some(stream) = self.stream.get() {
            return Ok(stream);
        }
        let buf = io::read_range(
            &self.file,
            self.header.stream_offset()..self.file_len,
            self.options.memory_budget,
        )?;
        Ok(self.stream.get_or_init(|| buf))
    }

    /// The record stream if it is already held in memory.
    pub(crate) fn loaded_stream(&self) -> Option<&[u8]> {
        self.stream.get().map(Vec::as_slice)
    }

    pub(crate) fn file(&self) -> &File {
        &self.file
    }

    /// Number of streamlines, building the index if needed.
    pub fn len(&self) -> Result<usize> {
        Ok(self.ensure_index()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Decode streamline `i`.
    pub fn get(&self, i: usize) -> Result<Streamline> {
        match self.strategy {
            Strategy::Naive => {
                self.ensure_index()?.check(i)?;
                self.get_naive(i)
            }
            Strategy::Seek => {
                let entry = self.ensure_index()?.check(i)?;
                match self.loaded_stream() {
                    Some(stream) => self.slice_record(stream, entry),
                    None => self.read_record(entry),
                }
            }
            Strategy::Bulk => {
                let entry = self.ensure_index()?.check(i)?;
                self.slice_record(self.stream_bytes()?, entry)
            }
        }
    }

    /// Decode every requested streamline, returned in the order of `indices`.
    ///
    /// Indices may repeat and need not be sorted. All are validated before any
    /// read. Reads are issued in file order and, with `parallel`, spread over
    /// the rayon pool using positional reads.
    pub fn get_many(&self, indices: &[usize]) -> Result<Vec<Streamline>> {
        let index = self.ensure_index()?;
        let entries = indices
            .iter()
            .map(|&i| index.check(i))
            .collect::<Result<Vec<_>>>()?;
        let stream = match self.strategy {
            Strategy::Naive => return indices.iter().map(|&i| self.get_naive(i)).collect(),
            Strategy::Bulk => Some(self.stream_bytes()?),
            Strategy::Seek if self.adaptive => self.dense_stream(&entries)?,
            Strategy::Seek => self.loaded_stream(),
        };

        let mut order: Vec<usize> = (0..entries.len()).collect();
        order.sort_unstable_by_key(|&k| entries[k].offset);

        let decode = |k: usize| -> Result<(usize, Streamline)> {
            let streamline = match stream {
                Some(stream) => self.slice_record(stream, entries[k])?,
                None => self.read_record(entries[k])?,
            };
            Ok((k, streamline))
        };

        let mut decoded = if self.options.parallel {
            order
                .par_iter()
                .map(|&k| decode(k))
                .collect::<Result<Vec<_>>>()?
        } else {
            order
                .iter()
                .map(|&k| decode(k))
                .collect::<Result<Vec<_>>>()?
        };

        decoded.sort_unstable_by_key(|(k, _)| *k);
        Ok(decoded.into_iter().map(|(_, s)| s).collect())
    }

    /// Iterate over every streamline in file order.
    ///
    /// Each call starts a fresh forward scan. The iterator stops after the
    /// first error.
    pub fn iter(&self) -> Result<StreamlineIter<'_>> {
        let index = self.ensure_index()?;
        let stream = match self.strategy {
            Strategy::Bulk => Some(self.stream_bytes()?),
            Strategy::Seek | Strategy::Naive => self.loaded_stream(),
        };
        let source = match stream {
            Some(stream) => IterSource::Memory(stream),
            None => {
                let mut file = File::open(&self.path)?;
                file.seek(SeekFrom::Start(index.start()))?;
                IterSource::Reader {
                    reader: BufReader::new(file),
                    buf: Vec::new(),
                }
            }
        };
        Ok(StreamlineIter {
            index,
            layout: self.layout,
            next: 0,
            source,
        })
    }

    /// Under `Auto`, the in-memory stream when `entries` are dense enough to load it.
    fn dense_stream(&self, entries: &[IndexEntry]) -> Result<Option<&[u8]>> {
        if let Some(stream) = self.loaded_stream() {
            return Ok(Some(stream));
        }
        let selected: u64 = entries
            .iter()
            .map(|e| self.layout.payload_len(e.point_count))
            .sum();
        let stream_len = self.stream_len();
        if entries.is_empty() || !self.options.prefers_span(selected, stream_len, stream_len) {
            return Ok(None);
        }
        self.stream_bytes().map(Some)
    }

    /// Positional read of one record's payload.
    pub(crate) fn read_record(&self, entry: IndexEntry) -> Result<Streamline> {
        let begin = entry.offset + PREFIX_LEN;
        let end = begin + self.layout.payload_len(entry.point_count);
        let payload = io::read_range(&self.file, begin..end, self.options.memory_budget)?;
        decode_streamline(&payload, entry.point_count, &self.layout)
    }

    /// Decode one record from the in-memory record stream.
    pub(crate) fn slice_record(&self, stream: &[u8], entry: IndexEntry) -> Result<Streamline> {
        let payload = self.payload_slice(stream, entry)?;
        decode_streamline(payload, entry.point_count, &self.layout)
    }

    pub(crate) fn payload_slice<'s>(&self, stream: &'s [u8], entry: IndexEntry) -> Result<&'s [u8]> {
        let begin = (entry.offset - self.header.stream_offset() + PREFIX_LEN) as usize;
        stream.get(begin..).ok_or(TrkError::DecodeOutOfRange {
            needed: begin,
            available: stream.len(),
        })
    }

    /// Locate streamline `i` by walking length prefixes from the stream start.
    ///
    /// `i` has already been checked against the index, so every prefix up to
    /// it belongs to a complete record.
    fn get_naive(&self, i: usize) -> Result<Streamline> {
        let mut offset = self.header.stream_offset();
        let mut prefix = [0u8; 4];
        let mut k = 0;
        loop {
            io::read_exact_at(&self.file, &mut prefix, offset)?;
            let raw = self.layout.endianness.read_i32(&prefix);
            let point_count = u32::try_from(raw).map_err(|_| TrkError::CorruptRecord {
                index: k,
                offset,
                point_count: raw,
            })?;

            if k == i {
                return self.read_record(IndexEntry {
                    offset,
                    point_count,
                });
            }
            offset += self.layout.record_len(point_count);
            k += 1;
        }
    }
}

enum IterSource<'a> {
    Memory(&'a [u8]),
    Reader {
        reader: BufReader<File>,
        buf: Vec<u8>,
    },
}

/// Forward-only iterator over decoded streamlines in file order.
pub struct StreamlineIter<'a> {
    index: &'a OffsetIndex,
    layout: RecordLayout,
    next: usize,
    source: IterSource<'a>,
}

impl StreamlineIter<'_> {
    fn decode_next(&mut self, entry: IndexEntry) -> Result<Streamline> {
        match &mut self.source {
            IterSource::Memory(stream) => {
                let begin = (entry.offset - self.index.start() + PREFIX_LEN) as usize;
                let payload = stream.get(begin..).ok_or(TrkError::DecodeOutOfRange {
                    needed: begin,
                    available: stream.len(),
                })?;
                decode_streamline(payload, entry.point_count, &self.layout)
            }
            IterSource::Reader { reader, buf } => {
                let mut prefix = [0u8; 4];
                reader.read_exact(&mut prefix)?;
                let len = self.layout.payload_len(entry.point_count) as usize;
                buf.resize(len, 0);
                reader.read_exact(buf)?;
                decode_streamline(buf, entry.point_count, &self.layout)
            }
        }
    }
}

impl Iterator for StreamlineIter<'_> {
    type Item = Result<Streamline>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.index.get(self.next)?;
        let item = self.decode_next(entry);
        self.next = if item.is_ok() {
            self.next + 1
        } else {
            self.index.len()
        };
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.index.len() - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for StreamlineIter<'_> {}
