//! Bulk conversion into one flat point container.
//!
//! The output keeps every requested streamline's points back to back plus a
//! length table, so callers can split the container without per-streamline
//! allocations.

use crate::cancel::CancelToken;
use crate::collection::TrkCollection;
use crate::decode::{decode_append, Streamline};
use crate::error::Result;
use crate::index::IndexEntry;
use crate::io;
use crate::layout::PREFIX_LEN;
use crate::options::Strategy;

/// Requested streamlines flattened into contiguous buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkStreamlines {
    /// Points of every streamline, concatenated in request order.
    pub points: Vec<[f32; 3]>,
    /// Per-point scalars, `scalar_count` per point, aligned with `points`.
    pub scalars: Vec<f32>,
    /// Per-streamline properties, `property_count` per streamline.
    pub properties: Vec<f32>,
    /// Point count of each requested streamline.
    pub lengths: Vec<u32>,
    pub scalar_count: usize,
    pub property_count: usize,
    /// How the payload bytes were read.
    pub plan: Strategy,
}

impl BulkStreamlines {
    /// Number of streamlines.
    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    pub fn total_points(&self) -> usize {
        self.points.len()
    }

    /// Start of each streamline in `points`.
    pub fn offsets(&self) -> Vec<usize> {
        self.lengths
            .iter()
            .scan(0usize, |start, &len| {
                let current = *start;
                *start += len as usize;
                Some(current)
            })
            .collect()
    }

    /// Points of the `k`-th requested streamline.
    ///
    /// Sums `lengths[..k]` on each call. To visit every streamline use
    /// [`iter`](Self::iter) or slice `points` with [`offsets`](Self::offsets).
    pub fn streamline_points(&self, k: usize) -> Option<&[[f32; 3]]> {
        let len = *self.lengths.get(k)? as usize;
        let start: usize = self.lengths[..k].iter().map(|&l| l as usize).sum();
        self.points.get(start..start + len)
    }

    /// Rebuild the individual streamlines from the flat buffers.
    pub fn iter(&self) -> impl Iterator<Item = Streamline> + '_ {
        let mut point = 0usize;
        self.lengths.iter().enumerate().map(move |(k, &len)| {
            let len = len as usize;
            let points = self.points[point..point + len].to_vec();
            let scalars =
                self.scalars[point * self.scalar_count..(point + len) * self.scalar_count].to_vec();
            let properties =
                self.properties[k * self.property_count..(k + 1) * self.property_count].to_vec();
            point += len;
            Streamline {
                points,
                scalars,
                scalar_count: self.scalar_count,
                properties,
            }
        })
    }
}

/// Flatten the streamlines at `indices` (in that order) into one container.
pub fn bulk_convert(collection: &TrkCollection, indices: &[usize]) -> Result<BulkStreamlines> {
    convert(collection, indices, None)
}

/// [`bulk_convert`], checking `token` between records.
pub fn bulk_convert_with(
    collection: &TrkCollection,
    indices: &[usize],
    token: &CancelToken,
) -> Result<BulkStreamlines> {
    convert(collection, indices, Some(token))
}

/// Flatten every streamline of the collection.
pub fn bulk_convert_all(collection: &TrkCollection) -> Result<BulkStreamlines> {
    let all: Vec<usize> = (0..collection.len()?).collect();
    bulk_convert(collection, &all)
}

fn convert(
    collection: &TrkCollection,
    indices: &[usize],
    token: Option<&CancelToken>,
) -> Result<BulkStreamlines> {
    let index = collection.ensure_index()?;
    let entries = indices
        .iter()
        .map(|&i| index.check(i))
        .collect::<Result<Vec<_>>>()?;

    let layout = index.layout();
    let budget = collection.options().memory_budget;
    let total_points: usize = entries.iter().map(|e| e.point_count as usize).sum();

    let mut out = BulkStreamlines {
        points: io::try_with_capacity(total_points, budget)?,
        scalars: io::try_with_capacity(total_points * layout.scalar_count, budget)?,
        properties: io::try_with_capacity(entries.len() * layout.property_count, budget)?,
        lengths: io::try_with_capacity(entries.len(), budget)?,
        scalar_count: layout.scalar_count,
        property_count: layout.property_count,
        plan: Strategy::Seek,
    };

    let check = || token.map_or(Ok(()), CancelToken::check);

    // Strategy C: one sequential read of the span covering the selection.
    if let Some((span_start, span)) = bulk_span(collection, &entries)? {
        out.plan = Strategy::Bulk;
        for entry in &entries {
            check()?;
            let begin = (entry.offset + PREFIX_LEN - span_start) as usize;
            let payload = span.get(begin..).unwrap_or_default();
            append(&mut out, payload, *entry, collection)?;
        }
        return Ok(out);
    }

    // Strategy B: one positional read per record.
    let mut buf = Vec::new();
    for entry in &entries {
        check()?;
        let len = layout.payload_len(entry.point_count) as usize;
        buf.resize(len, 0);
        io::read_exact_at(collection.file(), &mut buf, entry.offset + PREFIX_LEN)?;
        append(&mut out, &buf, *entry, collection)?;
    }
    Ok(out)
}

fn append(
    out: &mut BulkStreamlines,
    payload: &[u8],
    entry: IndexEntry,
    collection: &TrkCollection,
) -> Result<()> {
    decode_append(
        payload,
        entry.point_count,
        &collection.layout(),
        &mut out.points,
        &mut out.scalars,
        &mut out.properties,
    )?;
    out.lengths.push(entry.point_count);
    Ok(())
}

/// Bytes backing a bulk read.
enum Span<'a> {
    Loaded(&'a [u8]),
    Owned(Vec<u8>),
}

impl std::ops::Deref for Span<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Span::Loaded(bytes) => bytes,
            Span::Owned(bytes) => bytes,
        }
    }
}

/// Decide between one spanning read and per-record reads.
///
/// Returns the span when the selection covers at least `bulk_density` of the
/// record stream and the span fits the memory budget. A stream already held
/// by the bulk strategy is always reused.
fn bulk_span<'a>(
    collection: &'a TrkCollection,
    entries: &[IndexEntry],
) -> Result<Option<(u64, Span<'a>)>> {
    let stream_start = collection.header().stream_offset();
    if let Some(stream) = collection.loaded_stream() {
        return Ok(Some((stream_start, Span::Loaded(stream))));
    }
    if entries.is_empty() {
        return Ok(None);
    }

    let layout = collection.layout();
    let options = collection.options();
    let selected: u64 = entries
        .iter()
        .map(|e| layout.payload_len(e.point_count))
        .sum();
    let begin = entries.iter().map(|e| e.offset).min().unwrap_or(stream_start);
    let end = entries
        .iter()
        .map(|e| e.offset + layout.record_len(e.point_count))
        .max()
        .unwrap_or(begin);

    let span = end - begin;
    let wanted = match collection.strategy() {
        Strategy::Bulk => options.fits_budget(span),
        Strategy::Seek | Strategy::Naive => {
            options.prefers_span(selected, span, collection.stream_len())
        }
    };
    if !wanted {
        return Ok(None);
    }

    let bytes = io::read_range(collection.file(), begin..end, options.memory_budget)?;
    Ok(Some((begin, Span::Owned(bytes))))
}
