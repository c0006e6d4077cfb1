//! Offset indexing and random-access extraction of TrackVis (.trk) streamlines.
//!
//! A TRK file is a fixed header followed by variable-length records, each
//! announcing its own point count. Reaching streamline N therefore needs either
//! a forward scan or a precomputed offset table. This crate builds that table
//! once, with a pass that reads only the length prefixes, and then serves
//! single, batched, sequential and flattened access from it.
//!
//! ## File Layout
//!
//! ```text
//! TRK File Layout:
//! ┌─────────────────────────────────────────┐
//! │ Header                       1000 bytes │
//! │   id_string "TRACK\0", dim, voxel_size  │
//! │   n_scalars, n_properties, vox_to_ras   │
//! │   n_count (0 = unknown), version        │
//! │   hdr_size = 1000 (fixes byte order)    │
//! ├─────────────────────────────────────────┤
//! │ Record 0                                │
//! │   point_count: i32                      │
//! │   point_count x (x, y, z, scalars..)    │
//! │   properties..                          │
//! ├─────────────────────────────────────────┤
//! │ Record 1 ...                            │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use trk_core::{bulk_convert, OpenOptions, StrategyHint, TrkCollection};
//!
//! let tracts = TrkCollection::open(
//!     "tract.trk",
//!     OpenOptions::new().strategy(StrategyHint::Seek),
//! )?;
//! let first = tracts.get(0)?;
//! let picked = tracts.get_many(&[42, 7, 1000])?;
//! let flat = bulk_convert(&tracts, &[0, 1, 2])?;
//! assert_eq!(flat.lengths.len(), 3);
//! # let _ = (first, picked);
//! # Ok::<(), trk_core::TrkError>(())
//! ```

mod bulk;
mod cancel;
mod collection;
mod decode;
mod error;
mod header;
mod index;
mod io;
mod layout;
mod options;

#[cfg(test)]
#[path = "../tests/common/mod.rs"]
mod test_support;

pub use bulk::{bulk_convert, bulk_convert_all, bulk_convert_with, BulkStreamlines};
pub use cancel::CancelToken;
pub use collection::{StreamlineIter, TrkCollection};
pub use decode::{decode_append, decode_streamline, Streamline};
pub use error::{Result, TrkError};
pub use header::{TrkHeader, HEADER_SIZE, MAGIC, MAX_FIELDS};
pub use index::{IndexBuilder, IndexEntry, OffsetIndex, ScanOutcome, Truncation};
pub use layout::{Endianness, RecordLayout, PREFIX_LEN};
pub use options::{CountPolicy, OpenOptions, Strategy, StrategyHint, DEFAULT_BULK_DENSITY};

/// Open a TRK file. Shorthand for [`TrkCollection::open`].
pub fn open(path: impl AsRef<std::path::Path>, options: OpenOptions) -> Result<TrkCollection> {
    TrkCollection::open(path, options)
}
