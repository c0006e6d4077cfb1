//! CLI command implementations.

pub mod bench;
pub mod convert;
pub mod get;
pub mod index;
pub mod info;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;
use trk_core::{OpenOptions, TrkCollection};

/// Open `path` with `opts`, attaching the path to any error.
pub fn open(path: &Path, opts: OpenOptions) -> Result<TrkCollection> {
    debug!(path = %path.display(), ?opts, "opening tractogram");
    TrkCollection::open(path, opts).with_context(|| format!("opening {}", path.display()))
}
