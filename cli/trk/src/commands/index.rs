//! `trk index`: run the offset pass and report what it found.

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use tracing::{info, warn};
use trk_core::{OffsetIndex, OpenOptions, TrkError};

pub fn run(path: &Path, opts: OpenOptions, show: usize) -> Result<()> {
    let collection = super::open(path, opts)?;

    let start = Instant::now();
    let index = match (collection.build_index(), collection.index()) {
        (Ok(index), _) => index,
        (Err(TrkError::TruncatedRecord { .. }), Some(partial)) => {
            if let Some(t) = collection.truncation() {
                warn!(
                    index = t.index,
                    offset = t.offset,
                    expected = t.expected,
                    available = t.available,
                    "file is truncated, keeping complete records"
                );
            }
            partial
        }
        (Err(e), _) => return Err(e.into()),
    };
    info!(
        streamlines = index.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "offset index built"
    );

    print!("{}", render(index, show));
    Ok(())
}

fn render(index: &OffsetIndex, show: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!("Streamlines: {}\n", index.len()));
    out.push_str(&format!("Points:      {}\n", index.total_points()));
    out.push_str(&format!("Stream:      {}..{}\n", index.start(), index.end()));
    if show > 0 {
        out.push_str("  #         offset   points\n");
        for (i, entry) in index.iter().take(show).enumerate() {
            out.push_str(&format!(
                "  {i:<8} {:>8} {:>8}\n",
                entry.offset, entry.point_count
            ));
        }
    }
    out
}
