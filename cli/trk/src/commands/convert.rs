//! `trk convert`: flatten a selection of streamlines into one container.

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use tracing::info;
use trk_core::{bulk_convert, BulkStreamlines, OpenOptions};

use crate::selection::Selection;

pub fn run(path: &Path, opts: OpenOptions, selection: &Selection) -> Result<()> {
    let bulk = convert(path, opts, selection)?;
    print!("{}", render(&bulk));
    Ok(())
}

pub fn convert(path: &Path, opts: OpenOptions, selection: &Selection) -> Result<BulkStreamlines> {
    let collection = super::open(path, opts)?;
    let indices = selection.resolve(collection.len()?);

    let start = Instant::now();
    let bulk = bulk_convert(&collection, &indices)?;
    info!(
        streamlines = bulk.len(),
        points = bulk.total_points(),
        plan = %bulk.plan,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "bulk conversion finished"
    );
    Ok(bulk)
}

fn render(bulk: &BulkStreamlines) -> String {
    let mut out = String::new();
    out.push_str(&format!("Plan:        {}\n", bulk.plan));
    out.push_str(&format!("Streamlines: {}\n", bulk.len()));
    out.push_str(&format!("Points:      {}\n", bulk.total_points()));
    out.push_str(&format!("Scalars:     {} per point\n", bulk.scalar_count));
    out.push_str(&format!("Properties:  {} per streamline\n", bulk.property_count));
    if let (Some(min), Some(max)) = (bulk.lengths.iter().min(), bulk.lengths.iter().max()) {
        let mean = bulk.total_points() as f64 / bulk.len() as f64;
        out.push_str(&format!("Lengths:     min {min}, max {max}, mean {mean:.2}\n"));
    }
    out
}
