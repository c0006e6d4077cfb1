//! `trk get`: print individual streamlines.

use std::path::Path;

use anyhow::{Context, Result};
use trk_core::{OpenOptions, Streamline};

pub fn run(path: &Path, opts: OpenOptions, indices: &[usize]) -> Result<()> {
    let collection = super::open(path, opts)?;
    let streamlines = collection
        .get_many(indices)
        .with_context(|| format!("reading streamlines from {}", path.display()))?;
    for (&i, s) in indices.iter().zip(&streamlines) {
        print!("{}", render(i, s));
    }
    Ok(())
}

fn render(index: usize, s: &Streamline) -> String {
    let mut out = format!("streamline {index}: {} points\n", s.len());
    for (p, point) in s.points.iter().enumerate() {
        out.push_str(&format!("  {p:>5}  {:>12} {:>12} {:>12}", point[0], point[1], point[2]));
        if let Some(scalars) = s.point_scalars(p).filter(|v| !v.is_empty()) {
            out.push_str(&format!("  {scalars:?}"));
        }
        out.push('\n');
    }
    if !s.properties.is_empty() {
        out.push_str(&format!("  properties: {:?}\n", s.properties));
    }
    out
}
