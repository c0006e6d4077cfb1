//! `trk info`: header summary and discovered streamline count.

use std::path::Path;

use anyhow::{bail, Result};
use serde::Serialize;
use trk_core::{OpenOptions, Strategy, TrkHeader};

/// Everything `trk info` reports about a file.
#[derive(Debug, Serialize)]
pub struct InfoReport {
    pub header: TrkHeader,
    /// Streamlines found by scanning, which may differ from `header.n_count`.
    pub streamlines: usize,
    pub total_points: u64,
    pub stream_bytes: u64,
    pub strategy: Strategy,
}

pub fn report(path: &Path, opts: OpenOptions) -> Result<InfoReport> {
    let collection = super::open(path, opts)?;
    let index = collection.build_index()?;
    Ok(InfoReport {
        header: collection.header().clone(),
        streamlines: index.len(),
        total_points: index.total_points(),
        stream_bytes: collection.stream_len(),
        strategy: collection.strategy(),
    })
}

pub fn run(path: &Path, opts: OpenOptions, format: Option<&str>) -> Result<()> {
    let report = report(path, opts)?;
    match format.unwrap_or("human") {
        "human" => print!("{}", render(path, &report)),
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        other => bail!("unknown format '{other}' (expected human or json)"),
    }
    Ok(())
}

fn render(path: &Path, report: &InfoReport) -> String {
    let h = &report.header;
    let declared = match h.declared_count() {
        Some(n) if n == report.streamlines => format!("{n}"),
        Some(n) => format!("{n} (disagrees with scan)"),
        None => "unknown".to_string(),
    };
    let mut out = String::new();
    out.push_str(&format!("--- {} ---\n", path.display()));
    out.push_str(&format!("  Version:       {}\n", h.version));
    out.push_str(&format!("  Byte order:    {:?}\n", h.endianness));
    out.push_str(&format!("  Dimensions:    {:?}\n", h.dim));
    out.push_str(&format!("  Voxel size:    {:?}\n", h.voxel_size));
    out.push_str(&format!("  Voxel order:   {}\n", h.voxel_order));
    out.push_str(&format!("  Scalars:       {} {:?}\n", h.n_scalars, h.scalar_names));
    out.push_str(&format!("  Properties:    {} {:?}\n", h.n_properties, h.property_names));
    out.push_str("  vox_to_ras:\n");
    for row in &h.vox_to_ras {
        out.push_str(&format!("    {row:?}\n"));
    }
    out.push_str(&format!("  Declared:      {declared}\n"));
    out.push_str(&format!("  Streamlines:   {}\n", report.streamlines));
    out.push_str(&format!("  Points:        {}\n", report.total_points));
    out.push_str(&format!("  Stream bytes:  {}\n", report.stream_bytes));
    out.push_str(&format!("  Strategy:      {}\n", report.strategy));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixture;

    #[test]
    fn report_counts() {
        let file = fixture::write_sample();
        let report = report(file.path(), OpenOptions::new()).unwrap();
        assert_eq!(report.streamlines, 10);
        assert_eq!(report.total_points, 23);
        assert_eq!(report.header.n_count, 10);
    }

    #[test]
    fn render_flags_count_mismatch() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            &fixture::trk_bytes(5, &[vec![[0.0, 0.0, 0.0]]]),
        )
        .unwrap();
        let report = report(file.path(), OpenOptions::new()).unwrap();
        let text = render(file.path(), &report);
        assert!(text.contains("5 (disagrees with scan)"));
        assert!(text.contains("Streamlines:   1"));
    }

    #[test]
    fn json_output() {
        let file = fixture::write_sample();
        let report = report(file.path(), OpenOptions::new()).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["streamlines"], 10);
        assert_eq!(json["header"]["endianness"], "little");
        assert_eq!(json["strategy"], "seek");
    }

    #[test]
    fn unknown_format_rejected() {
        let file = fixture::write_sample();
        assert!(run(file.path(), OpenOptions::new(), Some("xml")).is_err());
    }
}
