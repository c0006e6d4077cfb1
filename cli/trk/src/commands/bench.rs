//! `trk bench`: compare the extraction strategies on one selection.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use tracing::{debug, info};
use trk_core::{bulk_convert, OpenOptions, Streamline, StrategyHint};

use crate::selection::Selection;

/// Selection size used when none is given.
pub const DEFAULT_SAMPLE: usize = 1000;

const STRATEGIES: [StrategyHint; 3] = [StrategyHint::Naive, StrategyHint::Seek, StrategyHint::Bulk];

/// Timing of one strategy over the selection.
#[derive(Debug)]
pub struct Timing {
    pub name: String,
    /// Time to open and build the index.
    pub index: Duration,
    /// Time to extract the selection.
    pub extract: Duration,
}

pub fn run(path: &Path, opts: OpenOptions, sample: Option<usize>, seed: Option<u64>) -> Result<()> {
    let timings = measure(path, opts, sample, seed)?;
    println!("{:<14} {:>12} {:>12}", "strategy", "index", "extract");
    for t in &timings {
        println!(
            "{:<14} {:>12} {:>12}",
            t.name,
            format!("{:.3?}", t.index),
            format!("{:.3?}", t.extract)
        );
    }
    Ok(())
}

/// Time every strategy plus bulk conversion and check they extract identical streamlines.
pub fn measure(
    path: &Path,
    opts: OpenOptions,
    sample: Option<usize>,
    seed: Option<u64>,
) -> Result<Vec<Timing>> {
    let len = super::open(path, opts.clone())?.len()?;
    let indices = Selection::Sample {
        count: sample.unwrap_or(DEFAULT_SAMPLE).min(len),
        seed,
        replace: false,
    }
    .resolve(len);
    info!(streamlines = len, selected = indices.len(), "benchmarking");

    let mut timings = Vec::new();
    let mut reference: Option<Vec<Streamline>> = None;
    for hint in STRATEGIES {
        let start = Instant::now();
        let collection = super::open(path, opts.clone().strategy(hint))?;
        collection.build_index()?;
        let index = start.elapsed();

        let start = Instant::now();
        let streamlines = collection.get_many(&indices)?;
        let extract = start.elapsed();

        let name = collection.strategy().to_string();
        debug!(strategy = %name, ?index, ?extract, "strategy measured");
        match &reference {
            Some(expected) => check_identical(&name, expected, &streamlines)?,
            None => reference = Some(streamlines),
        }
        timings.push(Timing {
            name,
            index,
            extract,
        });
    }

    let start = Instant::now();
    let collection = super::open(path, opts)?;
    collection.build_index()?;
    let index = start.elapsed();
    let start = Instant::now();
    let bulk = bulk_convert(&collection, &indices)?;
    let extract = start.elapsed();
    if let Some(expected) = &reference {
        check_identical("convert", expected, &bulk.iter().collect::<Vec<_>>())?;
    }
    timings.push(Timing {
        name: format!("convert/{}", bulk.plan),
        index,
        extract,
    });

    Ok(timings)
}

fn check_identical(name: &str, expected: &[Streamline], got: &[Streamline]) -> Result<()> {
    if expected.len() != got.len() {
        bail!(
            "{name}: extracted {} streamlines, expected {}",
            got.len(),
            expected.len()
        );
    }
    if let Some(k) = expected.iter().zip(got).position(|(a, b)| !a.bit_eq(b)) {
        bail!("{name}: selection entry {k} differs from naive extraction");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixture;

    #[test]
    fn all_strategies_measured() {
        let file = fixture::write_sample();
        let timings = measure(file.path(), OpenOptions::new(), Some(5), Some(3)).unwrap();
        let names: Vec<_> = timings.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names[..3], ["naive", "seek", "bulk"]);
        assert!(names[3].starts_with("convert/"));
    }

    #[test]
    fn sample_is_clamped_to_collection() {
        let file = fixture::write_sample();
        assert!(measure(file.path(), OpenOptions::new(), Some(500), None).is_ok());
    }

    #[test]
    fn mismatch_is_reported() {
        let a = Streamline {
            points: vec![[0.0, 0.0, 0.0]],
            ..Default::default()
        };
        let b = Streamline {
            points: vec![[-0.0, 0.0, 0.0]],
            ..Default::default()
        };
        let err = check_identical("seek", &[a.clone()], &[b]).unwrap_err();
        assert!(err.to_string().contains("entry 0"));
        assert!(check_identical("seek", &[a.clone()], &[]).is_err());
        assert!(check_identical("seek", &[a.clone()], &[a]).is_ok());
    }
}
