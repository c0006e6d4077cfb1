//! `trk.toml` configuration.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use trk_core::{CountPolicy, OpenOptions, StrategyHint};

/// File name searched for from the working directory upward.
pub const CONFIG_FILE: &str = "trk.toml";

/// The top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TrkConfig {
    /// Options handed to the reader for every opened file.
    pub open: OpenOptions,
    /// Defaults for random selections.
    pub sample: SampleConfig,
}

/// `[sample]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SampleConfig {
    /// Fixed seed for reproducible selections.
    pub seed: Option<u64>,
    /// Draw with replacement.
    pub replace: bool,
}

/// Overrides given on the command line. `None` keeps the configured value.
#[derive(Debug, Clone, Default)]
pub struct OpenOverrides {
    pub strategy: Option<String>,
    pub count_policy: Option<String>,
    pub eager: bool,
    pub partial: bool,
    pub no_parallel: bool,
    pub memory_budget: Option<u64>,
}

impl TrkConfig {
    /// Search upward from `start_dir` for `trk.toml`.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.is_file() {
                return Ok(Some((Self::load(&candidate)?, candidate)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    /// Load a specific config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Parse a configuration from a TOML string.
    #[cfg(test)]
    pub fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing trk.toml")
    }

    /// The configured open options with command-line overrides applied.
    pub fn open_options(&self, overrides: &OpenOverrides) -> Result<OpenOptions> {
        let mut opts = self.open.clone();
        if let Some(name) = overrides.strategy.as_deref() {
            opts.strategy = parse_strategy(name)?;
        }
        if let Some(name) = overrides.count_policy.as_deref() {
            opts.count_policy = parse_count_policy(name)?;
        }
        if overrides.eager {
            opts.eager_index = true;
        }
        if overrides.partial {
            opts.partial_index = true;
        }
        if overrides.no_parallel {
            opts.parallel = false;
        }
        if overrides.memory_budget.is_some() {
            opts.memory_budget = overrides.memory_budget;
        }
        Ok(opts)
    }
}

pub fn parse_strategy(name: &str) -> Result<StrategyHint> {
    match name {
        "auto" => Ok(StrategyHint::Auto),
        "naive" => Ok(StrategyHint::Naive),
        "seek" => Ok(StrategyHint::Seek),
        "bulk" => Ok(StrategyHint::Bulk),
        other => bail!("unknown strategy '{other}' (expected auto, naive, seek or bulk)"),
    }
}

pub fn parse_count_policy(name: &str) -> Result<CountPolicy> {
    match name {
        "scan" => Ok(CountPolicy::Scan),
        "header" => Ok(CountPolicy::Header),
        "strict" => Ok(CountPolicy::Strict),
        other => bail!("unknown count policy '{other}' (expected scan, header or strict)"),
    }
}
