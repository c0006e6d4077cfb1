//! Open-time configuration.
//!
//! Everything here derives `Deserialize` so collaborators can load it from a
//! config file; every field has a default.

use serde::{Deserialize, Serialize};

/// Default fraction of the record stream above which bulk reads win over per-record seeks.
pub const DEFAULT_BULK_DENSITY: f64 = 0.25;

/// Requested extraction strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyHint {
    /// Positional reads for single records. A batch covering at least
    /// `bulk_density` of the stream, within the memory budget, reads the
    /// stream once instead.
    #[default]
    Auto,
    Naive,
    Seek,
    Bulk,
}

/// Resolved extraction strategy of an open collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Walk length prefixes from the start of the stream on every access.
    Naive,
    /// Positional read of one record using the offset index.
    Seek,
    /// Hold the whole record stream in memory and slice it.
    Bulk,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Strategy::Naive => "naive",
            Strategy::Seek => "seek",
            Strategy::Bulk => "bulk",
        };
        f.write_str(name)
    }
}

/// How the header's `n_count` relates to the scanned record count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountPolicy {
    /// Scan to end of file; the header count is a hint only.
    #[default]
    Scan,
    /// Stop after `n_count` records when it is nonzero.
    Header,
    /// Scan to end of file and fail when a nonzero header count disagrees.
    Strict,
}

/// Options for [`TrkCollection::open`](crate::TrkCollection::open).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenOptions {
    /// Build the offset index during `open` instead of on first indexed access.
    pub eager_index: bool,
    pub strategy: StrategyHint,
    pub count_policy: CountPolicy,
    /// Keep the records before a truncation point usable instead of staying unindexed.
    pub partial_index: bool,
    /// Decode `get_many` selections on the rayon pool.
    pub parallel: bool,
    /// Upper bound in bytes for any single buffer the core allocates.
    pub memory_budget: Option<u64>,
    /// Selected payload share of the stream at which bulk conversion reads one span.
    pub bulk_density: f64,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            eager_index: false,
            strategy: StrategyHint::Auto,
            count_policy: CountPolicy::Scan,
            partial_index: false,
            parallel: true,
            memory_budget: None,
            bulk_density: DEFAULT_BULK_DENSITY,
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eager_index(mut self, eager: bool) -> Self {
        self.eager_index = eager;
        self
    }

    pub fn strategy(mut self, hint: StrategyHint) -> Self {
        self.strategy = hint;
        self
    }

    pub fn count_policy(mut self, policy: CountPolicy) -> Self {
        self.count_policy = policy;
        self
    }

    pub fn partial_index(mut self, partial: bool) -> Self {
        self.partial_index = partial;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn memory_budget(mut self, bytes: Option<u64>) -> Self {
        self.memory_budget = bytes;
        self
    }

    pub fn bulk_density(mut self, density: f64) -> Self {
        self.bulk_density = density;
        self
    }

    /// Whether a buffer of `bytes` fits the configured budget.
    pub fn fits_budget(&self, bytes: u64) -> bool {
        self.memory_budget.map_or(true, |budget| bytes <= budget)
    }

    /// The strategy a collection opens with. `Auto` starts as `Seek` and is
    /// promoted per batch by [`prefers_span`](Self::prefers_span).
    pub fn resolve_strategy(&self) -> Strategy {
        match self.strategy {
            StrategyHint::Naive => Strategy::Naive,
            StrategyHint::Auto | StrategyHint::Seek => Strategy::Seek,
            StrategyHint::Bulk => Strategy::Bulk,
        }
    }

    /// Whether reading `span` bytes at once beats per-record reads for a
    /// selection of `selected` payload bytes out of a `stream_len`-byte stream.
    pub fn prefers_span(&self, selected: u64, span: u64, stream_len: u64) -> bool {
        selected as f64 >= self.bulk_density * stream_len as f64 && self.fits_budget(span)
    }
}
