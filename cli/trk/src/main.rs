//! trk: inspect and extract streamlines from TrackVis `.trk` files.

mod commands;
mod config;
mod selection;

use std::path::{Path, PathBuf};
use std::process;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use config::{OpenOverrides, TrkConfig};
use selection::Selection;

#[derive(Parser)]
#[command(name = "trk", version, about = "TrackVis streamline indexing and extraction")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Config file (default: nearest trk.toml upward from the working directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Extraction strategy (auto, naive, seek, bulk)
    #[arg(long, global = true)]
    strategy: Option<String>,
    /// Header count handling (scan, header, strict)
    #[arg(long, global = true)]
    count_policy: Option<String>,
    /// Build the offset index when the file is opened
    #[arg(long, global = true)]
    eager: bool,
    /// Keep the records before a truncation point usable
    #[arg(long, global = true)]
    partial: bool,
    /// Decode selections on the calling thread only
    #[arg(long, global = true)]
    no_parallel: bool,
    /// Upper bound in bytes for any single buffer
    #[arg(long, global = true)]
    memory_budget: Option<u64>,
    /// More log output (-v info, -vv debug, -vvv trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Show header fields and the scanned streamline count
    Info {
        file: PathBuf,
        /// Output format (human, json)
        #[arg(long)]
        format: Option<String>,
    },
    /// Build the offset index and report it
    Index {
        file: PathBuf,
        /// Print the first N index entries
        #[arg(long, default_value_t = 0)]
        show: usize,
    },
    /// Print streamlines by index
    Get {
        file: PathBuf,
        /// Zero-based streamline indices
        #[arg(required = true)]
        indices: Vec<usize>,
    },
    /// Flatten a selection into one point container and summarize it
    Convert {
        file: PathBuf,
        /// Take the first N streamlines
        #[arg(long, conflicts_with = "sample")]
        first: Option<usize>,
        /// Draw K streamlines at random
        #[arg(long)]
        sample: Option<usize>,
        /// Seed for --sample
        #[arg(long)]
        seed: Option<u64>,
        /// Sample with replacement
        #[arg(long)]
        replace: bool,
    },
    /// Time the extraction strategies on a random selection
    Bench {
        file: PathBuf,
        /// Number of streamlines to extract
        #[arg(long)]
        sample: Option<usize>,
        /// Seed for the selection
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let config = load_config(cli.global.config.as_deref(), &cwd)?;
    let opts = config.open_options(&OpenOverrides {
        strategy: cli.global.strategy,
        count_policy: cli.global.count_policy,
        eager: cli.global.eager,
        partial: cli.global.partial,
        no_parallel: cli.global.no_parallel,
        memory_budget: cli.global.memory_budget,
    })?;

    match cli.command {
        Commands::Info { file, format } => commands::info::run(&file, opts, format.as_deref()),

        Commands::Index { file, show } => commands::index::run(&file, opts, show),

        Commands::Get { file, indices } => commands::get::run(&file, opts, &indices),

        Commands::Convert {
            file,
            first,
            sample,
            seed,
            replace,
        } => {
            let selection = match (first, sample) {
                (Some(n), _) => Selection::First(n),
                (None, Some(count)) => Selection::Sample {
                    count,
                    seed: seed.or(config.sample.seed),
                    replace: replace || config.sample.replace,
                },
                (None, None) => Selection::All,
            };
            commands::convert::run(&file, opts, &selection)
        }

        Commands::Bench { file, sample, seed } => {
            commands::bench::run(&file, opts, sample, seed.or(config.sample.seed))
        }
    }
}

fn load_config(explicit: Option<&Path>, cwd: &Path) -> Result<TrkConfig> {
    if let Some(path) = explicit {
        debug!(path = %path.display(), "loading config");
        return TrkConfig::load(path);
    }
    match TrkConfig::find_and_load(cwd)? {
        Some((config, path)) => {
            debug!(path = %path.display(), "loading config");
            Ok(config)
        }
        None => Ok(TrkConfig::default()),
    }
}
