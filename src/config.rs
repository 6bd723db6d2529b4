//! Configuration types for fs-walker
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation

use crate::error::ConfigError;
use crate::pool::Termination;
use clap::Parser;
use regex::Regex;
use std::path::PathBuf;
use std::time::Duration;

/// Maximum reasonable worker count
pub const MAX_WORKERS: usize = 512;

/// Default traversal depth below the root
pub const DEFAULT_MAX_LEVEL: usize = 4;

/// Default worker count for library callers
pub const DEFAULT_WORKERS: usize = 10;

/// Parallel directory walker that prints every file with its size
#[derive(Parser, Debug, Clone)]
#[command(
    name = "fs-walker",
    version,
    about = "Parallel directory walker that prints every file with its size",
    long_about = "Walks a directory tree with a fixed pool of worker threads.\n\n\
                  Each subdirectory becomes a new task in the pool; the walk ends when\n\
                  no task is outstanding, or after an idle window when --idle-timeout-ms is set.",
    after_help = "EXAMPLES:\n    \
        fs-walker ~/src\n    \
        fs-walker /data -w 32 -d 8 -q -p\n    \
        fs-walker . --exclude '/target/' --exclude '\\.git/'"
)]
pub struct CliArgs {
    /// Directory to walk
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    /// Number of worker threads
    #[arg(
        short = 'w',
        long,
        default_value_t = default_workers(),
        value_name = "NUM"
    )]
    pub workers: usize,

    /// Maximum directory depth below ROOT (0 = ROOT only)
    #[arg(short = 'd', long, default_value_t = DEFAULT_MAX_LEVEL, value_name = "NUM")]
    pub max_depth: usize,

    /// Stop after no directory finished for this many milliseconds
    #[arg(long, value_name = "MS")]
    pub idle_timeout_ms: Option<u64>,

    /// Exclude paths matching pattern (can be repeated)
    #[arg(long = "exclude", value_name = "PATTERN", action = clap::ArgAction::Append)]
    pub exclude_patterns: Vec<String>,

    /// Follow symbolic links (directories are visited once)
    #[arg(short = 'L', long)]
    pub follow_links: bool,

    /// Quiet mode - do not print one line per file
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Show a progress spinner
    #[arg(short = 'p', long)]
    pub progress: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

fn default_workers() -> usize {
    // Directory reads are I/O bound
    num_cpus::get() * 2
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct WalkConfig {
    /// Directory to start from
    pub root: PathBuf,

    /// Number of worker threads
    pub worker_count: usize,

    /// Deepest level that is still opened (root is level 0)
    pub max_level: usize,

    /// How the walk decides it is finished
    pub termination: Termination,

    /// Follow symbolic links
    pub follow_links: bool,

    /// Compiled exclude patterns
    pub exclude_patterns: Vec<Regex>,

    /// Print one line per file
    pub print_files: bool,

    /// Show progress indicator
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            worker_count: DEFAULT_WORKERS,
            max_level: DEFAULT_MAX_LEVEL,
            termination: Termination::Drained,
            follow_links: false,
            exclude_patterns: Vec::new(),
            print_files: true,
            show_progress: false,
            verbose: false,
        }
    }
}

impl WalkConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        // Validate worker count
        if args.workers == 0 || args.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: args.workers,
                max: MAX_WORKERS,
            });
        }

        // Validate root
        if !args.root.exists() {
            return Err(ConfigError::InvalidRoot {
                path: args.root,
                reason: "does not exist".into(),
            });
        }
        if !args.root.is_dir() {
            return Err(ConfigError::InvalidRoot {
                path: args.root,
                reason: "not a directory".into(),
            });
        }

        let termination = match args.idle_timeout_ms {
            Some(0) => return Err(ConfigError::InvalidIdleTimeout),
            Some(ms) => Termination::IdleTimeout(Duration::from_millis(ms)),
            None => Termination::Drained,
        };

        let exclude_patterns = compile_patterns(&args.exclude_patterns)?;

        Ok(Self {
            root: args.root,
            worker_count: args.workers,
            max_level: args.max_depth,
            termination,
            follow_links: args.follow_links,
            exclude_patterns,
            print_files: !args.quiet,
            show_progress: args.progress,
            verbose: args.verbose,
        })
    }
}

/// Compile exclude patterns, reporting the first invalid one
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| ConfigError::InvalidExcludePattern {
                pattern: p.clone(),
                reason: e.to_string(),
            })
        })
        .collect()
}
