//! fs-walker - Parallel Directory Walker
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{bounded, RecvTimeoutError};
use fs_walker::config::{CliArgs, WalkConfig};
use fs_walker::progress::{print_header, print_summary, ProgressReporter};
use fs_walker::walker::RecursiveWalker;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(200);

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = CliArgs::parse();

    setup_logging(args.verbose)?;

    let config = WalkConfig::from_args(args).context("Invalid configuration")?;

    if config.show_progress {
        print_header(
            &config.root.display().to_string(),
            config.worker_count,
            config.max_level,
        );
    }

    let walker = RecursiveWalker::from_config(&config);

    // Setup signal handler for graceful shutdown
    let shutdown = walker.shutdown_handle();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, shutting down...");
        shutdown.trigger();
    })
    .context("Failed to set signal handler")?;

    let start = Instant::now();
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut write_error: Option<io::Error> = None;

    let result = thread::scope(|scope| {
        let (done_tx, done_rx) = bounded::<()>(0);

        let ticker = config.show_progress.then(|| {
            let walker = &walker;
            scope.spawn(move || {
                let progress = ProgressReporter::new();
                progress.set_status("Starting walk...");
                loop {
                    match done_rx.recv_timeout(PROGRESS_INTERVAL) {
                        Err(RecvTimeoutError::Timeout) => {
                            progress.update(&walker.progress(start.elapsed()));
                        }
                        _ => break,
                    }
                }
                progress.finish("Walk finished");
            })
        });

        let result = walker.walk_dir_serialized(&config.root, |path: &Path, size: u64| {
            if !config.print_files || write_error.is_some() {
                return;
            }
            if let Err(e) = writeln!(out, "{} {}", path.display(), size) {
                write_error = Some(e);
            }
        });

        drop(done_tx);
        if let Some(ticker) = ticker {
            let _ = ticker.join();
        }
        result
    });

    let summary = result.context("Walk failed")?;
    let flushed = out.flush();
    if let Some(e) = write_error.or(flushed.err()) {
        // A closed pipe (e.g. `| head`) is not a walk failure
        if e.kind() != io::ErrorKind::BrokenPipe {
            return Err(e).context("Failed to write output");
        }
    }

    print_summary(&summary);

    if !summary.completed {
        info!("Walk was interrupted before completion");
    }

    if summary.errors > 0 {
        info!(errors = summary.errors, "Walk completed with errors");
    }

    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("fs_walker=debug,warn")
    } else {
        EnvFilter::new("fs_walker=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
