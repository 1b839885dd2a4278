//! Media Sorter - moves photos and videos into dated folders
//!
//! Scans the source tree concurrently, appends the scan results to the scan
//! log, then moves each planned file while logging to the move log.

use anyhow::Result;
use clap::Parser;
use media_sorter::{Cli, Config, Mover, scan_dir, write_scan_log};
use std::fs::OpenOptions;
use std::path::Path;
use tracing::{Dispatch, Level, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let scan_dispatch = console_dispatch(&cli);
    let (move_dispatch, guard) = move_log_dispatch(&cli, &cli.move_log)?;

    let config = load_config(&cli)?;
    config.validate()?;

    tracing::dispatcher::with_default(&scan_dispatch, || {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            source = %cli.source.display(),
            dest = %cli.dest.display(),
            "Media Sorter starting"
        );
        if cli.verbose {
            info!(?config, "Configuration loaded");
        }
    });

    let scanned = scan_dir(&cli.source, &cli.dest, &config, scan_dispatch.clone());
    let (results, walk_failed) = match scanned {
        Ok(results) => (results, false),
        Err(e) => {
            eprintln!("Error: {}", e);
            tracing::dispatcher::with_default(&scan_dispatch, || {
                error!(error = %e, "Scan failed");
            });
            (Vec::new(), true)
        }
    };

    tracing::dispatcher::with_default(&scan_dispatch, || {
        if let Err(e) = write_scan_log(&cli.scan_log, &results) {
            warn!(path = %cli.scan_log.display(), error = %e, "Failed to write scan log");
        }
    });

    if cli.dry_run {
        tracing::dispatcher::with_default(&scan_dispatch, || {
            info!(files = results.len(), "Dry run, nothing moved");
        });
    } else {
        let stats = Mover::new(move_dispatch).move_all(&results);
        println!("{}", stats.summary());
    }

    if walk_failed {
        // Flush the move log before exiting.
        drop(guard);
        std::process::exit(1);
    }

    Ok(())
}

/// Load configuration from file if given, then apply CLI overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };
    Ok(cli.merge_with_config(config))
}

fn env_filter(cli: &Cli) -> EnvFilter {
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

/// Console-only logging for the scan phase
fn console_dispatch(cli: &Cli) -> Dispatch {
    let subscriber = tracing_subscriber::registry()
        .with(env_filter(cli))
        .with(cli.json_log.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!cli.json_log).then(|| fmt::layer().with_writer(std::io::stderr)));

    Dispatch::new(subscriber)
}

/// Logging for the move phase: appended to the move log and echoed to stderr
fn move_log_dispatch(cli: &Cli, log_path: &Path) -> Result<(Dispatch, WorkerGuard)> {
    if let Some(parent) = log_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter(cli))
        .with(cli.json_log.then(|| {
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(non_blocking.clone())
        }))
        .with((!cli.json_log).then(|| fmt::layer().with_ansi(false).with_writer(non_blocking)))
        .with(fmt::layer().with_writer(std::io::stderr));

    Ok((Dispatch::new(subscriber), guard))
}
