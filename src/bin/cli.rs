//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! CLI supporting `inspect` and `config`.
//!
//! Examples:
//! ```bash
//! fewshot-cli inspect --dataset mini-imagenet --data-root ./dataset
//! fewshot-cli inspect --dataset omniglot --classes-per-it-tr 60 --batches 2
//! fewshot-cli -v inspect --config run.json              # options from JSON
//! fewshot-cli config --dataset tier-imagenet --tiered-interface legacy
//! ```

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use futures_util::StreamExt;
use std::collections::BTreeSet;
use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fewshot_loader::{build_loaders, Dataset, LogSink, Opts, Sample};

/// Macro to safely print with broken pipe handling
macro_rules! safe_println {
    ($($arg:tt)*) => {
        match writeln!(io::stdout(), $($arg)*) {
            Ok(_) => {},
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                // Gracefully exit on broken pipe (e.g., when piped to head/tail)
                std::process::exit(0);
            }
            Err(e) => return Err(e.into())
        }
    };
}

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[arg(short = 'v',
        long,
        action = ArgAction::Count,
        help = "Increase log verbosity: -v = Info, -vv = Debug",
    )]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the split loaders and summarise each one.
    Inspect {
        /// Read options from a JSON file instead of the flags below.
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        #[command(flatten)]
        opts: Opts,

        /// Pull this many batches from the training loader.
        #[arg(long, default_value_t = 0)]
        batches: usize,
    },

    /// Print the effective options as JSON.
    Config {
        /// Read options from a JSON file instead of the flags below.
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        #[command(flatten)]
        opts: Opts,
    },
}

fn resolve_opts(config: Option<PathBuf>, opts: Opts) -> Result<Opts> {
    match config {
        Some(path) => Opts::from_json_file(path),
        None => Ok(opts),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Loads any variables from .env file that are not already set
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",        // no -v: WARN level
        1 => "info",        // -v: INFO level
        _ => "debug",       // -vv or more: DEBUG level
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    match cli.cmd {
        Command::Inspect { config, opts, batches } => {
            inspect(resolve_opts(config, opts)?, batches).await?;
        }
        Command::Config { config, opts } => {
            let opts = resolve_opts(config, opts)?;
            safe_println!("{}", serde_json::to_string_pretty(&opts)?);
        }
    }
    Ok(())
}

async fn inspect(opts: Opts, batches: usize) -> Result<()> {
    let log = LogSink::open(opts.log_file.as_deref()).context("opening log file")?;

    let t0 = Instant::now();
    let loaders = build_loaders(&opts, &log)?;
    info!("built loaders for {} in {:?}", opts.dataset, t0.elapsed());

    for (split, slot) in loaders.iter() {
        let Some(loader) = slot.loader() else {
            safe_println!("{:<9} empty", split);
            continue;
        };
        let o = loader.options();
        let sampler = loader
            .batch_sampler()
            .map(|s| format!("{}x{}", s.num_batches(), s.batch_len()))
            .unwrap_or_else(|| "-".to_string());
        safe_println!(
            "{:<9} {:<20} items={:<6} batches/epoch={:<6} batch_size={} workers={} shuffle={} pin_memory={} sampler={}",
            split,
            loader.dataset().kind(),
            loader.dataset().len().unwrap_or(0),
            loader.num_batches().map(|n| n.to_string()).unwrap_or_else(|| "?".into()),
            o.batch_size,
            o.num_workers,
            o.shuffle,
            o.pin_memory,
            sampler
        );
    }

    if batches == 0 {
        return Ok(());
    }
    let Some(train) = loaders.train.loader() else {
        return Ok(());
    };

    let mut stream = train.stream();
    for i in 0..batches {
        let t = Instant::now();
        let Some(batch) = stream.next().await else { break };
        let batch = batch.with_context(|| format!("loading training batch {}", i))?;
        safe_println!("batch {:>3}: {} ({:?})", i, describe(&batch), t.elapsed());
    }
    Ok(())
}

fn describe(batch: &[Sample]) -> String {
    match batch.first() {
        Some(Sample::Episode(e)) => format!(
            "{} episodes, support {:?}, query {:?}",
            batch.len(),
            e.support_x.shape(),
            e.query_x.shape()
        ),
        Some(Sample::Image { image, .. }) => {
            let classes: BTreeSet<_> = batch.iter().filter_map(Sample::label).collect();
            format!("{} images of {:?} from {} classes", batch.len(), image.shape(), classes.len())
        }
        None => "empty batch".to_string(),
    }
}
