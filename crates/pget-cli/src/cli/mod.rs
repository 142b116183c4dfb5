//! Command line front-end: one download per invocation.

mod console;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pget_core::config::{self, PgetConfig};
use pget_core::naming;
use pget_core::{DownloadJob, JobOptions, JobOutcome};

use console::ConsoleObserver;

/// Segmented parallel HTTP downloader. Re-run the same command to resume an
/// interrupted download.
#[derive(Debug, Parser)]
#[command(name = "pget", version)]
#[command(about = "pget: segmented parallel file downloader", long_about = None)]
pub struct Cli {
    /// Direct HTTP/HTTPS URL to download.
    pub url: String,

    /// Destination file (default: last segment of the URL path).
    pub filename: Option<PathBuf>,

    /// Number of segments fetched in parallel (default: derived from size).
    #[arg(long, value_name = "N")]
    pub splits: Option<usize>,

    /// Write/progress increment in KiB (default: derived from size, at most 4096).
    #[arg(long = "chunk-size", alias = "chunk_size", value_name = "KB")]
    pub chunk_size_kb: Option<u64>,
}

impl Cli {
    fn destination(&self) -> PathBuf {
        self.filename
            .clone()
            .unwrap_or_else(|| PathBuf::from(naming::filename_from_url(&self.url)))
    }

    fn job_options(&self) -> JobOptions {
        JobOptions {
            segment_count: self.splits.filter(|&n| n > 0),
            chunk_size: self
                .chunk_size_kb
                .filter(|&kb| kb > 0)
                .map(|kb| kb.saturating_mul(1024)),
            total_size: None,
        }
    }
}

pub async fn run_from_args() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_or_init().context("loading config")?;
    tracing::debug!("loaded config: {:?}", cfg);
    run_download(cli, &cfg).await
}

async fn run_download(cli: Cli, cfg: &PgetConfig) -> Result<()> {
    let destination = cli.destination();
    let observer = Arc::new(ConsoleObserver::new());
    let job = DownloadJob::new(cli.url.clone(), destination.clone())
        .with_options(cli.job_options())
        .with_config(cfg)
        .with_observer(observer.clone());
    let handle = job.handle();
    println!("Downloading {} -> {}", cli.url, destination.display());

    // The engine blocks on worker threads; keep the runtime free for Ctrl-C.
    let mut task = tokio::task::spawn_blocking(move || job.run());
    let joined = tokio::select! {
        res = &mut task => res,
        Ok(()) = tokio::signal::ctrl_c() => {
            observer.finish();
            eprintln!("Interrupted, saving progress...");
            handle.cancel();
            task.await
        }
    };
    observer.finish();

    match joined.context("download task panicked")? {
        Ok(JobOutcome::Completed { bytes }) => {
            println!("Saved {} ({} bytes)", destination.display(), bytes);
            Ok(())
        }
        Ok(JobOutcome::Cancelled) => {
            println!("Download cancelled; run the same command again to resume.");
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("downloading {}", cli.url)),
    }
}
