//! Where pget's tracing output goes.
//!
//! Diagnostics are appended to `$XDG_STATE_HOME/pget/pget.log` so they never
//! mix with the progress line on the terminal. When that file cannot be
//! opened (no home directory, read-only state dir) the same subscriber writes
//! to stderr instead. The filter is `RUST_LOG` if set, otherwise
//! [`DEFAULT_FILTER`].

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "info,pget=debug,pget_core=debug";

/// Destination chosen by [`init`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    File(PathBuf),
    Stderr,
}

/// Install the global subscriber, preferring the state-dir log file.
///
/// Never fails: if the file is unusable, logging goes to stderr and the
/// reason is logged there. A second call leaves the first subscriber in place.
pub fn init() -> LogTarget {
    let (target, writer, fallback_reason) = match open_state_log() {
        Ok((path, file)) => (
            LogTarget::File(path),
            BoxMakeWriter::new(Mutex::new(file)),
            None,
        ),
        Err(e) => (LogTarget::Stderr, BoxMakeWriter::new(std::io::stderr), Some(e)),
    };

    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .is_ok();
    if !installed {
        return target;
    }

    match (&target, fallback_reason) {
        (LogTarget::File(path), _) => {
            tracing::info!(log = %path.display(), "pget logging started")
        }
        (LogTarget::Stderr, Some(e)) => {
            tracing::debug!("no log file, using stderr: {:#}", e)
        }
        (LogTarget::Stderr, None) => {}
    }
    target
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn open_state_log() -> Result<(PathBuf, File)> {
    let dirs = xdg::BaseDirectories::with_prefix("pget").context("locating XDG directories")?;
    let path = dirs
        .place_state_file("pget.log")
        .context("creating the pget state directory")?;
    let file = open_append(&path)?;
    Ok((path, file))
}

fn open_append(path: &Path) -> Result<File> {
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))
}
