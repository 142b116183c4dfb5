//! Terminal observer: one status line, redrawn at most every 500 ms.

use std::io::Write;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use pget_core::DownloadObserver;

const REDRAW_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Default)]
struct Line {
    status: String,
    bytes: u64,
    speed: f64,
    eta: Option<f64>,
    last_draw: Option<Instant>,
    drawn: bool,
}

pub struct ConsoleObserver {
    line: Mutex<Line>,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        ConsoleObserver {
            line: Mutex::new(Line::default()),
        }
    }

    /// End the status line so later output starts on a fresh line.
    pub fn finish(&self) {
        let mut line = self.line.lock().unwrap_or_else(PoisonError::into_inner);
        if line.drawn {
            println!();
            line.drawn = false;
        }
    }

    fn redraw(&self, force: bool) {
        let mut line = self.line.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let due = line
            .last_draw
            .map_or(true, |t| now.duration_since(t) >= REDRAW_INTERVAL);
        if !(force || due) {
            return;
        }
        let mut out = std::io::stdout().lock();
        let _ = write!(out, "\r{}  ", render(&line));
        let _ = out.flush();
        line.last_draw = Some(now);
        line.drawn = true;
    }
}

impl DownloadObserver for ConsoleObserver {
    fn on_progress(&self, _segment: usize, delta: u64, _segment_total: u64) {
        self.line.lock().unwrap_or_else(PoisonError::into_inner).bytes += delta;
    }

    fn on_status(&self, message: &str) {
        let finished = message == "Download Complete";
        self.line.lock().unwrap_or_else(PoisonError::into_inner).status = message.to_string();
        self.redraw(finished);
    }

    fn on_time_remaining(&self, seconds: f64) {
        self.line.lock().unwrap_or_else(PoisonError::into_inner).eta = Some(seconds);
    }

    fn on_speed(&self, bytes_per_sec: f64) {
        self.line.lock().unwrap_or_else(PoisonError::into_inner).speed = bytes_per_sec;
    }
}

fn render(line: &Line) -> String {
    let eta = line.eta.map(human_time).unwrap_or_else(|| "?".to_string());
    format!(
        "{}  {} this run  {}/s  ETA {}",
        line.status,
        human_size(line.bytes as f64),
        human_size(line.speed),
        eta
    )
}

/// `1536.0` -> `"1.50 KB"`, binary multiples up to TB.
fn human_size(mut size: f64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, UNITS[unit])
}

fn human_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let (hours, minutes, secs) = (total / 3600, total / 60 % 60, total % 60);
    if hours > 0 {
        format!("{} hours, {} minutes", hours, minutes)
    } else if minutes > 0 {
        format!("{} minutes, {} seconds", minutes, secs)
    } else {
        format!("{} seconds", secs)
    }
}
