use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

/// Progress of one transfer, keyed by the destination file name.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    Started {
        id: String,
        url: String,
        output_path: PathBuf,
        resumed_from: u64,
        total_bytes: Option<u64>,
    },
    Progress {
        id: String,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },
    Skipped {
        id: String,
        local_bytes: u64,
    },
    Completed {
        id: String,
        bytes_downloaded: u64,
        resumed: bool,
    },
    Retry {
        id: String,
        attempt: u32,
        max_attempts: u32,
        delay: Duration,
    },
    Failed {
        id: String,
        error: String,
    },
}

/// Receives progress from concurrently running transfers.
///
/// Shared by every worker of a run, so implementations synchronize internally.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: TransferEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn emit(&self, _event: TransferEvent) {}
}

impl ProgressSink for mpsc::UnboundedSender<TransferEvent> {
    fn emit(&self, event: TransferEvent) {
        // Nobody listening is fine.
        let _ = self.send(event);
    }
}

/// Terminal progress display: one bar per active transfer.
pub struct ProgressBoard {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
    style: ProgressStyle,
}

impl ProgressBoard {
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    /// Board that tracks state without drawing anything.
    pub fn hidden() -> Self {
        Self::with_draw_target(ProgressDrawTarget::hidden())
    }

    fn with_draw_target(target: ProgressDrawTarget) -> Self {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} {msg:40!} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");

        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: Mutex::new(HashMap::new()),
            style,
        }
    }

    /// Set the state of `task`, creating its bar on first use.
    pub fn update(&self, task: &str, completed: u64, total: Option<u64>, description: &str) {
        let mut bars = self.bars.lock().unwrap_or_else(PoisonError::into_inner);
        let bar = bars.entry(task.to_string()).or_insert_with(|| {
            let bar = self.multi.add(ProgressBar::new(0));
            bar.set_style(self.style.clone());
            bar
        });

        if let Some(total) = total {
            bar.set_length(total);
        }
        bar.set_position(completed);
        if bar.message() != description {
            bar.set_message(description.to_string());
        }
    }

    /// Finish `task`'s bar with a final message and stop tracking it.
    pub fn finish(&self, task: &str, description: &str) {
        let bar = self
            .bars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(task);
        if let Some(bar) = bar {
            bar.finish_with_message(description.to_string());
        }
    }

    /// `(completed, total)` of an active task.
    pub fn snapshot(&self, task: &str) -> Option<(u64, Option<u64>)> {
        let bars = self.bars.lock().unwrap_or_else(PoisonError::into_inner);
        bars.get(task).map(|bar| (bar.position(), bar.length()))
    }

    pub fn active_tasks(&self) -> usize {
        self.bars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Print a line above the bars without tearing them.
    pub fn println(&self, line: &str) {
        let _ = self.multi.println(line);
    }
}

impl Default for ProgressBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ProgressBoard {
    fn emit(&self, event: TransferEvent) {
        match event {
            TransferEvent::Started {
                id,
                resumed_from,
                total_bytes,
                ..
            } => {
                let verb = if resumed_from > 0 { "Resuming" } else { "Downloading" };
                self.update(&id, resumed_from, total_bytes, &format!("{} {}", verb, id));
            }
            TransferEvent::Progress {
                id,
                bytes_downloaded,
                total_bytes,
            } => {
                let description = self
                    .bars
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(&id)
                    .map(|bar| bar.message())
                    .unwrap_or_else(|| format!("Downloading {}", id));
                self.update(&id, bytes_downloaded, total_bytes, &description);
            }
            TransferEvent::Skipped { id, local_bytes } => {
                self.println(&format!(
                    "File already exists, skipping: {} ({})",
                    id,
                    ProgressTracker::format_bytes(local_bytes)
                ));
            }
            TransferEvent::Completed {
                id,
                bytes_downloaded,
                ..
            } => {
                let elapsed = self
                    .bars
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(&id)
                    .map(|bar| bar.elapsed().as_secs_f64())
                    .unwrap_or_default();
                let description = if elapsed > 0.0 {
                    let speed = (bytes_downloaded as f64 / elapsed) as u64;
                    format!("Downloaded {} ({})", id, ProgressTracker::format_speed(speed))
                } else {
                    format!("Downloaded {}", id)
                };
                self.finish(&id, &description);
            }
            TransferEvent::Retry {
                id,
                attempt,
                max_attempts,
                delay,
            } => {
                self.println(&format!(
                    "Retrying {} ({}/{}) in {}",
                    id,
                    attempt,
                    max_attempts,
                    ProgressTracker::format_duration(delay)
                ));
            }
            TransferEvent::Failed { id, error } => {
                self.finish(&id, &format!("Failed {}: {}", id, error));
            }
        }
    }
}

/// Formatting helpers for sizes, speeds and durations.
pub struct ProgressTracker;

impl ProgressTracker {
    pub fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.1} {}", size, UNITS[unit_index])
        }
    }

    pub fn format_speed(bytes_per_second: u64) -> String {
        format!("{}/s", Self::format_bytes(bytes_per_second))
    }

    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}
