pub mod engine;
pub mod filename;
pub mod orchestrator;
pub mod progress;

pub use engine::{TransferManager, TransferPlan};
pub use filename::{sanitize_title, video_filename};
pub use orchestrator::{DownloadOptions, MAX_PARALLEL_LIMIT, Orchestrator};
pub use progress::{NoProgress, ProgressBoard, ProgressSink, ProgressTracker, TransferEvent};

use crate::error::Error;
use crate::scrape::SeriesCatalogEntry;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// One file to fetch: where from, where to, and how.
#[derive(Debug, Clone)]
pub struct TransferTarget {
    pub url: Url,
    pub local_path: PathBuf,
    pub ordinal_position: Option<usize>,
    pub force_overwrite: bool,
    pub title: String,
    /// Applied as the file's modification time once the transfer completes.
    pub created_at: Option<DateTime<Utc>>,
}

impl TransferTarget {
    /// Target inside `output_dir`, named after `title` and `position`.
    pub fn new(url: Url, output_dir: &Path, title: &str, position: Option<usize>) -> Self {
        Self {
            url,
            local_path: output_dir.join(video_filename(title, position)),
            ordinal_position: position,
            force_overwrite: false,
            title: title.to_string(),
            created_at: None,
        }
    }

    pub fn with_created_at(mut self, created_at: Option<DateTime<Utc>>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn force_overwrite(mut self, force: bool) -> Self {
        self.force_overwrite = force;
        self
    }

    pub fn filename(&self) -> String {
        self.local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferStatus {
    Completed,
    Skipped,
    Resumed,
    Failed { reason: String },
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferStatus::Completed => write!(f, "completed"),
            TransferStatus::Skipped => write!(f, "skipped"),
            TransferStatus::Resumed => write!(f, "resumed"),
            TransferStatus::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

/// Terminal result of one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub title: String,
    pub filename: String,
    pub local_path: PathBuf,
    /// On-disk size once the outcome was produced.
    pub byte_size: u64,
    pub status: TransferStatus,
    pub ordinal_position: Option<usize>,
}

impl TransferOutcome {
    pub(crate) fn for_target(
        target: &TransferTarget,
        byte_size: u64,
        status: TransferStatus,
    ) -> Self {
        Self {
            title: target.title.clone(),
            filename: target.filename(),
            local_path: target.local_path.clone(),
            byte_size,
            status,
            ordinal_position: target.ordinal_position,
        }
    }

    /// Placeholder for a playlist entry whose pipeline failed before or during
    /// the transfer. Keeps the entry's position in the aggregate.
    pub(crate) fn failed(
        position: usize,
        source_url: &Url,
        output_dir: &Path,
        error: &Error,
    ) -> Self {
        Self {
            title: source_url.to_string(),
            filename: String::new(),
            local_path: output_dir.to_path_buf(),
            byte_size: 0,
            status: TransferStatus::Failed {
                reason: error.to_string(),
            },
            ordinal_position: Some(position),
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.status == TransferStatus::Skipped
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, TransferStatus::Failed { .. })
    }

    /// Bytes were written by this transfer.
    pub fn is_downloaded(&self) -> bool {
        matches!(
            self.status,
            TransferStatus::Completed | TransferStatus::Resumed
        )
    }
}

/// Every episode of one playlist, ordered by position.
#[derive(Debug, Clone)]
pub struct PlaylistResult {
    pub playlist_url: Url,
    pub videos: Vec<TransferOutcome>,
}

impl PlaylistResult {
    pub fn total(&self) -> usize {
        self.videos.len()
    }

    pub fn downloaded(&self) -> usize {
        self.videos.iter().filter(|v| v.is_downloaded()).count()
    }

    pub fn skipped(&self) -> usize {
        self.videos.iter().filter(|v| v.is_skipped()).count()
    }

    pub fn failed(&self) -> usize {
        self.videos.iter().filter(|v| v.is_failed()).count()
    }

    pub fn total_bytes(&self) -> u64 {
        self.videos
            .iter()
            .filter(|v| !v.is_failed())
            .map(|v| v.byte_size)
            .sum()
    }
}

#[derive(Debug, Clone)]
pub struct SeriesResult {
    pub entry: SeriesCatalogEntry,
    pub result: PlaylistResult,
}

#[derive(Debug, Clone)]
pub struct SeriesFailure {
    pub entry: SeriesCatalogEntry,
    pub reason: String,
}

/// Aggregate of a whole-catalog run.
#[derive(Debug, Clone, Default)]
pub struct SeriesSummary {
    pub total_series: usize,
    pub series: Vec<SeriesResult>,
    pub failures: Vec<SeriesFailure>,
}

impl SeriesSummary {
    pub fn completed_series(&self) -> usize {
        self.series.len()
    }

    pub fn downloaded(&self) -> usize {
        self.series.iter().map(|s| s.result.downloaded()).sum()
    }

    pub fn skipped(&self) -> usize {
        self.series.iter().map(|s| s.result.skipped()).sum()
    }

    pub fn failed_episodes(&self) -> usize {
        self.series.iter().map(|s| s.result.failed()).sum()
    }

    /// A series could not be expanded or one of its episodes failed.
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty() || self.failed_episodes() > 0
    }
}
