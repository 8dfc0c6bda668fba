use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{info, warn};
use url::Url;

use super::{
    NoProgress, PlaylistResult, ProgressSink, SeriesFailure, SeriesResult, SeriesSummary,
    TransferManager, TransferOutcome, TransferTarget,
};
use crate::client::{HttpSettings, SessionClient};
use crate::error::{Error, Result};
use crate::scrape::{PlaylistExpander, RedirectResolver, ResourceLocator, SeriesEnumerator};
use crate::session::AuthSession;

/// Upper bound for the per-playlist worker pool.
pub const MAX_PARALLEL_LIMIT: usize = 64;

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub output_directory: PathBuf,
    /// Width of the per-playlist worker pool.
    pub max_parallel: usize,
    pub retries: u32,
    pub retry_delay: Duration,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("downloads"),
            max_parallel: 10,
            retries: 2,
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// Locate, resolve and transfer one episode page. Shared read-only by every
/// worker; each run opens its own connection context.
#[derive(Clone)]
struct Pipeline {
    http: Arc<HttpSettings>,
    session: Option<AuthSession>,
    locator: ResourceLocator,
    retries: u32,
    retry_delay: Duration,
    progress: Arc<dyn ProgressSink>,
}

impl Pipeline {
    fn client(&self) -> Result<SessionClient> {
        SessionClient::new(Arc::clone(&self.http), self.session.as_ref())
    }

    async fn run(
        &self,
        page_url: &Url,
        output_dir: &Path,
        position: Option<usize>,
        force: bool,
    ) -> Result<TransferOutcome> {
        let client = self.client()?;

        let descriptor = self.locator.locate(&client, page_url).await?;
        let direct_url = RedirectResolver::new(&client)
            .resolve(&descriptor.indirect_url)
            .await?;

        let target = TransferTarget::new(direct_url, output_dir, &descriptor.title, position)
            .with_created_at(descriptor.created_at)
            .force_overwrite(force);

        TransferManager::new(&client)
            .with_retries(self.retries, self.retry_delay)
            .transfer(&target, self.progress.as_ref())
            .await
    }
}

/// Entry point for single videos, playlists and the whole catalog.
pub struct Orchestrator {
    pipeline: Arc<Pipeline>,
    options: DownloadOptions,
    expander: PlaylistExpander,
    enumerator: SeriesEnumerator,
}

impl Orchestrator {
    pub fn new(http: HttpSettings, session: Option<AuthSession>, options: DownloadOptions) -> Self {
        let pipeline = Pipeline {
            http: Arc::new(http),
            session,
            locator: ResourceLocator::new(),
            retries: options.retries,
            retry_delay: options.retry_delay,
            progress: Arc::new(NoProgress),
        };

        Self {
            pipeline: Arc::new(pipeline),
            options,
            expander: PlaylistExpander::new(),
            enumerator: SeriesEnumerator::new(),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        Arc::make_mut(&mut self.pipeline).progress = progress;
        self
    }

    /// One episode page into the output directory, without a position prefix.
    pub async fn download_one(&self, url: &Url, force: bool) -> Result<TransferOutcome> {
        self.pipeline
            .run(url, &self.options.output_directory, None, force)
            .await
    }

    /// Every episode of a playlist into the output directory.
    pub async fn download_playlist(&self, url: &Url, force: bool) -> Result<PlaylistResult> {
        self.download_playlist_into(url, &self.options.output_directory, force)
            .await
    }

    /// Every series of the catalog, one after the other, each into its own
    /// subdirectory. A failing series is recorded and the run moves on.
    pub async fn download_all_series(&self, force: bool) -> Result<SeriesSummary> {
        let client = self.pipeline.client()?;
        let catalog_url = self.pipeline.http.series_catalog_url()?;
        let entries = self.enumerator.enumerate(&client, &catalog_url).await?;

        let mut summary = SeriesSummary {
            total_series: entries.len(),
            ..SeriesSummary::default()
        };
        if entries.is_empty() {
            warn!(url = %catalog_url, "series catalog is empty");
            return Ok(summary);
        }

        for (index, entry) in entries.into_iter().enumerate() {
            info!(
                series = %entry.title,
                slug = %entry.directory_slug,
                "processing series {}/{}",
                index + 1,
                summary.total_series
            );
            let output_dir = self.options.output_directory.join(&entry.directory_slug);

            match self
                .download_playlist_into(&entry.playlist_url, &output_dir, force)
                .await
            {
                Ok(result) => summary.series.push(SeriesResult { entry, result }),
                Err(e) => {
                    warn!(series = %entry.title, error = %e, "series failed, continuing");
                    summary.failures.push(SeriesFailure {
                        entry,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(summary)
    }

    async fn download_playlist_into(
        &self,
        playlist_url: &Url,
        output_dir: &Path,
        force: bool,
    ) -> Result<PlaylistResult> {
        let client = self.pipeline.client()?;
        let episodes = self.expander.expand(&client, playlist_url).await?;
        info!(url = %playlist_url, episodes = episodes.len(), "downloading playlist");

        let width = self.options.max_parallel.clamp(1, MAX_PARALLEL_LIMIT);
        let semaphore = Arc::new(Semaphore::new(width));
        let mut handles = Vec::with_capacity(episodes.len());

        for (index, episode_url) in episodes.iter().enumerate() {
            let position = index + 1;
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| Error::transfer(playlist_url, e))?;
            let pipeline = Arc::clone(&self.pipeline);
            let episode_url = episode_url.clone();
            let output_dir = output_dir.to_path_buf();

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                pipeline
                    .run(&episode_url, &output_dir, Some(position), force)
                    .await
            }));
        }

        let mut videos = Vec::with_capacity(handles.len());
        for (index, (handle, episode_url)) in handles.into_iter().zip(&episodes).enumerate() {
            let position = index + 1;
            let outcome = match handle.await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => {
                    warn!(url = %episode_url, position, error = %e, "episode failed");
                    TransferOutcome::failed(position, episode_url, output_dir, &e)
                }
                Err(join_error) => {
                    let e = Error::transfer(episode_url, join_error);
                    warn!(url = %episode_url, position, error = %e, "episode worker aborted");
                    TransferOutcome::failed(position, episode_url, output_dir, &e)
                }
            };
            videos.push(outcome);
        }

        let result = PlaylistResult {
            playlist_url: playlist_url.clone(),
            videos,
        };
        info!(
            url = %playlist_url,
            total = result.total(),
            downloaded = result.downloaded(),
            skipped = result.skipped(),
            failed = result.failed(),
            "playlist finished"
        );
        Ok(result)
    }
}
