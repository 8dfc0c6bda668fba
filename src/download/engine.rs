use futures_util::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, HeaderMap, RANGE};
use reqwest::{Client, Response, StatusCode};
use std::io::ErrorKind;
use std::time::{Duration, Instant, SystemTime};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};
use url::Url;

use super::{ProgressSink, TransferEvent, TransferOutcome, TransferStatus, TransferTarget};
use crate::client::SessionClient;
use crate::error::{Error, Result};

/// Largest slice of the body written to disk at once.
pub const CHUNK_SIZE: usize = 64 * 1024;

const PROGRESS_UPDATE_INTERVAL: Duration = Duration::from_millis(250);

/// What reconciliation decided to do with a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPlan {
    /// Nothing usable on disk; download from byte 0.
    Fresh,
    /// Local file is a prefix of the remote one.
    Resume { offset: u64, remote_size: u64 },
    /// Local file is complete, or the remote size could not be verified.
    Skip { local_bytes: u64 },
}

/// Carried from one attempt of a transfer to the next.
struct AttemptState {
    /// Cleared once the file has been truncated, so retries resume instead
    /// of starting over.
    force: bool,
    /// Full size reported by the last response.
    known_total: Option<u64>,
    retrying: bool,
}

/// Streams one remote file to disk, resuming and skipping based on what is
/// already there.
pub struct TransferManager {
    client: Client,
    probe_timeout: Duration,
    stall_timeout: Option<Duration>,
    max_retries: u32,
    retry_delay: Duration,
}

impl TransferManager {
    pub fn new(session: &SessionClient) -> Self {
        Self {
            client: session.http().clone(),
            probe_timeout: session.settings().page_timeout,
            stall_timeout: session.settings().stall_timeout,
            max_retries: 2,
            retry_delay: Duration::from_secs(2),
        }
    }

    pub fn with_retries(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    pub async fn transfer(
        &self,
        target: &TransferTarget,
        progress: &dyn ProgressSink,
    ) -> Result<TransferOutcome> {
        let id = target.filename();
        let mut state = AttemptState {
            force: target.force_overwrite,
            known_total: None,
            retrying: false,
        };
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.attempt(target, &id, &mut state, progress).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_retryable() && attempt <= self.max_retries => {
                    warn!(file = %id, attempt, error = %e, "transfer attempt failed, retrying");
                    progress.emit(TransferEvent::Retry {
                        id: id.clone(),
                        attempt,
                        max_attempts: self.max_retries + 1,
                        delay: self.retry_delay,
                    });
                    state.retrying = true;
                    sleep(self.retry_delay).await;
                }
                Err(e) => {
                    progress.emit(TransferEvent::Failed {
                        id,
                        error: e.to_string(),
                    });
                    return Err(e);
                }
            }
        }
    }

    /// Compare the local file with the remote one.
    pub async fn reconcile(&self, target: &TransferTarget) -> Result<TransferPlan> {
        let Some(local_bytes) = existing_size(target).await? else {
            return Ok(TransferPlan::Fresh);
        };

        match self.remote_size(&target.url).await {
            Ok(remote_size) => Ok(plan_for(local_bytes, remote_size)),
            Err(e) => {
                warn!(
                    path = ?target.local_path,
                    error = %e,
                    "cannot verify remote size, keeping existing file"
                );
                Ok(TransferPlan::Skip { local_bytes })
            }
        }
    }

    /// Reconciliation before a retry. Whatever is on disk was written by the
    /// attempt that just failed, so an unverifiable size falls back to the
    /// total that attempt saw and never turns into a skip.
    async fn reconcile_retry(
        &self,
        target: &TransferTarget,
        known_total: Option<u64>,
    ) -> Result<TransferPlan> {
        let Some(local_bytes) = existing_size(target).await? else {
            return Ok(TransferPlan::Fresh);
        };

        let remote_size = match self.remote_size(&target.url).await {
            Ok(size) => size,
            Err(e) => known_total.ok_or_else(|| {
                Error::transfer(&target.url, format!("{} after an interrupted transfer", e))
            })?,
        };
        Ok(plan_for(local_bytes, remote_size))
    }

    /// `Content-Length` of a HEAD probe. Missing, zero and failed probes are
    /// all reported as unknown.
    async fn remote_size(&self, url: &Url) -> Result<u64> {
        let unknown = || Error::RemoteSizeUnknown {
            url: url.to_string(),
        };

        let response = self
            .client
            .head(url.clone())
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| {
                debug!(url = %url, error = %e, "size probe failed");
                unknown()
            })?;

        if !response.status().is_success() {
            debug!(url = %url, status = %response.status(), "size probe rejected");
            return Err(unknown());
        }

        // reqwest reports the (empty) body length for HEAD, so read the header.
        header_u64(response.headers(), CONTENT_LENGTH.as_str())
            .filter(|&size| size > 0)
            .ok_or_else(unknown)
    }

    async fn attempt(
        &self,
        target: &TransferTarget,
        id: &str,
        state: &mut AttemptState,
        progress: &dyn ProgressSink,
    ) -> Result<TransferOutcome> {
        let offset = if state.force {
            0
        } else {
            let plan = if state.retrying {
                self.reconcile_retry(target, state.known_total).await?
            } else {
                self.reconcile(target).await?
            };
            match plan {
                TransferPlan::Skip { local_bytes } => {
                    info!(file = %id, bytes = local_bytes, "file already exists, skipping");
                    progress.emit(TransferEvent::Skipped {
                        id: id.to_string(),
                        local_bytes,
                    });
                    return Ok(TransferOutcome::for_target(
                        target,
                        local_bytes,
                        TransferStatus::Skipped,
                    ));
                }
                TransferPlan::Resume { offset, remote_size } => {
                    info!(file = %id, offset, remote_size, "resuming partial download");
                    offset
                }
                TransferPlan::Fresh => 0,
            }
        };

        let mut request = self.client.get(target.url.clone());
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={}-", offset));
        }
        let response = request
            .send()
            .await
            .map_err(|e| Error::http(&target.url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: target.url.to_string(),
                status,
            });
        }

        let resumed = offset > 0 && status == StatusCode::PARTIAL_CONTENT;
        if offset > 0 && !resumed {
            warn!(file = %id, %status, "server ignored range request, restarting from zero");
        }
        let start = if resumed { offset } else { 0 };
        let total = content_range_total(response.headers())
            .or_else(|| response.content_length().map(|len| start + len));
        if total.is_some() {
            state.known_total = total;
        }

        let file = self.open_output(target, resumed).await?;
        state.force = false;

        progress.emit(TransferEvent::Started {
            id: id.to_string(),
            url: target.url.to_string(),
            output_path: target.local_path.clone(),
            resumed_from: start,
            total_bytes: total,
        });

        let file = self
            .stream_body(response, file, start, total, target, id, progress)
            .await?;

        if let Some(created_at) = target.created_at {
            match file.into_std().await.set_modified(SystemTime::from(created_at)) {
                Ok(()) => debug!(file = %id, %created_at, "set modification time"),
                Err(e) => warn!(file = %id, error = %e, "failed to set modification time"),
            }
        }

        let byte_size = fs::metadata(&target.local_path)
            .await
            .map_err(|e| Error::io(&target.local_path, e))?
            .len();

        let status = if resumed {
            TransferStatus::Resumed
        } else {
            TransferStatus::Completed
        };
        info!(file = %id, bytes = byte_size, %status, "transfer finished");
        progress.emit(TransferEvent::Completed {
            id: id.to_string(),
            bytes_downloaded: byte_size,
            resumed,
        });

        Ok(TransferOutcome::for_target(target, byte_size, status))
    }

    /// Append when resuming, otherwise create or truncate.
    async fn open_output(&self, target: &TransferTarget, append: bool) -> Result<File> {
        let path = &target.local_path;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io(parent, e))?;
        }

        let opened = if append {
            OpenOptions::new().append(true).open(path).await
        } else {
            File::create(path).await
        };
        opened.map_err(|e| Error::io(path, e))
    }

    /// Write the body to `file`. Whatever arrived is flushed even when the
    /// stream breaks, so the next attempt can resume from it.
    #[allow(clippy::too_many_arguments)]
    async fn stream_body(
        &self,
        response: Response,
        file: File,
        start: u64,
        total: Option<u64>,
        target: &TransferTarget,
        id: &str,
        progress: &dyn ProgressSink,
    ) -> Result<File> {
        let url = &target.url;
        let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);
        let mut stream = response.bytes_stream();
        let mut downloaded = start;
        let mut last_update = Instant::now();

        let streamed: Result<()> = async {
            loop {
                let next = match self.stall_timeout {
                    Some(limit) => timeout(limit, stream.next()).await.map_err(|_| {
                        Error::transfer(url, format!("no data received for {}s", limit.as_secs()))
                    })?,
                    None => stream.next().await,
                };
                let Some(chunk) = next else { break };
                let chunk = chunk.map_err(|e| Error::transfer(url, e))?;

                for piece in chunk.chunks(CHUNK_SIZE) {
                    writer
                        .write_all(piece)
                        .await
                        .map_err(|e| Error::io(&target.local_path, e))?;
                    downloaded += piece.len() as u64;
                }

                if last_update.elapsed() >= PROGRESS_UPDATE_INTERVAL {
                    progress.emit(TransferEvent::Progress {
                        id: id.to_string(),
                        bytes_downloaded: downloaded,
                        total_bytes: total,
                    });
                    last_update = Instant::now();
                }
            }
            Ok(())
        }
        .await;

        let flushed = writer
            .flush()
            .await
            .map_err(|e| Error::io(&target.local_path, e));
        streamed?;
        flushed?;

        progress.emit(TransferEvent::Progress {
            id: id.to_string(),
            bytes_downloaded: downloaded,
            total_bytes: total,
        });

        if let Some(total) = total {
            if downloaded < total {
                return Err(Error::transfer(
                    url,
                    format!("connection closed after {} of {} bytes", downloaded, total),
                ));
            }
        }

        Ok(writer.into_inner())
    }
}

/// Size of the file already on disk. Missing and empty files count as absent.
async fn existing_size(target: &TransferTarget) -> Result<Option<u64>> {
    match fs::metadata(&target.local_path).await {
        Ok(metadata) if metadata.len() > 0 => Ok(Some(metadata.len())),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io(&target.local_path, e)),
    }
}

fn plan_for(local_bytes: u64, remote_size: u64) -> TransferPlan {
    if local_bytes >= remote_size {
        TransferPlan::Skip { local_bytes }
    } else {
        TransferPlan::Resume {
            offset: local_bytes,
            remote_size,
        }
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

/// Full size from `Content-Range: bytes 1024-2047/2048`.
fn content_range_total(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_RANGE)?
        .to_str()
        .ok()?
        .split('/')
        .nth(1)?
        .trim()
        .parse()
        .ok()
}
