use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use futures::TryStreamExt;
use indicatif::{HumanBytes, MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{Mutex, Semaphore};
use tokio_util::io::StreamReader;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::state::{DownloadTask, TaskOutcome, TaskState};
use crate::utils::http_client;

/// Bytes read from the response body per write.
pub const CHUNK_SIZE: usize = 8 * 1024;

const BAR_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes:>12}/{total_bytes:<12} {bytes_per_sec:>12} {eta:>4} {msg}";
const SPINNER_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] {bytes:>12} {bytes_per_sec:>12} {msg}";

pub struct Downloader {
    client: Client,
    multi_progress: MultiProgress,
    header_pb: ProgressBar,
    semaphore: Arc<Semaphore>,
    total_files: AtomicUsize,
    completed_files: AtomicUsize,
    failed_files: AtomicUsize,
    total_downloaded_bytes: AtomicU64,
}

impl Downloader {
    /// `concurrency` caps how many transfers run at once.
    pub fn new(concurrency: usize, draw_target: ProgressDrawTarget) -> Self {
        let multi_progress = MultiProgress::with_draw_target(draw_target);

        let header_pb = multi_progress.add(ProgressBar::new(0));
        header_pb.set_style(style("{msg}", ProgressStyle::default_bar()));

        Self {
            client: http_client(),
            multi_progress,
            header_pb,
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            total_files: AtomicUsize::new(0),
            completed_files: AtomicUsize::new(0),
            failed_files: AtomicUsize::new(0),
            total_downloaded_bytes: AtomicU64::new(0),
        }
    }

    /// Runs every task concurrently and waits for all of them. Outcomes come
    /// back in the order the tasks were given, whatever order they finish in.
    /// Tasks sharing a destination path are written one after another.
    pub async fn download_all(self: &Arc<Self>, tasks: Vec<DownloadTask>) -> Vec<TaskOutcome> {
        self.total_files.fetch_add(tasks.len(), Ordering::Relaxed);
        self.refresh_summary();

        let mut path_locks: HashMap<PathBuf, Arc<Mutex<()>>> = HashMap::new();
        let mut handles = Vec::with_capacity(tasks.len());
        for task in tasks {
            let downloader = Arc::clone(self);
            let fallback = task.clone();
            let path_lock = Arc::clone(path_locks.entry(task.destination.clone()).or_default());
            let handle = tokio::spawn(async move {
                let _guard = path_lock.lock().await;
                downloader.download_file(task).await
            });
            handles.push((handle, fallback));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (handle, mut task) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(url = %task.url, error = %e, "Download task aborted");
                    self.failed_files.fetch_add(1, Ordering::Relaxed);
                    self.refresh_summary();
                    task.advance(TaskState::Failed);
                    let error = Error::Aborted {
                        url: task.url.clone(),
                        reason: e.to_string(),
                    };
                    outcomes.push(TaskOutcome {
                        task,
                        error: Some(error),
                    });
                }
            }
        }

        self.header_pb.finish();
        outcomes
    }

    /// Downloads one file, never letting its failure escape as anything but
    /// a failed outcome.
    pub async fn download_file(&self, mut task: DownloadTask) -> TaskOutcome {
        let _permit = match Arc::clone(&self.semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                task.advance(TaskState::Failed);
                let error = Error::Aborted {
                    url: task.url.clone(),
                    reason: e.to_string(),
                };
                return TaskOutcome {
                    task,
                    error: Some(error),
                };
            }
        };

        task.advance(TaskState::InProgress);
        let filename = task.file_name();
        debug!(url = %task.url, path = %task.destination.display(), "Starting download");

        let pb = self.multi_progress.add(ProgressBar::new(0));
        pb.set_style(style(SPINNER_TEMPLATE, ProgressStyle::default_spinner()));
        pb.set_message(format!("Connecting  {}", filename));

        match self.transfer(&mut task, &pb).await {
            Ok(()) => {
                task.advance(TaskState::Completed);
                self.completed_files.fetch_add(1, Ordering::Relaxed);
                self.refresh_summary();
                pb.finish_with_message(format!("Completed   {}", filename));
                info!(
                    url = %task.url,
                    bytes = task.transferred,
                    path = %task.destination.display(),
                    "Download complete"
                );
                TaskOutcome { task, error: None }
            }
            Err(error) => {
                task.advance(TaskState::Failed);
                self.failed_files.fetch_add(1, Ordering::Relaxed);
                self.refresh_summary();
                pb.abandon_with_message(format!("Failed      {}", filename));
                warn!(url = %task.url, error = %error, "Download failed");
                TaskOutcome {
                    task,
                    error: Some(error),
                }
            }
        }
    }

    async fn transfer(&self, task: &mut DownloadTask, pb: &ProgressBar) -> Result<(), Error> {
        let response = self
            .client
            .get(&task.url)
            .send()
            .await
            .map_err(|e| Error::network(&task.url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: task.url.clone(),
                status: status.as_u16(),
            });
        }

        task.total_bytes = response.content_length().unwrap_or(0);
        if task.total_bytes > 0 {
            pb.set_length(task.total_bytes);
            pb.set_style(style(BAR_TEMPLATE, ProgressStyle::default_bar()).progress_chars("=>-"));
        }
        pb.set_message(format!("Downloading {}", task.file_name()));

        let mut file = File::create(&task.destination)
            .await
            .map_err(|e| Error::io(&task.destination, e))?;

        let stream = response.bytes_stream().map_err(io::Error::other);
        let mut body = StreamReader::new(stream);
        let mut buf = vec![0u8; CHUNK_SIZE];

        loop {
            let n = body.read(&mut buf).await.map_err(|source| Error::Stream {
                url: task.url.clone(),
                source,
            })?;
            if n == 0 {
                break;
            }

            file.write_all(&buf[..n])
                .await
                .map_err(|e| Error::io(&task.destination, e))?;
            task.transferred += n as u64;
            pb.inc(n as u64);
            self.total_downloaded_bytes
                .fetch_add(n as u64, Ordering::Relaxed);
        }

        file.flush()
            .await
            .map_err(|e| Error::io(&task.destination, e))?;

        Ok(())
    }

    fn refresh_summary(&self) {
        self.header_pb.set_message(format!(
            "Summary: Files: {}/{} | Failed: {} | Downloaded: {}",
            self.completed_files.load(Ordering::Relaxed),
            self.total_files.load(Ordering::Relaxed),
            self.failed_files.load(Ordering::Relaxed),
            HumanBytes(self.total_downloaded_bytes.load(Ordering::Relaxed)),
        ));
        self.header_pb.tick();
    }
}

fn style(template: &str, fallback: ProgressStyle) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or(fallback)
}
