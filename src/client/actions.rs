use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use super::{BlobSaver, FileClient};

pub const DOWNLOAD_FAILED: &str = "File download failed.";

/// User-facing notification sink.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Reports notifications through the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str) {
        warn!(%message, "user notification");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Saved(PathBuf),
    Failed,
}

/// Download-and-save wiring for a file table.
#[derive(Clone)]
pub struct FileActions {
    client: FileClient,
    saver: Arc<dyn BlobSaver>,
    notifier: Arc<dyn Notifier>,
}

impl FileActions {
    pub fn new(client: FileClient, saver: Arc<dyn BlobSaver>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            client,
            saver,
            notifier,
        }
    }

    /// Fetches `filename` with `token` and saves it under the same name.
    ///
    /// One attempt. Any transport, status or save failure produces a single
    /// [`DOWNLOAD_FAILED`] notification and [`DownloadOutcome::Failed`].
    pub async fn download(&self, token: &str, filename: &str) -> DownloadOutcome {
        let bytes = match self.client.download(token, filename).await {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, %filename, "download request failed");
                self.notifier.notify(DOWNLOAD_FAILED);
                return DownloadOutcome::Failed;
            }
        };

        match self.saver.save(bytes, filename).await {
            Ok(path) => {
                info!(%filename, path = %path.display(), "download saved");
                DownloadOutcome::Saved(path)
            }
            Err(e) => {
                warn!(error = %e, %filename, "saving download failed");
                self.notifier.notify(DOWNLOAD_FAILED);
                DownloadOutcome::Failed
            }
        }
    }
}
