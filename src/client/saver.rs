use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

/// Where downloaded bytes end up.
#[async_trait]
pub trait BlobSaver: Send + Sync {
    async fn save(&self, bytes: Bytes, suggested_name: &str) -> anyhow::Result<PathBuf>;
}

/// Saves into a directory under the suggested name, replacing an existing file.
///
/// Bytes are staged in a temporary file inside the same directory and then
/// renamed into place; the temporary file never outlives the call.
#[derive(Debug, Clone)]
pub struct DirectorySaver {
    dir: PathBuf,
}

impl DirectorySaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

/// Last path component of `suggested`, or `"download"` when nothing usable is left.
fn local_name(suggested: &str) -> String {
    let base = suggested
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or("")
        .trim();
    if base.is_empty() || base.chars().all(|c| c == '.') {
        "download".to_string()
    } else {
        base.to_string()
    }
}

fn write_atomically(dir: &Path, name: &str, bytes: &[u8]) -> anyhow::Result<PathBuf> {
    let target = dir.join(name);
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("create temp file in {}", dir.display()))?;
    tmp.write_all(bytes).context("write temp file")?;
    tmp.persist(&target)
        .with_context(|| format!("persist {}", target.display()))?;
    Ok(target)
}

#[async_trait]
impl BlobSaver for DirectorySaver {
    async fn save(&self, bytes: Bytes, suggested_name: &str) -> anyhow::Result<PathBuf> {
        let dir = self.dir.clone();
        let name = local_name(suggested_name);
        let path = tokio::task::spawn_blocking(move || write_atomically(&dir, &name, &bytes))
            .await
            .context("save task panicked")??;
        debug!(path = %path.display(), "blob saved");
        Ok(path)
    }
}
