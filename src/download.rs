//! Saving record payloads to the viewer's download folder

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::DownloadError;
use crate::repo::MediaRepository;
use crate::state::data::MediaRecord;

/// Destination for one record's payload
#[async_trait]
pub trait DownloadSink: Send + Sync {
    /// Save the payload and return where it went
    async fn save(&self, record: &MediaRecord) -> Result<PathBuf, DownloadError>;
}

/// Fetches payloads from the repository into a local directory
pub struct DirectoryDownloader {
    repo: Arc<dyn MediaRepository>,
    target_dir: PathBuf,
}

impl DirectoryDownloader {
    pub fn new(repo: Arc<dyn MediaRepository>, target_dir: PathBuf) -> Self {
        Self { repo, target_dir }
    }

    /// Default target: the user's download folder, else the home folder
    pub fn default_dir() -> PathBuf {
        dirs::download_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[async_trait]
impl DownloadSink for DirectoryDownloader {
    async fn save(&self, record: &MediaRecord) -> Result<PathBuf, DownloadError> {
        let bytes = self
            .repo
            .fetch_binary(&record.url)
            .await
            .map_err(|source| DownloadError::Fetch {
                id: record.id.clone(),
                source,
            })?;

        let write_err = |path: &Path, source: std::io::Error| DownloadError::Write {
            path: path.display().to_string(),
            source,
        };
        tokio::fs::create_dir_all(&self.target_dir)
            .await
            .map_err(|e| write_err(self.target_dir.as_path(), e))?;

        let path = unique_path(&self.target_dir, &download_name(record)).await;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| write_err(path.as_path(), e))?;
        Ok(path)
    }
}

/// File name for a download: the normalized stored name, which keeps the
/// original extension
fn download_name(record: &MediaRecord) -> String {
    let name = crate::state::data::normalize_file_name(&record.file_name);
    name.chars()
        .map(|c| if matches!(c, '/' | '\\' | ':' | '\0') { '_' } else { c })
        .collect()
}

/// `dir/name`, or `dir/stem (n).ext` when that is taken
async fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
        return candidate;
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };
    let mut n = 1;
    loop {
        let numbered = match ext {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        };
        let candidate = dir.join(numbered);
        if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return candidate;
        }
        n += 1;
    }
}
