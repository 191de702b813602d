//! Upload ingestion
//!
//! This module handles:
//! - Describing candidate files (from disk or memory)
//! - Validating type, size and video duration
//! - Downscaling oversized photos before upload
//! - Running a batch sequentially against the repository

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::state::data::MediaKind;

pub mod pipeline;
pub mod probe;
pub mod transcode;
pub mod validate;

pub use pipeline::{BatchReport, IngestionPipeline};
pub use probe::{DurationProbe, FfprobeDurationProbe};

const MIB: u64 = 1024 * 1024;

/// Upload rules. Defaults match the gallery's published limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestLimits {
    pub max_photo_bytes: u64,
    pub max_video_bytes: u64,
    pub max_video_secs: u64,
    /// Photos larger than this box are downscaled to fit it
    pub max_width: u32,
    pub max_height: u32,
    /// JPEG quality (1-100) for downscaled photos
    pub jpeg_quality: u8,
    /// Accepted video MIME types
    pub video_types: Vec<String>,
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self {
            max_photo_bytes: 10 * MIB,
            max_video_bytes: 50 * MIB,
            max_video_secs: 60,
            max_width: 1920,
            max_height: 1080,
            jpeg_quality: 80,
            video_types: vec![
                "video/mp4".into(),
                "video/quicktime".into(),
                "video/webm".into(),
                "video/x-m4v".into(),
            ],
        }
    }
}

/// Where a candidate's bytes come from
#[derive(Debug, Clone)]
pub enum FileSource {
    Path(PathBuf),
    Memory(Arc<[u8]>),
}

/// One file the user picked for upload
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub name: String,
    /// Declared MIME type
    pub content_type: String,
    pub size_bytes: u64,
    pub source: FileSource,
}

impl CandidateFile {
    /// Describe a file on disk; the type is guessed from its extension
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self {
            name,
            content_type,
            size_bytes: metadata.len(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    pub fn from_bytes(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            size_bytes: bytes.len() as u64,
            source: FileSource::Memory(Arc::from(bytes)),
        }
    }

    /// Kind implied by the declared type
    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::from_content_type(&self.content_type)
    }

    /// Load the whole payload
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        match &self.source {
            FileSource::Path(path) => tokio::fs::read(path).await,
            FileSource::Memory(bytes) => Ok(bytes.to_vec()),
        }
    }
}

/// Every photo or video below `folder`, ordered by path
pub fn collect_folder(folder: &Path) -> Vec<CandidateFile> {
    let mut files: Vec<CandidateFile> = WalkDir::new(folder)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            mime_guess::from_path(e.path())
                .first()
                .is_some_and(|m| m.type_() == mime_guess::mime::IMAGE || m.type_() == mime_guess::mime::VIDEO)
        })
        .filter_map(|e| match CandidateFile::from_path(e.path()) {
            Ok(file) => Some(file),
            Err(err) => {
                tracing::warn!(path = %e.path().display(), error = %err, "skipping unreadable file");
                None
            }
        })
        .collect();

    files.sort_by(|a, b| a.name.cmp(&b.name));
    tracing::debug!(count = files.len(), folder = %folder.display(), "collected upload candidates");
    files
}
