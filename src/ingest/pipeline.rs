//! Sequential upload of one batch
//!
//! Every candidate is validated first; rejected files are dropped and
//! reported. The remaining files are persisted one after another:
//! payload upload, then metadata. A failure in either phase stops the
//! batch. Records persisted before the failure stay persisted.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::{IngestError, ValidationError};
use crate::repo::{IdentityContext, MediaRepository};
use crate::state::batch::{BatchProgress, UploadTemplate};
use crate::state::data::{MediaKind, MediaRecord, NewRecord};
use crate::state::liveness::LiveToken;

use super::probe::DurationProbe;
use super::{transcode, validate, CandidateFile, IngestLimits};

/// Outcome of one batch
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Records created, in upload order
    pub persisted: Vec<MediaRecord>,
    /// Files dropped by validation
    pub rejected: Vec<ValidationError>,
    /// Failure that stopped the batch
    pub error: Option<IngestError>,
}

impl BatchReport {
    /// The batch ran to the end (rejections do not count as failure)
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Something landed and nothing stopped the batch
    pub fn is_full_success(&self) -> bool {
        self.is_success() && !self.persisted.is_empty()
    }

    /// Clear the upload form after a full success. Returns whether it was
    /// cleared; a batch where every file was rejected keeps the form.
    pub fn settle_template(&self, template: &mut UploadTemplate) -> bool {
        let clear = self.is_full_success();
        if clear {
            template.reset();
        }
        clear
    }

    pub fn summary(&self) -> String {
        let mut parts = vec![format!("Uploaded {} file(s).", self.persisted.len())];
        if !self.rejected.is_empty() {
            parts.push(format!("Skipped {}:", self.rejected.len()));
            parts.extend(self.rejected.iter().map(|r| r.to_string()));
        }
        if let Some(e) = &self.error {
            parts.push(format!("Stopped: {e}"));
        }
        parts.join(" ")
    }
}

pub struct IngestionPipeline {
    repo: Arc<dyn MediaRepository>,
    identity: Arc<dyn IdentityContext>,
    probe: Arc<dyn DurationProbe>,
    limits: IngestLimits,
}

impl IngestionPipeline {
    pub fn new(
        repo: Arc<dyn MediaRepository>,
        identity: Arc<dyn IdentityContext>,
        probe: Arc<dyn DurationProbe>,
        limits: IngestLimits,
    ) -> Self {
        Self {
            repo,
            identity,
            probe,
            limits,
        }
    }

    /// Split `files` into accepted files (with their kind) and rejections
    pub async fn validate_all(
        &self,
        files: Vec<CandidateFile>,
    ) -> (Vec<(CandidateFile, MediaKind)>, Vec<ValidationError>) {
        let mut accepted = Vec::with_capacity(files.len());
        let mut rejected = Vec::new();

        for file in files {
            match validate::validate(&file, &self.limits, self.probe.as_ref()).await {
                Ok(kind) => accepted.push((file, kind)),
                Err(e) => {
                    tracing::warn!(error = %e, "rejected upload candidate");
                    rejected.push(e);
                }
            }
        }

        (accepted, rejected)
    }

    /// Upload a batch.
    ///
    /// `on_progress` is called after each persisted file while `token` is
    /// live. The caller resets its template when the report is a success.
    pub async fn run<F>(
        &self,
        files: Vec<CandidateFile>,
        template: &UploadTemplate,
        token: &LiveToken,
        mut on_progress: F,
    ) -> BatchReport
    where
        F: FnMut(BatchProgress) + Send,
    {
        let mut report = BatchReport::default();

        let Some(uploader) = self.identity.current_viewer_id().map(str::to_string) else {
            report.error = Some(IngestError::NotSignedIn);
            return report;
        };

        let (accepted, rejected) = self.validate_all(files).await;
        report.rejected = rejected;

        let total = accepted.len();
        let batch_started = Utc::now();
        let batch_ms = batch_started.timestamp_millis();
        let mut last_stamp = batch_started;

        tracing::info!(total, rejected = report.rejected.len(), "starting upload batch");

        for (index, (file, kind)) in accepted.into_iter().enumerate() {
            let uploaded_at = Utc::now().max(last_stamp);
            last_stamp = uploaded_at;

            match self
                .persist_one(&file, kind, index, batch_ms, uploaded_at, &uploader, template)
                .await
            {
                Ok(record) => {
                    tracing::debug!(id = %record.id, file = %file.name, "persisted");
                    report.persisted.push(record);
                }
                Err(e) => {
                    tracing::error!(file = %file.name, error = %e, "upload batch aborted");
                    report.error = Some(e);
                    break;
                }
            }

            if token.is_live() {
                on_progress(BatchProgress {
                    completed: index + 1,
                    total,
                });
            }
        }

        tracing::info!(
            persisted = report.persisted.len(),
            aborted = report.error.is_some(),
            "upload batch finished"
        );
        report
    }

    #[allow(clippy::too_many_arguments)]
    async fn persist_one(
        &self,
        file: &CandidateFile,
        kind: MediaKind,
        index: usize,
        batch_ms: i64,
        uploaded_at: DateTime<Utc>,
        uploader: &str,
        template: &UploadTemplate,
    ) -> Result<MediaRecord, IngestError> {
        let bytes = file.read().await.map_err(|source| IngestError::Read {
            file: file.name.clone(),
            source,
        })?;

        let (bytes, content_type, file_name) = match kind {
            MediaKind::Photo => {
                let prepared =
                    transcode::prepare_photo(&file.name, &file.content_type, bytes, &self.limits).await?;
                (prepared.bytes, prepared.content_type, prepared.file_name)
            }
            MediaKind::Video => (bytes, file.content_type.clone(), file.name.clone()),
        };

        let key = storage_key(uploader, batch_ms, index, &file_name);
        let size_bytes = bytes.len() as u64;

        let url = self
            .repo
            .put_binary(&key, bytes, &content_type)
            .await
            .map_err(|source| IngestError::Upload {
                file: file.name.clone(),
                source,
            })?;

        let new = NewRecord {
            kind,
            url,
            storage_key: Some(key.clone()),
            caption: template.caption(),
            file_name,
            size_bytes,
            uploaded_at,
            uploader_id: uploader.to_string(),
            tags: template.tags.clone(),
            album: template.album(),
        };

        match self.repo.create_record(new.clone()).await {
            Ok(id) => Ok(new.into_record(id)),
            Err(source) => {
                // The payload has no record pointing at it
                if let Err(e) = self.repo.delete_binary(&key).await {
                    tracing::warn!(key = %key, error = %e, "orphaned payload left behind");
                }
                Err(IngestError::Persist {
                    file: file.name.clone(),
                    source,
                })
            }
        }
    }
}

/// `media/<uploader>/<batch millis>_<index>_<name>`, unique per file
pub fn storage_key(uploader: &str, batch_ms: i64, index: usize, file_name: &str) -> String {
    format!(
        "media/{}/{batch_ms}_{index}_{}",
        sanitize(uploader),
        sanitize(file_name)
    )
}

fn sanitize(part: &str) -> String {
    let cleaned: String = part
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches(['.', '_']);
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::transcode::png_bytes;
    use crate::ingest::validate::fakes::FixedProbe;
    use crate::repo::memory::MemoryRepository;
    use crate::repo::Viewer;
    use crate::state::liveness::Liveness;
    use image::GenericImageView;

    fn pipeline(repo: Arc<MemoryRepository>, viewer: Viewer, limits: IngestLimits) -> IngestionPipeline {
        let probe = FixedProbe::with(&[("clip.mp4", 12.0), ("long.mp4", 75.0)]);
        IngestionPipeline::new(repo, Arc::new(viewer), Arc::new(probe), limits)
    }

    fn photo(name: &str) -> CandidateFile {
        CandidateFile::from_bytes(name, "image/jpeg", name.as_bytes().to_vec())
    }

    fn template() -> UploadTemplate {
        let mut t = UploadTemplate::new();
        t.caption = "Cup final".into();
        t.set_tags_from_input("Smith, Jones");
        t
    }

    #[tokio::test]
    async fn test_sequential_progress_and_call_order() {
        let repo = Arc::new(MemoryRepository::default());
        let p = pipeline(repo.clone(), Viewer::new("u1"), IngestLimits::default());
        let files = vec![photo("a.jpg"), photo("b.jpg"), photo("c.jpg")];

        let mut seen = Vec::new();
        let report = p
            .run(files, &template(), &LiveToken::detached(), |progress| seen.push(progress))
            .await;

        assert!(report.is_success());
        assert_eq!(
            seen.iter().map(|p| (p.completed, p.total)).collect::<Vec<_>>(),
            vec![(1, 3), (2, 3), (3, 3)]
        );

        let calls = repo.calls();
        assert_eq!(calls.len(), 6);
        for (i, name) in ["a.jpg", "b.jpg", "c.jpg"].iter().enumerate() {
            assert!(calls[2 * i].starts_with("put:media/u1/"));
            assert!(calls[2 * i].ends_with(&format!("_{i}_{name}")));
            assert_eq!(calls[2 * i + 1], format!("create:{name}"));
        }

        let stamps: Vec<_> = report.persisted.iter().map(|r| r.uploaded_at).collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
        assert!(report
            .persisted
            .iter()
            .all(|r| r.caption.as_deref() == Some("Cup final") && r.tags == vec!["Smith", "Jones"]));
    }

    #[tokio::test]
    async fn test_invalid_file_does_not_stop_siblings() {
        let repo = Arc::new(MemoryRepository::default());
        let limits = IngestLimits {
            max_photo_bytes: 16,
            ..IngestLimits::default()
        };
        let p = pipeline(repo.clone(), Viewer::new("u1"), limits);
        let files = vec![
            photo("1.jpg"),
            photo("2.jpg"),
            CandidateFile::from_bytes("3.jpg", "image/jpeg", vec![0; 17]),
            photo("4.jpg"),
            photo("5.jpg"),
        ];

        let mut seen = Vec::new();
        let report = p
            .run(files, &UploadTemplate::new(), &LiveToken::detached(), |progress| {
                seen.push(progress)
            })
            .await;

        assert!(report.is_success());
        assert_eq!(report.persisted.len(), 4);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].file_name(), "3.jpg");
        assert_eq!(seen.last().map(|p| (p.completed, p.total)), Some((4, 4)));
        assert!(repo.calls().iter().all(|c| !c.contains("3.jpg")));
    }

    #[tokio::test]
    async fn test_videos_checked_for_duration() {
        let repo = Arc::new(MemoryRepository::default());
        let p = pipeline(repo.clone(), Viewer::new("u1"), IngestLimits::default());
        let files = vec![
            CandidateFile::from_bytes("clip.mp4", "video/mp4", vec![1; 8]),
            CandidateFile::from_bytes("long.mp4", "video/mp4", vec![1; 8]),
            CandidateFile::from_bytes("deck.pdf", "application/pdf", vec![1; 8]),
        ];

        let report = p
            .run(files, &UploadTemplate::new(), &LiveToken::detached(), |_| {})
            .await;

        assert_eq!(report.persisted.len(), 1);
        assert_eq!(report.persisted[0].kind, MediaKind::Video);
        assert!(matches!(report.rejected[0], ValidationError::TooLong { .. }));
        assert!(matches!(report.rejected[1], ValidationError::UnsupportedType { .. }));
    }

    #[tokio::test]
    async fn test_upload_failure_aborts_remaining_files() {
        let mut repo = MemoryRepository::default();
        repo.fail_put_at = Some(1);
        let repo = Arc::new(repo);
        let p = pipeline(repo.clone(), Viewer::new("u1"), IngestLimits::default());

        let mut seen = Vec::new();
        let report = p
            .run(
                vec![photo("a.jpg"), photo("b.jpg"), photo("c.jpg")],
                &UploadTemplate::new(),
                &LiveToken::detached(),
                |progress| seen.push(progress),
            )
            .await;

        assert!(matches!(report.error, Some(IngestError::Upload { ref file, .. }) if file == "b.jpg"));
        assert_eq!(report.persisted.len(), 1);
        assert_eq!(repo.records().len(), 1);
        assert_eq!(seen.len(), 1);
        assert!(repo.calls().iter().all(|c| !c.contains("c.jpg")));
    }

    #[tokio::test]
    async fn test_metadata_failure_aborts_and_cleans_payload() {
        let mut repo = MemoryRepository::default();
        repo.fail_create_at = Some(0);
        let repo = Arc::new(repo);
        let p = pipeline(repo.clone(), Viewer::new("u1"), IngestLimits::default());

        let report = p
            .run(
                vec![photo("a.jpg"), photo("b.jpg")],
                &UploadTemplate::new(),
                &LiveToken::detached(),
                |_| {},
            )
            .await;

        assert!(matches!(report.error, Some(IngestError::Persist { .. })));
        assert!(report.persisted.is_empty());
        let calls = repo.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls[2].starts_with("delete_binary:media/u1/"));
    }

    #[tokio::test]
    async fn test_requires_signed_in_viewer() {
        let repo = Arc::new(MemoryRepository::default());
        let p = pipeline(repo.clone(), Viewer::anonymous(), IngestLimits::default());

        let report = p
            .run(vec![photo("a.jpg")], &UploadTemplate::new(), &LiveToken::detached(), |_| {})
            .await;

        assert!(matches!(report.error, Some(IngestError::NotSignedIn)));
        assert!(repo.calls().is_empty());
    }

    #[tokio::test]
    async fn test_form_cleared_only_after_full_success() {
        let repo = Arc::new(MemoryRepository::default());
        let limits = IngestLimits {
            max_photo_bytes: 16,
            ..IngestLimits::default()
        };
        let p = pipeline(repo.clone(), Viewer::new("u1"), limits);

        let mut form = template();
        let report = p
            .run(vec![photo("a.jpg")], &form, &LiveToken::detached(), |_| {})
            .await;
        assert!(report.settle_template(&mut form));
        assert_eq!(form, UploadTemplate::default());

        let mut form = template();
        let oversized = CandidateFile::from_bytes("big.jpg", "image/jpeg", vec![0; 17]);
        let report = p
            .run(vec![oversized], &form, &LiveToken::detached(), |_| {})
            .await;
        assert!(report.is_success());
        assert!(!report.settle_template(&mut form));
        assert_eq!(form, template());
    }

    #[tokio::test]
    async fn test_aborted_batch_keeps_form() {
        let mut repo = MemoryRepository::default();
        repo.fail_put_at = Some(1);
        let p = pipeline(Arc::new(repo), Viewer::new("u1"), IngestLimits::default());

        let mut form = template();
        let report = p
            .run(vec![photo("a.jpg"), photo("b.jpg")], &form, &LiveToken::detached(), |_| {})
            .await;
        assert_eq!(report.persisted.len(), 1);
        assert!(!report.settle_template(&mut form));
        assert_eq!(form, template());
    }

    #[tokio::test]
    async fn test_stale_token_suppresses_progress() {
        let repo = Arc::new(MemoryRepository::default());
        let p = pipeline(repo.clone(), Viewer::new("u1"), IngestLimits::default());
        let liveness = Liveness::new();
        let token = liveness.token();
        liveness.invalidate();

        let mut calls = 0;
        let report = p
            .run(vec![photo("a.jpg"), photo("b.jpg")], &UploadTemplate::new(), &token, |_| calls += 1)
            .await;

        assert_eq!(report.persisted.len(), 2);
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn test_oversized_photo_is_downscaled_before_upload() {
        let repo = Arc::new(MemoryRepository::default());
        let p = pipeline(repo.clone(), Viewer::new("u1"), IngestLimits::default());
        let file = CandidateFile::from_bytes("wide.png", "image/png", png_bytes(2400, 1200));

        let report = p
            .run(vec![file], &UploadTemplate::new(), &LiveToken::detached(), |_| {})
            .await;

        let record = &report.persisted[0];
        assert_eq!(record.file_name, "wide.jpg");
        let stored = repo.blob(&record.url).unwrap();
        assert_eq!(record.size_bytes, stored.len() as u64);
        let decoded = image::load_from_memory(&stored).unwrap();
        assert_eq!(decoded.dimensions(), (1920, 960));
    }

    #[test]
    fn test_storage_key_is_path_safe() {
        assert_eq!(
            storage_key("u1", 1715353200123, 2, "../My Goal!.jpg"),
            "media/u1/1715353200123_2_My_Goal_.jpg"
        );
    }
}
