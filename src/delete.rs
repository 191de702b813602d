//! Two-phase deletion
//!
//! Phase one removes the payload and is best-effort. Phase two removes the
//! metadata record and decides the outcome. Local state changes only after
//! phase two succeeds, so a record is either fully present in the store or
//! fully gone.

use std::sync::Arc;

use crate::error::DeleteError;
use crate::repo::{can_delete, IdentityContext, MediaRepository};
use crate::state::data::MediaRecord;
use crate::state::lightbox::LightboxController;
use crate::state::selection::SelectionManager;
use crate::state::store::{MediaStore, ViewFilter};

/// Successful delete, with or without leftover storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionOutcome {
    Deleted,
    /// The record is gone but its payload could not be removed
    CleanupPending { key: String, reason: String },
}

/// Per-record results of a bulk delete
#[derive(Debug, Default)]
pub struct BulkDeleteReport {
    pub deleted: Vec<String>,
    pub cleanup_pending: Vec<String>,
    /// (record id, reason)
    pub failed: Vec<(String, String)>,
}

impl BulkDeleteReport {
    /// Ids whose records are gone
    pub fn removed(&self) -> impl Iterator<Item = &String> {
        self.deleted.iter().chain(&self.cleanup_pending)
    }

    pub fn summary(&self) -> String {
        let mut msg = format!("Deleted {} item(s).", self.deleted.len() + self.cleanup_pending.len());
        if !self.cleanup_pending.is_empty() {
            msg.push_str(&format!(
                " Storage cleanup pending for {}.",
                self.cleanup_pending.len()
            ));
        }
        if !self.failed.is_empty() {
            msg.push_str(&format!(" {} could not be deleted.", self.failed.len()));
        }
        msg
    }
}

pub struct DeletionCoordinator {
    repo: Arc<dyn MediaRepository>,
    identity: Arc<dyn IdentityContext>,
}

impl DeletionCoordinator {
    pub fn new(repo: Arc<dyn MediaRepository>, identity: Arc<dyn IdentityContext>) -> Self {
        Self { repo, identity }
    }

    pub fn may_delete(&self, record: &MediaRecord) -> bool {
        can_delete(self.identity.as_ref(), record)
    }

    /// Run both phases against the repository without touching local state
    pub async fn execute(&self, record: &MediaRecord) -> Result<DeletionOutcome, DeleteError> {
        if !self.may_delete(record) {
            tracing::warn!(
                id = %record.id,
                viewer = ?self.identity.current_viewer_id(),
                "delete denied"
            );
            return Err(DeleteError::PermissionDenied);
        }

        let cleanup = match record.storage_key.as_deref() {
            Some(key) => match self.repo.delete_binary(key).await {
                Ok(()) => None,
                Err(e) => {
                    tracing::warn!(id = %record.id, key, error = %e, "payload delete failed");
                    Some((key.to_string(), e.to_string()))
                }
            },
            None => {
                tracing::warn!(id = %record.id, "legacy record has no storage key, skipping payload delete");
                None
            }
        };

        self.repo.delete_record(record.kind, &record.id).await?;

        tracing::info!(id = %record.id, cleanup_pending = cleanup.is_some(), "deleted media");
        Ok(match cleanup {
            None => DeletionOutcome::Deleted,
            Some((key, reason)) => DeletionOutcome::CleanupPending { key, reason },
        })
    }

    /// Delete the record with `id` and reconcile local state on success.
    /// On any error local state is unchanged.
    pub async fn delete(
        &self,
        id: &str,
        store: &mut MediaStore,
        lightbox: &mut LightboxController,
        selection: &mut SelectionManager,
        filter: &ViewFilter,
    ) -> Result<DeletionOutcome, DeleteError> {
        let record = store
            .get(id)
            .cloned()
            .ok_or_else(|| DeleteError::NotFound(id.to_string()))?;

        let outcome = self.execute(&record).await?;
        reconcile(id, store, lightbox, selection, filter);
        Ok(outcome)
    }

    /// Delete `records` one after another; a failure does not stop the rest
    pub async fn execute_many(&self, records: Vec<MediaRecord>) -> BulkDeleteReport {
        let mut report = BulkDeleteReport::default();
        for record in records {
            match self.execute(&record).await {
                Ok(DeletionOutcome::Deleted) => report.deleted.push(record.id),
                Ok(DeletionOutcome::CleanupPending { .. }) => report.cleanup_pending.push(record.id),
                Err(e) => report.failed.push((record.id, e.to_string())),
            }
        }
        report
    }

    /// Bulk delete by id, reconciling each removed record
    pub async fn delete_many(
        &self,
        ids: &[String],
        store: &mut MediaStore,
        lightbox: &mut LightboxController,
        selection: &mut SelectionManager,
        filter: &ViewFilter,
    ) -> BulkDeleteReport {
        let mut missing = Vec::new();
        let mut records = Vec::new();
        for id in ids {
            match store.get(id) {
                Some(record) => records.push(record.clone()),
                None => missing.push((id.clone(), DeleteError::NotFound(id.clone()).to_string())),
            }
        }

        let mut report = self.execute_many(records).await;
        report.failed.extend(missing);

        let removed: Vec<String> = report.removed().cloned().collect();
        for id in &removed {
            reconcile(id, store, lightbox, selection, filter);
        }
        report
    }
}

/// Apply a confirmed delete to local state: drop the record from the store
/// and the selection, close the lightbox if it shows the record, otherwise
/// re-anchor it to the shrunken view.
pub fn reconcile(
    id: &str,
    store: &mut MediaStore,
    lightbox: &mut LightboxController,
    selection: &mut SelectionManager,
    filter: &ViewFilter,
) {
    store.remove(id);
    selection.remove(id);
    if lightbox.current_id() == Some(id) {
        lightbox.close();
    } else {
        lightbox.reconcile(&store.view(filter));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::memory::MemoryRepository;
    use crate::repo::Viewer;
    use crate::state::data::fixtures::record;
    use crate::state::data::MediaKind;

    struct Fixture {
        repo: Arc<MemoryRepository>,
        store: MediaStore,
        lightbox: LightboxController,
        selection: SelectionManager,
        filter: ViewFilter,
    }

    fn fixture(repo: MemoryRepository) -> Fixture {
        let repo = Arc::new(repo);
        Fixture {
            store: MediaStore::from_records(repo.records()),
            repo,
            lightbox: LightboxController::new(),
            selection: SelectionManager::new(),
            filter: ViewFilter::default(),
        }
    }

    fn records() -> Vec<MediaRecord> {
        let mut theirs = record("b", MediaKind::Video, &[], 2);
        theirs.uploader_id = "someone-else".into();
        vec![record("a", MediaKind::Photo, &[], 3), theirs, record("c", MediaKind::Photo, &[], 1)]
    }

    fn coordinator(f: &Fixture, viewer: Viewer) -> DeletionCoordinator {
        DeletionCoordinator::new(f.repo.clone(), Arc::new(viewer))
    }

    #[tokio::test]
    async fn test_non_owner_is_denied_without_mutation() {
        let mut f = fixture(MemoryRepository::with_records(records()));
        let deleter = coordinator(&f, Viewer::new("owner"));

        let result = deleter
            .delete("b", &mut f.store, &mut f.lightbox, &mut f.selection, &f.filter)
            .await;

        assert!(matches!(result, Err(DeleteError::PermissionDenied)));
        assert_eq!(f.store.len(), 3);
        assert!(f.repo.calls().is_empty());
    }

    #[tokio::test]
    async fn test_admin_may_delete_any_record() {
        let mut f = fixture(MemoryRepository::with_records(records()));
        let deleter = coordinator(&f, Viewer::admin("referee"));

        let outcome = deleter
            .delete("b", &mut f.store, &mut f.lightbox, &mut f.selection, &f.filter)
            .await
            .unwrap();

        assert_eq!(outcome, DeletionOutcome::Deleted);
        assert!(f.store.get("b").is_none());
        assert_eq!(
            f.repo.calls(),
            vec!["delete_binary:media/owner/b".to_string(), "delete_record:b".to_string()]
        );
    }

    #[tokio::test]
    async fn test_payload_failure_reports_cleanup_pending() {
        let mut repo = MemoryRepository::with_records(records());
        repo.fail_delete_binary = true;
        let mut f = fixture(repo);
        let deleter = coordinator(&f, Viewer::new("owner"));

        let outcome = deleter
            .delete("a", &mut f.store, &mut f.lightbox, &mut f.selection, &f.filter)
            .await
            .unwrap();

        assert!(matches!(outcome, DeletionOutcome::CleanupPending { ref key, .. } if key == "media/owner/a"));
        assert!(f.store.get("a").is_none());
        assert!(f.repo.records().iter().all(|r| r.id != "a"));
    }

    #[tokio::test]
    async fn test_metadata_failure_leaves_state_unchanged() {
        let mut repo = MemoryRepository::with_records(records());
        repo.fail_delete_record = true;
        let mut f = fixture(repo);
        let deleter = coordinator(&f, Viewer::new("owner"));
        f.selection.toggle("a");

        let result = deleter
            .delete("a", &mut f.store, &mut f.lightbox, &mut f.selection, &f.filter)
            .await;

        assert!(matches!(result, Err(DeleteError::Repository(_))));
        assert!(f.store.get("a").is_some());
        assert!(f.selection.is_selected("a"));
    }

    #[tokio::test]
    async fn test_legacy_record_skips_payload_phase() {
        let mut legacy = record("old", MediaKind::Photo, &[], 0);
        legacy.storage_key = None;
        let mut f = fixture(MemoryRepository::with_records(vec![legacy]));
        let deleter = coordinator(&f, Viewer::new("owner"));

        let outcome = deleter
            .delete("old", &mut f.store, &mut f.lightbox, &mut f.selection, &f.filter)
            .await
            .unwrap();

        assert_eq!(outcome, DeletionOutcome::Deleted);
        assert_eq!(f.repo.calls(), vec!["delete_record:old".to_string()]);
    }

    #[tokio::test]
    async fn test_deleting_open_record_closes_lightbox() {
        let mut f = fixture(MemoryRepository::with_records(records()));
        let deleter = coordinator(&f, Viewer::new("owner"));
        let shown = f.store.get("c").unwrap().clone();
        f.lightbox.open(&shown, 2);

        deleter
            .delete("c", &mut f.store, &mut f.lightbox, &mut f.selection, &f.filter)
            .await
            .unwrap();

        assert!(!f.lightbox.is_open());
    }

    #[tokio::test]
    async fn test_deleting_other_record_reanchors_lightbox() {
        let mut f = fixture(MemoryRepository::with_records(records()));
        let deleter = coordinator(&f, Viewer::new("owner"));
        let shown = f.store.get("c").unwrap().clone();
        f.lightbox.open(&shown, 2);

        deleter
            .delete("a", &mut f.store, &mut f.lightbox, &mut f.selection, &f.filter)
            .await
            .unwrap();

        assert_eq!(f.lightbox.current_id(), Some("c"));
        assert_eq!(f.lightbox.current_index(), Some(1));
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let mut f = fixture(MemoryRepository::with_records(records()));
        let deleter = coordinator(&f, Viewer::new("owner"));

        let result = deleter
            .delete("zzz", &mut f.store, &mut f.lightbox, &mut f.selection, &f.filter)
            .await;
        assert!(matches!(result, Err(DeleteError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_many_continues_past_failures() {
        let mut f = fixture(MemoryRepository::with_records(records()));
        let deleter = coordinator(&f, Viewer::new("owner"));
        for id in ["a", "b", "c"] {
            f.selection.toggle(id);
        }
        let ids = f.selection.ids().to_vec();

        let report = deleter
            .delete_many(&ids, &mut f.store, &mut f.lightbox, &mut f.selection, &f.filter)
            .await;

        assert_eq!(report.deleted, vec!["a".to_string(), "c".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "b");
        assert_eq!(f.store.len(), 1);
        assert_eq!(f.selection.ids().to_vec(), vec!["b".to_string()]);
        assert_eq!(report.summary(), "Deleted 2 item(s). 1 could not be deleted.");
    }
}
