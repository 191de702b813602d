//! Collaborator interfaces consumed by the gallery core
//!
//! - `MediaRepository`: remote (or local) store for records and payloads
//! - `IdentityContext`: who is viewing, and whether they are an admin
//!
//! `local.rs` provides the SQLite + filesystem backend used by the app.

use async_trait::async_trait;

use crate::error::RepositoryError;
use crate::state::data::{MediaKind, MediaRecord, NewRecord};

pub mod local;
#[cfg(test)]
pub(crate) mod memory;

pub use local::LocalRepository;

/// Asynchronous media repository.
///
/// Implementations are network- or disk-fallible and make no ordering
/// promises for `list_records`; callers sort.
#[async_trait]
pub trait MediaRepository: Send + Sync {
    /// All records of one kind, in arbitrary order
    async fn list_records(&self, kind: MediaKind) -> Result<Vec<MediaRecord>, RepositoryError>;

    /// Store a payload under `key` and return a fetchable URL
    async fn put_binary(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, RepositoryError>;

    /// Read a payload back by URL (used for downloads)
    async fn fetch_binary(&self, url: &str) -> Result<Vec<u8>, RepositoryError>;

    async fn delete_binary(&self, key: &str) -> Result<(), RepositoryError>;

    /// Persist metadata and return the assigned id
    async fn create_record(&self, record: NewRecord) -> Result<String, RepositoryError>;

    async fn delete_record(&self, kind: MediaKind, id: &str) -> Result<(), RepositoryError>;
}

/// Current viewer, read synchronously
pub trait IdentityContext: Send + Sync {
    fn current_viewer_id(&self) -> Option<&str>;
    fn is_admin(&self) -> bool;
}

/// Fixed identity taken from configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Viewer {
    pub id: Option<String>,
    pub admin: bool,
}

impl Viewer {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            admin: false,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            admin: true,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl IdentityContext for Viewer {
    fn current_viewer_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn is_admin(&self) -> bool {
        self.admin
    }
}

/// Whether `identity` may delete `record`: its uploader, or any signed-in
/// admin
pub fn can_delete(identity: &dyn IdentityContext, record: &MediaRecord) -> bool {
    identity
        .current_viewer_id()
        .is_some_and(|viewer| identity.is_admin() || record.is_owned_by(viewer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::fixtures::record;

    #[test]
    fn test_owner_can_delete() {
        let r = record("a", MediaKind::Photo, &[], 0);
        assert!(can_delete(&Viewer::new("owner"), &r));
    }

    #[test]
    fn test_admin_can_delete_anything() {
        let r = record("a", MediaKind::Photo, &[], 0);
        assert!(can_delete(&Viewer::admin("coach"), &r));
    }

    #[test]
    fn test_stranger_and_anonymous_cannot_delete() {
        let r = record("a", MediaKind::Video, &[], 0);
        assert!(!can_delete(&Viewer::new("someone-else"), &r));
        assert!(!can_delete(&Viewer::anonymous(), &r));
    }

    #[test]
    fn test_admin_flag_without_viewer_cannot_delete() {
        let r = record("a", MediaKind::Photo, &[], 0);
        let signed_out_admin = Viewer {
            id: None,
            admin: true,
        };
        assert!(!can_delete(&signed_out_admin, &r));
    }
}
