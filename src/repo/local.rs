use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use std::path::{Component, Path, PathBuf};
use tokio::task;

use super::MediaRepository;
use crate::error::RepositoryError;
use crate::state::data::{MediaKind, MediaRecord, NewRecord};

/// The LocalRepository keeps media metadata in a SQLite catalog and
/// payloads as plain files under `blobs/`.
///
/// A fresh connection is opened per call inside a blocking task, so the
/// repository itself is `Send + Sync` and can be shared with async tasks.
#[derive(Debug)]
pub struct LocalRepository {
    db_path: PathBuf,
    blob_dir: PathBuf,
}

impl LocalRepository {
    /// Open (or create) a repository rooted at `root`:
    /// - `root/gallery.db` - catalog
    /// - `root/blobs/` - payloads
    pub fn open(root: &Path) -> Result<Self, RepositoryError> {
        std::fs::create_dir_all(root)?;
        let blob_dir = root.join("blobs");
        std::fs::create_dir_all(&blob_dir)?;

        let repo = LocalRepository {
            db_path: root.join("gallery.db"),
            blob_dir,
        };
        let conn = Connection::open(&repo.db_path)?;
        init_schema(&conn)?;

        tracing::info!(path = %repo.db_path.display(), "catalog initialized");
        Ok(repo)
    }

    /// Map a blob key to a file below `blob_dir`, refusing keys that would
    /// escape it
    fn blob_path(&self, key: &str) -> Result<PathBuf, RepositoryError> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || key.is_empty() {
            return Err(RepositoryError::Backend(format!("invalid blob key: {key}")));
        }
        Ok(self.blob_dir.join(relative))
    }

    /// Blob URLs are absolute file paths; only those inside `blob_dir` are served
    fn url_path(&self, url: &str) -> Result<PathBuf, RepositoryError> {
        let path = PathBuf::from(url);
        let inside = path
            .strip_prefix(&self.blob_dir)
            .map(|rest| {
                rest.components().next().is_some()
                    && rest.components().all(|c| matches!(c, Component::Normal(_)))
            })
            .unwrap_or(false);
        if !inside {
            return Err(RepositoryError::NotFound(url.to_string()));
        }
        Ok(path)
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, RepositoryError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, RepositoryError> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        // rusqlite::Connection is not Sync, so each call opens its own
        task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)?;
            f(&conn)
        })
        .await
        .map_err(|e| RepositoryError::Task(e.to_string()))?
    }
}

/// Initialize the catalog schema.
/// Creates the media table and its indexes if they don't exist.
fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS media (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            kind            TEXT NOT NULL,
            url             TEXT NOT NULL,
            storage_key     TEXT,
            caption         TEXT,
            file_name       TEXT NOT NULL,
            size_bytes      INTEGER NOT NULL,
            uploaded_at     INTEGER NOT NULL,
            uploader_id     TEXT NOT NULL,
            tags_json       TEXT NOT NULL DEFAULT '[]',
            album           TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_media_kind_uploaded_at
         ON media(kind, uploaded_at DESC)",
        [],
    )?;

    Ok(())
}

fn row_to_record(row: &Row<'_>) -> Result<MediaRecord, RepositoryError> {
    let id: i64 = row.get(0)?;
    let id = id.to_string();
    let kind: String = row.get(1)?;
    let kind = MediaKind::parse(&kind).ok_or_else(|| RepositoryError::Corrupt {
        id: id.clone(),
        reason: format!("unknown kind {kind:?}"),
    })?;
    let size_bytes: i64 = row.get(6)?;
    let uploaded_at_ms: i64 = row.get(7)?;
    let uploaded_at = DateTime::<Utc>::from_timestamp_millis(uploaded_at_ms).ok_or_else(|| {
        RepositoryError::Corrupt {
            id: id.clone(),
            reason: format!("bad timestamp {uploaded_at_ms}"),
        }
    })?;
    let tags_json: String = row.get(9)?;
    let tags: Vec<String> =
        serde_json::from_str(&tags_json).map_err(|e| RepositoryError::Corrupt {
            id: id.clone(),
            reason: format!("bad tags: {e}"),
        })?;

    Ok(MediaRecord {
        id,
        kind,
        url: row.get(2)?,
        storage_key: row.get(3)?,
        caption: row.get(4)?,
        file_name: row.get(5)?,
        size_bytes: size_bytes.max(0) as u64,
        uploaded_at,
        uploader_id: row.get(8)?,
        tags,
        album: row.get(10)?,
    })
}

#[async_trait]
impl MediaRepository for LocalRepository {
    async fn list_records(&self, kind: MediaKind) -> Result<Vec<MediaRecord>, RepositoryError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, kind, url, storage_key, caption, file_name, size_bytes,
                        uploaded_at, uploader_id, tags_json, album
                 FROM media WHERE kind = ?1",
            )?;
            let mut rows = stmt.query([kind.as_str()])?;

            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_record(row)?);
            }
            Ok(records)
        })
        .await
    }

    async fn put_binary(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, RepositoryError> {
        let path = self.blob_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(path.to_string_lossy().to_string())
    }

    async fn fetch_binary(&self, url: &str) -> Result<Vec<u8>, RepositoryError> {
        let path = self.url_path(url)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RepositoryError::NotFound(url.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_binary(&self, key: &str) -> Result<(), RepositoryError> {
        let path = self.blob_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RepositoryError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn create_record(&self, record: NewRecord) -> Result<String, RepositoryError> {
        let tags_json = serde_json::to_string(&record.tags)
            .map_err(|e| RepositoryError::Backend(format!("encoding tags: {e}")))?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO media (kind, url, storage_key, caption, file_name, size_bytes,
                                    uploaded_at, uploader_id, tags_json, album)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    record.kind.as_str(),
                    &record.url,
                    &record.storage_key,
                    &record.caption,
                    &record.file_name,
                    record.size_bytes as i64,
                    record.uploaded_at.timestamp_millis(),
                    &record.uploader_id,
                    &tags_json,
                    &record.album,
                ],
            )?;
            Ok(conn.last_insert_rowid().to_string())
        })
        .await
    }

    async fn delete_record(&self, kind: MediaKind, id: &str) -> Result<(), RepositoryError> {
        let rowid: i64 = id
            .parse()
            .map_err(|_| RepositoryError::NotFound(id.to_string()))?;
        let id = id.to_string();
        self.with_conn(move |conn| {
            let existing: Option<i64> = conn
                .query_row(
                    "SELECT id FROM media WHERE id = ?1 AND kind = ?2",
                    rusqlite::params![rowid, kind.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_none() {
                return Err(RepositoryError::NotFound(id));
            }
            conn.execute("DELETE FROM media WHERE id = ?1", [rowid])?;
            Ok(())
        })
        .await
    }
}
