//! In-memory repository for tests: records every call in order and can be
//! told to fail specific operations.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::MediaRepository;
use crate::error::RepositoryError;
use crate::state::data::{MediaKind, MediaRecord, NewRecord};

#[derive(Debug, Default)]
struct Inner {
    records: Vec<MediaRecord>,
    blobs: HashMap<String, Vec<u8>>,
    calls: Vec<String>,
    next_id: u64,
    puts: usize,
    creates: usize,
}

#[derive(Debug, Default)]
pub struct MemoryRepository {
    inner: Mutex<Inner>,
    /// Kinds whose listing fails
    pub fail_list: HashSet<MediaKind>,
    /// Zero-based index of the `put_binary` call that fails
    pub fail_put_at: Option<usize>,
    /// Zero-based index of the `create_record` call that fails
    pub fail_create_at: Option<usize>,
    pub fail_delete_binary: bool,
    pub fail_delete_record: bool,
    /// URLs whose fetch fails
    pub fail_fetch: HashSet<String>,
}

impl MemoryRepository {
    pub fn with_records(records: Vec<MediaRecord>) -> Self {
        let repo = Self::default();
        {
            let mut inner = repo.inner.lock().unwrap();
            for record in &records {
                inner.blobs.insert(record.url.clone(), record.id.as_bytes().to_vec());
            }
            inner.records = records;
        }
        repo
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn records(&self) -> Vec<MediaRecord> {
        self.inner.lock().unwrap().records.clone()
    }

    pub fn blob(&self, url: &str) -> Option<Vec<u8>> {
        self.inner.lock().unwrap().blobs.get(url).cloned()
    }

    fn log(&self, call: String) {
        self.inner.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl MediaRepository for MemoryRepository {
    async fn list_records(&self, kind: MediaKind) -> Result<Vec<MediaRecord>, RepositoryError> {
        self.log(format!("list:{}", kind.as_str()));
        if self.fail_list.contains(&kind) {
            return Err(RepositoryError::Backend(format!("{} collection unavailable", kind.as_str())));
        }
        let inner = self.inner.lock().unwrap();
        Ok(inner.records.iter().filter(|r| r.kind == kind).cloned().collect())
    }

    async fn put_binary(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, RepositoryError> {
        self.log(format!("put:{key}"));
        let mut inner = self.inner.lock().unwrap();
        let attempt = inner.puts;
        inner.puts += 1;
        if self.fail_put_at == Some(attempt) {
            return Err(RepositoryError::Backend("upload rejected".into()));
        }
        let url = format!("mem://{key}");
        inner.blobs.insert(url.clone(), bytes);
        Ok(url)
    }

    async fn fetch_binary(&self, url: &str) -> Result<Vec<u8>, RepositoryError> {
        self.log(format!("fetch:{url}"));
        if self.fail_fetch.contains(url) {
            return Err(RepositoryError::Backend("fetch failed".into()));
        }
        self.inner
            .lock()
            .unwrap()
            .blobs
            .get(url)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(url.to_string()))
    }

    async fn delete_binary(&self, key: &str) -> Result<(), RepositoryError> {
        self.log(format!("delete_binary:{key}"));
        if self.fail_delete_binary {
            return Err(RepositoryError::Backend("storage unavailable".into()));
        }
        let mut inner = self.inner.lock().unwrap();
        inner.blobs.retain(|url, _| !url.ends_with(key));
        Ok(())
    }

    async fn create_record(&self, record: NewRecord) -> Result<String, RepositoryError> {
        self.log(format!("create:{}", record.file_name));
        let mut inner = self.inner.lock().unwrap();
        let attempt = inner.creates;
        inner.creates += 1;
        if self.fail_create_at == Some(attempt) {
            return Err(RepositoryError::Backend("write rejected".into()));
        }
        inner.next_id += 1;
        let id = format!("m{}", inner.next_id);
        inner.records.push(record.into_record(id.clone()));
        Ok(id)
    }

    async fn delete_record(&self, _kind: MediaKind, id: &str) -> Result<(), RepositoryError> {
        self.log(format!("delete_record:{id}"));
        if self.fail_delete_record {
            return Err(RepositoryError::Backend("write rejected".into()));
        }
        let mut inner = self.inner.lock().unwrap();
        let before = inner.records.len();
        inner.records.retain(|r| r.id != id);
        if inner.records.len() == before {
            return Err(RepositoryError::NotFound(id.to_string()));
        }
        Ok(())
    }
}
