use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::download::DownloadSink;

use super::data::MediaRecord;

/// Pause between downloads so the host does not throttle a burst
pub const DEFAULT_DOWNLOAD_DELAY: Duration = Duration::from_millis(300);

/// Ids the user picked for a bulk action, kept in the order they were picked
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionManager {
    ids: Vec<String>,
}

/// Result of a bulk download
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadReport {
    /// (record id, saved path)
    pub saved: Vec<(String, PathBuf)>,
    /// (record id, reason)
    pub failed: Vec<(String, String)>,
}

impl DownloadReport {
    pub fn summary(&self) -> String {
        if self.failed.is_empty() {
            format!("Downloaded {} item(s).", self.saved.len())
        } else {
            format!(
                "Downloaded {} item(s); {} failed: {}",
                self.saved.len(),
                self.failed.len(),
                self.failed
                    .iter()
                    .map(|(id, _)| id.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        }
    }
}

impl SelectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of `id`; returns whether it is now selected
    pub fn toggle(&mut self, id: &str) -> bool {
        if let Some(pos) = self.ids.iter().position(|s| s == id) {
            self.ids.remove(pos);
            false
        } else {
            self.ids.push(id.to_string());
            true
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn remove(&mut self, id: &str) {
        self.ids.retain(|s| s != id);
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.ids.iter().any(|s| s == id)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Drop ids whose records are no longer in the visible view
    pub fn retain_visible(&mut self, view: &[&MediaRecord]) {
        self.ids.retain(|id| view.iter().any(|r| &r.id == id));
    }

    /// Selected records in view order
    pub fn selected_in<'a>(&self, view: &[&'a MediaRecord]) -> Vec<&'a MediaRecord> {
        view.iter()
            .copied()
            .filter(|r| self.is_selected(&r.id))
            .collect()
    }

    /// Download every selected record visible in `view`, one at a time
    pub async fn download_all(
        &self,
        view: &[&MediaRecord],
        sink: Arc<dyn DownloadSink>,
        delay: Duration,
    ) -> DownloadReport {
        let records = self.selected_in(view).into_iter().cloned().collect();
        download_records(records, sink, delay).await
    }
}

/// Download `records` sequentially with `delay` between items.
///
/// A failed item is recorded and skipped; the rest still run.
pub async fn download_records(
    records: Vec<MediaRecord>,
    sink: Arc<dyn DownloadSink>,
    delay: Duration,
) -> DownloadReport {
    let mut report = DownloadReport::default();

    for (i, record) in records.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match sink.save(record).await {
            Ok(path) => {
                tracing::debug!(id = %record.id, path = %path.display(), "downloaded");
                report.saved.push((record.id.clone(), path));
            }
            Err(e) => {
                tracing::warn!(id = %record.id, error = %e, "download failed, skipping");
                report.failed.push((record.id.clone(), e.to_string()));
            }
        }
    }

    report
}
