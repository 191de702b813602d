use crate::error::RepositoryError;
use crate::repo::MediaRepository;

use super::data::{MediaKind, MediaRecord};

/// Which kinds a view shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeFilter {
    #[default]
    All,
    PhotoOnly,
    VideoOnly,
}

impl TypeFilter {
    pub fn accepts(&self, kind: MediaKind) -> bool {
        match self {
            TypeFilter::All => true,
            TypeFilter::PhotoOnly => kind == MediaKind::Photo,
            TypeFilter::VideoOnly => kind == MediaKind::Video,
        }
    }
}

/// Photo and video totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KindCounts {
    pub photos: usize,
    pub videos: usize,
}

/// Filters the grid and lightbox currently apply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewFilter {
    pub kind: TypeFilter,
    /// Player name; blank means no tag filter
    pub tag: String,
}

/// The MediaStore holds the local copy of every known record,
/// sorted newest first, and derives filtered views from it.
#[derive(Debug, Default)]
pub struct MediaStore {
    records: Vec<MediaRecord>,
}

impl MediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from already-fetched records
    pub fn from_records(records: Vec<MediaRecord>) -> Self {
        let mut store = Self::default();
        store.replace(records);
        store
    }

    /// Fetch both kinds from the repository.
    ///
    /// Photos are required: a failure there is returned. A failure listing
    /// videos counts as "no videos yet".
    pub async fn fetch_all(repo: &dyn MediaRepository) -> Result<Vec<MediaRecord>, RepositoryError> {
        let mut records = repo.list_records(MediaKind::Photo).await?;
        let photo_count = records.len();

        match repo.list_records(MediaKind::Video).await {
            Ok(videos) => records.extend(videos),
            Err(e) => {
                tracing::warn!(error = %e, "video listing failed, treating as empty");
            }
        }

        tracing::info!(
            photos = photo_count,
            videos = records.len() - photo_count,
            "fetched media records"
        );
        Ok(records)
    }

    /// Replace the collection with a fresh fetch. On error the current
    /// collection is left untouched.
    pub async fn load(&mut self, repo: &dyn MediaRepository) -> Result<(), RepositoryError> {
        let records = Self::fetch_all(repo).await?;
        self.replace(records);
        Ok(())
    }

    /// Swap in a new collection and restore newest-first order
    pub fn replace(&mut self, records: Vec<MediaRecord>) {
        self.records = records;
        self.sort();
    }

    /// Records matching both filters, in store order.
    ///
    /// Lazily evaluated; calling it again with the same inputs yields the
    /// same sequence.
    pub fn filtered_view<'a>(
        &'a self,
        type_filter: TypeFilter,
        tag_filter: Option<&'a str>,
    ) -> impl Iterator<Item = &'a MediaRecord> + 'a {
        let tag_filter = tag_filter.map(str::trim).filter(|t| !t.is_empty());
        self.records.iter().filter(move |record| {
            type_filter.accepts(record.kind)
                && tag_filter.map_or(true, |term| record.has_tag_matching(term))
        })
    }

    /// Materialized [`MediaStore::filtered_view`] for a [`ViewFilter`]
    pub fn view<'a>(&'a self, filter: &'a ViewFilter) -> Vec<&'a MediaRecord> {
        self.filtered_view(filter.kind, Some(filter.tag.as_str())).collect()
    }

    /// Remove a record from the local collection only
    pub fn remove(&mut self, id: &str) -> Option<MediaRecord> {
        let pos = self.records.iter().position(|r| r.id == id)?;
        Some(self.records.remove(pos))
    }

    /// Insert a record and keep the newest-first order. A record with the
    /// same id is replaced rather than duplicated.
    pub fn append(&mut self, record: MediaRecord) {
        self.records.retain(|r| r.id != record.id);
        self.records.push(record);
        self.sort();
    }

    pub fn get(&self, id: &str) -> Option<&MediaRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn counts(&self) -> KindCounts {
        self.records.iter().fold(KindCounts::default(), |mut acc, r| {
            match r.kind {
                MediaKind::Photo => acc.photos += 1,
                MediaKind::Video => acc.videos += 1,
            }
            acc
        })
    }

    /// Distinct tags across the collection, first-seen spelling, sorted
    /// case-insensitively
    pub fn tags(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut tags: Vec<String> = self
            .records
            .iter()
            .flat_map(|r| r.tags.iter())
            .map(|t| t.trim())
            .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
            .map(str::to_string)
            .collect();
        tags.sort_by_key(|t| t.to_lowercase());
        tags
    }

    // Stable, so records uploaded at the same instant keep arrival order
    fn sort(&mut self) {
        self.records
            .sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
    }
}

/// Index of `id` within a materialized view
pub fn position_in(view: &[&MediaRecord], id: &str) -> Option<usize> {
    view.iter().position(|r| r.id == id)
}
