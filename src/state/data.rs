//! Shared data structures for the gallery state
//!
//! These structs represent the media model that flows between
//! the repository layer, the store and the UI layer.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Caption used when neither a caption nor a usable file name exists
pub const UNTITLED: &str = "Untitled";

/// Photo or video. Never changes after the record is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "photo" => Some(MediaKind::Photo),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }

    /// Kind implied by a MIME type (`image/*` or `video/*`)
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let top = content_type.split('/').next().unwrap_or_default();
        match top.trim().to_ascii_lowercase().as_str() {
            "image" => Some(MediaKind::Photo),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }
}

/// One photo or video in the gallery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    /// Repository-assigned identifier, immutable
    pub id: String,
    pub kind: MediaKind,
    /// Fetchable location of the payload
    pub url: String,
    /// Backend blob key; `None` for legacy records
    pub storage_key: Option<String>,
    /// Caption entered at upload time
    pub caption: Option<String>,
    /// Original file name as uploaded
    pub file_name: String,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
    pub uploader_id: String,
    /// Player names
    pub tags: Vec<String>,
    pub album: Option<String>,
}

impl MediaRecord {
    /// Caption if present, otherwise the normalized file name
    pub fn display_name(&self) -> String {
        if let Some(caption) = self.caption.as_deref().map(str::trim) {
            if !caption.is_empty() {
                return caption.to_string();
            }
        }
        normalize_file_name(&self.file_name)
    }

    /// Whether any tag matches `term` (see [`tag_matches`])
    pub fn has_tag_matching(&self, term: &str) -> bool {
        self.tags.iter().any(|tag| tag_matches(tag, term))
    }

    pub fn is_owned_by(&self, viewer_id: &str) -> bool {
        self.uploader_id == viewer_id
    }
}

/// Metadata for a record that has not been persisted yet.
///
/// The repository assigns the id; [`NewRecord::into_record`] joins them.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub kind: MediaKind,
    pub url: String,
    pub storage_key: Option<String>,
    pub caption: Option<String>,
    pub file_name: String,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
    pub uploader_id: String,
    pub tags: Vec<String>,
    pub album: Option<String>,
}

impl NewRecord {
    pub fn into_record(self, id: String) -> MediaRecord {
        MediaRecord {
            id,
            kind: self.kind,
            url: self.url,
            storage_key: self.storage_key,
            caption: self.caption,
            file_name: self.file_name,
            size_bytes: self.size_bytes,
            uploaded_at: self.uploaded_at,
            uploader_id: self.uploader_id,
            tags: self.tags,
            album: self.album,
        }
    }
}

/// Case-insensitive, substring-tolerant tag match.
///
/// Matches when either side contains the other after trimming and
/// lower-casing. An empty term matches nothing.
pub fn tag_matches(tag: &str, term: &str) -> bool {
    let tag = tag.trim().to_lowercase();
    let term = term.trim().to_lowercase();
    if tag.is_empty() || term.is_empty() {
        return false;
    }
    tag.contains(&term) || term.contains(&tag)
}

fn upload_prefix() -> &'static Regex {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    // `<batch millis>_<index>_` as written by the ingestion key scheme,
    // or a bare `<millis>_` from older uploads
    PREFIX.get_or_init(|| Regex::new(r"^\d{10,}_(\d+_)?").expect("valid prefix pattern"))
}

/// Strip upload-time prefixes and directory parts from a stored file name
pub fn normalize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let stripped = upload_prefix().replace(base, "");
    let stripped = stripped.trim();
    if stripped.is_empty() {
        UNTITLED.to_string()
    } else {
        stripped.to_string()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_match_is_case_insensitive() {
        assert!(tag_matches("Smith", "smith"));
        assert!(tag_matches("  SMITH ", "Smith"));
    }

    #[test]
    fn test_tag_match_either_direction_substring() {
        assert!(tag_matches("John Smith", "smith"));
        assert!(tag_matches("Smith", "j. smith"));
        assert!(!tag_matches("Jones", "smith"));
    }

    #[test]
    fn test_empty_term_matches_nothing() {
        assert!(!tag_matches("Smith", "   "));
        assert!(!tag_matches("", "smith"));
    }

    #[test]
    fn test_display_name_prefers_caption() {
        let mut record = fixtures::record("a", MediaKind::Photo, &[], 0);
        record.caption = Some("Late winner".into());
        assert_eq!(record.display_name(), "Late winner");

        record.caption = Some("   ".into());
        assert_eq!(record.display_name(), "a.jpg");
    }

    #[test]
    fn test_normalize_strips_upload_prefix() {
        assert_eq!(normalize_file_name("1715353200123_2_goal.jpg"), "goal.jpg");
        assert_eq!(normalize_file_name("1715353200123_goal.jpg"), "goal.jpg");
        assert_eq!(normalize_file_name("media/u1/1715353200123_0_kickoff.mp4"), "kickoff.mp4");
        assert_eq!(normalize_file_name("2024_final.jpg"), "2024_final.jpg");
    }

    #[test]
    fn test_normalize_falls_back_to_untitled() {
        assert_eq!(normalize_file_name(""), UNTITLED);
        assert_eq!(normalize_file_name("1715353200123_4_"), UNTITLED);
    }

    #[test]
    fn test_kind_from_content_type() {
        assert_eq!(MediaKind::from_content_type("image/jpeg"), Some(MediaKind::Photo));
        assert_eq!(MediaKind::from_content_type("VIDEO/mp4"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_content_type("application/pdf"), None);
    }

    #[test]
    fn test_kind_string_round_trip() {
        for kind in [MediaKind::Photo, MediaKind::Video] {
            assert_eq!(MediaKind::parse(kind.as_str()), Some(kind));
        }
    }
}
