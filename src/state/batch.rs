//! Upload batch metadata and progress
//!
//! An upload batch shares one caption/tags/album template across every
//! file. The template is what the upload form edits; it is reset after a
//! batch fully succeeds.

use serde::{Deserialize, Serialize};

/// Metadata applied uniformly to every file of a batch
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct UploadTemplate {
    /// Free-text caption; blank means "use the file name"
    pub caption: String,

    /// Player names, de-duplicated case-insensitively
    pub tags: Vec<String>,

    /// Optional grouping label; blank means none
    pub album: String,
}

impl UploadTemplate {
    /// Create an empty template
    pub fn new() -> Self {
        Self::default()
    }

    /// Split comma-separated tag input into clean, distinct tags
    pub fn parse_tags(input: &str) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        for tag in input.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            if !tags.iter().any(|t| t.to_lowercase() == tag.to_lowercase()) {
                tags.push(tag.to_string());
            }
        }
        tags
    }

    /// Replace the tags from raw form input
    pub fn set_tags_from_input(&mut self, input: &str) {
        self.tags = Self::parse_tags(input);
    }

    pub fn caption(&self) -> Option<String> {
        non_blank(&self.caption)
    }

    pub fn album(&self) -> Option<String> {
        non_blank(&self.album)
    }

    /// Reset all fields after a successful batch
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn non_blank(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Where a batch stands, reported after each file is persisted
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchProgress {
    /// Files fully persisted so far
    pub completed: usize,
    /// Files that passed validation
    pub total: usize,
}

impl BatchProgress {
    /// `completed / total` as a percentage
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.completed as f64 / self.total as f64 * 100.0
    }
}
