use crate::error::ValidationError;
use crate::state::data::MediaKind;

use super::probe::DurationProbe;
use super::{CandidateFile, IngestLimits};

/// Type and size checks that need no I/O
pub fn check_static(file: &CandidateFile, limits: &IngestLimits) -> Result<MediaKind, ValidationError> {
    let content_type = file.content_type.trim().to_ascii_lowercase();

    let (kind, limit) = match file.kind() {
        Some(MediaKind::Photo) => (MediaKind::Photo, limits.max_photo_bytes),
        Some(MediaKind::Video)
            if limits
                .video_types
                .iter()
                .any(|t| t.eq_ignore_ascii_case(&content_type)) =>
        {
            (MediaKind::Video, limits.max_video_bytes)
        }
        _ => {
            return Err(ValidationError::UnsupportedType {
                name: file.name.clone(),
                content_type: file.content_type.clone(),
            })
        }
    };

    if file.size_bytes > limit {
        return Err(ValidationError::TooLarge {
            name: file.name.clone(),
            size: file.size_bytes,
            limit,
        });
    }

    Ok(kind)
}

/// Full check for one file. Videos are probed for their duration, and a
/// probe that cannot answer rejects the file.
pub async fn validate(
    file: &CandidateFile,
    limits: &IngestLimits,
    probe: &dyn DurationProbe,
) -> Result<MediaKind, ValidationError> {
    let kind = check_static(file, limits)?;
    if kind == MediaKind::Photo {
        return Ok(kind);
    }

    let duration = probe
        .duration(file)
        .await
        .map_err(|e| ValidationError::ProbeFailed {
            name: file.name.clone(),
            reason: e.to_string(),
        })?;

    let secs = duration.as_secs_f64();
    if secs > limits.max_video_secs as f64 {
        return Err(ValidationError::TooLong {
            name: file.name.clone(),
            secs,
            limit: limits.max_video_secs,
        });
    }

    Ok(kind)
}
