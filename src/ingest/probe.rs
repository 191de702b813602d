//! Video duration probing

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{CandidateFile, FileSource};

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("could not start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("probe exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("unreadable probe output: {0}")]
    Output(String),
}

/// Reads a video's playback duration
#[async_trait]
pub trait DurationProbe: Send + Sync {
    async fn duration(&self, file: &CandidateFile) -> Result<Duration, ProbeError>;
}

/// Probes with the `ffprobe` binary. In-memory files are piped over stdin.
#[derive(Debug, Clone)]
pub struct FfprobeDurationProbe {
    program: PathBuf,
}

impl Default for FfprobeDurationProbe {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffprobe"),
        }
    }
}

impl FfprobeDurationProbe {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_entries",
            "format=duration",
        ])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
        cmd
    }

    fn spawn_err(&self, source: std::io::Error) -> ProbeError {
        ProbeError::Spawn {
            program: self.program.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl DurationProbe for FfprobeDurationProbe {
    async fn duration(&self, file: &CandidateFile) -> Result<Duration, ProbeError> {
        let mut cmd = self.command();

        let output = match &file.source {
            FileSource::Path(path) => {
                cmd.arg(path).stdin(Stdio::null());
                cmd.output().await.map_err(|e| self.spawn_err(e))?
            }
            FileSource::Memory(bytes) => {
                cmd.arg("pipe:0").stdin(Stdio::piped());
                let mut child = cmd.spawn().map_err(|e| self.spawn_err(e))?;
                if let Some(mut stdin) = child.stdin.take() {
                    let bytes = bytes.clone();
                    // ffprobe may stop reading once it has the header
                    tokio::spawn(async move {
                        let _ = stdin.write_all(&bytes).await;
                    });
                }
                child
                    .wait_with_output()
                    .await
                    .map_err(|e| self.spawn_err(e))?
            }
        };

        if !output.status.success() {
            return Err(ProbeError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let secs = parse_duration(&output.stdout)?;
        tracing::debug!(file = %file.name, secs, "probed video duration");
        Ok(Duration::from_secs_f64(secs))
    }
}

/// Pull `format.duration` out of ffprobe's JSON output
fn parse_duration(stdout: &[u8]) -> Result<f64, ProbeError> {
    let json: serde_json::Value =
        serde_json::from_slice(stdout).map_err(|e| ProbeError::Output(e.to_string()))?;

    let raw = json
        .get("format")
        .and_then(|f| f.get("duration"))
        .ok_or_else(|| ProbeError::Output("no duration reported".into()))?;

    let secs = match raw {
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        serde_json::Value::Number(n) => n.as_f64(),
        _ => None,
    }
    .ok_or_else(|| ProbeError::Output(format!("bad duration {raw}")))?;

    if secs.is_finite() && secs >= 0.0 {
        Ok(secs)
    } else {
        Err(ProbeError::Output(format!("bad duration {secs}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_string_duration() {
        let out = br#"{ "format": { "duration": "59.940000" } }"#;
        assert!((parse_duration(out).unwrap() - 59.94).abs() < 1e-9);
    }

    #[test]
    fn test_parse_rejects_missing_or_bad_duration() {
        assert!(parse_duration(br#"{ "format": {} }"#).is_err());
        assert!(parse_duration(br#"{ "format": { "duration": "N/A" } }"#).is_err());
        assert!(parse_duration(b"not json").is_err());
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let probe = FfprobeDurationProbe::new("/nonexistent/ffprobe-for-tests");
        let file = CandidateFile::from_bytes("clip.mp4", "video/mp4", vec![0; 8]);
        assert!(matches!(
            probe.duration(&file).await,
            Err(ProbeError::Spawn { .. })
        ));
    }
}
