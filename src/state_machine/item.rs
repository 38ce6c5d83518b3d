use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One image awaiting a caption, plus the sidecar path the caption goes to.
/// Built at enumeration time and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub image_path: PathBuf,
    pub caption_path: PathBuf,
}

impl WorkItem {
    /// Builds the item for an image, deriving the `.txt` sidecar path next
    /// to it.
    pub fn new(image_path: PathBuf) -> Self {
        let caption_path = image_path.with_extension("txt");
        Self {
            image_path,
            caption_path,
        }
    }

    /// File name for log lines.
    pub fn file_name(&self) -> String {
        self.image_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.image_path.display().to_string())
    }
}

/// The result of one inference attempt against the current (key, model) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The endpoint produced a caption.
    Success(String),
    /// The endpoint turned the attempt away for quota reasons. The pair is
    /// spent; the same item is retried after the matrix rotates.
    QuotaExhausted,
    /// Any other failure. The item is skipped and the matrix stays put.
    OtherError(String),
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// Every pending item was resolved, or there was nothing to do.
    Completed,
    /// Every key and model from the starting point was spent on quota
    /// failures; unresolved items stay pending for a later run.
    Exhausted,
    /// A stop request was honored between items; unresolved items stay
    /// pending for a later run.
    Stopped,
}

/// Structured summary produced at the end of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub folder: PathBuf,
    pub termination: Termination,
    pub completed: usize,
    pub skipped: usize,
    pub already_captioned: usize,
    pub remaining: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
}
