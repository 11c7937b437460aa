use std::path::PathBuf;
use thiserror::Error;

/// Domain failures the pipeline distinguishes from plain I/O errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("metadata file not found: {}", .0.display())]
    MetadataNotFound(PathBuf),
    #[error("invalid metadata in {}: {reason}", .path.display())]
    InvalidMetadata { path: PathBuf, reason: String },
    #[error("participant table must contain the columns {expected:?}; missing {missing:?}")]
    MissingColumns {
        expected: Vec<String>,
        missing: Vec<String>,
    },
    #[error("row {row}: participant_id {value:?} is not a non-negative integer")]
    InvalidParticipantId { row: usize, value: String },
    #[error("{entity} label {value:?} must be non-empty and alphanumeric")]
    InvalidLabel { entity: &'static str, value: String },
    #[error("{} already exists and overwrite is disabled", .0.display())]
    RecordingExists(PathBuf),
    #[error("invalid EDF recording {}: {reason}", .path.display())]
    InvalidRecording { path: PathBuf, reason: String },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
