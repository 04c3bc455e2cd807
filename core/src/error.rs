use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SaveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Thumbnail error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Corrupt save '{}': {reason}", path.display())]
    CorruptSave { path: PathBuf, reason: String },

    #[error("Encryption key must be 16, 24 or 32 bytes of UTF-8, got {len}")]
    InvalidKeyLength { len: usize },

    #[error("Save integrity violated: info id '{info_id}' does not match data id '{data_id}'")]
    IntegrityMismatch { info_id: String, data_id: String },

    #[error("Save data file '{}' does not exist", path.display())]
    MissingDataFile { path: PathBuf },

    #[error(
        "{} saveable token(s) not found in the save, re-save the game before loading: {}",
        missing.len(),
        missing.join(", ")
    )]
    TokenMismatch { missing: Vec<String> },

    #[error("Invalid token '{token}': {reason}")]
    InvalidToken { token: String, reason: String },

    #[error("Reference '{guid}' is not in the reference catalog")]
    UnknownReference { guid: String },

    #[error("Field '{key}' is missing")]
    FieldMissing { key: String },

    #[error("Field '{key}' has type {found}, expected {expected}")]
    TypeMismatch {
        key:      String,
        expected: &'static str,
        found:    &'static str,
    },

    #[error("A save is already in progress")]
    SaveInProgress,

    #[error("Failed to remove {} save folder(s)", failures.len())]
    RemoveFailed { failures: Vec<(PathBuf, std::io::Error)> },

    #[error("Save state lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SaveError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::CorruptSave {
            path:   path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type SaveResult<T> = Result<T, SaveError>;
