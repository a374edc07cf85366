//! Error taxonomy for the detection core and the upload boundary.
//!
//! `PipelineError` covers everything that stops frame processing. `UploadError` never
//! stops the loop: the driver logs it and moves on to the next frame.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("smoothing factor must be in (0, 1), got {0}")]
    InvalidAlpha(f32),

    #[error("background model updated before initialization")]
    UninitializedModel,

    #[error("background model already initialized")]
    AlreadyInitialized,

    #[error("frame is {actual:?} but background model is {expected:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("frame timestamp went backwards")]
    NonMonotonicTimestamp,

    #[error("frame source exhausted")]
    SourceExhausted,

    #[error("frame source failed: {0}")]
    Source(String),
}

impl PipelineError {
    pub(crate) fn source(msg: impl std::fmt::Display) -> Self {
        PipelineError::Source(msg.to_string())
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to encode snapshot: {0}")]
    Encode(String),

    #[error("snapshot write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("remote storage rejected upload (status {status}): {message}")]
    Remote { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("upload queue full, snapshot dropped")]
    QueueFull,

    #[error("upload worker stopped")]
    WorkerStopped,
}

impl UploadError {
    /// Whether a later attempt with the same payload could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            UploadError::Transport(_) | UploadError::Io(_) => true,
            UploadError::Remote { status, .. } => *status == 429 || *status >= 500,
            UploadError::Encode(_) | UploadError::QueueFull | UploadError::WorkerStopped => {
                false
            }
        }
    }
}
