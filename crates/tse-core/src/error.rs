use thiserror::Error;

/// Failures surfaced to the caller. Tree-level lookups that merely find
/// nothing degrade to `Option`/`bool` instead; only the external codec and
/// file handling are fatal to an operation.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("save codec not found or not working: {detail}")]
    CodecUnavailable { detail: String },

    #[error("{command} failed (exit {status}): {stderr}")]
    CodecFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("{command} timed out after {secs}s")]
    CodecTimeout { command: String, secs: u64 },
}
