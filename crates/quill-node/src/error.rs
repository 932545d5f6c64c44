//! Node-level errors.

use thiserror::Error;

use quill_core::error::{ParamsError, QuillError};

#[derive(Error, Debug)]
pub enum NodeError {
    /// A block task failed; the ledger was rolled back to its pre-block state.
    #[error("block {block_num} rejected by task {task}: {source}")]
    BlockRejected {
        block_num: u64,
        task: &'static str,
        #[source]
        source: QuillError,
    },
    #[error(transparent)] Quill(#[from] QuillError),
    #[error("invalid chain parameters: {0}")] InvalidParams(#[from] ParamsError),
    #[error("invalid genesis: {0}")] Genesis(String),
    #[error("configuration error: {0}")] Config(#[from] config::ConfigError),
    #[error("I/O error: {0}")] Io(#[from] std::io::Error),
    #[error("JSON error: {0}")] Json(#[from] serde_json::Error),
}

impl NodeError {
    /// The error a block task failed with, if this is a rejection.
    pub fn task_error(&self) -> Option<&QuillError> {
        match self {
            Self::BlockRejected { source, .. } => Some(source),
            _ => None,
        }
    }
}
