//! Hub errors

use thiserror::Error;
use xcomfort_registry::StorageError;

use crate::state::InvalidTransition;

#[derive(Debug, Error)]
pub enum HubError {
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("update task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type HubResult<T> = Result<T, HubError>;
