//! Guide error types.

use thiserror::Error;

use crate::sources::UpdateError;
use crate::store::StoreError;

/// Errors returned by [`Guide`](super::Guide) operations.
#[derive(Debug, Error)]
pub enum GuideError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Update failed: {0}")]
    Update(#[from] UpdateError),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("No updater configured")]
    NoUpdater,
}
