//! Mock guide updater for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::sources::{GuideUpdater, UpdateError, UpdateSummary};
use crate::store::GuideStore;

/// Mock implementation of the GuideUpdater trait.
///
/// Records the backend of every call and returns a configurable summary
/// without touching the store.
#[derive(Debug, Default)]
pub struct MockUpdater {
    /// Backends requested, in call order.
    backends: Arc<RwLock<Vec<Option<String>>>>,
    /// Summary returned by successful updates.
    summary: Arc<RwLock<UpdateSummary>>,
    /// If set, the next update will fail with this message.
    next_error: Arc<RwLock<Option<String>>>,
}

impl MockUpdater {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn recorded_backends(&self) -> Vec<Option<String>> {
        self.backends.read().await.clone()
    }

    pub async fn update_count(&self) -> usize {
        self.backends.read().await.len()
    }

    pub async fn set_summary(&self, summary: UpdateSummary) {
        *self.summary.write().await = summary;
    }

    pub async fn set_next_error(&self, message: impl Into<String>) {
        *self.next_error.write().await = Some(message.into());
    }
}

#[async_trait]
impl GuideUpdater for MockUpdater {
    async fn update(
        &self,
        _store: &dyn GuideStore,
        backend: Option<&str>,
    ) -> Result<UpdateSummary, UpdateError> {
        self.backends
            .write()
            .await
            .push(backend.map(str::to_string));

        if let Some(message) = self.next_error.write().await.take() {
            return Err(UpdateError::Source {
                source_name: backend.unwrap_or("mock").to_string(),
                message,
            });
        }

        Ok(self.summary.read().await.clone())
    }
}
