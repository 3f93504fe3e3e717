//! Mock guide source for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::sources::{ChannelDump, GuideDump, GuideSource, GuideWriter, UpdateError};

/// Mock implementation of the GuideSource trait.
///
/// Provides controllable behavior for testing:
/// - Serve a configurable guide dump on every fetch
/// - Count fetches for assertions
/// - Simulate a failing feed
///
/// # Example
///
/// ```rust,ignore
/// use tvguide_core::testing::{fixtures, MockSource};
///
/// let source = MockSource::new();
/// source.add_channel(fixtures::channel_dump("KQED", &["9"], vec![
///     fixtures::program("Nova", 0, 3600),
/// ])).await;
///
/// let updater = SourceUpdater::new().with_source("mock", Arc::new(source));
/// ```
#[derive(Debug, Default)]
pub struct MockSource {
    /// Guide data written on every fetch.
    dump: Arc<RwLock<GuideDump>>,
    /// Number of fetches so far.
    fetches: Arc<RwLock<usize>>,
    /// If set, the next fetch will fail with this message.
    next_error: Arc<RwLock<Option<String>>>,
}

impl MockSource {
    /// Create a new mock source with no channels.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_channel(&self, channel: ChannelDump) {
        self.dump.write().await.channels.push(channel);
    }

    pub async fn set_dump(&self, dump: GuideDump) {
        *self.dump.write().await = dump;
    }

    pub async fn fetch_count(&self) -> usize {
        *self.fetches.read().await
    }

    pub async fn set_next_error(&self, message: impl Into<String>) {
        *self.next_error.write().await = Some(message.into());
    }
}

#[async_trait]
impl GuideSource for MockSource {
    async fn fetch(&self, writer: &mut GuideWriter<'_>) -> Result<(), UpdateError> {
        *self.fetches.write().await += 1;

        if let Some(message) = self.next_error.write().await.take() {
            return Err(UpdateError::Source {
                source_name: "mock".to_string(),
                message,
            });
        }

        let dump = self.dump.read().await.clone();
        dump.write_to(writer).await
    }
}
