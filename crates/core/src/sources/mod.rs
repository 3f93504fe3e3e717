//! Guide update mechanism.
//!
//! The guide itself never writes channels or programs. An update is delegated
//! to a [`GuideUpdater`]; the bundled [`SourceUpdater`] runs named
//! [`GuideSource`] backends that feed a [`GuideWriter`].

mod json;
mod writer;

pub use json::{ChannelDump, GuideDump, JsonFileSource};
pub use writer::{GuideWriter, ProgramData};

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{JsonSourceConfig, UpdateConfig};
use crate::store::{GuideStore, StoreError};

/// Errors raised while updating the guide.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    #[error("Source '{source_name}' failed: {message}")]
    Source {
        source_name: String,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Outcome of an update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateSummary {
    /// Backends that ran, in run order.
    pub sources: Vec<String>,
    pub channels_added: u32,
    pub channels_updated: u32,
    pub programs_added: u32,
    /// Existing programs removed because a new one overlapped them.
    pub programs_replaced: u64,
    /// Programs ignored because they did not end after they started.
    pub programs_skipped: u32,
    pub programs_expired: u64,
    pub max_program_length: i64,
    pub num_programs: u64,
}

/// Populates the store with channels and programs.
#[async_trait]
pub trait GuideUpdater: Send + Sync {
    /// Run the named backend, or every backend when `backend` is `None`.
    async fn update(
        &self,
        store: &dyn GuideStore,
        backend: Option<&str>,
    ) -> Result<UpdateSummary, UpdateError>;
}

/// A backend producing guide data.
#[async_trait]
pub trait GuideSource: Send + Sync {
    /// Push this source's channels and programs into the writer.
    async fn fetch(&self, writer: &mut GuideWriter<'_>) -> Result<(), UpdateError>;
}

/// Updater running a registry of named sources through one [`GuideWriter`].
#[derive(Default)]
pub struct SourceUpdater {
    sources: BTreeMap<String, Arc<dyn GuideSource>>,
    /// Programs that stopped longer ago than this are expired after an update.
    expire_after: Option<chrono::Duration>,
}

impl SourceUpdater {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an updater from the `[update]` and `[[sources.json]]` config sections.
    pub fn from_config(update: &UpdateConfig, json_sources: &[JsonSourceConfig]) -> Self {
        let mut updater = Self::new();
        if update.expire_after_hours > 0 {
            updater = updater.expire_after(chrono::Duration::hours(update.expire_after_hours as i64));
        }
        for source in json_sources {
            updater.register(&source.name, Arc::new(JsonFileSource::new(&source.path)));
        }
        updater
    }

    pub fn register(&mut self, name: impl Into<String>, source: Arc<dyn GuideSource>) {
        self.sources.insert(name.into(), source);
    }

    pub fn with_source(mut self, name: impl Into<String>, source: Arc<dyn GuideSource>) -> Self {
        self.register(name, source);
        self
    }

    pub fn expire_after(mut self, age: chrono::Duration) -> Self {
        self.expire_after = Some(age);
        self
    }

    pub fn backends(&self) -> Vec<String> {
        self.sources.keys().cloned().collect()
    }
}

#[async_trait]
impl GuideUpdater for SourceUpdater {
    async fn update(
        &self,
        store: &dyn GuideStore,
        backend: Option<&str>,
    ) -> Result<UpdateSummary, UpdateError> {
        let selected: Vec<(&String, &Arc<dyn GuideSource>)> = match backend {
            Some(name) => {
                let (key, source) = self
                    .sources
                    .get_key_value(name)
                    .ok_or_else(|| UpdateError::UnknownBackend(name.to_string()))?;
                vec![(key, source)]
            }
            None => self.sources.iter().collect(),
        };

        let mut writer = GuideWriter::new(store).await?;
        let mut names = Vec::with_capacity(selected.len());
        for (name, source) in selected {
            info!(backend = %name, "Updating guide from source");
            if let Err(e) = source.fetch(&mut writer).await {
                // Earlier sources are already committed; keep the count in step with them.
                if let Err(count_err) = writer.record_program_count().await {
                    warn!(error = %count_err, "Failed to record program count after source error");
                }
                return Err(e);
            }
            names.push(name.clone());
        }

        let expire_before = self
            .expire_after
            .map(|age| (chrono::Utc::now() - age).timestamp());
        let mut summary = writer.finish(expire_before).await?;
        summary.sources = names;

        info!(
            sources = ?summary.sources,
            programs_added = summary.programs_added,
            programs_expired = summary.programs_expired,
            num_programs = summary.num_programs,
            "Guide update finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guide::schema::register_schema;
    use crate::guide::cache::{MAX_PROGRAM_LENGTH_KEY, NUM_PROGRAMS_KEY};
    use crate::store::{AttrValue, Query, SqliteGuideStore};
    use crate::testing::{fixtures, MockSource};

    async fn create_test_store() -> SqliteGuideStore {
        let store = SqliteGuideStore::in_memory().unwrap();
        register_schema(&store).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_update_all_sources_in_name_order() {
        let store = create_test_store().await;
        let b = MockSource::new();
        b.add_channel(fixtures::channel_dump("B", &["2"], vec![fixtures::program("B show", 0, 60)]))
            .await;
        let a = MockSource::new();
        a.add_channel(fixtures::channel_dump("A", &["1"], vec![fixtures::program("A show", 0, 60)]))
            .await;

        let updater = SourceUpdater::new()
            .with_source("beta", Arc::new(b))
            .with_source("alpha", Arc::new(a));
        let summary = updater.update(&store, None).await.unwrap();

        assert_eq!(summary.sources, vec!["alpha", "beta"]);
        assert_eq!(summary.channels_added, 2);
        assert_eq!(summary.programs_added, 2);
        assert_eq!(summary.num_programs, 2);
        assert_eq!(store.count(&Query::new("channel")).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_single_backend() {
        let store = create_test_store().await;
        let a = Arc::new(MockSource::new());
        let b = Arc::new(MockSource::new());
        let updater = SourceUpdater::new()
            .with_source("alpha", a.clone())
            .with_source("beta", b.clone());

        let summary = updater.update(&store, Some("beta")).await.unwrap();
        assert_eq!(summary.sources, vec!["beta"]);
        assert_eq!(a.fetch_count().await, 0);
        assert_eq!(b.fetch_count().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_backend() {
        let store = create_test_store().await;
        let updater = SourceUpdater::new();
        let result = updater.update(&store, Some("xmltv")).await;
        assert!(matches!(result, Err(UpdateError::UnknownBackend(name)) if name == "xmltv"));
    }

    #[tokio::test]
    async fn test_source_failure_aborts_update() {
        let store = create_test_store().await;
        let failing = MockSource::new();
        failing.set_next_error("feed unavailable").await;
        let updater = SourceUpdater::new().with_source("broken", Arc::new(failing));

        let result = updater.update(&store, None).await;
        assert!(matches!(result, Err(UpdateError::Source { .. })));
    }

    #[tokio::test]
    async fn test_failed_source_keeps_metadata_consistent() {
        let store = create_test_store().await;
        let alpha = MockSource::new();
        alpha
            .add_channel(fixtures::channel_dump(
                "A",
                &["1"],
                vec![fixtures::program("Marathon", 0, 18000)],
            ))
            .await;
        let beta = Arc::new(MockSource::new());
        beta.add_channel(fixtures::channel_dump("B", &["2"], vec![fixtures::program("Short", 0, 60)]))
            .await;
        beta.set_next_error("feed unavailable").await;

        let updater = SourceUpdater::new()
            .with_source("alpha", Arc::new(alpha))
            .with_source("beta", beta.clone());
        assert!(updater.update(&store, None).await.is_err());

        let max = store
            .get_metadata(MAX_PROGRAM_LENGTH_KEY, AttrValue::Int(0))
            .await
            .unwrap();
        assert_eq!(max, AttrValue::Int(18000));
        let count = store
            .get_metadata(NUM_PROGRAMS_KEY, AttrValue::Int(0))
            .await
            .unwrap();
        assert_eq!(count, AttrValue::Int(1));

        let summary = updater.update(&store, Some("beta")).await.unwrap();
        assert_eq!(summary.max_program_length, 18000);
        assert_eq!(summary.num_programs, 2);
    }

    #[tokio::test]
    async fn test_expiry_removes_old_programs() {
        let store = create_test_store().await;
        let now = chrono::Utc::now().timestamp();
        let source = MockSource::new();
        source
            .add_channel(fixtures::channel_dump(
                "A",
                &["1"],
                vec![
                    fixtures::program("Ancient", now - 10 * 86400, now - 10 * 86400 + 3600),
                    fixtures::program("Current", now - 600, now + 3000),
                ],
            ))
            .await;

        let updater = SourceUpdater::new()
            .with_source("mock", Arc::new(source))
            .expire_after(chrono::Duration::hours(24));
        let summary = updater.update(&store, None).await.unwrap();

        assert_eq!(summary.programs_added, 2);
        assert_eq!(summary.programs_expired, 1);
        assert_eq!(summary.num_programs, 1);
    }

    #[test]
    fn test_from_config() {
        let update = UpdateConfig {
            expire_after_hours: 0,
        };
        let sources = vec![
            JsonSourceConfig {
                name: "local".to_string(),
                path: "/tmp/guide.json".into(),
            },
            JsonSourceConfig {
                name: "backup".to_string(),
                path: "/tmp/backup.json".into(),
            },
        ];
        let updater = SourceUpdater::from_config(&update, &sources);
        assert_eq!(updater.backends(), vec!["backup", "local"]);
        assert!(updater.expire_after.is_none());
    }
}
