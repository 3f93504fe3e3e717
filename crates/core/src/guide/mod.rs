//! Program guide: channel cache, program search and updates.
//!
//! [`Guide`] owns a store handle and the current [`ChannelCache`] snapshot.
//! Searches are translated into a single store query, and the resulting rows
//! are joined to cached channels, annotated by registered hooks, and turned
//! into [`Program`]s (or any [`FromProgramRow`] type).

pub mod cache;
mod channel;
mod error;
pub mod mapper;
mod program;
pub mod query;
pub mod schema;

pub use cache::{ChannelCache, TunerCollision};
pub use channel::{compare_channels, sort_channels, Channel, ChannelError};
pub use error::GuideError;
pub use mapper::{ProgramExtras, ProgramRetrieved, RawProgram};
pub use program::{Credit, FromProgramRow, Program, ProgramFlags};
pub use query::{ChannelSelector, IntoTimestamp, ProgramAttr, SearchRequest, TimeSpec};

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use tracing::{debug, error, info};

use crate::config::Config;
use crate::metrics;
use crate::sources::{GuideUpdater, SourceUpdater, UpdateSummary};
use crate::store::{GuideStore, SqliteGuideStore};

/// Television guide facade.
pub struct Guide {
    store: Arc<dyn GuideStore>,
    updater: Option<Arc<dyn GuideUpdater>>,
    cache: RwLock<Arc<ChannelCache>>,
    /// Serializes syncs so two never overlap.
    sync_lock: tokio::sync::Mutex<()>,
    /// Held for a whole update cycle, updater run plus re-sync.
    update_lock: tokio::sync::Mutex<()>,
    hooks: RwLock<Vec<Arc<dyn ProgramRetrieved>>>,
}

impl std::fmt::Debug for Guide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guide")
            .field("store", &"<store>")
            .field("updater", &self.updater.as_ref().map(|_| "<updater>"))
            .field("channels", &self.snapshot().len())
            .finish()
    }
}

impl Guide {
    /// Register the guide schema and load the first snapshot.
    pub async fn open(store: Arc<dyn GuideStore>) -> Result<Self, GuideError> {
        schema::register_schema(store.as_ref()).await?;

        let guide = Self {
            store,
            updater: None,
            cache: RwLock::new(Arc::new(ChannelCache::default())),
            sync_lock: tokio::sync::Mutex::new(()),
            update_lock: tokio::sync::Mutex::new(()),
            hooks: RwLock::new(Vec::new()),
        };
        guide.sync().await?;
        Ok(guide)
    }

    /// Open the SQLite database and sources named in the config.
    pub async fn from_config(config: &Config) -> Result<Self, GuideError> {
        let store = SqliteGuideStore::new(&config.database.path)?;
        let updater = SourceUpdater::from_config(&config.update, &config.sources.json);
        info!(
            database = %config.database.path.display(),
            backends = ?updater.backends(),
            "Opening guide"
        );
        Ok(Self::open(Arc::new(store)).await?.with_updater(Arc::new(updater)))
    }

    pub fn with_updater(mut self, updater: Arc<dyn GuideUpdater>) -> Self {
        self.updater = Some(updater);
        self
    }

    pub fn store(&self) -> &Arc<dyn GuideStore> {
        &self.store
    }

    /// Current cache snapshot.
    pub fn snapshot(&self) -> Arc<ChannelCache> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&cache)
    }

    /// Rebuild the channel cache from the store and swap it in.
    pub async fn sync(&self) -> Result<(), GuideError> {
        let _guard = self.sync_lock.lock().await;

        let cache = ChannelCache::load(self.store.as_ref()).await?;
        debug!(
            channels = cache.len(),
            max_program_length = cache.max_program_length(),
            num_programs = cache.num_programs(),
            collisions = cache.collisions().len(),
            "Synced channel cache"
        );
        metrics::CACHE_SYNCS.inc();
        metrics::CHANNELS_CACHED.set(cache.len() as i64);

        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(cache);
        Ok(())
    }

    /// Add a hook run on every program row retrieved by a search.
    pub fn register_hook(&self, hook: Arc<dyn ProgramRetrieved>) {
        self.hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(hook);
    }

    fn hooks(&self) -> Vec<Arc<dyn ProgramRetrieved>> {
        self.hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Search for programs.
    pub async fn search(&self, request: SearchRequest) -> Result<Vec<Program>, GuideError> {
        self.search_as(request).await
    }

    /// Search for programs, building each result with `T::from_row`.
    ///
    /// Rows whose channel is not in the current snapshot are left out.
    pub async fn search_as<T: FromProgramRow>(
        &self,
        request: SearchRequest,
    ) -> Result<Vec<T>, GuideError> {
        let timer = Instant::now();
        let cache = self.snapshot();
        let rows = self.run_query(&request, &cache).await?;
        let extras = mapper::collect_extras(&rows, &self.hooks());
        let results = mapper::rows_to_programs(&cache, rows, extras);

        self.record_search("typed", timer, results.len());
        Ok(results)
    }

    /// Search for programs, returning store rows without joining channels.
    pub async fn search_raw(&self, request: SearchRequest) -> Result<Vec<RawProgram>, GuideError> {
        let timer = Instant::now();
        let cache = self.snapshot();
        let rows = self.run_query(&request, &cache).await?;
        let extras = mapper::collect_extras(&rows, &self.hooks());
        let results = mapper::rows_to_raw(rows, extras, request.attrs.as_deref());

        self.record_search("raw", timer, results.len());
        Ok(results)
    }

    async fn run_query(
        &self,
        request: &SearchRequest,
        cache: &ChannelCache,
    ) -> Result<Vec<crate::store::Row>, GuideError> {
        let query = query::translate(request, cache.max_program_length())?;
        debug!(?query, "Searching programs");
        Ok(self.store.query(&query).await?)
    }

    fn record_search(&self, output: &str, timer: Instant, results: usize) {
        metrics::SEARCHES_TOTAL.with_label_values(&[output]).inc();
        metrics::SEARCH_DURATION
            .with_label_values(&[output])
            .observe(timer.elapsed().as_secs_f64());
        metrics::SEARCH_RESULTS
            .with_label_values(&[])
            .observe(results as f64);
    }

    /// Build a channel that is not backed by the store.
    pub fn new_channel(
        &self,
        tuner_ids: Vec<String>,
        name: Option<&str>,
        long_name: Option<&str>,
    ) -> Result<Channel, ChannelError> {
        Channel::detached(tuner_ids, name, long_name).inspect_err(|e| {
            error!(error = %e, "Cannot create channel");
        })
    }

    pub fn get_channel(&self, name: &str) -> Option<Arc<Channel>> {
        self.snapshot().get_by_name(name)
    }

    pub fn get_channel_by_tuner_id(&self, tuner_id: &str) -> Option<Arc<Channel>> {
        self.snapshot().get_by_tuner_id(tuner_id)
    }

    pub fn get_channel_by_db_id(&self, id: i64) -> Option<Arc<Channel>> {
        self.snapshot().get_by_db_id(id)
    }

    /// All channels, one per name. Sorted by [`compare_channels`] then name if requested.
    pub fn get_channels(&self, sorted: bool) -> Vec<Arc<Channel>> {
        self.snapshot().channels(sorted)
    }

    /// Run the updater, then re-sync. A failed update leaves the cache as it was.
    ///
    /// Concurrent calls run one at a time.
    pub async fn update(&self, backend: Option<&str>) -> Result<UpdateSummary, GuideError> {
        let updater = self.updater.as_ref().ok_or(GuideError::NoUpdater)?;
        let _guard = self.update_lock.lock().await;

        let summary = match updater.update(self.store.as_ref(), backend).await {
            Ok(summary) => summary,
            Err(e) => {
                error!(backend = ?backend, error = %e, "Guide update failed");
                metrics::UPDATES_TOTAL.with_label_values(&["failed"]).inc();
                return Err(e.into());
            }
        };
        metrics::UPDATES_TOTAL.with_label_values(&["success"]).inc();

        self.sync().await?;
        info!(
            backend = ?backend,
            programs_added = summary.programs_added,
            num_programs = summary.num_programs,
            "Guide updated"
        );
        Ok(summary)
    }

    /// Terms of the `keywords` index.
    pub async fn get_keywords(
        &self,
        associated: Option<&[String]>,
        prefix: Option<&str>,
    ) -> Result<Vec<String>, GuideError> {
        Ok(self
            .store
            .index_terms(schema::KEYWORDS_INDEX, associated, prefix)
            .await?)
    }

    /// Terms of the `genres` index.
    pub async fn get_genres(
        &self,
        associated: Option<&[String]>,
        prefix: Option<&str>,
    ) -> Result<Vec<String>, GuideError> {
        Ok(self
            .store
            .index_terms(schema::GENRES_INDEX, associated, prefix)
            .await?)
    }

    /// Program count as of the last sync.
    pub fn num_programs(&self) -> u64 {
        self.snapshot().num_programs()
    }

    /// Longest program duration in seconds as of the last sync.
    pub fn max_program_length(&self) -> i64 {
        self.snapshot().max_program_length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Row;
    use crate::testing::{fixtures, MockSource, MockUpdater};

    async fn create_test_guide() -> Guide {
        let store = Arc::new(SqliteGuideStore::in_memory().unwrap());
        Guide::open(store).await.unwrap()
    }

    #[tokio::test]
    async fn test_open_empty_guide() {
        let guide = create_test_guide().await;
        assert_eq!(guide.num_programs(), 0);
        assert_eq!(guide.max_program_length(), 0);
        assert!(guide.get_channels(false).is_empty());
    }

    #[tokio::test]
    async fn test_update_without_updater() {
        let guide = create_test_guide().await;
        assert!(matches!(guide.update(None).await, Err(GuideError::NoUpdater)));
    }

    #[tokio::test]
    async fn test_failed_update_leaves_cache_untouched() {
        let updater = Arc::new(MockUpdater::new());
        updater.set_next_error("backend down").await;
        let guide = create_test_guide().await.with_updater(updater.clone());
        let before = guide.snapshot();

        let result = guide.update(Some("xmltv")).await;
        assert!(matches!(result, Err(GuideError::Update(_))));
        assert!(Arc::ptr_eq(&before, &guide.snapshot()));
        assert_eq!(updater.recorded_backends().await, vec![Some("xmltv".to_string())]);
    }

    #[tokio::test]
    async fn test_update_resyncs_cache() {
        let source = MockSource::new();
        source
            .add_channel(fixtures::channel_dump("KQED", &["9"], vec![fixtures::program("Nova", 0, 3600)]))
            .await;
        let updater = SourceUpdater::new().with_source("mock", Arc::new(source));
        let guide = create_test_guide().await.with_updater(Arc::new(updater));

        let summary = guide.update(None).await.unwrap();
        assert_eq!(summary.programs_added, 1);
        assert_eq!(guide.num_programs(), 1);
        assert_eq!(guide.max_program_length(), 3600);
        assert_eq!(guide.get_channel_by_tuner_id("9").unwrap().name, "KQED");
    }

    #[tokio::test]
    async fn test_concurrent_updates_keep_longest_program() {
        let alpha = MockSource::new();
        alpha
            .add_channel(fixtures::channel_dump(
                "A",
                &["1"],
                vec![fixtures::program("Marathon", 0, 18000)],
            ))
            .await;
        let beta = MockSource::new();
        beta.add_channel(fixtures::channel_dump("B", &["2"], vec![fixtures::program("Short", 0, 60)]))
            .await;
        let updater = SourceUpdater::new()
            .with_source("alpha", Arc::new(alpha))
            .with_source("beta", Arc::new(beta));
        let guide = create_test_guide().await.with_updater(Arc::new(updater));

        let (a, b) = tokio::join!(guide.update(Some("alpha")), guide.update(Some("beta")));
        a.unwrap();
        b.unwrap();

        assert_eq!(guide.max_program_length(), 18000);
        assert_eq!(guide.num_programs(), 2);
        let programs = guide.search(SearchRequest::new().at(9000)).await.unwrap();
        assert_eq!(programs.len(), 1);
        assert_eq!(programs[0].title, "Marathon");
    }

    #[tokio::test]
    async fn test_new_channel_validation() {
        let guide = create_test_guide().await;
        assert_eq!(
            guide.new_channel(vec![], None, None),
            Err(ChannelError::MissingFields)
        );
        let chan = guide.new_channel(vec!["3".to_string()], None, None).unwrap();
        assert_eq!(chan.name, "3");
        assert!(chan.is_detached());
    }

    #[tokio::test]
    async fn test_hooks_annotate_results() {
        let source = MockSource::new();
        source
            .add_channel(fixtures::channel_dump("KQED", &["9"], vec![fixtures::program("Nova", 0, 3600)]))
            .await;
        let guide = create_test_guide()
            .await
            .with_updater(Arc::new(SourceUpdater::new().with_source("mock", Arc::new(source))));
        guide.update(None).await.unwrap();

        guide.register_hook(Arc::new(|row: &Row, extras: &mut ProgramExtras| {
            extras.insert("recorded".to_string(), serde_json::json!(row.get_str("title") == Some("Nova")));
        }));

        let programs = guide.search(SearchRequest::new().at(100)).await.unwrap();
        assert_eq!(programs.len(), 1);
        assert_eq!(programs[0].extras["recorded"], true);

        let raw = guide.search_raw(SearchRequest::new().at(100)).await.unwrap();
        assert_eq!(raw[0].extras["recorded"], true);
    }
}
