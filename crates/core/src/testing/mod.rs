//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the update traits plus
//! fixtures for building guides in tests without real guide feeds.
//!
//! # Example
//!
//! ```rust,ignore
//! use tvguide_core::testing::{fixtures, MockSource};
//!
//! let source = MockSource::new();
//! source.add_channel(fixtures::channel_dump("KQED", &["9"], vec![
//!     fixtures::program("Nova", 1000, 4600),
//! ])).await;
//!
//! let guide = fixtures::guide_with_source(source).await;
//! guide.update(None).await?;
//! ```

mod mock_source;
mod mock_updater;

pub use mock_source::MockSource;
pub use mock_updater::MockUpdater;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::sync::Arc;

    use super::MockSource;
    use crate::guide::{Guide, GuideError};
    use crate::sources::{ChannelDump, ProgramData, SourceUpdater};
    use crate::store::SqliteGuideStore;

    /// Create a program with only a title and times set.
    pub fn program(title: &str, start: i64, stop: i64) -> ProgramData {
        ProgramData::new(title, start, stop)
    }

    /// Create a program with genres and a description.
    pub fn program_with_genres(title: &str, start: i64, stop: i64, genres: &[&str]) -> ProgramData {
        let mut data = program(title, start, stop);
        data.desc = format!("{} description.", title);
        data.genres = genres.iter().map(|g| g.to_string()).collect();
        data
    }

    /// Create a channel dump; the long name is derived from the name.
    pub fn channel_dump(name: &str, tuner_ids: &[&str], programs: Vec<ProgramData>) -> ChannelDump {
        ChannelDump {
            tuner_ids: tuner_ids.iter().map(|t| t.to_string()).collect(),
            name: name.to_string(),
            long_name: format!("{} Television", name),
            programs,
        }
    }

    /// Open a guide over an in-memory store, updated by `source` under the backend name "mock".
    pub async fn guide_with_source(source: MockSource) -> Result<Guide, GuideError> {
        let store = Arc::new(SqliteGuideStore::in_memory()?);
        let updater = SourceUpdater::new().with_source("mock", Arc::new(source));
        Ok(Guide::open(store).await?.with_updater(Arc::new(updater)))
    }
}
