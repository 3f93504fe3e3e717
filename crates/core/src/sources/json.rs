//! Import from a local JSON guide dump.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{GuideSource, GuideWriter, ProgramData, UpdateError};

/// Top-level layout of a guide dump file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuideDump {
    #[serde(default)]
    pub channels: Vec<ChannelDump>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelDump {
    #[serde(default)]
    pub tuner_ids: Vec<String>,
    pub name: String,
    #[serde(default)]
    pub long_name: String,
    #[serde(default)]
    pub programs: Vec<ProgramData>,
}

impl GuideDump {
    /// Write every channel and its programs.
    pub async fn write_to(&self, writer: &mut GuideWriter<'_>) -> Result<(), UpdateError> {
        for channel in &self.channels {
            let id = writer
                .add_channel(&channel.tuner_ids, &channel.name, &channel.long_name)
                .await?;
            for program in &channel.programs {
                writer.add_program(id, program).await?;
            }
        }
        Ok(())
    }
}

/// Source reading a [`GuideDump`] from disk on every fetch.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<GuideDump, UpdateError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        serde_json::from_str(&content)
            .map_err(|e| UpdateError::Parse(format!("{}: {}", self.path.display(), e)))
    }
}

#[async_trait]
impl GuideSource for JsonFileSource {
    async fn fetch(&self, writer: &mut GuideWriter<'_>) -> Result<(), UpdateError> {
        let dump = self.load().await?;
        debug!(path = %self.path.display(), channels = dump.channels.len(), "Loaded guide dump");
        dump.write_to(writer).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guide::schema::register_schema;
    use crate::sources::{GuideUpdater, SourceUpdater};
    use crate::store::{GuideStore, Query, SqliteGuideStore};
    use std::sync::Arc;
    use tempfile::TempDir;

    const DUMP: &str = r#"{
        "channels": [
            {
                "tuner_ids": ["5"],
                "name": "KQED",
                "long_name": "KQED Public Television",
                "programs": [
                    {"title": "Nova", "desc": "Science", "start": 1000, "stop": 4600, "genres": ["Science"]},
                    {"title": "Frontline", "start": 4600, "stop": 8200}
                ]
            },
            {"tuner_ids": ["7"], "name": "ABC"}
        ]
    }"#;

    #[tokio::test]
    async fn test_load_dump() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("guide.json");
        std::fs::write(&path, DUMP).unwrap();

        let dump = JsonFileSource::new(&path).load().await.unwrap();
        assert_eq!(dump.channels.len(), 2);
        assert_eq!(dump.channels[0].programs[0].genres, vec!["Science"]);
        assert!(dump.channels[1].programs.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_through_updater() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("guide.json");
        std::fs::write(&path, DUMP).unwrap();

        let store = SqliteGuideStore::in_memory().unwrap();
        register_schema(&store).await.unwrap();
        let updater = SourceUpdater::new().with_source("local", Arc::new(JsonFileSource::new(&path)));

        let summary = updater.update(&store, None).await.unwrap();
        assert_eq!(summary.channels_added, 2);
        assert_eq!(summary.programs_added, 2);
        assert_eq!(summary.max_program_length, 3600);
        assert_eq!(store.count(&Query::new("program")).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let store = SqliteGuideStore::in_memory().unwrap();
        register_schema(&store).await.unwrap();
        let updater =
            SourceUpdater::new().with_source("local", Arc::new(JsonFileSource::new("/nonexistent/guide.json")));

        let result = updater.update(&store, None).await;
        assert!(matches!(result, Err(UpdateError::Io(_))));
    }

    #[tokio::test]
    async fn test_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("guide.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = JsonFileSource::new(&path).load().await;
        assert!(matches!(result, Err(UpdateError::Parse(_))));
    }
}
