//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! over an on-disk guide database fed by a mock source, enabling E2E
//! testing without real guide feeds.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use tvguide_core::{
    config::{DatabaseConfig, JsonSourceConfig, ServerConfig},
    testing::MockSource,
    Config, Guide, SourceUpdater, SqliteGuideStore,
};
use tvguide_server::{api::create_router, state::AppState};

/// Re-export fixtures for test convenience
pub use tvguide_core::testing::fixtures;

/// Test fixture for E2E testing with a mock guide source.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_update() {
///     let fixture = TestFixture::new().await;
///     fixture.source.add_channel(fixtures::channel_dump("KQED", &["9"], vec![])).await;
///
///     let response = fixture.post("/api/v1/update", json!({})).await;
///     assert_eq!(response.status, StatusCode::OK);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock source registered under the backend name "mock"
    pub source: Arc<MockSource>,
    /// The guide behind the router
    pub guide: Arc<Guide>,
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture with an empty mock source.
    pub async fn new() -> Self {
        Self::build(true).await
    }

    /// Create a test fixture whose guide has no updater.
    pub async fn without_updater() -> Self {
        Self::build(false).await
    }

    /// Create a fixture and run one update with the News/Sports lineup.
    pub async fn with_lineup() -> Self {
        let fixture = Self::new().await;
        fixture
            .source
            .add_channel(fixtures::channel_dump(
                "KPIX",
                &["5"],
                vec![
                    fixtures::program_with_genres("Evening News", 1000, 2000, &["News"]),
                    fixtures::program_with_genres(
                        "Sports Tonight",
                        2000,
                        3000,
                        &["Sports", "Talk"],
                    ),
                ],
            ))
            .await;
        fixture
            .source
            .add_channel(fixtures::channel_dump(
                "KGO",
                &["7"],
                vec![fixtures::program_with_genres("Late Movie", 1500, 4500, &["Movie"])],
            ))
            .await;

        let response = fixture
            .post("/api/v1/update", serde_json::json!({}))
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);
        fixture
    }

    async fn build(with_updater: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("guide.db");

        let config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            sources: tvguide_core::config::SourcesConfig {
                json: vec![JsonSourceConfig {
                    name: "local".to_string(),
                    path: temp_dir.path().join("missing.json"),
                }],
            },
            ..Config::default()
        };

        let source = Arc::new(MockSource::new());
        let store = Arc::new(SqliteGuideStore::new(&db_path).expect("Failed to create store"));
        let mut guide = Guide::open(store).await.expect("Failed to open guide");
        if with_updater {
            let updater = SourceUpdater::new().with_source("mock", source.clone());
            guide = guide.with_updater(Arc::new(updater));
        }
        let guide = Arc::new(guide);

        let state = Arc::new(AppState::new(config, Arc::clone(&guide)));
        let router = create_router(state);

        Self {
            router,
            source,
            guide,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a GET request and return the status and raw body text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        (status, String::from_utf8_lossy(&body_bytes).into_owned())
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Collect the `title` field of every program in a search response, sorted.
pub fn program_titles(body: &Value) -> Vec<String> {
    let mut titles: Vec<String> = body["programs"]
        .as_array()
        .map(|programs| {
            programs
                .iter()
                .filter_map(|p| p["title"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    titles.sort();
    titles
}
