use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::meilisearch::Meilisearch;

use algodata::app::{build_router, AppState};
use algodata::models::record::ResourceKind;
use algodata::search::client::{IndexSettings, MeilisearchIndex, SearchIndex};
use algodata::search::codec::Clock;
use algodata::search::memory::MemoryIndex;

pub const DOCS_URL: &str = "/swaggerui/index.html?url=%2Fswagger.json";

/// Clock pinned to a single instant so stored dates are predictable.
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Provides the Axum router plus direct access to the indexes behind it.
///
/// When backed by Meilisearch the container lives as long as this struct.
pub struct TestEnv {
    _meili: Option<ContainerAsync<Meilisearch>>,
    pub router: Router,
    pub algorithms: Arc<dyn SearchIndex>,
    pub datasets: Arc<dyn SearchIndex>,
}

impl TestEnv {
    /// Router over fresh in-memory indexes.
    pub fn memory() -> Self {
        Self::memory_with_page_size(20)
    }

    pub fn memory_with_page_size(page_size: usize) -> Self {
        let algorithms: Arc<dyn SearchIndex> =
            Arc::new(MemoryIndex::with_page_size("algorithms", page_size));
        let datasets: Arc<dyn SearchIndex> =
            Arc::new(MemoryIndex::with_page_size("datasets", page_size));
        Self::assemble(None, algorithms, datasets)
    }

    /// Spin up a Meilisearch container and build a router wired to it.
    pub async fn meilisearch() -> Self {
        let container = Meilisearch::default()
            .start()
            .await
            .expect("Failed to start Meilisearch container");
        let port = container
            .get_host_port_ipv4(7700)
            .await
            .expect("Failed to get Meilisearch port");
        let url = format!("http://127.0.0.1:{port}");

        let mut indexes: Vec<Arc<dyn SearchIndex>> = Vec::new();
        for kind in ResourceKind::ALL {
            let index = MeilisearchIndex::new(&url, None::<String>, kind.path(), 20)
                .expect("Failed to create MeilisearchIndex");
            index
                .configure_index(&IndexSettings::for_kind(kind))
                .await
                .expect("Failed to configure Meilisearch index");
            indexes.push(Arc::new(index));
        }
        let datasets = indexes.pop().unwrap();
        let algorithms = indexes.pop().unwrap();

        Self::assemble(Some(container), algorithms, datasets)
    }

    fn assemble(
        meili: Option<ContainerAsync<Meilisearch>>,
        algorithms: Arc<dyn SearchIndex>,
        datasets: Arc<dyn SearchIndex>,
    ) -> Self {
        let clock = Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()));
        let state = AppState::new(algorithms.clone(), datasets.clone(), clock, DOCS_URL);

        Self {
            _meili: meili,
            router: build_router(state),
            algorithms,
            datasets,
        }
    }

    /// Build an `axum_test::TestServer` from this environment's router.
    pub fn server(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .expect_success_by_default()
            .try_build(self.router.clone())
            .expect("Failed to build TestServer")
    }

    /// Build a `TestServer` that does NOT expect success by default (for error tests).
    pub fn server_permissive(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .try_build(self.router.clone())
            .expect("Failed to build TestServer")
    }

    pub fn index(&self, kind: ResourceKind) -> &Arc<dyn SearchIndex> {
        match kind {
            ResourceKind::Algorithms => &self.algorithms,
            ResourceKind::Datasets => &self.datasets,
        }
    }

    /// Helper: store a record via the API.
    pub async fn create(
        &self,
        server: &axum_test::TestServer,
        kind: ResourceKind,
        body: &Value,
    ) -> axum_test::TestResponse {
        server.post(&format!("/{}/", kind.path())).json(body).await
    }

    /// Helper: store `count` records with ids `item-000`, `item-001`, ...
    pub async fn seed(&self, server: &axum_test::TestServer, kind: ResourceKind, count: usize) {
        for i in 0..count {
            let body = record_json(
                kind,
                &format!("item-{i:03}"),
                &format!("<p>Summary number {i}</p>"),
            );
            self.create(server, kind, &body).await;
        }
    }
}

/// A valid request body for `kind`.
pub fn record_json(kind: ResourceKind, id: &str, summary: &str) -> Value {
    json!({
        kind.id_field(): id,
        kind.summary_field(): summary,
        "displayName": format!("Display {id}"),
        "linkURL": format!("https://example.org/{id}"),
    })
}

/// Ids of a list response, in response order.
pub fn ids(kind: ResourceKind, records: &[Value]) -> Vec<String> {
    records
        .iter()
        .map(|r| r[kind.id_field()].as_str().unwrap().to_string())
        .collect()
}
