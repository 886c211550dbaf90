use std::sync::Arc;

use axum::http::{header, HeaderName, HeaderValue};
use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::api::docs::docs_redirect_handler;
use crate::api::errors::not_found_handler;
use crate::api::resources::{
    clear_handler, create_handler, delete_handler, get_handler, list_handler, ResourceState,
};
use crate::config::{AppConfig, BackendKind};
use crate::error::AppError;
use crate::models::record::ResourceKind;
use crate::search::client::{IndexSettings, MeilisearchIndex, SearchIndex};
use crate::search::codec::{Clock, SystemClock};
use crate::search::memory::MemoryIndex;

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_METHODS: &str = "POST, GET, DELETE, PUT, OPTIONS";
pub const ALLOW_HEADERS: &str =
    "Content-Type, api_key, Authorization, x-requested-with, Total-Count, Total-Pages, Error-Message";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Shared application state, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub algorithms: ResourceState,
    pub datasets: ResourceState,
    pub docs_redirect_url: String,
}

impl AppState {
    /// Wire both resources to the given indexes.
    pub fn new(
        algorithms: Arc<dyn SearchIndex>,
        datasets: Arc<dyn SearchIndex>,
        clock: Arc<dyn Clock>,
        docs_redirect_url: impl Into<String>,
    ) -> Self {
        Self {
            algorithms: ResourceState::new(ResourceKind::Algorithms, algorithms, clock.clone()),
            datasets: ResourceState::new(ResourceKind::Datasets, datasets, clock),
            docs_redirect_url: docs_redirect_url.into(),
        }
    }

    /// Build the state described by `config`, connecting to the search
    /// backend and preparing its indexes.
    pub async fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let mut indexes: Vec<Arc<dyn SearchIndex>> = Vec::with_capacity(2);

        for kind in ResourceKind::ALL {
            let index: Arc<dyn SearchIndex> = match config.backend {
                BackendKind::Memory => Arc::new(MemoryIndex::with_page_size(
                    kind.path(),
                    config.query_page_size,
                )),
                BackendKind::Meilisearch => {
                    let index = MeilisearchIndex::new(
                        config.meilisearch.url.as_str(),
                        config.meilisearch.api_key.as_deref(),
                        config.index_uid(kind),
                        config.query_page_size,
                    )?;
                    index.configure_index(&IndexSettings::for_kind(kind)).await?;
                    Arc::new(index)
                }
            };
            tracing::info!(kind = %kind, index = index.name(), backend = ?config.backend, "Index ready");
            indexes.push(index);
        }

        let datasets = indexes.pop().ok_or_else(|| AppError::Internal("missing datasets index".into()))?;
        let algorithms = indexes.pop().ok_or_else(|| AppError::Internal("missing algorithms index".into()))?;

        Ok(Self::new(
            algorithms,
            datasets,
            Arc::new(SystemClock),
            config.docs.redirect_url.clone(),
        ))
    }
}

/// Routes for one resource, e.g. `/algorithms/` and `/algorithms/{id}`.
///
/// The id segment captures the rest of the path, so ids may contain `/`.
fn resource_router(state: ResourceState) -> Router {
    let base = format!("/{}/", state.kind.path());
    let item = format!("/{}/{{*id}}", state.kind.path());

    Router::new()
        .route(&base, get(list_handler).post(create_handler).delete(clear_handler))
        .route(&item, get(get_handler).delete(delete_handler))
        .with_state(state)
}

fn fixed_header(name: HeaderName, value: &'static str) -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(name, HeaderValue::from_static(value))
}

/// Build the complete Axum router.
///
/// Every response, including fallbacks and redirects, carries the CORS and
/// JSON content-type headers.
pub fn build_router(state: AppState) -> Router {
    let docs = Router::new()
        .route("/", get(docs_redirect_handler))
        .route("/doc", get(docs_redirect_handler))
        .with_state(state.clone());

    Router::new()
        .merge(resource_router(state.algorithms))
        .merge(resource_router(state.datasets))
        .merge(docs)
        .fallback(not_found_handler)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(fixed_header(header::ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW_ORIGIN))
                .layer(fixed_header(header::ACCESS_CONTROL_ALLOW_METHODS, ALLOW_METHODS))
                .layer(fixed_header(header::ACCESS_CONTROL_ALLOW_HEADERS, ALLOW_HEADERS))
                .layer(fixed_header(header::CONTENT_TYPE, JSON_CONTENT_TYPE)),
        )
}
