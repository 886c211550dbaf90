use std::path::Path;

use serde::Deserialize;

use crate::error::AppError;

/// Which search service backs the indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process index; contents are lost on restart.
    Memory,
    Meilisearch,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeilisearchConfig {
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Prepended to `algorithms` / `datasets` to form index uids.
    #[serde(default)]
    pub index_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocsConfig {
    /// Target of the `/` and `/doc` redirects.
    pub redirect_url: String,
}

/// Application configuration.
///
/// Sources, later ones winning: built-in defaults, an optional config file,
/// then `ALGODATA_*` environment variables (`__` separates nested keys, e.g.
/// `ALGODATA_MEILISEARCH__URL`).
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub bind_addr: String,
    pub backend: BackendKind,
    /// Hits per page when paging through query results.
    pub query_page_size: usize,
    pub meilisearch: MeilisearchConfig,
    pub docs: DocsConfig,
}

pub const ENV_PREFIX: &str = "ALGODATA";

fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, AppError> {
    Ok(config::Config::builder()
        .set_default("bind_addr", "0.0.0.0:8080")?
        .set_default("backend", "memory")?
        .set_default("query_page_size", 20)?
        .set_default("meilisearch.url", "http://localhost:7700")?
        .set_default("meilisearch.index_prefix", "")?
        .set_default("docs.redirect_url", "/swaggerui/index.html?url=%2Fswagger.json")?)
}

impl AppConfig {
    /// Load configuration from defaults, `path` (if given) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut builder = defaults()?;
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Self::from_builder(builder)
    }

    /// Load from defaults plus an inline source. Used by tests and tooling.
    pub fn from_source<S>(source: S) -> Result<Self, AppError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        Self::from_builder(defaults()?.add_source(source))
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, AppError> {
        let config: AppConfig = builder.build()?.try_deserialize()?;
        if config.query_page_size == 0 {
            return Err(AppError::Config("query_page_size must be positive".into()));
        }
        Ok(config)
    }

    /// Index uid for a resource, honouring the configured prefix.
    pub fn index_uid(&self, kind: crate::models::record::ResourceKind) -> String {
        format!("{}{}", self.meilisearch.index_prefix, kind.path())
    }
}
