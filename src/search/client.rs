use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use meilisearch_sdk::documents::DocumentsQuery;
use meilisearch_sdk::errors::{Error as MeiliError, ErrorCode};
use meilisearch_sdk::settings::PaginationSetting;
use meilisearch_sdk::task_info::TaskInfo;
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::models::document::{Field, FieldValue, IndexedDocument};
use crate::models::record::ResourceKind;
use crate::models::search::{Cursor, SearchPage, SearchRequest, SortDirection};
use crate::rendering::text::html_to_text;
use crate::search::codec::DATE_FIELD;

/// Maximum number of documents a single range read or id listing returns.
pub const RANGE_PAGE_LIMIT: usize = 100;

/// Maximum number of ids accepted by one batch delete.
pub const DELETE_BATCH_LIMIT: usize = 200;

// A full listing page must always fit in one batch delete.
const _: () = assert!(RANGE_PAGE_LIMIT <= DELETE_BATCH_LIMIT);

/// Trait for search index operations, enabling in-memory testing.
///
/// Mirrors the operations of a hosted full-text index: keyed writes and
/// reads, ordered range reads capped at [`RANGE_PAGE_LIMIT`] rows, and
/// cursor-paged relevance queries.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    fn name(&self) -> &str;

    /// Add a document, replacing any document with the same key.
    async fn put(&self, doc: &IndexedDocument) -> Result<(), AppError>;

    /// Point lookup. `Ok(None)` when no document has this key.
    async fn get(&self, doc_id: &str) -> Result<Option<IndexedDocument>, AppError>;

    /// Documents in ascending key order with keys strictly greater than
    /// `start_after` (or from the beginning). `limit` is clamped to
    /// [`RANGE_PAGE_LIMIT`].
    async fn get_range(
        &self,
        start_after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<IndexedDocument>, AppError>;

    /// Keys of the first `limit` documents (clamped to [`RANGE_PAGE_LIMIT`]).
    async fn list_ids(&self, limit: usize) -> Result<Vec<String>, AppError>;

    /// Delete a batch of documents. Missing keys are ignored. Batches larger
    /// than [`DELETE_BATCH_LIMIT`] are rejected.
    async fn delete(&self, doc_ids: &[String]) -> Result<(), AppError>;

    /// Fetch one page of a free-text query.
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage, AppError>;
}

pub(crate) fn check_batch(doc_ids: &[String]) -> Result<(), AppError> {
    if doc_ids.len() > DELETE_BATCH_LIMIT {
        return Err(AppError::Search(format!(
            "Delete batch of {} ids exceeds the limit of {DELETE_BATCH_LIMIT}",
            doc_ids.len()
        )));
    }
    Ok(())
}

/// Searchable and sortable attributes for an index.
#[derive(Debug, Clone)]
pub struct IndexSettings {
    pub searchable: Vec<String>,
    pub sortable: Vec<String>,
}

impl IndexSettings {
    pub fn for_kind(kind: ResourceKind) -> Self {
        let [id, summary, name, link] = kind.field_names();
        Self {
            searchable: vec![
                id.to_string(),
                html_text_attribute(summary),
                name.to_string(),
                link.to_string(),
            ],
            sortable: vec![
                id.to_string(),
                name.to_string(),
                link.to_string(),
                DATE_FIELD.to_string(),
            ],
        }
    }
}

/// Meilisearch primary key attribute: hex of the UTF-8 document key.
const PK: &str = "pk";
const DOC_ID: &str = "doc_id";
const FIELD_TYPES: &str = "field_types";
const HTML_TEXT_SUFFIX: &str = "__text";
const MAX_TOTAL_HITS: usize = 1_000_000;

fn html_text_attribute(name: &str) -> String {
    format!("{name}{HTML_TEXT_SUFFIX}")
}

/// Meilisearch only accepts `[A-Za-z0-9_-]` in document ids. Lowercase hex
/// keeps any key representable and preserves byte-wise ordering, which the
/// key-range reads depend on.
fn hex_key(doc_id: &str) -> String {
    doc_id.bytes().map(|b| format!("{b:02x}")).collect()
}

fn meili_err(context: &str) -> impl Fn(MeiliError) -> AppError + '_ {
    move |e| AppError::Search(format!("Meilisearch {context} error: {e}"))
}

/// Meilisearch implementation of the SearchIndex.
pub struct MeilisearchIndex {
    client: meilisearch_sdk::client::Client,
    uid: String,
    page_size: usize,
}

impl MeilisearchIndex {
    pub fn new(
        url: impl Into<String>,
        api_key: Option<impl Into<String>>,
        uid: impl Into<String>,
        page_size: usize,
    ) -> Result<Self, AppError> {
        let client = meilisearch_sdk::client::Client::new(url, api_key)
            .map_err(|e| AppError::Search(format!("Failed to create Meilisearch client: {e}")))?;

        Ok(Self {
            client,
            uid: uid.into(),
            page_size: page_size.max(1),
        })
    }

    fn index(&self) -> meilisearch_sdk::indexes::Index {
        self.client.index(&self.uid)
    }

    async fn wait(&self, task: TaskInfo, context: &str) -> Result<(), AppError> {
        let task = task
            .wait_for_completion(&self.client, None, None)
            .await
            .map_err(meili_err(context))?;
        if task.is_failure() {
            return Err(AppError::Search(format!(
                "Meilisearch {context} task failed: {:?}",
                task.unwrap_failure()
            )));
        }
        Ok(())
    }

    /// Create the index if needed and apply attribute settings.
    /// Should be called once on startup.
    pub async fn configure_index(&self, settings: &IndexSettings) -> Result<(), AppError> {
        let created = self
            .client
            .create_index(&self.uid, Some(PK))
            .await
            .map_err(meili_err("create index"))?
            .wait_for_completion(&self.client, None, None)
            .await
            .map_err(meili_err("create index"))?;
        if created.is_failure() {
            tracing::debug!("Index '{}' already exists", self.uid);
        }

        let index = self.index();

        let mut filterable = vec![PK.to_string()];
        filterable.extend(settings.sortable.iter().cloned());
        let mut sortable = vec![PK.to_string()];
        sortable.extend(settings.sortable.iter().cloned());

        let task = index
            .set_filterable_attributes(&filterable)
            .await
            .map_err(meili_err("config"))?;
        self.wait(task, "config").await?;

        let task = index
            .set_sortable_attributes(&sortable)
            .await
            .map_err(meili_err("config"))?;
        self.wait(task, "config").await?;

        let task = index
            .set_searchable_attributes(&settings.searchable)
            .await
            .map_err(meili_err("config"))?;
        self.wait(task, "config").await?;

        let task = index
            .set_pagination(PaginationSetting {
                max_total_hits: MAX_TOTAL_HITS,
            })
            .await
            .map_err(meili_err("config"))?;
        self.wait(task, "config").await?;

        tracing::info!("Configured Meilisearch index '{}'", self.uid);
        Ok(())
    }
}

/// Flatten a document into the JSON stored by Meilisearch.
fn to_meili(doc: &IndexedDocument) -> Value {
    let mut object = Map::new();
    let mut types = Map::new();
    object.insert(PK.into(), Value::String(hex_key(&doc.doc_id)));
    object.insert(DOC_ID.into(), Value::String(doc.doc_id.clone()));

    for field in &doc.fields {
        types.insert(field.name.clone(), field.value.type_name().into());
        let value = match &field.value {
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Html(s) => {
                object.insert(html_text_attribute(&field.name), html_to_text(s).into());
                Value::String(s.clone())
            }
            FieldValue::Date(d) => Value::from(d.timestamp()),
        };
        object.insert(field.name.clone(), value);
    }

    object.insert(FIELD_TYPES.into(), Value::Object(types));
    Value::Object(object)
}

fn from_meili(value: Value) -> Result<IndexedDocument, AppError> {
    let malformed = |what: &str| AppError::Search(format!("Malformed Meilisearch document: {what}"));

    let object = value.as_object().ok_or_else(|| malformed("not an object"))?;
    let doc_id = object
        .get(DOC_ID)
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("missing doc_id"))?
        .to_string();
    let types = object
        .get(FIELD_TYPES)
        .and_then(Value::as_object)
        .ok_or_else(|| malformed("missing field_types"))?;

    let mut fields = Vec::with_capacity(types.len());
    for (name, kind) in types {
        let raw = object.get(name).ok_or_else(|| malformed(name))?;
        let field = match kind.as_str() {
            Some("text") => Field::text(name, raw.as_str().ok_or_else(|| malformed(name))?),
            Some("html") => Field::html(name, raw.as_str().ok_or_else(|| malformed(name))?),
            Some("date") => {
                let secs = raw.as_i64().ok_or_else(|| malformed(name))?;
                let date = Utc
                    .timestamp_opt(secs, 0)
                    .single()
                    .ok_or_else(|| malformed(name))?;
                Field::date(name, date)
            }
            _ => return Err(malformed(name)),
        };
        fields.push(field);
    }

    Ok(IndexedDocument { doc_id, fields })
}

#[async_trait]
impl SearchIndex for MeilisearchIndex {
    fn name(&self) -> &str {
        &self.uid
    }

    async fn put(&self, doc: &IndexedDocument) -> Result<(), AppError> {
        let task = self
            .index()
            .add_documents(&[to_meili(doc)], Some(PK))
            .await
            .map_err(meili_err("index"))?;
        self.wait(task, "index").await
    }

    async fn get(&self, doc_id: &str) -> Result<Option<IndexedDocument>, AppError> {
        match self.index().get_document::<Value>(&hex_key(doc_id)).await {
            Ok(value) => from_meili(value).map(Some),
            Err(MeiliError::Meilisearch(e)) if matches!(e.error_code, ErrorCode::DocumentNotFound) => {
                Ok(None)
            }
            Err(e) => Err(meili_err("get")(e)),
        }
    }

    async fn get_range(
        &self,
        start_after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<IndexedDocument>, AppError> {
        let index = self.index();
        let filter = start_after.map(|key| format!("{PK} > \"{}\"", hex_key(key)));
        let sort = [format!("{PK}:asc")];
        let sort: Vec<&str> = sort.iter().map(String::as_str).collect();

        let mut query = index.search();
        query
            .with_query("")
            .with_sort(&sort)
            .with_limit(limit.min(RANGE_PAGE_LIMIT));
        if let Some(filter) = &filter {
            query.with_filter(filter);
        }

        let results = query
            .execute::<Value>()
            .await
            .map_err(meili_err("range"))?;

        results
            .hits
            .into_iter()
            .map(|hit| from_meili(hit.result))
            .collect()
    }

    async fn list_ids(&self, limit: usize) -> Result<Vec<String>, AppError> {
        let index = self.index();
        let results = DocumentsQuery::new(&index)
            .with_limit(limit.min(RANGE_PAGE_LIMIT))
            .with_fields([DOC_ID])
            .execute::<Value>()
            .await
            .map_err(meili_err("list"))?;

        results
            .results
            .into_iter()
            .map(|value| {
                value
                    .get(DOC_ID)
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .ok_or_else(|| AppError::Search("Document without doc_id".into()))
            })
            .collect()
    }

    async fn delete(&self, doc_ids: &[String]) -> Result<(), AppError> {
        check_batch(doc_ids)?;
        if doc_ids.is_empty() {
            return Ok(());
        }

        let keys: Vec<String> = doc_ids.iter().map(|id| hex_key(id)).collect();
        let task = self
            .index()
            .delete_documents(&keys)
            .await
            .map_err(meili_err("delete"))?;
        self.wait(task, "delete").await
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchPage, AppError> {
        let offset = match &request.cursor {
            Some(cursor) => cursor.offset()?,
            None => 0,
        };

        let sort: Vec<String> = request
            .sort
            .iter()
            .flat_map(|options| options.expressions.iter())
            .map(|e| match e.direction {
                SortDirection::Ascending => format!("{}:asc", e.field),
                SortDirection::Descending => format!("{}:desc", e.field),
            })
            .collect();
        let sort: Vec<&str> = sort.iter().map(String::as_str).collect();

        let index = self.index();
        let mut query = index.search();
        query
            .with_query(&request.query)
            .with_offset(offset)
            .with_limit(self.page_size);
        if !sort.is_empty() {
            query.with_sort(&sort);
        }

        let results = query
            .execute::<Value>()
            .await
            .map_err(meili_err("search"))?;

        let documents = results
            .hits
            .into_iter()
            .map(|hit| from_meili(hit.result))
            .collect::<Result<Vec<_>, _>>()?;

        let cursor = (documents.len() == self.page_size)
            .then(|| Cursor::from_offset(offset + documents.len()));

        Ok(SearchPage { documents, cursor })
    }
}
