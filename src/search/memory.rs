use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Bound;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::models::document::{FieldValue, IndexedDocument};
use crate::models::search::{Cursor, SearchPage, SearchRequest, SortDirection, SortOptions};
use crate::rendering::text::html_to_text;
use crate::search::client::{check_batch, SearchIndex, RANGE_PAGE_LIMIT};

/// Default number of hits per query page.
pub const DEFAULT_QUERY_PAGE_SIZE: usize = 20;

/// In-process search index.
///
/// Keeps documents ordered by key and honours the same limits as the hosted
/// service, so pagination code paths behave identically against it.
pub struct MemoryIndex {
    name: String,
    page_size: usize,
    documents: RwLock<BTreeMap<String, IndexedDocument>>,
}

impl MemoryIndex {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_page_size(name, DEFAULT_QUERY_PAGE_SIZE)
    }

    pub fn with_page_size(name: impl Into<String>, page_size: usize) -> Self {
        Self {
            name: name.into(),
            page_size: page_size.max(1),
            documents: RwLock::new(BTreeMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

/// Every query term must appear as a token of some text or HTML field.
///
/// A query made only of separators has no terms and matches every document,
/// the same placeholder behaviour Meilisearch has.
fn matches(doc: &IndexedDocument, terms: &[String]) -> bool {
    let tokens: Vec<String> = doc
        .fields
        .iter()
        .flat_map(|field| match &field.value {
            FieldValue::Text(s) => tokenize(s).collect::<Vec<_>>(),
            FieldValue::Html(s) => tokenize(&html_to_text(s)).collect(),
            FieldValue::Date(_) => Vec::new(),
        })
        .collect();

    terms.iter().all(|term| tokens.contains(term))
}

fn compare(a: &IndexedDocument, b: &IndexedDocument, sort: &SortOptions) -> Ordering {
    for expression in &sort.expressions {
        let key = |doc: &IndexedDocument| doc.field(&expression.field).map(FieldValue::sort_key);
        let ordering = match expression.direction {
            SortDirection::Ascending => key(a).cmp(&key(b)),
            SortDirection::Descending => key(b).cmp(&key(a)),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a.doc_id.cmp(&b.doc_id)
}

#[async_trait]
impl SearchIndex for MemoryIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put(&self, doc: &IndexedDocument) -> Result<(), AppError> {
        self.documents
            .write()
            .await
            .insert(doc.doc_id.clone(), doc.clone());
        Ok(())
    }

    async fn get(&self, doc_id: &str) -> Result<Option<IndexedDocument>, AppError> {
        Ok(self.documents.read().await.get(doc_id).cloned())
    }

    async fn get_range(
        &self,
        start_after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<IndexedDocument>, AppError> {
        let lower = match start_after {
            Some(key) => Bound::Excluded(key),
            None => Bound::Unbounded,
        };
        let documents = self.documents.read().await;
        Ok(documents
            .range::<str, _>((lower, Bound::Unbounded))
            .take(limit.min(RANGE_PAGE_LIMIT))
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    async fn list_ids(&self, limit: usize) -> Result<Vec<String>, AppError> {
        Ok(self
            .documents
            .read()
            .await
            .keys()
            .take(limit.min(RANGE_PAGE_LIMIT))
            .cloned()
            .collect())
    }

    async fn delete(&self, doc_ids: &[String]) -> Result<(), AppError> {
        check_batch(doc_ids)?;
        let mut documents = self.documents.write().await;
        for id in doc_ids {
            documents.remove(id);
        }
        Ok(())
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchPage, AppError> {
        let offset = match &request.cursor {
            Some(cursor) => cursor.offset()?,
            None => 0,
        };
        let terms: Vec<String> = tokenize(&request.query).collect();

        let documents = self.documents.read().await;
        let mut hits: Vec<&IndexedDocument> = documents
            .values()
            .filter(|doc| matches(doc, &terms))
            .collect();
        if let Some(sort) = &request.sort {
            hits.sort_by(|a, b| compare(a, b, sort));
        }

        let total = hits.len();
        let page: Vec<IndexedDocument> = hits
            .into_iter()
            .skip(offset)
            .take(self.page_size)
            .cloned()
            .collect();

        let next = offset + page.len();
        let cursor = (next < total).then(|| Cursor::from_offset(next));

        Ok(SearchPage {
            documents: page,
            cursor,
        })
    }
}
