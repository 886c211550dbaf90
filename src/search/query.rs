use crate::error::AppError;
use crate::models::record::{Record, ResourceKind};
use crate::models::search::{SearchRequest, SortOptions};
use crate::search::client::{SearchIndex, RANGE_PAGE_LIMIT};
use crate::search::codec::decode;

/// Result of deleting a single document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Nothing was stored under the key.
    Absent,
    Deleted,
    /// The document survived its deletion; the index is inconsistent.
    StillPresent,
}

/// Return every record matching `query`, paging past the service limits.
///
/// Without a query string or sort options the whole index is walked in key
/// order, 100 rows at a time. Otherwise the query is paged by cursor until
/// the service stops returning one. Pages are appended as they arrive; a
/// cursor that revisits a document would yield it twice.
pub async fn query_records(
    index: &dyn SearchIndex,
    kind: ResourceKind,
    query: Option<&str>,
    sort: Option<&SortOptions>,
) -> Result<Vec<Record>, AppError> {
    let query = query.unwrap_or_default();
    if query.is_empty() && sort.is_none() {
        enumerate_all(index, kind).await
    } else {
        search_all(index, kind, query, sort).await
    }
}

async fn enumerate_all(index: &dyn SearchIndex, kind: ResourceKind) -> Result<Vec<Record>, AppError> {
    let mut records = Vec::new();
    let mut start_after: Option<String> = None;

    // A full page says nothing about whether more rows exist, so only an
    // empty page ends the walk.
    loop {
        let page = index
            .get_range(start_after.as_deref(), RANGE_PAGE_LIMIT)
            .await?;
        let Some(last) = page.last() else {
            break;
        };
        start_after = Some(last.doc_id.clone());

        for doc in &page {
            records.push(decode(kind, doc)?);
        }
    }

    tracing::debug!(index = index.name(), count = records.len(), "Enumerated index");
    Ok(records)
}

async fn search_all(
    index: &dyn SearchIndex,
    kind: ResourceKind,
    query: &str,
    sort: Option<&SortOptions>,
) -> Result<Vec<Record>, AppError> {
    let mut records = Vec::new();
    let mut request = SearchRequest {
        query: query.to_string(),
        sort: sort.cloned(),
        cursor: None,
    };
    let mut pages = 0usize;

    loop {
        let page = index.search(&request).await?;
        pages += 1;
        for doc in &page.documents {
            records.push(decode(kind, doc)?);
        }
        match page.cursor {
            Some(cursor) => request.cursor = Some(cursor),
            None => break,
        }
    }

    tracing::debug!(
        index = index.name(),
        query,
        pages,
        count = records.len(),
        "Collected query results"
    );
    Ok(records)
}

/// Point lookup of one record.
pub async fn get_record(
    index: &dyn SearchIndex,
    kind: ResourceKind,
    id: &str,
) -> Result<Option<Record>, AppError> {
    index
        .get(id)
        .await?
        .map(|doc| decode(kind, &doc))
        .transpose()
}

/// Delete one document and confirm it is gone.
pub async fn delete_record(index: &dyn SearchIndex, id: &str) -> Result<DeleteOutcome, AppError> {
    if index.get(id).await?.is_none() {
        return Ok(DeleteOutcome::Absent);
    }

    index.delete(&[id.to_string()]).await?;

    if index.get(id).await?.is_some() {
        tracing::error!(index = index.name(), id, "Document still present after delete");
        return Ok(DeleteOutcome::StillPresent);
    }
    Ok(DeleteOutcome::Deleted)
}

/// Remove every document, one listing page per batch delete.
pub async fn clear_index(index: &dyn SearchIndex) -> Result<usize, AppError> {
    let mut removed = 0;
    loop {
        let ids = index.list_ids(RANGE_PAGE_LIMIT).await?;
        if ids.is_empty() {
            break;
        }
        index.delete(&ids).await?;
        removed += ids.len();
    }

    tracing::info!(index = index.name(), removed, "Cleared index");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::IndexedDocument;
    use crate::models::search::{SearchPage, SortDirection};
    use crate::search::codec::{encode, SystemClock};
    use crate::search::memory::MemoryIndex;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // -- Test wrappers --

    /// Counts calls made against an inner index.
    struct CountingIndex {
        inner: MemoryIndex,
        range_calls: AtomicUsize,
        search_calls: AtomicUsize,
        delete_calls: AtomicUsize,
    }

    impl CountingIndex {
        fn new(inner: MemoryIndex) -> Self {
            Self {
                inner,
                range_calls: AtomicUsize::new(0),
                search_calls: AtomicUsize::new(0),
                delete_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SearchIndex for CountingIndex {
        fn name(&self) -> &str {
            self.inner.name()
        }

        async fn put(&self, doc: &IndexedDocument) -> Result<(), AppError> {
            self.inner.put(doc).await
        }

        async fn get(&self, doc_id: &str) -> Result<Option<IndexedDocument>, AppError> {
            self.inner.get(doc_id).await
        }

        async fn get_range(
            &self,
            start_after: Option<&str>,
            limit: usize,
        ) -> Result<Vec<IndexedDocument>, AppError> {
            self.range_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get_range(start_after, limit).await
        }

        async fn list_ids(&self, limit: usize) -> Result<Vec<String>, AppError> {
            self.inner.list_ids(limit).await
        }

        async fn delete(&self, doc_ids: &[String]) -> Result<(), AppError> {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.delete(doc_ids).await
        }

        async fn search(&self, request: &SearchRequest) -> Result<SearchPage, AppError> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.search(request).await
        }
    }

    /// Accepts deletes but never removes anything.
    struct StickyIndex(MemoryIndex);

    #[async_trait]
    impl SearchIndex for StickyIndex {
        fn name(&self) -> &str {
            self.0.name()
        }

        async fn put(&self, doc: &IndexedDocument) -> Result<(), AppError> {
            self.0.put(doc).await
        }

        async fn get(&self, doc_id: &str) -> Result<Option<IndexedDocument>, AppError> {
            self.0.get(doc_id).await
        }

        async fn get_range(
            &self,
            start_after: Option<&str>,
            limit: usize,
        ) -> Result<Vec<IndexedDocument>, AppError> {
            self.0.get_range(start_after, limit).await
        }

        async fn list_ids(&self, limit: usize) -> Result<Vec<String>, AppError> {
            self.0.list_ids(limit).await
        }

        async fn delete(&self, _doc_ids: &[String]) -> Result<(), AppError> {
            Ok(())
        }

        async fn search(&self, request: &SearchRequest) -> Result<SearchPage, AppError> {
            self.0.search(request).await
        }
    }

    /// Returns the same single-document page forever, then stops after a
    /// fixed number of pages. Models a cursor that revisits documents.
    struct RepeatingCursorIndex {
        doc: IndexedDocument,
        pages: usize,
        served: AtomicUsize,
    }

    #[async_trait]
    impl SearchIndex for RepeatingCursorIndex {
        fn name(&self) -> &str {
            "repeating"
        }

        async fn put(&self, _doc: &IndexedDocument) -> Result<(), AppError> {
            Ok(())
        }

        async fn get(&self, _doc_id: &str) -> Result<Option<IndexedDocument>, AppError> {
            Ok(None)
        }

        async fn get_range(
            &self,
            _start_after: Option<&str>,
            _limit: usize,
        ) -> Result<Vec<IndexedDocument>, AppError> {
            Ok(vec![])
        }

        async fn list_ids(&self, _limit: usize) -> Result<Vec<String>, AppError> {
            Ok(vec![])
        }

        async fn delete(&self, _doc_ids: &[String]) -> Result<(), AppError> {
            Ok(())
        }

        async fn search(&self, _request: &SearchRequest) -> Result<SearchPage, AppError> {
            let served = self.served.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(SearchPage {
                documents: vec![self.doc.clone()],
                cursor: (served < self.pages)
                    .then(|| crate::models::search::Cursor::from_offset(served)),
            })
        }
    }

    fn record(kind: ResourceKind, id: &str, tag: &str) -> Record {
        Record {
            kind,
            id: id.to_string(),
            summary: format!("<p>Summary of {id} {tag}</p>"),
            display_name: format!("Name {id}"),
            link_url: format!("https://example.org/{id}"),
        }
    }

    async fn fill(index: &dyn SearchIndex, kind: ResourceKind, count: usize) {
        for i in 0..count {
            let r = record(kind, &format!("{}-{i:04}", kind.path()), "bulk");
            index.put(&encode(&r, &SystemClock)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_enumeration_returns_every_document_once() {
        for count in [0usize, 1, 2, 100, 101, 200] {
            let index = MemoryIndex::new("algorithms");
            fill(&index, ResourceKind::Algorithms, count).await;

            let records = query_records(&index, ResourceKind::Algorithms, None, None)
                .await
                .unwrap();

            let ids: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
            assert_eq!(records.len(), count, "count for N={count}");
            assert_eq!(ids.len(), count, "duplicates for N={count}");
        }
    }

    #[tokio::test]
    async fn test_full_page_triggers_one_more_range_read() {
        for (count, expected_calls) in [(0, 1), (99, 2), (100, 2), (101, 3), (200, 3)] {
            let index = CountingIndex::new(MemoryIndex::new("datasets"));
            fill(&index, ResourceKind::Datasets, count).await;

            query_records(&index, ResourceKind::Datasets, Some(""), None)
                .await
                .unwrap();

            assert_eq!(
                index.range_calls.load(Ordering::SeqCst),
                expected_calls,
                "range reads for N={count}"
            );
            assert_eq!(index.search_calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn test_query_finds_unique_tag_among_many() {
        let index = MemoryIndex::new("algorithms");
        fill(&index, ResourceKind::Algorithms, 199).await;
        let tagged = record(ResourceKind::Algorithms, "needle", "uniquetag42");
        index.put(&encode(&tagged, &SystemClock)).await.unwrap();

        let records = query_records(&index, ResourceKind::Algorithms, Some("uniquetag42"), None)
            .await
            .unwrap();

        assert_eq!(records, vec![tagged]);
    }

    #[tokio::test]
    async fn test_query_follows_cursor_across_pages() {
        let index = CountingIndex::new(MemoryIndex::with_page_size("algorithms", 20));
        fill(&index, ResourceKind::Algorithms, 200).await;

        let records = query_records(&index, ResourceKind::Algorithms, Some("bulk"), None)
            .await
            .unwrap();

        assert_eq!(records.len(), 200);
        assert_eq!(index.search_calls.load(Ordering::SeqCst), 10);
        assert_eq!(index.range_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sort_without_query_uses_search() {
        let index = CountingIndex::new(MemoryIndex::new("datasets"));
        fill(&index, ResourceKind::Datasets, 5).await;
        let sort = SortOptions::by("displayName", SortDirection::Descending);

        let records = query_records(&index, ResourceKind::Datasets, None, Some(&sort))
            .await
            .unwrap();

        assert_eq!(records.len(), 5);
        assert_eq!(records[0].id, "datasets-0004");
        assert_eq!(index.range_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_revisiting_cursor_is_not_deduplicated() {
        let doc = encode(&record(ResourceKind::Algorithms, "loop", "x"), &SystemClock);
        let index = RepeatingCursorIndex {
            doc,
            pages: 3,
            served: AtomicUsize::new(0),
        };

        let records = query_records(&index, ResourceKind::Algorithms, Some("x"), None)
            .await
            .unwrap();

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.id == "loop"));
    }

    #[tokio::test]
    async fn test_get_record() {
        let index = MemoryIndex::new("datasets");
        let r = record(ResourceKind::Datasets, "iris", "flowers");
        index.put(&encode(&r, &SystemClock)).await.unwrap();

        assert_eq!(
            get_record(&index, ResourceKind::Datasets, "iris").await.unwrap(),
            Some(r)
        );
        assert_eq!(
            get_record(&index, ResourceKind::Datasets, "missing").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_delete_outcomes() {
        let index = MemoryIndex::new("datasets");
        let r = record(ResourceKind::Datasets, "iris", "flowers");
        index.put(&encode(&r, &SystemClock)).await.unwrap();

        assert_eq!(delete_record(&index, "iris").await.unwrap(), DeleteOutcome::Deleted);
        assert!(index.get("iris").await.unwrap().is_none());
        assert_eq!(delete_record(&index, "iris").await.unwrap(), DeleteOutcome::Absent);
    }

    #[tokio::test]
    async fn test_delete_detects_inconsistent_store() {
        let index = StickyIndex(MemoryIndex::new("datasets"));
        let r = record(ResourceKind::Datasets, "iris", "flowers");
        index.put(&encode(&r, &SystemClock)).await.unwrap();

        assert_eq!(
            delete_record(&index, "iris").await.unwrap(),
            DeleteOutcome::StillPresent
        );
    }

    #[tokio::test]
    async fn test_clear_index_batches_by_listing_page() {
        let index = CountingIndex::new(MemoryIndex::new("algorithms"));
        fill(&index, ResourceKind::Algorithms, 101).await;

        let removed = clear_index(&index).await.unwrap();

        assert_eq!(removed, 101);
        assert_eq!(index.delete_calls.load(Ordering::SeqCst), 2);
        let records = query_records(&index, ResourceKind::Algorithms, None, None)
            .await
            .unwrap();
        assert!(records.is_empty());
    }
}
