use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::AppError;
use crate::models::document::IndexedDocument;

/// Opaque continuation token handed out by a paged query.
///
/// Clients of [`crate::search::client::SearchIndex`] only pass it back; the
/// backends shipped here encode the offset of the next page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor(String);

const OFFSET_TAG: &str = "offset:";

impl Cursor {
    pub fn from_offset(offset: usize) -> Self {
        Cursor(URL_SAFE_NO_PAD.encode(format!("{OFFSET_TAG}{offset}")))
    }

    pub fn offset(&self) -> Result<usize, AppError> {
        let invalid = || AppError::Search(format!("Invalid cursor '{}'", self.0));
        let raw = URL_SAFE_NO_PAD.decode(&self.0).map_err(|_| invalid())?;
        let text = String::from_utf8(raw).map_err(|_| invalid())?;
        text.strip_prefix(OFFSET_TAG)
            .and_then(|n| n.parse().ok())
            .ok_or_else(invalid)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortExpression {
    pub field: String,
    pub direction: SortDirection,
}

/// Ordering applied to a query, most significant expression first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortOptions {
    pub expressions: Vec<SortExpression>,
}

impl SortOptions {
    pub fn by(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            expressions: vec![SortExpression {
                field: field.into(),
                direction,
            }],
        }
    }

    pub fn then_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.expressions.push(SortExpression {
            field: field.into(),
            direction,
        });
        self
    }
}

/// One page request against a search index.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: String,
    pub sort: Option<SortOptions>,
    /// `None` asks for the first page.
    pub cursor: Option<Cursor>,
}

/// One page of query results.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub documents: Vec<IndexedDocument>,
    /// Present while more pages may follow.
    pub cursor: Option<Cursor>,
}
