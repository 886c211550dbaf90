use chrono::{DateTime, SecondsFormat, Utc};

/// A document as stored in the search index: a key plus typed fields.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedDocument {
    /// Storage key; equal to the record identifier.
    pub doc_id: String,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
}

/// Field types understood by the search service.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Plain text, tokenized as-is.
    Text(String),
    /// HTML markup; only the text content is searchable.
    Html(String),
    Date(DateTime<Utc>),
}

impl FieldValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::Html(_) => "html",
            FieldValue::Date(_) => "date",
        }
    }

    /// String form used for ordering. Dates use a fixed-width RFC 3339 form
    /// so lexical order matches chronological order.
    pub fn sort_key(&self) -> String {
        match self {
            FieldValue::Text(s) | FieldValue::Html(s) => s.clone(),
            FieldValue::Date(d) => d.to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }
}

impl Field {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Text(value.into()),
        }
    }

    pub fn html(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Html(value.into()),
        }
    }

    pub fn date(name: impl Into<String>, value: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Date(value),
        }
    }
}

impl IndexedDocument {
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }
}
