use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::models::validation::{validate_id, ValidationError};

/// The two catalogue resources. They share every behaviour and differ only in
/// field names, index name and client-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Algorithms,
    Datasets,
}

pub const DISPLAY_NAME_FIELD: &str = "displayName";
pub const LINK_URL_FIELD: &str = "linkURL";

impl ResourceKind {
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Algorithms, ResourceKind::Datasets];

    /// URL segment, also the default search index name.
    pub fn path(self) -> &'static str {
        match self {
            ResourceKind::Algorithms => "algorithms",
            ResourceKind::Datasets => "datasets",
        }
    }

    pub fn id_field(self) -> &'static str {
        match self {
            ResourceKind::Algorithms => "algorithmId",
            ResourceKind::Datasets => "datasetId",
        }
    }

    pub fn summary_field(self) -> &'static str {
        match self {
            ResourceKind::Algorithms => "algorithmSummary",
            ResourceKind::Datasets => "datasetSummary",
        }
    }

    /// The four record keys, in document field order.
    pub fn field_names(self) -> [&'static str; 4] {
        [
            self.id_field(),
            self.summary_field(),
            DISPLAY_NAME_FIELD,
            LINK_URL_FIELD,
        ]
    }

    pub fn not_found_message(self) -> &'static str {
        match self {
            ResourceKind::Algorithms => "Algorithm Not Found",
            ResourceKind::Datasets => "Dataset Not Found",
        }
    }

    pub fn not_deleted_message(self) -> &'static str {
        match self {
            ResourceKind::Algorithms => "Algorithm Not Deleted",
            ResourceKind::Datasets => "Dataset Not Deleted",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Public representation of an algorithm or dataset entry.
///
/// Serializes to a flat JSON object keyed by the kind's field names, e.g.
/// `{"algorithmId": .., "algorithmSummary": .., "displayName": .., "linkURL": ..}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub kind: ResourceKind,
    pub id: String,
    /// HTML fragment.
    pub summary: String,
    pub display_name: String,
    pub link_url: String,
}

impl Record {
    /// Parse and validate a submitted JSON value.
    ///
    /// The value must be an object with exactly the kind's four keys, all
    /// string-valued, and a usable identifier.
    pub fn from_json(kind: ResourceKind, value: &Value) -> Result<Self, ValidationError> {
        let object = value.as_object().ok_or(ValidationError::NotAnObject)?;
        if object.len() != 4 {
            return Err(ValidationError::WrongFieldCount(object.len()));
        }

        let [id_key, summary_key, name_key, link_key] = kind.field_names();
        let field = |key: &'static str| -> Result<String, ValidationError> {
            object
                .get(key)
                .ok_or(ValidationError::MissingField(key))?
                .as_str()
                .map(str::to_owned)
                .ok_or(ValidationError::NotAString(key))
        };

        let record = Record {
            kind,
            id: field(id_key)?,
            summary: field(summary_key)?,
            display_name: field(name_key)?,
            link_url: field(link_key)?,
        };
        validate_id(&record.id)?;
        Ok(record)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(4))?;
        map.serialize_entry(self.kind.id_field(), &self.id)?;
        map.serialize_entry(self.kind.summary_field(), &self.summary)?;
        map.serialize_entry(DISPLAY_NAME_FIELD, &self.display_name)?;
        map.serialize_entry(LINK_URL_FIELD, &self.link_url)?;
        map.end()
    }
}
