use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::document::{Field, FieldValue, IndexedDocument};
use crate::models::record::{Record, ResourceKind};

/// Name of the server-assigned creation timestamp field.
pub const DATE_FIELD: &str = "date";

/// Source of creation timestamps, injectable for tests.
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Build the indexed form of a record, stamped with the clock's current time.
pub fn encode(record: &Record, clock: &dyn Clock) -> IndexedDocument {
    let kind = record.kind;
    IndexedDocument {
        doc_id: record.id.clone(),
        fields: vec![
            Field::text(kind.id_field(), &record.id),
            Field::html(kind.summary_field(), &record.summary),
            Field::text(crate::models::record::DISPLAY_NAME_FIELD, &record.display_name),
            Field::text(crate::models::record::LINK_URL_FIELD, &record.link_url),
            Field::date(DATE_FIELD, clock.now()),
        ],
    }
}

/// Flatten a stored document back into a record, dropping the timestamp.
///
/// A document lacking one of the record fields means the index holds data
/// this service did not write; that is reported as an internal error.
pub fn decode(kind: ResourceKind, doc: &IndexedDocument) -> Result<Record, AppError> {
    let text = |name: &str| -> Result<String, AppError> {
        match doc.field(name) {
            Some(FieldValue::Text(v)) | Some(FieldValue::Html(v)) => Ok(v.clone()),
            Some(FieldValue::Date(_)) => Err(AppError::Internal(format!(
                "Field '{name}' of {kind} document '{}' is a date",
                doc.doc_id
            ))),
            None => Err(AppError::Internal(format!(
                "{kind} document '{}' has no field '{name}'",
                doc.doc_id
            ))),
        }
    };

    let [id_key, summary_key, name_key, link_key] = kind.field_names();
    Ok(Record {
        kind,
        id: text(id_key)?,
        summary: text(summary_key)?,
        display_name: text(name_key)?,
        link_url: text(link_key)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(kind: ResourceKind) -> Record {
        Record {
            kind,
            id: "dijkstra".to_string(),
            summary: "<p>Shortest <em>paths</em></p>".to_string(),
            display_name: "Dijkstra's algorithm".to_string(),
            link_url: "https://en.wikipedia.org/wiki/Dijkstra%27s_algorithm".to_string(),
        }
    }

    #[test]
    fn test_encode_uses_clock_and_field_types() {
        let stamp = Utc.with_ymd_and_hms(2017, 3, 14, 15, 9, 26).unwrap();
        let mut clock = MockClock::new();
        clock.expect_now().times(1).return_const(stamp);

        let doc = encode(&sample(ResourceKind::Algorithms), &clock);

        assert_eq!(doc.doc_id, "dijkstra");
        assert_eq!(doc.fields.len(), 5);
        assert_eq!(
            doc.field("algorithmSummary"),
            Some(&FieldValue::Html("<p>Shortest <em>paths</em></p>".into()))
        );
        assert_eq!(
            doc.field("displayName"),
            Some(&FieldValue::Text("Dijkstra's algorithm".into()))
        );
        assert_eq!(doc.field(DATE_FIELD), Some(&FieldValue::Date(stamp)));
    }

    #[test]
    fn test_decode_reverses_encode() {
        for kind in ResourceKind::ALL {
            let record = sample(kind);
            let doc = encode(&record, &SystemClock);
            assert_eq!(decode(kind, &doc).unwrap(), record);
        }
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let mut doc = encode(&sample(ResourceKind::Datasets), &SystemClock);
        doc.fields.push(Field::text("legacy", "value"));
        assert_eq!(decode(ResourceKind::Datasets, &doc).unwrap().id, "dijkstra");
    }

    #[test]
    fn test_decode_missing_field_is_an_error() {
        let mut doc = encode(&sample(ResourceKind::Datasets), &SystemClock);
        doc.fields.retain(|f| f.name != "linkURL");
        assert!(matches!(
            decode(ResourceKind::Datasets, &doc),
            Err(AppError::Internal(_))
        ));
    }

    #[test]
    fn test_decode_with_wrong_kind_fails() {
        let doc = encode(&sample(ResourceKind::Algorithms), &SystemClock);
        assert!(decode(ResourceKind::Datasets, &doc).is_err());
    }
}
