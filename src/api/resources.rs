use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use serde_json::Value;

use crate::error::AppError;
use crate::models::record::{Record, ResourceKind};
use crate::models::validation::validate_id;
use crate::search::client::SearchIndex;
use crate::search::codec::{encode, Clock};
use crate::search::query::{clear_index, delete_record, get_record, query_records, DeleteOutcome};

/// Everything one resource's handlers need.
#[derive(Clone)]
pub struct ResourceState {
    pub kind: ResourceKind,
    pub index: Arc<dyn SearchIndex>,
    pub clock: Arc<dyn Clock>,
}

impl ResourceState {
    pub fn new(kind: ResourceKind, index: Arc<dyn SearchIndex>, clock: Arc<dyn Clock>) -> Self {
        Self { kind, index, clock }
    }
}

/// Extract the search string from a raw query string.
///
/// No query string (or an empty one) means "list everything". A query
/// string must carry a non-empty `query` parameter; blank values are ignored
/// the way form decoding drops them.
pub fn parse_list_query(raw: Option<&str>) -> Result<Option<String>, AppError> {
    let Some(raw) = raw.filter(|r| !r.is_empty()) else {
        return Ok(None);
    };

    url::form_urlencoded::parse(raw.as_bytes())
        .find(|(key, value)| key == "query" && !value.is_empty())
        .map(|(_, value)| Some(value.into_owned()))
        .ok_or_else(|| AppError::MalformedData(format!("query string '{raw}' has no 'query' parameter")))
}

/// `true` when the Content-Type media type is `application/json`,
/// ignoring parameters such as `charset`.
fn is_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("application/json"))
}

fn checked_id(id: &str) -> Result<(), AppError> {
    validate_id(id).map_err(|e| AppError::MalformedData(format!("'{id}': {e}")))
}

/// Listing logic, kept apart from the HTTP layer.
pub async fn process_list(state: &ResourceState, query: Option<&str>) -> Result<Vec<Record>, AppError> {
    query_records(state.index.as_ref(), state.kind, query, None).await
}

pub async fn process_get(state: &ResourceState, id: &str) -> Result<Record, AppError> {
    checked_id(id)?;
    get_record(state.index.as_ref(), state.kind, id)
        .await?
        .ok_or_else(|| AppError::NotFound(state.kind.not_found_message().to_string()))
}

/// Validate a submitted body and store it.
pub async fn process_create(
    state: &ResourceState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Record, AppError> {
    if !is_json_content_type(headers) {
        return Err(AppError::MalformedData("expected application/json".into()));
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| AppError::MalformedData(format!("invalid JSON body: {e}")))?;
    let record = Record::from_json(state.kind, &value)?;

    state
        .index
        .put(&encode(&record, state.clock.as_ref()))
        .await?;

    tracing::info!(kind = %state.kind, id = %record.id, "Stored record");
    Ok(record)
}

/// Delete one record. Succeeds whether or not it existed.
pub async fn process_delete(state: &ResourceState, id: &str) -> Result<DeleteOutcome, AppError> {
    checked_id(id)?;
    match delete_record(state.index.as_ref(), id).await? {
        DeleteOutcome::StillPresent => Err(AppError::NotDeleted(
            state.kind.not_deleted_message().to_string(),
        )),
        outcome => Ok(outcome),
    }
}

pub async fn process_clear(state: &ResourceState) -> Result<usize, AppError> {
    clear_index(state.index.as_ref()).await
}

/// Axum handler for `GET /{resource}/`.
pub async fn list_handler(
    State(state): State<ResourceState>,
    RawQuery(raw): RawQuery,
) -> Result<Json<Vec<Record>>, AppError> {
    let query = parse_list_query(raw.as_deref())?;
    let records = process_list(&state, query.as_deref()).await?;
    Ok(Json(records))
}

/// Axum handler for `GET /{resource}/{id}`.
pub async fn get_handler(
    State(state): State<ResourceState>,
    Path(id): Path<String>,
) -> Result<Json<Record>, AppError> {
    Ok(Json(process_get(&state, &id).await?))
}

/// Axum handler for `POST /{resource}/`. Responds 200 with an empty body.
pub async fn create_handler(
    State(state): State<ResourceState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    process_create(&state, &headers, &body).await?;
    Ok(StatusCode::OK)
}

/// Axum handler for `DELETE /{resource}/{id}`.
pub async fn delete_handler(
    State(state): State<ResourceState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    process_delete(&state, &id).await?;
    Ok(StatusCode::OK)
}

/// Axum handler for `DELETE /{resource}/`.
pub async fn clear_handler(State(state): State<ResourceState>) -> Result<StatusCode, AppError> {
    process_clear(&state).await?;
    Ok(StatusCode::OK)
}
