use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::app::AppState;

/// Axum handler for `GET /` and `GET /doc`.
///
/// Permanently redirects (301) to the interactive API browser.
pub async fn docs_redirect_handler(State(state): State<AppState>) -> Response {
    (
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, state.docs_redirect_url.as_str())],
    )
        .into_response()
}
