use crate::AppState;
use askama::Template;
use axum::{
    extract::Query,
    http::Uri,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

// ── Template structs ───────────────────────────────────────────────────────

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    prefilled_key: String,
    links: Vec<LinkEntry>,
}

struct LinkEntry {
    key: String,
    url: String,
}

#[derive(Deserialize, Default)]
struct IndexQuery {
    key: Option<String>,
}

// ── Handlers ───────────────────────────────────────────────────────────────

/// GET /
/// Management page: the create form (key pre-filled from `?key=`) and every
/// link sorted by key.
pub fn show(state: &AppState, uri: &Uri) -> Response {
    let query = Query::<IndexQuery>::try_from_uri(uri)
        .map(|Query(query)| query)
        .unwrap_or_default();

    let mut links: Vec<LinkEntry> = state
        .store
        .all()
        .into_iter()
        .map(|(key, url)| LinkEntry { key, url })
        .collect();
    links.sort_unstable_by(|a, b| a.key.cmp(&b.key));

    IndexTemplate {
        prefilled_key: query.key.unwrap_or_default(),
        links,
    }
    .into_response()
}
