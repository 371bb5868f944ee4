use crate::{routing::Reply, validate, AppState};
use axum::{
    extract::{FromRequest, Request},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use url::Url;

// ── Form types ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateLinkForm {
    #[serde(default)]
    key: String,
    #[serde(default)]
    url: String,
}

#[derive(Deserialize)]
pub struct UpdateLinkForm {
    #[serde(default)]
    url: String,
}

// ── Handlers ───────────────────────────────────────────────────────────────

/// GET /{key}
///
/// 302 to the stored destination, or 307 to the management page with the key
/// pre-filled so the missing link can be created. The 307 is temporary on
/// purpose: the link may exist a minute later.
pub fn redirect(state: &AppState, key: &str) -> Response {
    match state.store.get(key) {
        Some(dest) => {
            tracing::info!(key, dest = %dest, "Redirecting");
            found(&dest)
        }
        None => {
            tracing::info!(key, "Link not found, suggesting creation");
            Redirect::temporary(&format!("/?key={}", urlencoding::encode(key))).into_response()
        }
    }
}

/// POST /
pub async fn create(state: &AppState, req: Request) -> Response {
    let Form(form) = match Form::<CreateLinkForm>::from_request(req, &()).await {
        Ok(form) => form,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Unreadable create form");
            return (StatusCode::BAD_REQUEST, "missing key or URL").into_response();
        }
    };

    let key = match validate::key(&form.key) {
        Ok(key) => key,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };
    let url = match validate::destination(&form.url) {
        Ok(url) => url,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    if let Err(e) = state.store.set(key, url) {
        tracing::error!(key, error = %e, "Failed to save link");
        return (StatusCode::INTERNAL_SERVER_ERROR, "failed to save link").into_response();
    }

    tracing::info!(key, url, "Created link");
    Redirect::to("/").into_response()
}

/// POST|PUT /api/update/{key}
pub async fn update(state: &AppState, key: &str, reply: Reply, req: Request) -> Response {
    let Form(form) = match Form::<UpdateLinkForm>::from_request(req, &()).await {
        Ok(form) => form,
        Err(rejection) => {
            tracing::debug!(key, error = %rejection, "Unreadable update form");
            return (StatusCode::BAD_REQUEST, "missing URL").into_response();
        }
    };

    let url = match validate::destination(&form.url) {
        Ok(url) => url,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    match state.store.update(key, url) {
        Ok(true) => {
            tracing::info!(key, url, "Updated link");
            respond(reply)
        }
        Ok(false) => (StatusCode::NOT_FOUND, "link not found").into_response(),
        Err(e) => {
            tracing::error!(key, error = %e, "Failed to update link");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to save changes").into_response()
        }
    }
}

/// POST|DELETE /api/delete/{key}
pub fn delete(state: &AppState, key: &str, reply: Reply) -> Response {
    match state.store.delete(key) {
        Ok(true) => {
            tracing::info!(key, "Deleted link");
            respond(reply)
        }
        Ok(false) => (StatusCode::NOT_FOUND, "link not found").into_response(),
        Err(e) => {
            tracing::error!(key, error = %e, "Failed to delete link");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to save changes").into_response()
        }
    }
}

// ── Private helpers ────────────────────────────────────────────────────────

fn respond(reply: Reply) -> Response {
    match reply {
        Reply::SeeOther => Redirect::to("/").into_response(),
        Reply::NoContent => StatusCode::NO_CONTENT.into_response(),
    }
}

/// 302 Found. Destinations are stored as typed; non-ASCII ones are sent in
/// their normalised, percent-encoded form.
fn found(dest: &str) -> Response {
    let location = if dest.is_ascii() {
        HeaderValue::try_from(dest).ok()
    } else {
        Url::parse(dest)
            .ok()
            .and_then(|url| HeaderValue::try_from(url.as_str()).ok())
    };

    match location {
        Some(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
        None => {
            tracing::error!(dest, "Stored destination cannot be used as a Location header");
            (StatusCode::INTERNAL_SERVER_ERROR, "invalid destination").into_response()
        }
    }
}
