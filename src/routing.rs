//! Per-request classification.
//!
//! Every inbound request is turned into exactly one [`Action`] by [`classify`]
//! before anything touches the store or the upstream, which keeps the
//! host/path/method decision tree in one place.

use axum::{
    extract::Request,
    http::{header, Method, StatusCode},
};

/// How a successful API mutation answers the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// 303 back to the management page (form submissions).
    SeeOther,
    /// 204 with no body (scripted DELETE/PUT).
    NoContent,
}

/// What to do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Not for the shortener: forward to the upstream service.
    Proxy,
    ShowUi,
    Create,
    Redirect { key: String },
    Update { key: String, reply: Reply },
    Delete { key: String, reply: Reply },
    Reject {
        status: StatusCode,
        reason: &'static str,
    },
}

impl Action {
    fn reject(status: StatusCode, reason: &'static str) -> Self {
        Self::Reject { status, reason }
    }
}

/// Host the client addressed, without port. Falls back to the request URI for
/// absolute-form requests that carry no `Host` header.
pub fn request_host(req: &Request) -> Option<&str> {
    let raw = req
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| req.uri().authority().map(|a| a.as_str()))?;
    Some(strip_port(raw))
}

/// `go.local:8080` -> `go.local`, `[::1]:80` -> `[::1]`.
pub fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    host.split(':').next().unwrap_or(host)
}

/// Decide what to do with a request addressed to `host` with `method` and the
/// raw (still percent-encoded) URI `path`.
pub fn classify(go_hosts: &[String], host: Option<&str>, method: &Method, path: &str) -> Action {
    let is_go_host = host.is_some_and(|h| go_hosts.iter().any(|g| g.eq_ignore_ascii_case(h)));
    if !is_go_host {
        return Action::Proxy;
    }

    let decoded = match urlencoding::decode(path) {
        Ok(decoded) => decoded,
        Err(_) => return Action::reject(StatusCode::BAD_REQUEST, "invalid path encoding"),
    };
    let path = decoded.trim_matches('/');

    if path.is_empty() {
        return match *method {
            Method::GET | Method::HEAD => Action::ShowUi,
            Method::POST => Action::Create,
            _ => Action::reject(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"),
        };
    }

    if let Some(rest) = path.strip_prefix("api/") {
        return classify_api(method, rest);
    }

    Action::Redirect {
        key: path.to_owned(),
    }
}

fn classify_api(method: &Method, rest: &str) -> Action {
    let (action, key) = match rest.split_once('/') {
        Some((action, key)) if !key.is_empty() => (action, key.to_owned()),
        _ => return Action::reject(StatusCode::BAD_REQUEST, "invalid API path"),
    };

    match action {
        "delete" => match *method {
            Method::POST => Action::Delete {
                key,
                reply: Reply::SeeOther,
            },
            Method::DELETE => Action::Delete {
                key,
                reply: Reply::NoContent,
            },
            _ => Action::reject(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"),
        },
        "update" => match *method {
            Method::POST => Action::Update {
                key,
                reply: Reply::SeeOther,
            },
            Method::PUT => Action::Update {
                key,
                reply: Reply::NoContent,
            },
            _ => Action::reject(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"),
        },
        _ => Action::reject(StatusCode::NOT_FOUND, "unknown API action"),
    }
}
