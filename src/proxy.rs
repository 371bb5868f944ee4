//! Transparent reverse proxy to the upstream admin console.
//!
//! Requests for any host other than the shortener are forwarded here with
//! their method, headers and body intact. Only the URI is rewritten to point
//! at the upstream, hop-by-hop headers are dropped in both directions, and the
//! client address is appended to `X-Forwarded-For`. Bodies are streamed, never
//! buffered.

use std::{net::SocketAddr, time::Duration};

use axum::{
    body::Body,
    extract::Request,
    http::{
        header::{self, HeaderName, HeaderValue},
        uri::{Authority, PathAndQuery, Scheme},
        HeaderMap, StatusCode, Uri, Version,
    },
    response::{IntoResponse, Response},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Headers that describe a single connection and must not be forwarded.
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Client for the single upstream target.
#[derive(Clone)]
pub struct UpstreamProxy {
    client: Client<HttpConnector, Body>,
    scheme: Scheme,
    authority: Authority,
    // Target path without trailing slash, prepended to every request path.
    base_path: String,
    base_query: Option<String>,
}

impl UpstreamProxy {
    /// `target` must be an absolute `http` URI; `AppConfig` checks this.
    /// `connect_timeout` bounds establishing a new upstream connection and
    /// `idle_timeout` how long pooled connections are kept.
    pub fn new(target: &Uri, connect_timeout: Duration, idle_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(idle_timeout)
            .build(connector);

        let scheme = target.scheme().cloned().unwrap_or(Scheme::HTTP);
        let authority = target
            .authority()
            .cloned()
            .unwrap_or_else(|| Authority::from_static("127.0.0.1"));
        let base_path = target.path().trim_end_matches('/').to_owned();
        let base_query = target.query().map(str::to_owned);

        Self {
            client,
            scheme,
            authority,
            base_path,
            base_query,
        }
    }

    /// Forward `req` upstream and relay the response. Connection failures are
    /// answered with 502.
    pub async fn forward(&self, req: Request, client_addr: Option<SocketAddr>) -> Response {
        let (mut parts, body) = req.into_parts();
        let method = parts.method.clone();
        let original_uri = parts.uri.clone();

        parts.uri = match self.upstream_uri(&parts.uri) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::warn!(uri = %original_uri, error = %e, "Cannot map request onto upstream");
                return (StatusCode::BAD_REQUEST, "invalid request URI").into_response();
            }
        };
        parts.version = Version::HTTP_11;
        strip_hop_by_hop(&mut parts.headers);
        if let Some(addr) = client_addr {
            append_forwarded_for(&mut parts.headers, addr);
        }

        tracing::debug!(method = %method, uri = %parts.uri, "Proxying request");

        match self.client.request(Request::from_parts(parts, body)).await {
            Ok(response) => {
                let (mut parts, body) = response.into_parts();
                strip_hop_by_hop(&mut parts.headers);
                Response::from_parts(parts, Body::new(body))
            }
            Err(e) => {
                tracing::error!(
                    method = %method,
                    uri = %original_uri,
                    upstream = %self.authority,
                    error = %e,
                    "Upstream error"
                );
                (StatusCode::BAD_GATEWAY, "upstream unavailable").into_response()
            }
        }
    }

    /// Rewrite an inbound URI onto the upstream: target scheme and authority,
    /// target path joined to the request path with a single slash, and the two
    /// query strings concatenated.
    fn upstream_uri(&self, uri: &Uri) -> Result<Uri, axum::http::Error> {
        let request_path = uri.path();
        let mut path_and_query = String::with_capacity(
            self.base_path.len() + request_path.len() + uri.query().map_or(0, str::len) + 2,
        );
        path_and_query.push_str(&self.base_path);
        if !request_path.starts_with('/') {
            path_and_query.push('/');
        }
        path_and_query.push_str(request_path);

        match (self.base_query.as_deref(), uri.query()) {
            (Some(base), Some(query)) => {
                path_and_query.push('?');
                path_and_query.push_str(base);
                path_and_query.push('&');
                path_and_query.push_str(query);
            }
            (Some(query), None) | (None, Some(query)) => {
                path_and_query.push('?');
                path_and_query.push_str(query);
            }
            (None, None) => {}
        }

        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(PathAndQuery::try_from(path_and_query)?)
            .build()
    }
}

/// Drop hop-by-hop headers, including any the `Connection` header names.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::try_from(name.trim()).ok())
        .collect();

    for name in &named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, addr: SocketAddr) {
    let ip = addr.ip().to_string();
    let value = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) if !prior.is_empty() => format!("{prior}, {ip}"),
        _ => ip,
    };
    if let Ok(value) = HeaderValue::try_from(value) {
        headers.insert(HeaderName::from_static(X_FORWARDED_FOR), value);
    }
}
