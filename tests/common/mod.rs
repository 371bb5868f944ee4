//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::Body,
    extract::Request,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use golinks::{server, AppConfig, AppState, LinkStore};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tower::ServiceExt;

/// App state backed by a database file inside a fresh temp dir. Keep the
/// returned `TempDir` alive for the duration of the test.
pub fn test_state(upstream: Option<SocketAddr>) -> (Arc<AppState>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig {
        db_file: dir.path().join("go_links.json"),
        ..AppConfig::default()
    };
    if let Some(addr) = upstream {
        config.upstream_target = format!("http://{addr}").parse().unwrap();
    }
    let store = LinkStore::open(&config.db_file).unwrap();
    (Arc::new(AppState::new(config, store)), dir)
}

/// App state whose database file sits in a directory that does not exist, so
/// every save fails.
pub fn unwritable_state() -> (Arc<AppState>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig {
        db_file: dir.path().join("missing").join("go_links.json"),
        ..AppConfig::default()
    };
    let store = LinkStore::open(&config.db_file).unwrap();
    (Arc::new(AppState::new(config, store)), dir)
}

/// Send one request through the full router.
pub async fn send(state: &Arc<AppState>, req: Request) -> Response {
    server::build_router(state.clone()).oneshot(req).await.unwrap()
}

pub fn go_request(method: Method, uri: &str) -> Request {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, "go")
        .body(Body::empty())
        .unwrap()
}

pub fn go_form(method: Method, uri: &str, form: &str) -> Request {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, "go")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_owned()))
        .unwrap()
}

pub fn location(res: &Response) -> &str {
    res.headers()
        .get(header::LOCATION)
        .expect("missing Location header")
        .to_str()
        .unwrap()
}

pub async fn body_string(res: Response) -> String {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Start a throwaway upstream that answers every request with 418 and a body
/// describing what it received.
pub async fn start_upstream() -> SocketAddr {
    async fn echo(req: Request) -> Response {
        let host = req
            .headers()
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_owned();
        let forwarded = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_owned();
        let method = req.method().clone();
        let uri = req.uri().clone();
        let body = axum::body::to_bytes(req.into_body(), usize::MAX)
            .await
            .unwrap();

        (
            StatusCode::IM_A_TEAPOT,
            [("x-upstream", "pihole")],
            format!(
                "{method} {uri} host={host} xff={forwarded} body={}",
                String::from_utf8_lossy(&body)
            ),
        )
            .into_response()
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, Router::new().fallback(echo))
            .await
            .unwrap();
    });
    addr
}
