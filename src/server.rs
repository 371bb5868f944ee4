//! Router assembly and the serve loop.
//!
//! There is a single entry point, [`dispatch`], mounted as the router's
//! fallback: it classifies the request (see [`crate::routing`]) and hands it
//! to the matching link handler or to the upstream proxy.

use std::{future::Future, net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::{ConnectInfo, Request, State},
    response::{IntoResponse, Response},
    Router,
};
use hyper::{body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::{net::TcpListener, sync::watch, task::JoinSet};
use tower::ServiceExt;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{
    connection::IdleTimeout,
    handlers::{links, ui},
    routing::{self, Action},
    AppState,
};

/// Build the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let request_timeout = state.config.write_timeout;

    Router::new()
        .fallback(dispatch)
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
}

async fn dispatch(State(state): State<Arc<AppState>>, req: Request) -> Response {
    let action = routing::classify(
        &state.config.go_hosts,
        routing::request_host(&req),
        req.method(),
        req.uri().path(),
    );

    match action {
        Action::Proxy => {
            let client_addr = req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr);
            state.proxy.forward(req, client_addr).await
        }
        Action::ShowUi => ui::show(&state, req.uri()),
        Action::Create => links::create(&state, req).await,
        Action::Redirect { key } => links::redirect(&state, &key),
        Action::Update { key, reply } => links::update(&state, &key, reply, req).await,
        Action::Delete { key, reply } => links::delete(&state, &key, reply),
        Action::Reject { status, reason } => (status, reason).into_response(),
    }
}

/// Serve until `shutdown` resolves, then flush the store and give in-flight
/// requests `config.shutdown_grace` to finish before dropping them.
///
/// Each connection must deliver request headers within `config.read_timeout`
/// and is closed after `config.idle_timeout` without traffic.
pub async fn serve(
    state: Arc<AppState>,
    listener: TcpListener,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let router = build_router(state.clone());

    let mut http = http1::Builder::new();
    http.timer(TokioTimer::new())
        .header_read_timeout(state.config.read_timeout);

    let idle_timeout = state.config.idle_timeout;
    let (stop_tx, stop_rx) = watch::channel(false);
    let mut connections = JoinSet::new();

    tokio::pin!(shutdown);
    loop {
        let (stream, remote) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => continue,
            () = &mut shutdown => break,
        };

        let router = router.clone();
        let service = service_fn(move |mut req: hyper::Request<Incoming>| {
            req.extensions_mut().insert(ConnectInfo(remote));
            router.clone().oneshot(req)
        });
        let conn = http.serve_connection(
            TokioIo::new(IdleTimeout::new(stream, idle_timeout)),
            service,
        );
        let mut stop = stop_rx.clone();

        connections.spawn(async move {
            tokio::pin!(conn);
            let res = tokio::select! {
                res = conn.as_mut() => res,
                _ = stop.changed() => {
                    conn.as_mut().graceful_shutdown();
                    conn.await
                }
            };
            if let Err(e) = res {
                tracing::debug!(client = %remote, error = %e, "Connection closed with error");
            }
        });
    }
    drop(listener);

    tracing::info!("Shutting down server gracefully...");

    if let Err(e) = state.store.save() {
        tracing::error!(error = %e, "Failed to save links during shutdown");
    }

    let _ = stop_tx.send(true);

    let drain = async { while connections.join_next().await.is_some() {} };
    if tokio::time::timeout(state.config.shutdown_grace, drain)
        .await
        .is_err()
    {
        tracing::warn!(
            grace = ?state.config.shutdown_grace,
            "In-flight requests did not finish in time, closing connections"
        );
        connections.abort_all();
    }

    Ok(())
}

/// Resolves on SIGINT (Ctrl+C) or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT"),
        () = terminate => tracing::info!("Received SIGTERM"),
    }
}
