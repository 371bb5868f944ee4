//! Local-network go-links service.
//!
//! Requests addressed to one of the shortener host names (`go`, `go.local` by
//! default) are served from a small JSON-backed link store: `/{key}` redirects,
//! `/` shows the management page, `/api/{update,delete}/{key}` edit links.
//! Every other host is reverse-proxied untouched to the upstream service the
//! shortener shares its port with (typically the Pi-hole admin console).

pub mod config;
pub mod connection;
pub mod error;
pub mod handlers;
pub mod proxy;
pub mod routing;
pub mod server;
pub mod store;
pub mod validate;

pub use config::AppConfig;
pub use error::{StoreError, ValidationError};
pub use proxy::UpstreamProxy;
pub use store::LinkStore;

// ── Shared application state ───────────────────────────────────────────────

pub struct AppState {
    pub store: LinkStore,
    pub proxy: UpstreamProxy,
    pub config: AppConfig,
}

impl AppState {
    /// Wire the store and an upstream client built from `config`.
    pub fn new(config: AppConfig, store: LinkStore) -> Self {
        let proxy = UpstreamProxy::new(
            &config.upstream_target,
            config.read_timeout,
            config.idle_timeout,
        );
        Self {
            store,
            proxy,
            config,
        }
    }
}
