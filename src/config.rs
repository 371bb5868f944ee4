use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};
use axum::http::{uri::Scheme, Uri};

pub const DEFAULT_UPSTREAM_TARGET: &str = "http://127.0.0.1:8080";
pub const DEFAULT_LISTEN_ADDR: &str = ":80";
pub const DEFAULT_DB_FILE: &str = "go_links.json";
pub const DEFAULT_GO_HOSTS: &[&str] = &["go", "go.local"];

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Service that receives every request not addressed to a shortener host,
    /// e.g. the Pi-hole web console at "http://127.0.0.1:8080"
    pub upstream_target: Uri,

    /// Address to bind, e.g. "0.0.0.0:80". A Go-style ":80" is accepted in the
    /// environment and widened to all interfaces.
    pub listen_addr: String,

    /// JSON file holding the links
    pub db_file: PathBuf,

    /// Host names (without port, lowercase) served by the shortener itself
    pub go_hosts: Vec<String>,

    /// Deadline for a client to deliver request headers; also bounds
    /// establishing an upstream connection
    pub read_timeout: Duration,

    /// Deadline for producing a response head
    pub write_timeout: Duration,

    /// How long a client connection may sit without traffic; also how long
    /// idle upstream connections stay pooled
    pub idle_timeout: Duration,

    /// How long in-flight requests may drain after a shutdown signal
    pub shutdown_grace: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            upstream_target: Uri::from_static(DEFAULT_UPSTREAM_TARGET),
            listen_addr: normalize_listen_addr(DEFAULT_LISTEN_ADDR),
            db_file: PathBuf::from(DEFAULT_DB_FILE),
            go_hosts: DEFAULT_GO_HOSTS.iter().map(|h| (*h).to_owned()).collect(),
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(120),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables (populated by dotenvy before this is called).
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup. Unset and
    /// empty variables fall back to their defaults.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let raw_target = var("PIHOLE_TARGET").unwrap_or_else(|| DEFAULT_UPSTREAM_TARGET.into());
        let upstream_target = parse_upstream(raw_target.trim())
            .with_context(|| format!("PIHOLE_TARGET {raw_target:?} is not a usable upstream"))?;

        let listen_addr = normalize_listen_addr(
            var("LISTEN_ADDR")
                .as_deref()
                .unwrap_or(DEFAULT_LISTEN_ADDR)
                .trim(),
        );

        let db_file = var("DB_FILE")
            .map(|f| PathBuf::from(f.trim()))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE));

        let go_hosts = var("GO_HOSTS")
            .map(|raw| parse_hosts(&raw))
            .filter(|hosts| !hosts.is_empty())
            .unwrap_or_else(|| DEFAULT_GO_HOSTS.iter().map(|h| (*h).to_owned()).collect());

        Ok(Self {
            upstream_target,
            listen_addr,
            db_file,
            go_hosts,
            ..Self::default()
        })
    }
}

fn parse_upstream(raw: &str) -> Result<Uri> {
    let uri: Uri = raw.parse().context("invalid URL")?;

    if uri.scheme() != Some(&Scheme::HTTP) {
        bail!("upstream must use the http scheme");
    }
    if uri.host().map_or(true, str::is_empty) {
        bail!("upstream URL has no host");
    }

    Ok(uri)
}

fn normalize_listen_addr(raw: &str) -> String {
    if raw.starts_with(':') {
        format!("0.0.0.0{raw}")
    } else {
        raw.to_owned()
    }
}

fn parse_hosts(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|h| h.trim().to_ascii_lowercase())
        .filter(|h| !h.is_empty())
        .collect()
}
