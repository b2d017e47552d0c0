//! cinder-server: HTTP API for the Cinder encrypted pastebin
//!
//! The server stores and serves opaque encrypted envelopes. Keys are created
//! and used only by clients and travel in the URL fragment.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/pastes` | Create a paste (rate limited) |
//! | GET | `/api/pastes/{id}` | Read a paste, `?password=` for gated pastes |
//! | DELETE | `/api/pastes/{id}` | Delete a paste |
//! | GET | `/health` | Liveness probe |

pub mod api;
pub mod client;
pub mod client_id;
pub mod config;
pub mod error;
pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderMap, HeaderValue, Method, header, request};
use axum::routing::{get, post};
use cinder_core::{Clock, SystemClock};
use cinder_paste::{KvRateLimiter, PasteLifecycle, RateLimiter};
use cinder_storage::{InMemoryKvStore, KvStore, RedbKvConfig, RedbKvStore, StorageError};
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, info, warn};

use crate::config::{CorsConfig, ServerConfig, StorageBackend};

/// Room for the JSON envelope around the largest accepted `content`
const BODY_OVERHEAD_BYTES: usize = 64 * 1024;

/// Scheme reported by a TLS-terminating proxy
const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Shared state for API handlers
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: PasteLifecycle,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub public_origin: Option<String>,
    pub client_ip_header: Option<String>,
}

impl AppState {
    /// Wire the lifecycle and rate limiter to one store
    pub fn new(config: &ServerConfig, store: Arc<dyn KvStore>) -> Self {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &ServerConfig, store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        let rate_limiter = KvRateLimiter::new(store.clone(), config.rate_limit_config());
        Self {
            lifecycle: PasteLifecycle::with_clock(store, clock, config.lifecycle_config()),
            rate_limiter: Arc::new(rate_limiter),
            public_origin: config.public_origin.clone(),
            client_ip_header: config.client_ip_header.clone(),
        }
    }

    /// Origin for returned URLs: configured, else taken from `Host`
    ///
    /// The scheme of a `Host`-derived origin is `http` unless a proxy is
    /// trusted (`client_ip_header` is set) and reports `X-Forwarded-Proto:
    /// https`. Deployments terminating TLS elsewhere should set
    /// `public_origin`.
    pub fn origin_for(&self, headers: &HeaderMap) -> String {
        if let Some(origin) = &self.public_origin {
            return origin.clone();
        }
        let Some(host) = headers.get(header::HOST).and_then(|host| host.to_str().ok()) else {
            return String::new();
        };
        format!("{}://{}", self.forwarded_scheme(headers), host)
    }

    fn forwarded_scheme(&self, headers: &HeaderMap) -> &'static str {
        if self.client_ip_header.is_none() {
            return "http";
        }
        let proto = headers
            .get(FORWARDED_PROTO)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim);
        match proto {
            Some(proto) if proto.eq_ignore_ascii_case("https") => "https",
            _ => "http",
        }
    }
}

/// Build the API router
///
/// No request-tracing layer is installed: the query string of a read may
/// carry a password.
pub fn build_router(config: &ServerConfig, state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/pastes", post(handlers::create_paste))
        .route(
            "/pastes/{id}",
            get(handlers::get_paste).delete(handlers::delete_paste),
        )
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(
            config.max_content_bytes.saturating_add(BODY_OVERHEAD_BYTES),
        ))
        .layer(cors_layer(&config.cors))
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let config = config.clone();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &request::Parts| {
                origin.to_str().is_ok_and(|origin| config.allows(origin))
            },
        ))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

/// Open the configured key-value store
pub fn open_store(config: &ServerConfig) -> Result<Arc<dyn KvStore>, StorageError> {
    let store: Arc<dyn KvStore> = match config.storage.backend {
        StorageBackend::Memory => Arc::new(InMemoryKvStore::new()),
        StorageBackend::Redb => Arc::new(RedbKvStore::open(RedbKvConfig::at(
            config.storage.path.clone(),
        ))?),
    };
    info!(backend = ?config.storage.backend, "Opened paste store");
    Ok(store)
}

/// Periodically purge expired entries
///
/// Expiry is still enforced on every read; this only reclaims space held by
/// pastes nobody asks for again.
pub fn spawn_sweeper(lifecycle: PasteLifecycle, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match lifecycle.sweep().await {
                Ok(0) => {}
                Ok(removed) => debug!(removed, "Swept expired pastes"),
                Err(e) => warn!(error = %e, "Sweep failed"),
            }
        }
    })
}
