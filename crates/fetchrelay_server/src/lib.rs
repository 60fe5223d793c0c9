/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FetchRelay Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! A small HTTP relay that forwards JSON calls to caller-named upstreams so
//! browser-hosted pages can reach endpoints their origin policy blocks. One
//! parametrized server replaces the pile of near-identical single-route proxy
//! scripts it grew out of.

use anyhow::Context;
use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::{from_fn, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use fetchrelay_protocol::ErrorBody;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span};

pub mod chat;
pub mod config;
pub mod forward;
pub mod limiter;

use crate::config::RelayConfig;
use crate::limiter::RateLimiter;

static REQ_ID: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> String {
    let id = REQ_ID.fetch_add(1, Ordering::Relaxed);
    format!("req-{id}")
}

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<RelayConfig>,
    pub http: reqwest::Client,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(cfg: RelayConfig) -> anyhow::Result<Self> {
        // Redirects are never followed: forwarding is single-shot, and a
        // followed redirect would move the call to a host the allow-list
        // never saw.
        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .pool_idle_timeout(Duration::from_secs(cfg.http_pool_idle_timeout_secs))
            .pool_max_idle_per_host(cfg.http_pool_max_idle_per_host);
        if cfg.http_timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(cfg.http_timeout_secs));
        }
        if cfg.http_connect_timeout_secs > 0 {
            builder = builder.connect_timeout(Duration::from_secs(cfg.http_connect_timeout_secs));
        }
        let http = builder.build().context("http client init")?;
        Ok(Self {
            cfg: Arc::new(cfg),
            http,
            limiter: Arc::new(RateLimiter::new()),
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/proxy", post(forward::forward))
        .route("/chat", post(chat::chat))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .layer(axum::extract::DefaultBodyLimit::max(state.cfg.max_body_bytes))
        .layer(build_cors(&state.cfg))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                let request_id = req
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("req");
                info_span!(
                    "http",
                    method = %req.method(),
                    uri = %req.uri(),
                    request_id = %request_id
                )
            }),
        )
        .layer(from_fn(add_security_headers))
        .layer(from_fn(ensure_request_ids))
        .with_state(state)
}

/// Running relay instance. Binding and teardown are explicit so embedders and
/// tests control the lifecycle instead of a process-wide port constant.
pub struct Server {
    addr: SocketAddr,
    shutdown: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

impl Server {
    pub async fn bind(cfg: RelayConfig) -> anyhow::Result<Server> {
        let bind = cfg.bind;
        let state = AppState::new(cfg)?;
        let app = router(state);
        let listener = tokio::net::TcpListener::bind(bind)
            .await
            .with_context(|| format!("bind {bind}"))?;
        let addr = listener.local_addr().context("local addr")?;
        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        let handle = tokio::spawn(async move {
            let serve = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move { signal.cancelled().await });
            if let Err(e) = serve.await {
                error!("server error: {e}");
            }
        });
        info!("fetchrelay listening on http://{addr}");
        Ok(Server {
            addr,
            shutdown,
            handle,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Signal the accept loop to stop. In-flight requests finish draining.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Wait for the serve task to exit.
    pub async fn wait(self) {
        let _ = self.handle.await;
    }
}

fn build_cors(cfg: &RelayConfig) -> CorsLayer {
    // The relay exists to be called cross-origin; no configured origins means
    // any origin, matching the original wide-open cors() middleware.
    if cfg.allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = cfg
            .allowed_origins
            .iter()
            .filter_map(|o| HeaderValue::from_str(o).ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody::new(message))).into_response()
}

pub fn client_ip(cfg: &RelayConfig, peer: &SocketAddr, headers: &HeaderMap) -> String {
    if !cfg.trust_proxy_headers {
        return peer.ip().to_string();
    }

    // Only safe when a trusted reverse proxy is deployed in front and overwrites these headers.
    if let Some(v) = headers.get("X-Real-IP").and_then(|v| v.to_str().ok()) {
        if let Ok(ip) = v.trim().parse::<IpAddr>() {
            return ip.to_string();
        }
    }
    if let Some(v) = headers.get("X-Forwarded-For").and_then(|v| v.to_str().ok()) {
        if let Some(ip) = v
            .split(',')
            .map(str::trim)
            .find_map(|s| s.parse::<IpAddr>().ok())
        {
            return ip.to_string();
        }
    }

    peer.ip().to_string()
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn readyz() -> impl IntoResponse {
    (StatusCode::OK, "ready")
}

async fn add_security_headers(req: axum::http::Request<axum::body::Body>, next: Next) -> Response {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(next_request_id);
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();
    headers.insert(
        "X-Request-Id",
        HeaderValue::from_str(&request_id).unwrap_or_else(|_| HeaderValue::from_static("req")),
    );
    headers
        .entry("X-Content-Type-Options")
        .or_insert(HeaderValue::from_static("nosniff"));
    headers
        .entry("X-Frame-Options")
        .or_insert(HeaderValue::from_static("DENY"));
    headers
        .entry("Referrer-Policy")
        .or_insert(HeaderValue::from_static("no-referrer"));
    resp
}

async fn ensure_request_ids(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let headers = req.headers_mut();
    if headers.get("x-request-id").is_none() {
        let request_id = next_request_id();
        headers.insert(
            "x-request-id",
            HeaderValue::from_str(&request_id).unwrap_or_else(|_| HeaderValue::from_static("req")),
        );
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg_with_trust(trust: bool) -> RelayConfig {
        RelayConfig {
            trust_proxy_headers: trust,
            ..RelayConfig::default()
        }
    }

    #[test]
    fn client_ip_ignores_headers_by_default() {
        let peer: SocketAddr = "10.0.0.9:4321".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("X-Real-IP", HeaderValue::from_static("1.2.3.4"));
        assert_eq!(client_ip(&cfg_with_trust(false), &peer, &headers), "10.0.0.9");
    }

    #[test]
    fn client_ip_honors_trusted_proxy_headers() {
        let peer: SocketAddr = "10.0.0.9:4321".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("X-Forwarded-For", HeaderValue::from_static("bogus, 1.2.3.4"));
        assert_eq!(client_ip(&cfg_with_trust(true), &peer, &headers), "1.2.3.4");
    }

    #[test]
    fn request_ids_are_unique() {
        let a = next_request_id();
        let b = next_request_id();
        assert_ne!(a, b);
        assert!(a.starts_with("req-"));
    }
}
