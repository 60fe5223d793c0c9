/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FetchRelay Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use fetchrelay_protocol::{ForwardOptions, ForwardRequest};
use std::net::SocketAddr;
use tracing::{error, info, warn};

use crate::config::host_allowed;
use crate::{client_ip, error_response, AppState};

/// `POST /proxy`: forward one HTTP call to the caller-named upstream and
/// relay its JSON body back verbatim. Upstream status is not checked; a JSON
/// error page from the upstream relays as 200 plus that page, exactly as a
/// browser-side fetch-and-json would have seen it.
pub async fn forward(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<ForwardRequest>,
) -> Response {
    let Some(url) = req.url.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "url is required");
    };

    if !state
        .limiter
        .check(
            client_ip(&state.cfg, &peer, &headers),
            "forward",
            state.cfg.rate_limit_forward_per_min,
        )
        .await
    {
        return error_response(StatusCode::TOO_MANY_REQUESTS, "rate limited");
    }

    let target: reqwest::Url = match url.parse() {
        Ok(u) => u,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, format!("invalid url: {e}"));
        }
    };
    if target.scheme() != "http" && target.scheme() != "https" {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("unsupported url scheme: {}", target.scheme()),
        );
    }
    let Some(host) = target.host_str() else {
        return error_response(StatusCode::BAD_REQUEST, "url has no host");
    };
    if !host_allowed(&state.cfg.allowed_hosts, host) {
        warn!("refusing forward to disallowed host {host}");
        return error_response(StatusCode::FORBIDDEN, "host not allowed");
    }

    let builder = match build_outbound(&state, target.clone(), &req.options) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    let method = req.options.method.as_deref().unwrap_or("GET");
    info!("forwarding {method} {target}");

    let resp = match builder.send().await {
        Ok(resp) => resp,
        Err(e) => {
            error!("forward to {target} failed: {e}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };
    let upstream_status = resp.status();
    let bytes = match resp.bytes().await {
        Ok(b) => b,
        Err(e) => {
            error!("reading body from {target} failed: {e}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };
    let value: serde_json::Value = match serde_json::from_slice(&bytes) {
        Ok(v) => v,
        Err(e) => {
            warn!("non-JSON body from {target} (status {upstream_status}): {e}");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("upstream returned non-JSON body: {e}"),
            );
        }
    };
    info!("forwarded {method} {target}: upstream status {upstream_status}");
    (StatusCode::OK, Json(value)).into_response()
}

/// Translate caller-supplied options into an outbound request. Malformed
/// method or header material is a caller error, answered before any network
/// traffic happens.
fn build_outbound(
    state: &AppState,
    target: reqwest::Url,
    options: &ForwardOptions,
) -> Result<reqwest::RequestBuilder, Response> {
    let method = match options.method.as_deref() {
        Some(m) => Method::from_bytes(m.to_ascii_uppercase().as_bytes()).map_err(|_| {
            error_response(StatusCode::BAD_REQUEST, format!("invalid method: {m}"))
        })?,
        None => Method::GET,
    };

    let mut builder = state.http.request(method, target);

    if let Some(headers) = &options.headers {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                error_response(StatusCode::BAD_REQUEST, format!("invalid header name: {name}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|_| {
                error_response(StatusCode::BAD_REQUEST, format!("invalid value for header {name}"))
            })?;
            map.insert(name, value);
        }
        builder = builder.headers(map);
    }

    // String bodies go out as-is (callers pre-stringify JSON payloads, as the
    // fetch API required); structured values are serialized. Neither sets a
    // Content-Type, that stays under the caller's control via headers.
    match &options.body {
        Some(serde_json::Value::String(s)) => builder = builder.body(s.clone()),
        Some(v) => {
            let raw = serde_json::to_string(v).map_err(|e| {
                error_response(StatusCode::BAD_REQUEST, format!("unserializable body: {e}"))
            })?;
            builder = builder.body(raw);
        }
        None => {}
    }

    Ok(builder)
}
