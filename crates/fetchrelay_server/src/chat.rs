/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FetchRelay Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use fetchrelay_protocol::{ChatReply, ChatRequest};
use std::net::SocketAddr;
use tracing::{error, info, warn};

use crate::{client_ip, error_response, AppState};

/// `POST /chat`: relay a prompt to the configured generative-language
/// endpoint and hand back only the completion text. The upstream URL and API
/// key live in server config so the key never reaches the browser.
pub async fn chat(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<ChatRequest>,
) -> Response {
    let Some(chat_url) = state.cfg.chat_url.clone() else {
        return error_response(StatusCode::NOT_FOUND, "chat relay not configured");
    };
    let Some(prompt) = req.prompt.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "prompt is required");
    };

    if !state
        .limiter
        .check(
            client_ip(&state.cfg, &peer, &headers),
            "chat",
            state.cfg.rate_limit_chat_per_min,
        )
        .await
    {
        return error_response(StatusCode::TOO_MANY_REQUESTS, "rate limited");
    }

    let body = serde_json::json!({
        "contents": [{ "parts": [{ "text": prompt }] }]
    });
    let mut builder = state.http.post(&chat_url).json(&body);
    if let Some(key) = state.cfg.chat_api_key.as_deref() {
        builder = builder.query(&[("key", key)]);
    }

    info!("relaying chat prompt ({} chars) to {chat_url}", prompt.len());
    let resp = match builder.send().await {
        Ok(resp) => resp,
        Err(e) => {
            error!("chat relay to {chat_url} failed: {e}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };
    let upstream_status = resp.status();
    let value: serde_json::Value = match resp.json().await {
        Ok(v) => v,
        Err(e) => {
            error!("chat upstream body unreadable (status {upstream_status}): {e}");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("upstream returned non-JSON body: {e}"),
            );
        }
    };
    let Some(text) = extract_completion_text(&value) else {
        warn!("chat upstream response missing completion text (status {upstream_status})");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "upstream response missing completion text",
        );
    };
    (
        StatusCode::OK,
        Json(ChatReply {
            text: text.to_string(),
        }),
    )
        .into_response()
}

/// The documented completion path: `candidates[0].content.parts[0].text`.
pub fn extract_completion_text(value: &serde_json::Value) -> Option<&str> {
    value
        .pointer("/candidates/0/content/parts/0/text")?
        .as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_text_from_well_formed_response() {
        let value = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "hello there" }] }
            }]
        });
        assert_eq!(extract_completion_text(&value), Some("hello there"));
    }

    #[test]
    fn missing_candidates_yields_none() {
        assert_eq!(extract_completion_text(&json!({})), None);
        assert_eq!(extract_completion_text(&json!({"candidates": []})), None);
    }

    #[test]
    fn non_string_text_yields_none() {
        let value = json!({
            "candidates": [{ "content": { "parts": [{ "text": 42 }] } }]
        });
        assert_eq!(extract_completion_text(&value), None);
    }
}
