/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FetchRelay Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Manual smoke client: sends one forwarding request through a locally
//! running relay at a chat-completions endpoint and prints the JSON reply.

use fetchrelay_protocol::{ForwardOptions, ForwardRequest};
use std::collections::HashMap;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap()),
        )
        .init();

    let relay = std::env::var("FETCHRELAY_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:5000".to_string());
    let target = std::env::var("FETCHRELAY_TARGET")
        .unwrap_or_else(|_| "http://localhost:1234/v1/chat/completions".to_string());

    let payload = serde_json::json!({
        "model": "qwen2.5-7b-1m",
        "messages": [
            { "role": "system", "content": "Always answer in rhymes." },
            { "role": "user", "content": "Introduce yourself." }
        ],
        "temperature": 0.7,
        "stream": false
    });

    let req = ForwardRequest {
        url: Some(target.clone()),
        options: ForwardOptions {
            method: Some("POST".to_string()),
            headers: Some(HashMap::from([(
                "Content-Type".to_string(),
                "application/json".to_string(),
            )])),
            body: Some(serde_json::Value::String(payload.to_string())),
        },
    };

    info!("forwarding to {target} via {relay}");
    let resp = reqwest::Client::new()
        .post(format!("{relay}/proxy"))
        .json(&req)
        .send()
        .await?;
    let status = resp.status();
    let body: serde_json::Value = resp.json().await?;
    info!("relay answered {status}");
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
