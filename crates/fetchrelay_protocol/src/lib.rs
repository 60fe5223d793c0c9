/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FetchRelay Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Body of `POST /proxy`. `url` is required but modeled as an `Option` so the
/// handler can answer with the contractual 400 instead of a framework reject.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ForwardRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub options: ForwardOptions,
}

/// Outbound call configuration, mirrored from the caller verbatim.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ForwardOptions {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    /// Either a raw string (sent as-is) or any JSON value (re-serialized).
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatReply {
    pub text: String,
}
