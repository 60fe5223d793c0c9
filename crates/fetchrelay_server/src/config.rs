/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FetchRelay Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind: SocketAddr,
    pub allowed_origins: Vec<String>,
    pub allowed_hosts: Vec<HostRule>,
    pub trust_proxy_headers: bool,
    pub max_body_bytes: usize,
    pub http_timeout_secs: u64,
    pub http_connect_timeout_secs: u64,
    pub http_pool_idle_timeout_secs: u64,
    pub http_pool_max_idle_per_host: usize,
    pub rate_limit_forward_per_min: u32,
    pub rate_limit_chat_per_min: u32,
    pub chat_url: Option<String>,
    pub chat_api_key: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".parse().expect("default bind"),
            allowed_origins: Vec::new(),
            allowed_hosts: vec![HostRule::Any],
            trust_proxy_headers: false,
            max_body_bytes: 1024 * 1024,
            http_timeout_secs: 30,
            http_connect_timeout_secs: 10,
            http_pool_idle_timeout_secs: 90,
            http_pool_max_idle_per_host: 8,
            rate_limit_forward_per_min: 0,
            rate_limit_chat_per_min: 0,
            chat_url: None,
            chat_api_key: None,
        }
    }
}

pub fn load_config() -> RelayConfig {
    let defaults = RelayConfig::default();
    let bind = std::env::var("FETCHRELAY_BIND").unwrap_or_else(|_| "0.0.0.0:5000".to_string());
    let bind: SocketAddr = bind.parse().expect("FETCHRELAY_BIND invalid");
    let allowed_origins = std::env::var("FETCHRELAY_ALLOWED_ORIGINS")
        .ok()
        .map(|s| split_list(&s))
        .unwrap_or_default();
    let allowed_hosts = parse_host_rules(std::env::var("FETCHRELAY_ALLOWED_HOSTS").ok());
    let trust_proxy_headers = std::env::var("FETCHRELAY_TRUST_PROXY_HEADERS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let max_body_bytes = std::env::var("FETCHRELAY_MAX_BODY_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(defaults.max_body_bytes);
    let http_timeout_secs = std::env::var("FETCHRELAY_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(defaults.http_timeout_secs);
    let http_connect_timeout_secs = std::env::var("FETCHRELAY_HTTP_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(defaults.http_connect_timeout_secs);
    let http_pool_idle_timeout_secs = std::env::var("FETCHRELAY_HTTP_POOL_IDLE_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(defaults.http_pool_idle_timeout_secs);
    let http_pool_max_idle_per_host = std::env::var("FETCHRELAY_HTTP_POOL_MAX_IDLE_PER_HOST")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(defaults.http_pool_max_idle_per_host);
    let rate_limit_forward_per_min = std::env::var("FETCHRELAY_RL_FORWARD_PER_MIN")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(defaults.rate_limit_forward_per_min);
    let rate_limit_chat_per_min = std::env::var("FETCHRELAY_RL_CHAT_PER_MIN")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(defaults.rate_limit_chat_per_min);
    let chat_url = std::env::var("FETCHRELAY_CHAT_URL")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let chat_api_key = std::env::var("FETCHRELAY_CHAT_API_KEY")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    RelayConfig {
        bind,
        allowed_origins,
        allowed_hosts,
        trust_proxy_headers,
        max_body_bytes,
        http_timeout_secs,
        http_connect_timeout_secs,
        http_pool_idle_timeout_secs,
        http_pool_max_idle_per_host,
        rate_limit_forward_per_min,
        rate_limit_chat_per_min,
        chat_url,
        chat_api_key,
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(|c| c == ',' || c == ' ' || c == '\n' || c == '\t')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Upstream host policy. The original proxies forwarded to any host the
/// caller named; `Any` (the `*` rule) preserves that, everything else is an
/// explicit opt-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostRule {
    Any,
    /// Case-insensitive exact host match.
    Exact(String),
    /// `.example.com` matches `example.com` and any subdomain of it.
    Suffix(String),
}

pub fn parse_host_rules(env: Option<String>) -> Vec<HostRule> {
    let Some(raw) = env else {
        return vec![HostRule::Any];
    };
    // Set-but-empty means deny everything, not fall back to permissive.
    split_list(&raw)
        .into_iter()
        .map(|s| {
            let s = s.to_ascii_lowercase();
            if s == "*" {
                HostRule::Any
            } else if let Some(suffix) = s.strip_prefix('.') {
                HostRule::Suffix(suffix.to_string())
            } else {
                HostRule::Exact(s)
            }
        })
        .collect()
}

pub fn host_allowed(rules: &[HostRule], host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    rules.iter().any(|rule| match rule {
        HostRule::Any => true,
        HostRule::Exact(h) => *h == host,
        HostRule::Suffix(suffix) => {
            host == *suffix || host.ends_with(&format!(".{suffix}"))
        }
    })
}
