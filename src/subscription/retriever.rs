//! Subscription retriever for fetching link lists from remote sources
//!
//! This module provides functionality for:
//! - Fetching a subscription body over HTTP, optionally through a proxy
//! - Detecting base64-wrapped bodies and falling back to plain text
//! - Splitting the body into trimmed, non-empty link lines

use crate::error::{Error, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use reqwest::header::USER_AGENT;
use reqwest::{Client, Method, Proxy as ReqwestProxy};
use std::time::Duration;
use url::Url;

/// Default timeout for HTTP requests in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default user agent for HTTP requests
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Source of subscription link lists
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Fetch `url` and return its links in order of appearance
    async fn fetch(
        &self,
        url: &str,
        user_agent: Option<&str>,
        proxy: Option<&str>,
    ) -> Result<Vec<String>>;
}

/// Configuration for the HTTP retriever
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Timeout for each request
    pub timeout: Duration,
    /// User agent sent when the caller gives none
    pub default_user_agent: String,
    /// HTTP method used for the request
    pub method: Method,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            default_user_agent: DEFAULT_USER_AGENT.to_string(),
            method: Method::GET,
        }
    }
}

impl RetrieverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.default_user_agent = user_agent;
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }
}

/// reqwest-backed retriever
#[derive(Debug, Clone, Default)]
pub struct HttpRetriever {
    config: RetrieverConfig,
}

impl HttpRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RetrieverConfig) -> Self {
        Self { config }
    }

    /// Create a reqwest client, routed through `proxy` when given
    fn create_client(&self, proxy: Option<&str>) -> reqwest::Result<Client> {
        let mut builder = Client::builder()
            .timeout(self.config.timeout)
            .user_agent(&self.config.default_user_agent);

        if let Some(proxy_url) = proxy {
            builder = builder.proxy(ReqwestProxy::all(proxy_url)?);
        }

        builder.build()
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    async fn fetch(
        &self,
        url: &str,
        user_agent: Option<&str>,
        proxy: Option<&str>,
    ) -> Result<Vec<String>> {
        let parsed = Url::parse(url).map_err(|source| Error::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        let transport = |source: reqwest::Error| Error::Transport {
            url: url.to_string(),
            source,
        };

        let client = self.create_client(proxy).map_err(transport)?;
        let mut request = client.request(self.config.method.clone(), parsed);
        if let Some(agent) = user_agent.filter(|a| !a.is_empty()) {
            request = request.header(USER_AGENT, agent);
        }

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::RemoteStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(transport)?;
        Ok(split_links(&decode_body(&body)))
    }
}

/// Decode a subscription body that may or may not be base64.
///
/// Whitespace inside the body is ignored, so line-wrapped base64 decodes.
/// A body that fails to decode (or decodes to non UTF-8 bytes) is returned
/// unchanged.
pub fn decode_body(body: &str) -> String {
    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let decoded = STANDARD
        .decode(&compact)
        .or_else(|_| STANDARD_NO_PAD.decode(&compact))
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok());

    match decoded {
        Some(text) => text,
        None => {
            tracing::debug!("body is not base64, parsing it as plain text");
            body.to_string()
        }
    }
}

/// Split content into trimmed lines, dropping blank ones
pub fn split_links(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}
