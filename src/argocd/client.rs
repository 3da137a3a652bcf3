//! ArgoCD REST client
//!
//! Native REST implementation of the `/api/v1` endpoints used for
//! applications, projects and repositories. Uses reqwest with rustls.
//!
//! References:
//! - [ArgoCD API docs](https://argo-cd.readthedocs.io/en/stable/developer-guide/api-docs/)

use super::{ApiResponse, ArgoCdApi, Endpoint, QueryParams};
use crate::config::{ArgoCdConfig, AuthStrategy};
use crate::constants::ARGOCD_API_PREFIX;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, Instrument};

/// ArgoCD REST client holding a bearer token
pub struct ArgoCdClient {
    http_client: Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for ArgoCdClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArgoCdClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Request body for `POST /api/v1/session`
#[derive(Debug, Serialize)]
struct SessionCreateRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// Response from `POST /api/v1/session`
#[derive(Debug, Deserialize)]
struct SessionResponse {
    token: String,
}

impl ArgoCdClient {
    /// Build the HTTP client and authenticate
    ///
    /// For session authentication the username/password are exchanged for a
    /// JWT once, up front.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built or the login fails.
    pub async fn connect(config: &ArgoCdConfig) -> Result<Self> {
        if !config.verify_ssl {
            info!("TLS certificate verification disabled for {}", config.server_url);
        }
        let http_client = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .context("Failed to build ArgoCD HTTP client")?;

        let token = match &config.auth {
            AuthStrategy::Token(token) => token.clone(),
            AuthStrategy::Session { username, password } => {
                Self::login(&http_client, &config.server_url, username, password).await?
            }
        };

        Ok(Self {
            http_client,
            base_url: config.server_url.clone(),
            token,
        })
    }

    async fn login(
        http_client: &Client,
        base_url: &str,
        username: &str,
        password: &str,
    ) -> Result<String> {
        info!("Logging in to ArgoCD as {}", username);
        let url = format!("{base_url}{ARGOCD_API_PREFIX}/session");
        let response = http_client
            .post(&url)
            .json(&SessionCreateRequest { username, password })
            .send()
            .await
            .context("Failed to reach ArgoCD session endpoint")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("ArgoCD login failed: {status} - {text}");
        }

        let session: SessionResponse = response
            .json()
            .await
            .context("Failed to parse ArgoCD session response")?;
        Ok(session.token)
    }

    async fn send(
        &self,
        method: Method,
        path: String,
        query: &QueryParams,
        body: Option<&serde_json::Value>,
    ) -> Result<ApiResponse> {
        let span = tracing::debug_span!(
            "argocd.request",
            http.method = %method,
            http.path = path.as_str(),
            http.status = tracing::field::Empty,
            operation.duration_ms = tracing::field::Empty,
        );
        let span_clone = span.clone();
        let start = Instant::now();

        async move {
            let url = format!("{}{}", self.base_url, path);
            let mut request = self
                .http_client
                .request(method.clone(), &url)
                .bearer_auth(&self.token);

            let pairs = query_pairs(query);
            if !pairs.is_empty() {
                request = request.query(&pairs);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request
                .send()
                .await
                .with_context(|| format!("{method} {path} failed"))?;
            let status = response.status().as_u16();
            let text = response
                .text()
                .await
                .with_context(|| format!("Failed to read response body of {method} {path}"))?;

            span_clone.record("http.status", status);
            span_clone.record(
                "operation.duration_ms",
                u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            );
            debug!("{} {} -> {}", method, path, status);

            Ok(ApiResponse {
                status,
                body: decode_body(&text),
            })
        }
        .instrument(span)
        .await
    }
}

#[async_trait]
impl ArgoCdApi for ArgoCdClient {
    async fn get(&self, endpoint: Endpoint, name: &str) -> Result<ApiResponse> {
        self.send(
            Method::GET,
            resource_path(endpoint, name),
            &QueryParams::new(),
            None,
        )
        .await
    }

    async fn create(
        &self,
        endpoint: Endpoint,
        body: &serde_json::Value,
        query: &QueryParams,
    ) -> Result<ApiResponse> {
        self.send(Method::POST, collection_path(endpoint), query, Some(body))
            .await
    }

    async fn update(
        &self,
        endpoint: Endpoint,
        name: &str,
        body: &serde_json::Value,
        query: &QueryParams,
    ) -> Result<ApiResponse> {
        self.send(Method::PUT, resource_path(endpoint, name), query, Some(body))
            .await
    }

    async fn delete(
        &self,
        endpoint: Endpoint,
        name: &str,
        query: &QueryParams,
    ) -> Result<ApiResponse> {
        self.send(Method::DELETE, resource_path(endpoint, name), query, None)
            .await
    }
}

/// `/api/v1/<endpoint>`
#[must_use]
pub fn collection_path(endpoint: Endpoint) -> String {
    format!("{ARGOCD_API_PREFIX}/{}", endpoint.as_str())
}

/// `/api/v1/<endpoint>/<name>` with the name percent-encoded
///
/// Repository names are URLs, so the whole name is one path segment.
#[must_use]
pub fn resource_path(endpoint: Endpoint, name: &str) -> String {
    format!("{}/{}", collection_path(endpoint), urlencoding::encode(name))
}

/// ArgoCD query keys are the camelCase form of the snake_case names
#[must_use]
pub fn query_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '_' {
            upper_next = !key.is_empty();
        } else if upper_next {
            key.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            key.push(c);
        }
    }
    key
}

/// Flatten query params into wire pairs
///
/// Lists repeat the key, nulls are dropped, objects are sent as JSON.
#[must_use]
pub fn query_pairs(query: &QueryParams) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(query.len());
    for (name, value) in query {
        let key = query_key(name);
        match value {
            serde_json::Value::Null => {}
            serde_json::Value::Array(items) => {
                pairs.extend(items.iter().filter_map(|item| {
                    scalar_text(item).map(|text| (key.clone(), text))
                }));
            }
            other => {
                if let Some(text) = scalar_text(other) {
                    pairs.push((key, text));
                }
            }
        }
    }
    pairs
}

fn scalar_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn decode_body(text: &str) -> serde_json::Value {
    if text.trim().is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::Value::String(text.to_string()))
}
