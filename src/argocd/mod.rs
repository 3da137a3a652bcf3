//! # ArgoCD API Adapter
//!
//! The operations the dispatcher needs from the ArgoCD REST API, behind the
//! [`ArgoCdApi`] trait. [`ArgoCdClient`] implements it over HTTP.

use async_trait::async_trait;
use std::fmt;

pub mod client;

pub use client::ArgoCdClient;

/// Query parameters after allow-list filtering, keyed by snake_case name
pub type QueryParams = serde_json::Map<String, serde_json::Value>;

/// REST collection an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Applications,
    Projects,
    Repositories,
    /// Repositories holding write credentials (used by source hydration)
    WriteRepositories,
}

impl Endpoint {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Applications => "applications",
            Self::Projects => "projects",
            Self::Repositories => "repositories",
            Self::WriteRepositories => "write-repositories",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status and decoded body of an API response
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl ApiResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// ArgoCD answers 403 instead of 404 for objects the caller may not see
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self.status, 403 | 404)
    }
}

/// ArgoCD REST operations
///
/// An `Err` is a transport-level fault; HTTP error statuses are returned as
/// [`ApiResponse`] values.
#[async_trait]
pub trait ArgoCdApi: Send + Sync {
    async fn get(&self, endpoint: Endpoint, name: &str) -> anyhow::Result<ApiResponse>;

    async fn create(
        &self,
        endpoint: Endpoint,
        body: &serde_json::Value,
        query: &QueryParams,
    ) -> anyhow::Result<ApiResponse>;

    async fn update(
        &self,
        endpoint: Endpoint,
        name: &str,
        body: &serde_json::Value,
        query: &QueryParams,
    ) -> anyhow::Result<ApiResponse>;

    async fn delete(
        &self,
        endpoint: Endpoint,
        name: &str,
        query: &QueryParams,
    ) -> anyhow::Result<ApiResponse>;
}
