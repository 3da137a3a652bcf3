//! Common test utilities
//!
//! Provides rustls crypto provider setup, manifest trees on disk, a static
//! secret resolver and a recording ArgoCD API double.

#![allow(dead_code, reason = "each test binary uses a different subset of helpers")]

use argocd_apply::argocd::{ApiResponse, ArgoCdApi, Endpoint, QueryParams};
use argocd_apply::manifest::SecretRef;
use argocd_apply::provider::SecretResolver;
use argocd_apply::{ApplyError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` to ensure it's only called once across all tests.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        // Ignore the error when another test binary thread installed it first
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// A manifest and its body files in a temporary directory
pub struct ManifestTree {
    pub dir: tempfile::TempDir,
}

impl ManifestTree {
    pub fn new(manifest: &str) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        std::fs::write(dir.path().join("argocd.yaml"), manifest).expect("Failed to write manifest");
        Self { dir }
    }

    pub fn with_body(self, section: &str, name: &str, body: &str) -> Self {
        let section_dir = self.dir.path().join(section);
        std::fs::create_dir_all(&section_dir).expect("Failed to create section dir");
        std::fs::write(section_dir.join(format!("{name}.yaml")), body)
            .expect("Failed to write body");
        self
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.path().join("argocd.yaml")
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

/// Resolver that serves fixed values and records every reference it sees
#[derive(Default)]
pub struct StaticResolver {
    pub values: HashMap<String, String>,
    pub fail: bool,
    pub seen: Mutex<Vec<SecretRef>>,
}

impl StaticResolver {
    pub fn with(values: &[(&str, &str)]) -> Self {
        Self {
            values: values
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl SecretResolver for StaticResolver {
    async fn resolve(&self, secret_ref: &SecretRef) -> Result<HashMap<String, String>> {
        self.seen.lock().unwrap().push(secret_ref.clone());
        if self.fail {
            return Err(ApplyError::SecretBackend {
                backend: secret_ref.backend(),
                source: anyhow::anyhow!("401 Unauthorized"),
            });
        }
        let SecretRef::Azure(azure) = secret_ref else {
            return Ok(self.values.clone());
        };
        // Only the requested names that exist, like a real vault
        Ok(azure
            .secret_names
            .iter()
            .filter_map(|name| self.values.get(name).map(|v| (name.clone(), v.clone())))
            .collect())
    }
}

/// One recorded API call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Get(Endpoint, String),
    Create(Endpoint, serde_json::Value, QueryParams),
    Update(Endpoint, String, serde_json::Value, QueryParams),
    Delete(Endpoint, String, QueryParams),
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::Get(..))
    }
}

/// ArgoCD API double backed by a set of existing names
#[derive(Default)]
pub struct RecordingApi {
    pub existing: HashSet<String>,
    /// Status returned by mutating calls (defaults to 200)
    pub mutation_status: Option<u16>,
    /// Names whose existence probe fails at the transport level
    pub unreachable: HashSet<String>,
    /// Fail every mutating call at the transport level
    pub broken_mutations: bool,
    pub calls: Mutex<Vec<Call>>,
}

impl RecordingApi {
    pub fn with_existing(names: &[&str]) -> Self {
        Self {
            existing: names.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    fn mutation(&self, call: Call) -> anyhow::Result<ApiResponse> {
        self.calls.lock().unwrap().push(call);
        if self.broken_mutations {
            anyhow::bail!("connection reset by peer");
        }
        Ok(ApiResponse {
            status: self.mutation_status.unwrap_or(200),
            body: serde_json::json!({}),
        })
    }
}

#[async_trait]
impl ArgoCdApi for RecordingApi {
    async fn get(&self, endpoint: Endpoint, name: &str) -> anyhow::Result<ApiResponse> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Get(endpoint, name.to_string()));
        if self.unreachable.contains(name) {
            anyhow::bail!("dns error: failed to lookup address information");
        }
        let status = if self.existing.contains(name) { 200 } else { 404 };
        Ok(ApiResponse {
            status,
            body: serde_json::json!({}),
        })
    }

    async fn create(
        &self,
        endpoint: Endpoint,
        body: &serde_json::Value,
        query: &QueryParams,
    ) -> anyhow::Result<ApiResponse> {
        self.mutation(Call::Create(endpoint, body.clone(), query.clone()))
    }

    async fn update(
        &self,
        endpoint: Endpoint,
        name: &str,
        body: &serde_json::Value,
        query: &QueryParams,
    ) -> anyhow::Result<ApiResponse> {
        self.mutation(Call::Update(
            endpoint,
            name.to_string(),
            body.clone(),
            query.clone(),
        ))
    }

    async fn delete(
        &self,
        endpoint: Endpoint,
        name: &str,
        query: &QueryParams,
    ) -> anyhow::Result<ApiResponse> {
        self.mutation(Call::Delete(endpoint, name.to_string(), query.clone()))
    }
}
