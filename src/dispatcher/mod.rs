//! # Reconciliation Dispatcher
//!
//! Applies loaded resource bodies to ArgoCD, one at a time and in manifest
//! order:
//!
//! 1. Pop `query_params` and the kind-specific fields from the body
//! 2. Probe whether the resource exists (a failed probe counts as absent)
//! 3. Skip deletes of resources that do not exist
//! 4. Filter query params to what the endpoint accepts for the method
//! 5. Call create/update/delete and record the status
//!
//! Transport failures of create/update/delete abort the run. Unknown methods
//! and bodies without a name only invalidate their own resource.

pub mod query_params;
pub mod report;

pub use query_params::{allowed_query_params, filter_query_params};
pub use report::{DispatchOutcome, DispatchResult, RunOutcome, RunSummary};

use crate::argocd::{ApiResponse, ArgoCdApi, Endpoint, QueryParams};
use crate::constants::DEFAULT_PACING_SECS;
use crate::error::{ApplyError, Result};
use crate::manifest::{Method, ResourceBody, ResourceKind};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// A body shaped for its endpoint
#[derive(Debug, Clone, PartialEq)]
struct PreparedCall {
    endpoint: Endpoint,
    /// Remote name: `metadata.name`, or `spec.repo` for repositories
    remote_name: String,
    /// Body sent on create
    create_body: Value,
    /// Body sent on update
    update_body: Value,
}

/// Drives an [`ArgoCdApi`] over the resources of one kind
pub struct Dispatcher<'a> {
    client: &'a dyn ArgoCdApi,
    kind: ResourceKind,
    pacing: Duration,
    print: bool,
}

impl std::fmt::Debug for Dispatcher<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("kind", &self.kind)
            .field("pacing", &self.pacing)
            .finish_non_exhaustive()
    }
}

impl<'a> Dispatcher<'a> {
    #[must_use]
    pub fn new(client: &'a dyn ArgoCdApi, kind: ResourceKind) -> Self {
        Self {
            client,
            kind,
            pacing: Duration::from_secs(DEFAULT_PACING_SECS),
            print: true,
        }
    }

    /// Delay between two dispatched resources
    #[must_use]
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Toggle terminal status lines
    #[must_use]
    pub fn with_output(mut self, print: bool) -> Self {
        self.print = print;
        self
    }

    /// Reconcile every resource in order
    ///
    /// # Errors
    /// Returns [`ApplyError::ApiOperation`] when a create/update/delete call
    /// fails at the transport level; remaining resources are not processed.
    pub async fn run(&self, resources: Vec<ResourceBody>) -> Result<Vec<DispatchResult>> {
        let total = resources.len();
        let mut results = Vec::with_capacity(total);

        for (index, resource) in resources.into_iter().enumerate() {
            let result = self.dispatch(resource).await?;
            if self.print {
                report::print_result(&result);
            }

            let called = result.status.is_some();
            results.push(result);
            if called && index + 1 < total && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
        }

        let summary = RunSummary::from_results(&results);
        info!("{} run finished: {}", self.kind, summary);
        Ok(results)
    }

    async fn dispatch(&self, resource: ResourceBody) -> Result<DispatchResult> {
        let ResourceBody {
            name,
            method: method_name,
            document,
            ..
        } = resource;
        let kind = self.kind;

        let parsed = method_name
            .as_deref()
            .ok_or_else(|| "no method declared".to_string())
            .and_then(str::parse::<Method>);
        let method = match parsed {
            Ok(method) => method,
            Err(reason) => {
                error!("{} {}: {}", kind, name, reason);
                return Ok(DispatchResult::without_call(
                    kind,
                    &name,
                    method_name.as_deref(),
                    DispatchOutcome::Invalid(reason),
                ));
            }
        };

        let Value::Object(mut document) = document else {
            return Ok(DispatchResult::without_call(
                kind,
                &name,
                Some(method.as_str()),
                DispatchOutcome::Invalid("body is not a mapping".to_string()),
            ));
        };
        let query = take_query_params(&mut document);

        let call = match prepare(kind, document) {
            Ok(call) => call,
            Err(reason) => {
                error!("{} {}: {}", kind, name, reason);
                return Ok(DispatchResult::without_call(
                    kind,
                    &name,
                    Some(method.as_str()),
                    DispatchOutcome::Invalid(reason),
                ));
            }
        };

        let exists = self.exists(call.endpoint, &call.remote_name).await;
        if method == Method::Delete && !exists {
            info!("{} {} does not exist, nothing to delete", kind, name);
            return Ok(DispatchResult::without_call(
                kind,
                &name,
                Some(method.as_str()),
                DispatchOutcome::Skipped,
            ));
        }

        let query = filter_query_params(kind, method, &query);
        debug!(
            "{} {} {} on {} with {} query params",
            method,
            kind,
            name,
            call.endpoint,
            query.len()
        );

        let response = self
            .call(method, &call, &query)
            .await
            .map_err(|source| ApplyError::ApiOperation {
                method: method.to_string(),
                kind: kind.to_string(),
                name: name.clone(),
                source,
            })?;

        if !response.is_success() {
            warn!(
                "{} {} {} returned {}: {}",
                method, kind, name, response.status, response.body
            );
        }
        Ok(DispatchResult::from_status(
            kind,
            &name,
            method.as_str(),
            response.status,
        ))
    }

    async fn exists(&self, endpoint: Endpoint, remote_name: &str) -> bool {
        match self.client.get(endpoint, remote_name).await {
            Ok(response) if response.is_success() => true,
            Ok(response) if response.is_not_found() => {
                info!("{} {} not found", self.kind, remote_name);
                false
            }
            Ok(response) => {
                warn!(
                    "Existence check for {} {} returned {}, assuming absent",
                    self.kind, remote_name, response.status
                );
                false
            }
            Err(e) => {
                warn!(
                    "Existence check for {} {} failed, assuming absent: {:#}",
                    self.kind, remote_name, e
                );
                false
            }
        }
    }

    async fn call(
        &self,
        method: Method,
        call: &PreparedCall,
        query: &QueryParams,
    ) -> anyhow::Result<ApiResponse> {
        match method {
            Method::Create => self.client.create(call.endpoint, &call.create_body, query).await,
            Method::Update => {
                self.client
                    .update(call.endpoint, &call.remote_name, &call.update_body, query)
                    .await
            }
            Method::Delete => {
                self.client
                    .delete(call.endpoint, &call.remote_name, query)
                    .await
            }
        }
    }
}

fn take_query_params(document: &mut Map<String, Value>) -> QueryParams {
    match document.remove("query_params") {
        Some(Value::Object(params)) => params,
        Some(Value::Null) | None => QueryParams::new(),
        Some(other) => {
            warn!("Ignoring query_params that is not a mapping: {}", other);
            QueryParams::new()
        }
    }
}

fn metadata_name(document: &Map<String, Value>) -> std::result::Result<String, String> {
    document
        .get("metadata")
        .and_then(|metadata| metadata.get("name"))
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| "body has no metadata.name".to_string())
}

/// Shape the body for the kind's endpoint
fn prepare(
    kind: ResourceKind,
    mut document: Map<String, Value>,
) -> std::result::Result<PreparedCall, String> {
    match kind {
        ResourceKind::Application => {
            let remote_name = metadata_name(&document)?;
            let body = Value::Object(document);
            Ok(PreparedCall {
                endpoint: Endpoint::Applications,
                remote_name,
                create_body: body.clone(),
                update_body: body,
            })
        }
        ResourceKind::Project => {
            let upsert = match document.remove("upsert") {
                None | Some(Value::Null) => false,
                Some(Value::Bool(flag)) => flag,
                Some(other) => return Err(format!("upsert must be a boolean, got {other}")),
            };
            let remote_name = metadata_name(&document)?;
            let project = Value::Object(document);
            Ok(PreparedCall {
                endpoint: Endpoint::Projects,
                remote_name,
                create_body: json!({ "project": project, "upsert": upsert }),
                update_body: json!({ "project": project }),
            })
        }
        ResourceKind::Repository => {
            let write = match document.remove("permission") {
                None | Some(Value::Null) => false,
                Some(Value::String(permission)) => match permission.as_str() {
                    "write" => true,
                    "read" => false,
                    other => return Err(format!("permission must be 'read' or 'write', got '{other}'")),
                },
                Some(other) => return Err(format!("permission must be a string, got {other}")),
            };
            let spec = match document.remove("spec") {
                Some(spec @ Value::Object(_)) => spec,
                _ => return Err("body has no spec mapping".to_string()),
            };
            let remote_name = spec
                .get("repo")
                .and_then(Value::as_str)
                .filter(|repo| !repo.is_empty())
                .map(ToString::to_string)
                .ok_or_else(|| "body has no spec.repo".to_string())?;
            Ok(PreparedCall {
                endpoint: if write {
                    Endpoint::WriteRepositories
                } else {
                    Endpoint::Repositories
                },
                remote_name,
                create_body: spec.clone(),
                update_body: spec,
            })
        }
    }
}
