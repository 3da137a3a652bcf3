//! Query parameter allow-lists per resource kind and method.
//!
//! Body files may carry a `query_params` mapping; only the names the ArgoCD
//! endpoint accepts for the given verb are forwarded.

use crate::argocd::QueryParams;
use crate::manifest::{Method, ResourceKind};
use tracing::debug;

/// Names accepted for `(kind, method)`
#[must_use]
pub fn allowed_query_params(kind: ResourceKind, method: Method) -> &'static [&'static str] {
    match (kind, method) {
        (ResourceKind::Application, Method::Create) => &["upsert", "validate"],
        (ResourceKind::Application, Method::Update) => &["validate", "project"],
        (ResourceKind::Application, Method::Delete) => &[
            "name",
            "cascade",
            "propagation_policy",
            "app_namespace",
            "project",
        ],
        (ResourceKind::Repository, Method::Create) => &["upsert", "creds_only"],
        (ResourceKind::Repository, Method::Delete) => &["force_refresh", "app_project"],
        // Project upsert travels in the request body
        (ResourceKind::Project, _) | (ResourceKind::Repository, Method::Update) => &[],
    }
}

/// Keep the allow-listed subset of `params`, values unchanged
#[must_use]
pub fn filter_query_params(kind: ResourceKind, method: Method, params: &QueryParams) -> QueryParams {
    let allowed = allowed_query_params(kind, method);
    params
        .iter()
        .filter(|(name, _)| {
            let keep = allowed.contains(&name.as_str());
            if !keep {
                debug!("Dropping query param '{}' not accepted for {} {}", name, method, kind);
            }
            keep
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}
