//! # argocd-apply
//!
//! Applies ArgoCD applications, projects and repositories described by a YAML
//! manifest.
//!
//! A manifest section lists resources with the method used to reconcile them
//! (`create`, `update`, `delete`; disabled resources are deleted). Each
//! resource has a body file that may reference secrets from Azure Key Vault or
//! AWS Secrets Manager as `${NAME}` placeholders. The loader renders the
//! bodies and the dispatcher calls the ArgoCD REST API for each one in order.
//!
//! ```text
//! deploy/
//! ├── argocd.yaml            # manifest
//! ├── applications/
//! │   └── guestbook.yaml     # body for applications.guestbook
//! └── repositories/
//!     └── charts.yaml
//! ```

pub mod argocd;
pub mod config;
pub mod constants;
pub mod dispatcher;
pub mod error;
pub mod manifest;
pub mod provider;
pub mod template;

pub use error::{ApplyError, Result};
