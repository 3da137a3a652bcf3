//! # Errors
//!
//! Error taxonomy for manifest loading, secret resolution and dispatch.
//!
//! Provider and HTTP internals return `anyhow::Result` with context; they are
//! wrapped into [`ApplyError`] where they cross a module boundary.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApplyError {
    /// Manifest missing or malformed, unknown backend tag, unusable settings
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Secret store unreachable, unauthorized or client construction failed
    #[error("{backend} secret backend failed: {source:#}")]
    SecretBackend {
        backend: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// A single requested secret does not exist in the store
    #[error("secret '{name}' not found in {backend}")]
    SecretNotFound { backend: &'static str, name: String },

    /// Body file or rendered template is not valid YAML
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Transport-level failure of a create/update/delete call
    #[error("{method} on {kind} '{name}' failed: {source:#}")]
    ApiOperation {
        method: String,
        kind: String,
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ApplyError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

pub type Result<T, E = ApplyError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_backend_error_includes_cause_chain() {
        let source = anyhow::anyhow!("connection refused").context("Failed to get Azure secret");
        let err = ApplyError::SecretBackend {
            backend: "azure",
            source,
        };
        let message = err.to_string();
        assert!(message.starts_with("azure secret backend failed"));
        assert!(message.contains("connection refused"));
    }

    #[test]
    fn test_parse_error_names_the_file() {
        let source = serde_yaml::from_str::<serde_yaml::Value>("a: [1, 2").unwrap_err();
        let err = ApplyError::Parse {
            path: PathBuf::from("applications/web.yaml"),
            source,
        };
        assert!(err.to_string().contains("applications/web.yaml"));
    }
}
