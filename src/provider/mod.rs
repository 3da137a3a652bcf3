//! # Secret Providers
//!
//! Resolve the secrets a manifest entry references into a name → value map.
//!
//! Each backend implements [`SecretStore`]; [`CloudSecretResolver`] picks the
//! backend from the manifest's [`SecretRef`] and applies the shared semantics:
//! a missing secret is logged and skipped, any other store failure is fatal.

use crate::error::{ApplyError, Result};
use crate::manifest::{AwsSecretLocator, AzureSecretRef, SecretRef};
use async_trait::async_trait;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::future::Future;
use tracing::{debug, info, warn};

pub mod aws;
pub mod azure;

pub use aws::AwsSecretsManager;
pub use azure::AzureKeyVault;

/// Read access to a cloud secret store
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Get the latest secret value, `None` when the secret does not exist
    async fn get_secret_value(&self, secret_name: &str) -> anyhow::Result<Option<String>>;
}

/// Turns a manifest secret reference into substitution variables
#[async_trait]
pub trait SecretResolver: Send + Sync {
    /// # Errors
    /// Returns [`ApplyError::SecretBackend`] when the store cannot be reached
    /// or the credentials are rejected.
    async fn resolve(&self, secret_ref: &SecretRef) -> Result<HashMap<String, String>>;
}

/// Resolver backed by Azure Key Vault and AWS Secrets Manager
#[derive(Debug, Default, Clone, Copy)]
pub struct CloudSecretResolver;

#[async_trait]
impl SecretResolver for CloudSecretResolver {
    async fn resolve(&self, secret_ref: &SecretRef) -> Result<HashMap<String, String>> {
        match secret_ref {
            SecretRef::Azure(azure) => resolve_azure(azure).await,
            SecretRef::Aws(locators) => resolve_aws(locators).await,
        }
    }
}

async fn resolve_azure(config: &AzureSecretRef) -> Result<HashMap<String, String>> {
    let vault = AzureKeyVault::new(config).map_err(|source| ApplyError::SecretBackend {
        backend: "azure",
        source,
    })?;
    fetch_named_secrets(&vault, "azure", &config.secret_names).await
}

async fn resolve_aws(locators: &[AwsSecretLocator]) -> Result<HashMap<String, String>> {
    resolve_per_region(locators, |region| async move {
        AwsSecretsManager::new(&region).await
    })
    .await
}

/// Resolve AWS locators with one store per region, built on first use
async fn resolve_per_region<S, F, Fut>(
    locators: &[AwsSecretLocator],
    mut connect: F,
) -> Result<HashMap<String, String>>
where
    S: SecretStore,
    F: FnMut(String) -> Fut + Send,
    Fut: Future<Output = S> + Send,
{
    let mut resolved = HashMap::new();
    let mut stores: HashMap<&str, S> = HashMap::new();

    for locator in locators {
        if !aws::secret_names::is_valid(&locator.name) {
            return Err(ApplyError::config(format!(
                "invalid AWS secret name '{}'",
                locator.name
            )));
        }
        let store = match stores.entry(locator.region.as_str()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(connect(locator.region.clone()).await),
        };

        let fetched =
            fetch_named_secrets(&*store, "aws", std::slice::from_ref(&locator.name)).await?;
        for (name, value) in fetched {
            resolved.extend(expand_json_secret(&name, &value));
        }
    }

    Ok(resolved)
}

/// Fetch each name from `store`, skipping the ones that do not exist
///
/// # Errors
/// Returns [`ApplyError::SecretBackend`] on the first store failure.
pub async fn fetch_named_secrets(
    store: &dyn SecretStore,
    backend: &'static str,
    names: &[String],
) -> Result<HashMap<String, String>> {
    let mut secrets = HashMap::with_capacity(names.len());

    for name in names {
        match store.get_secret_value(name).await {
            Ok(Some(value)) => {
                info!("Secret '{}' retrieved from {}", name, backend);
                secrets.insert(name.clone(), value);
            }
            Ok(None) => {
                let missing = ApplyError::SecretNotFound {
                    backend,
                    name: name.clone(),
                };
                warn!("{}, continuing without it", missing);
            }
            Err(source) => return Err(ApplyError::SecretBackend { backend, source }),
        }
    }

    debug!(
        "Resolved {} of {} {} secrets",
        secrets.len(),
        names.len(),
        backend
    );
    Ok(secrets)
}

/// Flatten a JSON object secret into variables
///
/// Values that are not JSON objects are exposed under the secret's own name.
#[must_use]
pub fn expand_json_secret(name: &str, value: &str) -> HashMap<String, String> {
    match serde_json::from_str::<serde_json::Value>(value) {
        Ok(serde_json::Value::Object(fields)) => fields
            .into_iter()
            .map(|(key, field)| {
                let text = match field {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, text)
            })
            .collect(),
        _ => HashMap::from([(name.to_string(), value.to_string())]),
    }
}
