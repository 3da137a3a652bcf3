//! # Azure Key Vault Client
//!
//! Client for reading secrets from Azure Key Vault.
//!
//! This module provides functionality to:
//! - Retrieve the latest version of a secret
//! - Authenticate with an explicit service principal from the manifest, or
//!   with Workload Identity / Managed Identity when none is given

use crate::constants::{ENV_AZURE_FEDERATED_TOKEN_FILE, ENV_AZURE_KEYVAULT_URL};
use crate::manifest::AzureSecretRef;
use crate::provider::SecretStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use azure_core::credentials::{Secret, TokenCredential};
use azure_identity::{ClientSecretCredential, ManagedIdentityCredential, WorkloadIdentityCredential};
use azure_security_keyvault_secrets::SecretClient;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, Instrument};

/// Azure Key Vault provider implementation
pub struct AzureKeyVault {
    client: SecretClient,
    vault_url: String,
}

impl std::fmt::Debug for AzureKeyVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureKeyVault")
            .field("vault_url", &self.vault_url)
            .finish_non_exhaustive()
    }
}

/// Build the vault URL from a vault name or pass a full URL through
#[must_use]
pub fn vault_url_for(vault: &str) -> String {
    if vault.starts_with("https://") || vault.starts_with("http://") {
        vault.to_string()
    } else {
        format!("https://{vault}.vault.azure.net/")
    }
}

impl AzureKeyVault {
    /// Create a new Azure Key Vault client
    ///
    /// # Errors
    /// Returns an error if no vault URL is configured or the credential or
    /// client cannot be constructed.
    pub fn new(config: &AzureSecretRef) -> Result<Self> {
        let vault = config
            .vault_url
            .clone()
            .or_else(|| std::env::var(ENV_AZURE_KEYVAULT_URL).ok())
            .filter(|v| !v.is_empty())
            .with_context(|| {
                format!("No vault_url in manifest and {ENV_AZURE_KEYVAULT_URL} is not set")
            })?;
        let vault_url = vault_url_for(&vault);

        let credential: Arc<dyn TokenCredential> = match config.client_credentials() {
            Some((tenant_id, client_id, client_secret)) => {
                info!(
                    "Using Azure service principal authentication with client ID: {}",
                    client_id
                );
                ClientSecretCredential::new(
                    tenant_id,
                    client_id.to_string(),
                    Secret::new(client_secret.to_string()),
                    None,
                )
                .context("Failed to create ClientSecretCredential")?
            }
            None if std::env::var(ENV_AZURE_FEDERATED_TOKEN_FILE).is_ok() => {
                info!("Using Azure Workload Identity authentication");
                WorkloadIdentityCredential::new(None)
                    .context("Failed to create WorkloadIdentityCredential")?
            }
            None => {
                // Works automatically in Azure environments (AKS, VMs, App Service)
                info!("No client credentials specified, using Managed Identity");
                ManagedIdentityCredential::new(None)
                    .context("Failed to create ManagedIdentityCredential")?
            }
        };

        let client = SecretClient::new(&vault_url, credential, None)
            .context("Failed to create Azure Key Vault SecretClient")?;

        Ok(Self { client, vault_url })
    }
}

#[async_trait]
impl SecretStore for AzureKeyVault {
    async fn get_secret_value(&self, secret_name: &str) -> Result<Option<String>> {
        let span = tracing::debug_span!(
            "azure.keyvault.secret.get",
            secret.name = secret_name,
            vault.url = self.vault_url.as_str(),
            operation.found = tracing::field::Empty,
            operation.duration_ms = tracing::field::Empty,
        );
        let span_clone = span.clone();
        let start = Instant::now();

        async move {
            // No version parameter: the latest version is returned
            let result = match self.client.get_secret(secret_name, None).await {
                Ok(response) => {
                    use azure_security_keyvault_secrets::models::Secret;
                    let secret = serde_json::from_slice::<Secret>(&response.into_body())
                        .context("Failed to deserialize Azure secret response")?;
                    Ok(secret.value)
                }
                Err(e) => {
                    let error_msg = e.to_string();
                    if error_msg.contains("SecretNotFound")
                        || error_msg.contains("404")
                        || error_msg.contains("not found")
                    {
                        debug!("Azure secret {} not found", secret_name);
                        Ok(None)
                    } else {
                        Err(anyhow::anyhow!(
                            "Failed to get Azure secret {secret_name}: {e}"
                        ))
                    }
                }
            };

            if let Ok(value) = &result {
                span_clone.record("operation.found", value.is_some());
            }
            span_clone.record(
                "operation.duration_ms",
                u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            );
            result
        }
        .instrument(span)
        .await
    }
}
