//! # AWS Secrets Manager Client
//!
//! Legacy backend for manifests that reference `secrets.aws`.
//!
//! Credentials come from the AWS SDK default chain (environment, profile,
//! IRSA web identity, instance metadata). Each secret is expected to hold a
//! JSON object whose fields become substitution variables.

use crate::provider::SecretStore;
use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_secretsmanager::Client as SecretsManagerClient;
use std::time::Instant;
use tracing::{debug, info, Instrument};

/// AWS Secrets Manager provider implementation
pub struct AwsSecretsManager {
    client: SecretsManagerClient,
    region: String,
}

impl std::fmt::Debug for AwsSecretsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsSecretsManager")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl AwsSecretsManager {
    /// Create a Secrets Manager client for `region` using the default credential chain
    pub async fn new(region: &str) -> Self {
        info!("Creating AWS Secrets Manager client for region {}", region);
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;

        Self {
            client: SecretsManagerClient::new(&sdk_config),
            region: region.to_string(),
        }
    }
}

#[async_trait]
impl SecretStore for AwsSecretsManager {
    async fn get_secret_value(&self, secret_name: &str) -> Result<Option<String>> {
        let span = tracing::debug_span!(
            "aws.secret.get",
            secret.name = secret_name,
            region = self.region.as_str(),
            operation.found = tracing::field::Empty,
            operation.duration_ms = tracing::field::Empty,
        );
        let span_clone = span.clone();
        let start = Instant::now();

        async move {
            let result = match self
                .client
                .get_secret_value()
                .secret_id(secret_name)
                .send()
                .await
            {
                Ok(response) => {
                    let value = response
                        .secret_string()
                        .map(ToString::to_string)
                        .or_else(|| {
                            response
                                .secret_binary()
                                .map(|blob| String::from_utf8_lossy(blob.as_ref()).to_string())
                        });

                    match value {
                        Some(v) => Ok(Some(v)),
                        None => Err(anyhow::anyhow!(
                            "AWS secret {secret_name} has no string or binary value"
                        )),
                    }
                }
                Err(e) => {
                    let not_found = e
                        .as_service_error()
                        .is_some_and(|service_error| service_error.is_resource_not_found_exception());
                    if not_found {
                        debug!("AWS secret {} not found", secret_name);
                        Ok(None)
                    } else {
                        Err(anyhow::anyhow!(
                            "Failed to get AWS secret {secret_name}: {}",
                            aws_sdk_secretsmanager::error::DisplayErrorContext(&e)
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

pub mod secret_names {
    //! AWS Secrets Manager naming rules

    /// Names are 1-512 characters of letters, digits and `/_+=.@-`
    #[must_use]
    pub fn is_valid(name: &str) -> bool {
        !name.is_empty()
            && name.len() <= 512
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "/_+=.@-".contains(c))
    }
}

#[cfg(test)]
mod tests {
    use super::secret_names;

    #[test]
    fn test_aws_secret_name_validation() {
        let valid_names = vec![
            "my-secret",
            "argocd/repo/credentials",
            "my_secret_123",
            "my+secret=test",
            "my.secret@test",
        ];

        for name in valid_names {
            assert!(secret_names::is_valid(name), "Secret name {name} should be valid");
        }
        assert!(!secret_names::is_valid(""));
        assert!(!secret_names::is_valid("has space"));
        assert!(!secret_names::is_valid(&"a".repeat(513)));
    }
}
