//! # Constants
//!
//! Shared constants used throughout the tool.
//!
//! These values represent reasonable defaults and can be overridden via
//! command-line flags or environment variables where applicable.

/// Default delay between two dispatched resources (seconds)
/// Keeps a burst of manifest entries from overloading the ArgoCD API server
pub const DEFAULT_PACING_SECS: u64 = 2;

/// Default HTTP request timeout for ArgoCD API calls (seconds)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Prefix of every ArgoCD REST endpoint
pub const ARGOCD_API_PREFIX: &str = "/api/v1";

/// HTTP status codes treated as a successful apply
pub const SUCCESS_STATUS_CODES: [u16; 3] = [200, 201, 202];

/// Environment variable holding the ArgoCD server URL
pub const ENV_ARGOCD_URL: &str = "ARGOCD_URL";

/// Environment variable holding the ArgoCD bearer token
pub const ENV_ARGOCD_AUTH_TOKEN: &str = "ARGOCD_AUTH_TOKEN";

/// Environment variable toggling TLS verification (`true`/`false`)
pub const ENV_ARGOCD_VERIFY_SSL: &str = "ARGOCD_VERIFY_SSL";

/// Environment variable holding the ArgoCD username for session login
pub const ENV_ARGOCD_USERNAME: &str = "ARGOCD_USERNAME";

/// Environment variable holding the ArgoCD password for session login
pub const ENV_ARGOCD_PASSWORD: &str = "ARGOCD_PASSWORD";

/// Environment variable selecting the authentication strategy
pub const ENV_ARGOCD_AUTH_MODE: &str = "ARGOCD_AUTH_MODE";

/// Fallback Key Vault URL when a manifest entry omits `vault_url`
pub const ENV_AZURE_KEYVAULT_URL: &str = "AZURE_KEYVAULT_URL";

/// Set by the Azure workload identity webhook inside AKS pods
pub const ENV_AZURE_FEDERATED_TOKEN_FILE: &str = "AZURE_FEDERATED_TOKEN_FILE";

/// Terminal width used for separators when `COLUMNS` is not set
pub const DEFAULT_TERMINAL_WIDTH: usize = 80;
