//! # Manifest
//!
//! The top-level manifest enumerates resources per section and declares how
//! each one is reconciled. The loader turns it into rendered resource bodies.
//!
//! ```yaml
//! applications:
//!   guestbook:
//!     enabled: true
//!     method: create
//!     secrets:
//!       azure:
//!         vault_url: https://platform-kv.vault.azure.net/
//!         secret_names: [GUESTBOOK_DB_PASSWORD]
//!   legacy-api:
//!     enabled: false
//! ```

pub mod loader;
pub mod types;

pub use loader::{ManifestLoader, ResourceBody};
pub use types::{
    AwsSecretLocator, AzureSecretRef, Manifest, Method, ResourceDeclaration, ResourceKind,
    SecretRef, SecretsDeclaration,
};
