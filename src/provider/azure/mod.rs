//! # Azure Providers
//!
//! - `key_vault`: Azure Key Vault for secrets referenced by `secrets.azure`

pub mod key_vault;

pub use key_vault::AzureKeyVault;
