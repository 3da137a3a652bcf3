//! Manifest data model: resource kinds, methods, declarations and secret references.

use crate::error::{ApplyError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Kind of ArgoCD resource a manifest section describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Application,
    Project,
    Repository,
}

impl ResourceKind {
    /// Manifest section and body directory used when none is given
    #[must_use]
    pub fn default_section(self) -> &'static str {
        match self {
            Self::Application => "applications",
            Self::Project => "projects",
            Self::Repository => "repositories",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::Project => "project",
            Self::Repository => "repository",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reconciliation verb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Create,
    Update,
    Delete,
}

impl Method {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(format!("invalid method name '{other}'")),
        }
    }
}

/// One entry of a manifest section
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDeclaration {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Kept as text so an unknown verb only invalidates this resource
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub secrets: Option<SecretsDeclaration>,
}

fn default_enabled() -> bool {
    true
}

impl ResourceDeclaration {
    /// Declared method, or `delete` for a disabled resource
    ///
    /// `None` when an enabled resource declares no method.
    #[must_use]
    pub fn effective_method(&self) -> Option<String> {
        if self.enabled {
            self.method.clone()
        } else {
            Some(Method::Delete.as_str().to_string())
        }
    }
}

/// Raw `secrets:` block, validated by [`SecretsDeclaration::secret_ref`]
#[derive(Debug, Clone, Deserialize)]
pub struct SecretsDeclaration {
    #[serde(default)]
    pub azure: Option<AzureSecretRef>,
    #[serde(default)]
    pub aws: Option<AwsSecretRefs>,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_yaml::Value>,
}

impl SecretsDeclaration {
    /// Select the backend; Azure wins when both are declared
    ///
    /// # Errors
    /// Returns a configuration error when neither `azure` nor `aws` is set.
    pub fn secret_ref(&self) -> Result<SecretRef> {
        if let Some(azure) = &self.azure {
            return Ok(SecretRef::Azure(azure.clone()));
        }
        if let Some(aws) = &self.aws {
            return Ok(SecretRef::Aws(aws.clone().into_vec()));
        }
        let tags: Vec<&str> = self.other.keys().map(String::as_str).collect();
        Err(ApplyError::config(if tags.is_empty() {
            "secrets block declares no backend (expected 'azure' or 'aws')".to_string()
        } else {
            format!(
                "unsupported secret backend '{}' (expected 'azure' or 'aws')",
                tags.join("', '")
            )
        }))
    }
}

/// A resolved choice of secret backend with its locator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretRef {
    Azure(AzureSecretRef),
    Aws(Vec<AwsSecretLocator>),
}

impl SecretRef {
    #[must_use]
    pub fn backend(&self) -> &'static str {
        match self {
            Self::Azure(_) => "azure",
            Self::Aws(_) => "aws",
        }
    }
}

/// Azure Key Vault locator
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct AzureSecretRef {
    #[serde(default)]
    pub vault_url: Option<String>,
    #[serde(default)]
    pub secret_names: Vec<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

impl fmt::Debug for AzureSecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureSecretRef")
            .field("vault_url", &self.vault_url)
            .field("secret_names", &self.secret_names)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("tenant_id", &self.tenant_id)
            .finish()
    }
}

impl AzureSecretRef {
    /// Explicit service principal credentials, only when all three are set
    #[must_use]
    pub fn client_credentials(&self) -> Option<(&str, &str, &str)> {
        match (&self.tenant_id, &self.client_id, &self.client_secret) {
            (Some(tenant), Some(client), Some(secret)) => {
                Some((tenant.as_str(), client.as_str(), secret.as_str()))
            }
            _ => None,
        }
    }
}

/// AWS Secrets Manager locator
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AwsSecretLocator {
    pub region: String,
    pub name: String,
}

/// `aws:` accepts one locator or a list of them
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AwsSecretRefs {
    One(AwsSecretLocator),
    Many(Vec<AwsSecretLocator>),
}

impl AwsSecretRefs {
    #[must_use]
    pub fn into_vec(self) -> Vec<AwsSecretLocator> {
        match self {
            Self::One(locator) => vec![locator],
            Self::Many(locators) => locators,
        }
    }
}

/// Parsed top-level manifest
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    sections: serde_yaml::Mapping,
}

impl Manifest {
    /// Read and parse a manifest file
    ///
    /// # Errors
    /// Returns a configuration error when the file is missing, unreadable or
    /// not a YAML mapping.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ApplyError::config(format!("failed to read manifest {}: {e}", path.display()))
        })?;
        Self::parse(&content, path)
    }

    /// Parse manifest text; `path` anchors the body directories
    ///
    /// # Errors
    /// Returns a configuration error when the text is not a YAML mapping.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(content).map_err(|e| {
            ApplyError::config(format!("malformed manifest {}: {e}", path.display()))
        })?;
        let sections = match value {
            serde_yaml::Value::Mapping(map) => map,
            serde_yaml::Value::Null => serde_yaml::Mapping::new(),
            _ => {
                return Err(ApplyError::config(format!(
                    "manifest {} must be a mapping of sections",
                    path.display()
                )))
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            sections,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory the per-section body directories live in
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Declarations of one section, in manifest order
    ///
    /// An absent or empty section yields no declarations.
    ///
    /// # Errors
    /// Returns a configuration error when the section is not a mapping or an
    /// entry does not match the declaration schema.
    pub fn declarations(&self, section: &str) -> Result<Vec<(String, ResourceDeclaration)>> {
        let entries = match self.sections.get(section) {
            None | Some(serde_yaml::Value::Null) => return Ok(Vec::new()),
            Some(serde_yaml::Value::Mapping(entries)) => entries,
            Some(_) => {
                return Err(ApplyError::config(format!(
                    "section '{section}' in {} must be a mapping of resource names",
                    self.path.display()
                )))
            }
        };

        entries
            .iter()
            .map(|(key, value)| {
                let name = match key {
                    serde_yaml::Value::String(name) => name.clone(),
                    other => serde_yaml::to_string(other)
                        .map(|s| s.trim_end().to_string())
                        .map_err(|e| ApplyError::config(format!("invalid resource name: {e}")))?,
                };
                let declaration: ResourceDeclaration = serde_yaml::from_value(value.clone())
                    .map_err(|e| {
                        ApplyError::config(format!(
                            "invalid declaration for {section}/{name}: {e}"
                        ))
                    })?;
                Ok((name, declaration))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(text: &str) -> Manifest {
        Manifest::parse(text, Path::new("/deploy/argocd.yaml")).unwrap()
    }

    #[test]
    fn test_disabled_resource_is_deleted_regardless_of_method() {
        let m = manifest(
            "applications:\n  a: {enabled: false, method: create}\n  b: {enabled: false, method: update}\n  c: {enabled: false}\n",
        );
        for (name, decl) in m.declarations("applications").unwrap() {
            assert_eq!(decl.effective_method().as_deref(), Some("delete"), "resource {name}");
        }
    }

    #[test]
    fn test_enabled_resource_keeps_declared_method() {
        let m = manifest("applications:\n  a: {enabled: true, method: update}\n  b: {method: create}\n");
        let decls = m.declarations("applications").unwrap();
        assert_eq!(decls[0].1.effective_method().as_deref(), Some("update"));
        assert_eq!(decls[1].1.effective_method().as_deref(), Some("create"));
    }

    #[test]
    fn test_enabled_resource_without_method_has_none() {
        let m = manifest("applications:\n  a: {enabled: true}\n  b: {}\n");
        for (name, decl) in m.declarations("applications").unwrap() {
            assert_eq!(decl.effective_method(), None, "resource {name}");
        }
    }

    #[test]
    fn test_declarations_preserve_manifest_order() {
        let m = manifest(
            "repositories:\n  zeta: {enabled: true, method: create}\n  alpha: {enabled: true, method: create}\n  mid: {enabled: true, method: create}\n",
        );
        let names: Vec<String> = m
            .declarations("repositories")
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_missing_section_is_empty() {
        let m = manifest("projects:\n  p: {enabled: true, method: create}\n");
        assert!(m.declarations("applications").unwrap().is_empty());
        assert!(manifest("").declarations("projects").unwrap().is_empty());
    }

    #[test]
    fn test_section_must_be_mapping() {
        let m = manifest("applications: [a, b]\n");
        assert!(matches!(
            m.declarations("applications"),
            Err(ApplyError::Configuration(_))
        ));
    }

    #[test]
    fn test_malformed_manifest_is_configuration_error() {
        let err = Manifest::parse("applications: {a: [", Path::new("m.yaml")).unwrap_err();
        assert!(matches!(err, ApplyError::Configuration(_)));
    }

    #[test]
    fn test_base_dir_is_manifest_parent() {
        assert_eq!(manifest("").base_dir(), Path::new("/deploy"));
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("create".parse::<Method>(), Ok(Method::Create));
        assert_eq!("delete".parse::<Method>(), Ok(Method::Delete));
        assert!("patch".parse::<Method>().unwrap_err().contains("patch"));
        assert!("".parse::<Method>().is_err());
    }

    #[test]
    fn test_azure_secret_ref_wins_over_aws() {
        let decl: SecretsDeclaration = serde_yaml::from_str(
            "azure:\n  vault_url: https://kv.vault.azure.net/\n  secret_names: [A, B]\naws:\n  region: us-east-1\n  name: legacy\n",
        )
        .unwrap();
        match decl.secret_ref().unwrap() {
            SecretRef::Azure(azure) => {
                assert_eq!(azure.secret_names, vec!["A", "B"]);
                assert!(azure.client_credentials().is_none());
            }
            other => panic!("Expected Azure secret ref, got {other:?}"),
        }
    }

    #[test]
    fn test_aws_secret_ref_single_and_list() {
        let single: SecretsDeclaration =
            serde_yaml::from_str("aws:\n  region: eu-west-1\n  name: argocd/repo\n").unwrap();
        let list: SecretsDeclaration = serde_yaml::from_str(
            "aws:\n  - {region: eu-west-1, name: one}\n  - {region: us-east-1, name: two}\n",
        )
        .unwrap();
        assert_eq!(
            single.secret_ref().unwrap(),
            SecretRef::Aws(vec![AwsSecretLocator {
                region: "eu-west-1".to_string(),
                name: "argocd/repo".to_string(),
            }])
        );
        match list.secret_ref().unwrap() {
            SecretRef::Aws(locators) => assert_eq!(locators.len(), 2),
            other => panic!("Expected AWS secret ref, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_secret_backend_is_configuration_error() {
        let decl: SecretsDeclaration =
            serde_yaml::from_str("gcp:\n  project: my-project\n").unwrap();
        let err = decl.secret_ref().unwrap_err();
        assert!(err.to_string().contains("gcp"));
    }

    #[test]
    fn test_azure_client_credentials_require_all_three() {
        let partial: AzureSecretRef =
            serde_yaml::from_str("client_id: id\nclient_secret: s\n").unwrap();
        assert!(partial.client_credentials().is_none());

        let full: AzureSecretRef =
            serde_yaml::from_str("client_id: id\nclient_secret: s\ntenant_id: t\n").unwrap();
        assert_eq!(full.client_credentials(), Some(("t", "id", "s")));
        assert!(!format!("{full:?}").contains("\"s\""));
    }
}
