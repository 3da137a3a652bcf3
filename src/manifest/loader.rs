//! # Manifest Loader
//!
//! Resolves each declared resource into a rendered body ready for dispatch.
//!
//! Bodies live next to the manifest at `<manifest dir>/<section>/<name>.yaml`.
//! Resources that declare secrets have their body rendered with the process
//! environment overlaid by the resolved secrets; other bodies are parsed as-is.

use crate::error::{ApplyError, Result};
use crate::manifest::types::{Manifest, ResourceDeclaration};
use crate::provider::SecretResolver;
use crate::template;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A rendered resource body with its effective method
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceBody {
    /// Manifest key
    pub name: String,
    /// Effective method as declared (`delete` for disabled resources),
    /// `None` when an enabled resource declares none
    pub method: Option<String>,
    /// Rendered body; always a JSON object
    pub document: serde_json::Value,
    /// File the body was read from
    pub source: PathBuf,
}

/// Loads manifest sections through a [`SecretResolver`]
pub struct ManifestLoader<'a> {
    resolver: &'a dyn SecretResolver,
    environment: HashMap<String, String>,
}

impl std::fmt::Debug for ManifestLoader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestLoader")
            .field("environment_vars", &self.environment.len())
            .finish_non_exhaustive()
    }
}

impl<'a> ManifestLoader<'a> {
    /// Loader whose render context starts from the current process environment
    #[must_use]
    pub fn new(resolver: &'a dyn SecretResolver) -> Self {
        Self {
            resolver,
            environment: utf8_environment(std::env::vars_os()),
        }
    }

    /// Replace the base render context
    #[must_use]
    pub fn with_environment(mut self, environment: HashMap<String, String>) -> Self {
        self.environment = environment;
        self
    }

    /// Read `manifest_path` and load every resource of `section`
    ///
    /// # Errors
    /// See [`ManifestLoader::load_manifest`]; a missing or malformed manifest
    /// is a configuration error.
    pub async fn load(&self, manifest_path: &Path, section: &str) -> Result<Vec<ResourceBody>> {
        let manifest = Manifest::from_path(manifest_path).await?;
        self.load_manifest(&manifest, section).await
    }

    /// Load every resource of `section`, in manifest order
    ///
    /// Resources whose body file is missing are skipped with a warning, so an
    /// empty result means there is nothing to apply.
    ///
    /// # Errors
    /// Returns configuration errors for malformed declarations or unsupported
    /// secret backends, secret backend failures, and parse errors for
    /// malformed bodies.
    pub async fn load_manifest(
        &self,
        manifest: &Manifest,
        section: &str,
    ) -> Result<Vec<ResourceBody>> {
        let declarations = manifest.declarations(section)?;
        info!(
            "Loaded {} {} declarations from {}",
            declarations.len(),
            section,
            manifest.path().display()
        );

        let body_dir = manifest.base_dir().join(section);
        let mut bodies = Vec::with_capacity(declarations.len());

        for (name, declaration) in declarations {
            if let Some(body) = self.load_resource(&body_dir, &name, &declaration).await? {
                bodies.push(body);
            }
        }

        Ok(bodies)
    }

    async fn load_resource(
        &self,
        body_dir: &Path,
        name: &str,
        declaration: &ResourceDeclaration,
    ) -> Result<Option<ResourceBody>> {
        let method = declaration.effective_method();
        if method.is_none() {
            warn!("{} declares no method", name);
        }
        if !declaration.enabled {
            debug!("{} is disabled, reconciling as delete", name);
        }

        let secrets = match &declaration.secrets {
            Some(block) => {
                let secret_ref = block.secret_ref()?;
                debug!("Resolving {} secrets for {}", secret_ref.backend(), name);
                Some(self.resolver.resolve(&secret_ref).await?)
            }
            None => None,
        };

        let path = body_dir.join(format!("{name}.yaml"));
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "Body file {} not found, skipping {}",
                    path.display(),
                    name
                );
                return Ok(None);
            }
            Err(e) => {
                return Err(ApplyError::config(format!(
                    "failed to read {}: {e}",
                    path.display()
                )))
            }
        };

        let value = match secrets {
            Some(resolved) => {
                let mut context = self.environment.clone();
                context.extend(resolved);
                template::render(&text, &context, &path)?
            }
            None => template::parse(&text, &path)?,
        };

        if !value.is_mapping() {
            return Err(ApplyError::config(format!(
                "{} must contain a mapping",
                path.display()
            )));
        }
        let document = serde_json::to_value(&value).map_err(|e| {
            ApplyError::config(format!("{} is not JSON-compatible: {e}", path.display()))
        })?;

        Ok(Some(ResourceBody {
            name: name.to_string(),
            method,
            document,
            source: path,
        }))
    }
}

/// Keep the variables whose name and value are both valid UTF-8
pub(crate) fn utf8_environment<I>(vars: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
            (Ok(key), Ok(value)) => Some((key, value)),
            (Ok(key), Err(_)) => {
                debug!("Skipping environment variable {} with a non-UTF-8 value", key);
                None
            }
            (Err(key), _) => {
                debug!("Skipping environment variable {:?} with a non-UTF-8 name", key);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoSecrets;

    #[async_trait::async_trait]
    impl SecretResolver for NoSecrets {
        async fn resolve(
            &self,
            _secret_ref: &crate::manifest::SecretRef,
        ) -> Result<HashMap<String, String>> {
            Ok(HashMap::new())
        }
    }

    #[cfg(unix)]
    fn non_utf8(bytes: &[u8]) -> OsString {
        use std::os::unix::ffi::OsStringExt;
        OsString::from_vec(bytes.to_vec())
    }

    #[cfg(unix)]
    #[test]
    fn test_utf8_environment_skips_undecodable_pairs() {
        let env = utf8_environment(vec![
            (OsString::from("ARGOCD_URL"), OsString::from("argocd.example.com")),
            (OsString::from("BROKEN_VALUE"), non_utf8(&[0xff, 0xfe])),
            (non_utf8(&[0x80, b'X']), OsString::from("ignored")),
        ]);

        assert_eq!(env.len(), 1);
        assert_eq!(env["ARGOCD_URL"], "argocd.example.com");
    }

    #[cfg(unix)]
    #[test]
    fn test_new_tolerates_non_utf8_process_environment() {
        std::env::set_var("ARGOCD_APPLY_LOADER_NON_UTF8", non_utf8(&[0xff, 0xfe]));
        std::env::set_var("ARGOCD_APPLY_LOADER_PLAIN", "plain");

        let loader = ManifestLoader::new(&NoSecrets);

        assert_eq!(
            loader.environment.get("ARGOCD_APPLY_LOADER_PLAIN").map(String::as_str),
            Some("plain")
        );
        assert!(!loader.environment.contains_key("ARGOCD_APPLY_LOADER_NON_UTF8"));
        std::env::remove_var("ARGOCD_APPLY_LOADER_NON_UTF8");
        std::env::remove_var("ARGOCD_APPLY_LOADER_PLAIN");
    }
}
