//! # Connection Configuration
//!
//! Settings for reaching the ArgoCD API server: server URL, TLS verification,
//! request timeout and one explicit authentication strategy.

use crate::constants::DEFAULT_HTTP_TIMEOUT_SECS;
use crate::error::{ApplyError, Result};
use std::fmt;
use std::time::Duration;

/// Authentication strategy requested on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AuthMode {
    /// Bearer token (ArgoCD account token)
    Token,
    /// Username/password exchanged for a session JWT
    Session,
}

/// Resolved authentication strategy
#[derive(Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    Token(String),
    Session { username: String, password: String },
}

impl fmt::Debug for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(_) => f.write_str("Token(<redacted>)"),
            Self::Session { username, .. } => f
                .debug_struct("Session")
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

/// Raw connection settings, as collected from flags and environment
#[derive(Debug, Clone, Default)]
pub struct ConnectionOptions {
    pub host_url: Option<String>,
    pub token: Option<String>,
    pub verify_ssl: Option<bool>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub auth_mode: Option<AuthMode>,
    pub timeout: Option<Duration>,
}

/// Validated settings for [`crate::argocd::ArgoCdClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgoCdConfig {
    /// Base URL without trailing slash
    pub server_url: String,
    pub auth: AuthStrategy,
    pub verify_ssl: bool,
    pub timeout: Duration,
}

impl ArgoCdConfig {
    /// Validate raw options
    ///
    /// Without an explicit auth mode a token wins over username/password.
    ///
    /// # Errors
    /// Returns a configuration error when the server URL or the credentials
    /// required by the selected strategy are missing.
    pub fn from_options(options: ConnectionOptions) -> Result<Self> {
        let server_url = options
            .host_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(normalize_server_url)
            .ok_or_else(|| ApplyError::config("ArgoCD server URL is not set (--host-url / ARGOCD_URL)"))?;

        let token = options.token.filter(|t| !t.is_empty());
        let login = match (options.username, options.password) {
            (Some(username), Some(password)) if !username.is_empty() => Some((username, password)),
            _ => None,
        };

        let mode = options.auth_mode.or_else(|| {
            if token.is_some() {
                Some(AuthMode::Token)
            } else if login.is_some() {
                Some(AuthMode::Session)
            } else {
                None
            }
        });

        let auth = match mode {
            Some(AuthMode::Token) => AuthStrategy::Token(token.ok_or_else(|| {
                ApplyError::config("token authentication selected but no token given (--token / ARGOCD_AUTH_TOKEN)")
            })?),
            Some(AuthMode::Session) => {
                let (username, password) = login.ok_or_else(|| {
                    ApplyError::config("session authentication selected but username/password are missing")
                })?;
                AuthStrategy::Session { username, password }
            }
            None => {
                return Err(ApplyError::config(
                    "no ArgoCD credentials: set a token or a username and password",
                ))
            }
        };

        Ok(Self {
            server_url,
            auth,
            verify_ssl: options.verify_ssl.unwrap_or(true),
            timeout: options
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS)),
        })
    }
}

/// Add `https://` when no scheme is given and drop trailing slashes
#[must_use]
pub fn normalize_server_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// Parse `true`/`false` the way the `*_VERIFY_SSL` variables are written
///
/// # Errors
/// Returns a message for anything other than a boolean word.
pub fn parse_bool_flag(value: &str) -> std::result::Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(format!("expected 'true' or 'false', got '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ConnectionOptions {
        ConnectionOptions {
            host_url: Some("argocd.example.com/".to_string()),
            ..ConnectionOptions::default()
        }
    }

    #[test]
    fn test_normalize_server_url() {
        assert_eq!(normalize_server_url("argocd.example.com"), "https://argocd.example.com");
        assert_eq!(normalize_server_url("http://localhost:8080/"), "http://localhost:8080");
        assert_eq!(normalize_server_url(" https://cd.internal// "), "https://cd.internal");
    }

    #[test]
    fn test_token_preferred_without_explicit_mode() {
        let config = ArgoCdConfig::from_options(ConnectionOptions {
            token: Some("tok".to_string()),
            username: Some("admin".to_string()),
            password: Some("pw".to_string()),
            ..options()
        })
        .unwrap();
        assert_eq!(config.auth, AuthStrategy::Token("tok".to_string()));
        assert_eq!(config.server_url, "https://argocd.example.com");
        assert!(config.verify_ssl);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS));
    }

    #[test]
    fn test_session_selected_from_username_password() {
        let config = ArgoCdConfig::from_options(ConnectionOptions {
            username: Some("admin".to_string()),
            password: Some("pw".to_string()),
            verify_ssl: Some(false),
            ..options()
        })
        .unwrap();
        assert_eq!(
            config.auth,
            AuthStrategy::Session {
                username: "admin".to_string(),
                password: "pw".to_string(),
            }
        );
        assert!(!config.verify_ssl);
    }

    #[test]
    fn test_explicit_session_mode_requires_login() {
        let err = ArgoCdConfig::from_options(ConnectionOptions {
            token: Some("tok".to_string()),
            auth_mode: Some(AuthMode::Session),
            ..options()
        })
        .unwrap_err();
        assert!(err.to_string().contains("session"));
    }

    #[test]
    fn test_missing_server_url_and_credentials() {
        assert!(ArgoCdConfig::from_options(ConnectionOptions {
            token: Some("tok".to_string()),
            ..ConnectionOptions::default()
        })
        .is_err());
        assert!(ArgoCdConfig::from_options(options()).is_err());
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let token = format!("{:?}", AuthStrategy::Token("super-secret".to_string()));
        let session = format!(
            "{:?}",
            AuthStrategy::Session {
                username: "admin".to_string(),
                password: "hunter2".to_string(),
            }
        );
        assert!(!token.contains("super-secret"));
        assert!(session.contains("admin"));
        assert!(!session.contains("hunter2"));
    }

    #[test]
    fn test_parse_bool_flag() {
        assert_eq!(parse_bool_flag("true"), Ok(true));
        assert_eq!(parse_bool_flag("False"), Ok(false));
        assert!(parse_bool_flag("maybe").is_err());
    }
}
