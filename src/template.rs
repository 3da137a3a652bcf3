//! # Template Renderer
//!
//! Substitutes `$NAME` and `${NAME}` placeholders in resource bodies and parses
//! the result as YAML.
//!
//! Substitution is safe: a placeholder whose name is not in the environment,
//! or a `$` that does not start a valid placeholder, is left as-is. `$$`
//! renders a literal `$`.

use crate::error::{ApplyError, Result};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:(?P<escaped>\$)|(?P<named>[_A-Za-z][_A-Za-z0-9]*)|\{(?P<braced>[_A-Za-z][_A-Za-z0-9]*)\})")
        .unwrap_or_else(|e| panic!("placeholder pattern is invalid: {e}"))
});

/// Replace every resolvable placeholder in `text` with its value from `env`
#[must_use]
pub fn substitute(text: &str, env: &HashMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures<'_>| {
            if caps.name("escaped").is_some() {
                return "$".to_string();
            }
            let name = caps
                .name("named")
                .or_else(|| caps.name("braced"))
                .map_or("", |m| m.as_str());
            env.get(name)
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Substitute placeholders and parse the result
///
/// `origin` only labels the parse error. An empty document renders to an
/// empty mapping.
///
/// # Errors
/// Returns [`ApplyError::Parse`] when the substituted text is not valid YAML.
pub fn render(
    text: &str,
    env: &HashMap<String, String>,
    origin: &Path,
) -> Result<serde_yaml::Value> {
    parse(&substitute(text, env), origin)
}

/// Parse YAML without substitution
///
/// # Errors
/// Returns [`ApplyError::Parse`] when `text` is not valid YAML.
pub fn parse(text: &str, origin: &Path) -> Result<serde_yaml::Value> {
    let value: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|source| ApplyError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;

    Ok(match value {
        serde_yaml::Value::Null => serde_yaml::Value::Mapping(serde_yaml::Mapping::new()),
        other => other,
    })
}
