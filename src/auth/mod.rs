//! Authentication for GitHub and GitLab
//!
//! Tokens come from explicit configuration, environment variables or, for
//! GitHub, the `gh` CLI.

use crate::config::HostingConfig;
use std::process::Command;
use tracing::debug;

/// Source of authentication token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSource {
    /// Token from `relay.*-token` git config or config.toml
    Config,
    /// Token from environment variable
    EnvVar,
    /// Token from CLI tool (gh)
    Cli,
}

/// A resolved API token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The secret
    pub value: String,
    /// Where it came from
    pub source: AuthSource,
}

const GITHUB_ENV_VARS: &[&str] = &["GITHUB_TOKEN", "GH_TOKEN"];
const GITLAB_ENV_VARS: &[&str] = &["GITLAB_TOKEN", "GL_TOKEN"];

/// Resolve a token from explicit config, then the given environment variables.
///
/// `lookup` abstracts environment access so callers can supply a fixed map.
pub fn resolve_token<F>(explicit: Option<&str>, env_vars: &[&str], lookup: F) -> Option<Token>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = explicit.filter(|v| !v.trim().is_empty()) {
        return Some(Token {
            value: value.trim().to_string(),
            source: AuthSource::Config,
        });
    }
    env_vars.iter().find_map(|name| {
        lookup(name)
            .filter(|v| !v.trim().is_empty())
            .map(|value| Token {
                value: value.trim().to_string(),
                source: AuthSource::EnvVar,
            })
    })
}

/// GitHub token: config, `GITHUB_TOKEN`/`GH_TOKEN`, then `gh auth token`
pub fn get_github_token(hosting: &HostingConfig) -> Option<Token> {
    let token = resolve_token(hosting.github_token.as_deref(), GITHUB_ENV_VARS, |name| {
        std::env::var(name).ok()
    })
    .or_else(gh_cli_token);
    if let Some(ref t) = token {
        debug!(source = ?t.source, "resolved GitHub token");
    }
    token
}

/// GitLab token: config, then `GITLAB_TOKEN`/`GL_TOKEN`
pub fn get_gitlab_token(hosting: &HostingConfig) -> Option<Token> {
    let token = resolve_token(hosting.gitlab_token.as_deref(), GITLAB_ENV_VARS, |name| {
        std::env::var(name).ok()
    });
    if let Some(ref t) = token {
        debug!(source = ?t.source, "resolved GitLab token");
    }
    token
}

fn gh_cli_token() -> Option<Token> {
    let output = Command::new("gh").args(["auth", "token"]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if value.is_empty() {
        return None;
    }
    Some(Token {
        value,
        source: AuthSource::Cli,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_explicit_token_wins() {
        let vars = env(&[("GITHUB_TOKEN", "from-env")]);
        let token = resolve_token(Some("from-config"), GITHUB_ENV_VARS, |n| vars.get(n).cloned())
            .unwrap();
        assert_eq!(token.value, "from-config");
        assert_eq!(token.source, AuthSource::Config);
    }

    #[test]
    fn test_env_vars_checked_in_order() {
        let vars = env(&[("GH_TOKEN", "second"), ("GITHUB_TOKEN", "first")]);
        let token = resolve_token(None, GITHUB_ENV_VARS, |n| vars.get(n).cloned()).unwrap();
        assert_eq!(token.value, "first");
        assert_eq!(token.source, AuthSource::EnvVar);
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let vars = env(&[("GITLAB_TOKEN", "  ")]);
        assert!(resolve_token(Some(""), GITLAB_ENV_VARS, |n| vars.get(n).cloned()).is_none());
    }
}
