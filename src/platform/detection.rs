//! Remote URL parsing and platform detection

use crate::config::HostingConfig;
use crate::error::{Error, Result};
use crate::types::{Platform, PlatformConfig};
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// `[user@]host:path` (scp-like syntax)
static SCP_REMOTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[^@/]+@)?(?P<host>[^:/]+):(?P<path>[^/].*)$").expect("valid regex")
});

/// Host and repository path parsed from a remote URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteInfo {
    /// Hostname without port
    pub host: String,
    /// Owner (user, org or nested group path)
    pub owner: String,
    /// Repository name without `.git`
    pub repo: String,
}

/// Parse an https, ssh or scp-style remote URL
pub fn parse_repo_info(remote_url: &str) -> Result<RemoteInfo> {
    let trimmed = remote_url.trim();
    let (host, path) = if trimmed.contains("://") {
        let url = Url::parse(trimmed)
            .map_err(|e| Error::InvalidRemoteUrl(format!("{trimmed}: {e}")))?;
        let host = url
            .host_str()
            .ok_or_else(|| Error::InvalidRemoteUrl(format!("{trimmed}: missing host")))?
            .to_string();
        (host, url.path().to_string())
    } else if let Some(caps) = SCP_REMOTE.captures(trimmed) {
        (caps["host"].to_string(), caps["path"].to_string())
    } else {
        return Err(Error::InvalidRemoteUrl(trimmed.to_string()));
    };

    let path = path.trim_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    let (owner, repo) = path
        .rsplit_once('/')
        .ok_or_else(|| Error::InvalidRemoteUrl(format!("{trimmed}: missing owner/repo")))?;
    if owner.is_empty() || repo.is_empty() {
        return Err(Error::InvalidRemoteUrl(format!(
            "{trimmed}: missing owner/repo"
        )));
    }

    Ok(RemoteInfo {
        host,
        owner: owner.to_string(),
        repo: repo.to_string(),
    })
}

/// Decide which platform serves `host`.
///
/// An explicit driver name always wins; otherwise the hostname decides.
pub fn detect_platform(host: &str, driver: Option<&str>) -> Result<Option<Platform>> {
    if let Some(name) = driver {
        return match name.trim().to_ascii_lowercase().as_str() {
            "github" => Ok(Some(Platform::GitHub)),
            "gitlab" => Ok(Some(Platform::GitLab)),
            other => Err(Error::Config(format!(
                "unsupported code hosting driver {other:?} (expected github or gitlab)"
            ))),
        };
    }
    let host = host.to_ascii_lowercase();
    if host == "github.com" || host.ends_with(".github.com") {
        Ok(Some(Platform::GitHub))
    } else if host == "gitlab.com" || host.contains("gitlab") {
        Ok(Some(Platform::GitLab))
    } else {
        Ok(None)
    }
}

/// Platform configuration for a remote, honouring the hostname and driver
/// overrides. `None` when no supported platform hosts the remote.
pub fn platform_config(remote_url: &str, hosting: &HostingConfig) -> Result<Option<PlatformConfig>> {
    let info = parse_repo_info(remote_url)?;
    let host = hosting
        .origin_hostname
        .clone()
        .unwrap_or_else(|| info.host.clone());
    let Some(platform) = detect_platform(&host, hosting.driver.as_deref())? else {
        return Ok(None);
    };
    Ok(Some(PlatformConfig {
        platform,
        owner: info.owner,
        repo: info.repo,
        host,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scp_remote() {
        let info = parse_repo_info("git@github.com:git-town/git-town.git").unwrap();
        assert_eq!(info.host, "github.com");
        assert_eq!(info.owner, "git-town");
        assert_eq!(info.repo, "git-town");
    }

    #[test]
    fn test_parse_https_remote_without_suffix() {
        let info = parse_repo_info("https://gitlab.com/group/sub/project").unwrap();
        assert_eq!(info.host, "gitlab.com");
        assert_eq!(info.owner, "group/sub");
        assert_eq!(info.repo, "project");
    }

    #[test]
    fn test_parse_ssh_url_with_port() {
        let info = parse_repo_info("ssh://git@github.example.com:2222/acme/tool.git").unwrap();
        assert_eq!(info.host, "github.example.com");
        assert_eq!(info.owner, "acme");
        assert_eq!(info.repo, "tool");
    }

    #[test]
    fn test_parse_rejects_local_path() {
        assert!(parse_repo_info("/srv/repos/project.git").is_err());
    }

    #[test]
    fn test_driver_override_for_self_hosted() {
        let hosting = HostingConfig {
            driver: Some("github".to_string()),
            ..HostingConfig::default()
        };
        let config = platform_config("git@self-hosted-github.com:git-town/git-town.git", &hosting)
            .unwrap()
            .unwrap();
        assert_eq!(config.platform, Platform::GitHub);
        assert_eq!(
            config.repository_url(),
            "https://self-hosted-github.com/git-town/git-town"
        );
    }

    #[test]
    fn test_custom_hostname() {
        let hosting = HostingConfig {
            origin_hostname: Some("github.com".to_string()),
            ..HostingConfig::default()
        };
        let config = platform_config("git@my-ssh-identity.com:git-town/git-town.git", &hosting)
            .unwrap()
            .unwrap();
        assert_eq!(config.platform, Platform::GitHub);
        assert_eq!(config.repository_url(), "https://github.com/git-town/git-town");
    }

    #[test]
    fn test_unknown_host_has_no_platform() {
        let config =
            platform_config("git@example.com:me/repo.git", &HostingConfig::default()).unwrap();
        assert!(config.is_none());
    }

    #[test]
    fn test_unknown_driver_name_is_config_error() {
        assert!(matches!(
            detect_platform("example.com", Some("bitbucket")),
            Err(Error::Config(_))
        ));
    }
}
