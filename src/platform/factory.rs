//! Hosting driver construction from repository configuration

use crate::auth::{get_github_token, get_gitlab_token};
use crate::config::Config;
use crate::error::Result;
use crate::git::Repo;
use crate::platform::{GitHubService, GitLabService, HostingDriver, platform_config};
use crate::types::Platform;
use tracing::debug;

/// Build the hosting driver for the `origin` remote.
///
/// Returns `None` when offline, when there is no origin, or when the origin
/// is not hosted on a supported platform.
pub fn create_hosting_driver(
    config: &Config,
    repo: &mut Repo,
) -> Result<Option<Box<dyn HostingDriver>>> {
    if config.offline {
        debug!("offline, no hosting driver");
        return Ok(None);
    }
    let Some(url) = repo.remote_url("origin")? else {
        debug!("no origin remote, no hosting driver");
        return Ok(None);
    };
    let Some(platform) = platform_config(&url, &config.hosting)? else {
        debug!(%url, "origin is not on a supported hosting service");
        return Ok(None);
    };

    let driver: Box<dyn HostingDriver> = match platform.platform {
        Platform::GitHub => {
            let token = get_github_token(&config.hosting);
            Box::new(GitHubService::new(
                token.as_ref().map(|t| t.value.as_str()),
                platform,
            )?)
        }
        Platform::GitLab => {
            let token = get_gitlab_token(&config.hosting);
            Box::new(GitLabService::new(token.map(|t| t.value), platform)?)
        }
    };
    debug!(service = %driver.service_name(), url = %driver.repository_url(), "hosting driver ready");
    Ok(Some(driver))
}
