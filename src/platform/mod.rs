//! Hosting drivers for GitHub and GitLab
//!
//! Provides a unified interface for the pull-request operations that
//! merge-type steps need.

mod detection;
mod factory;
mod github;
mod gitlab;

pub use detection::{RemoteInfo, detect_platform, parse_repo_info, platform_config};
pub use factory::create_hosting_driver;
pub use github::GitHubService;
pub use gitlab::GitLabService;

use crate::error::Result;
use crate::types::{MergePullRequestOptions, PlatformConfig, PullRequestInfo};
use async_trait::async_trait;

/// Hosting driver trait for PR/MR operations
///
/// Implementations are expected to impose their own network timeouts and
/// report them as errors.
#[async_trait]
pub trait HostingDriver: Send + Sync {
    /// Get the platform configuration
    fn config(&self) -> &PlatformConfig;

    /// Human-readable service name (`GitHub`, `GitLab`)
    fn service_name(&self) -> String {
        self.config().platform.to_string()
    }

    /// Browser URL of the repository
    fn repository_url(&self) -> String {
        self.config().repository_url()
    }

    /// Look up the single open PR from `branch` into `parent_branch`.
    ///
    /// Zero or several matching PRs are not an error here; they yield
    /// `can_merge_with_api == false`.
    async fn load_pull_request_info(
        &self,
        branch: &str,
        parent_branch: &str,
    ) -> Result<PullRequestInfo>;

    /// Merge the PR for `options.branch` and return the new commit SHA.
    ///
    /// Open PRs based on `options.branch` are re-targeted to
    /// `options.parent_branch`. Fails unless exactly one open PR matches.
    async fn merge_pull_request(&self, options: &MergePullRequestOptions) -> Result<String>;
}
