//! GitHub hosting driver

use crate::error::{Error, Result};
use crate::platform::HostingDriver;
use crate::types::{MergePullRequestOptions, PlatformConfig, PullRequest, PullRequestInfo};
use async_trait::async_trait;
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Query parameters for `GET /repos/{owner}/{repo}/pulls`
#[derive(Serialize)]
struct ListPullsQuery<'a> {
    state: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    head: Option<String>,
    base: &'a str,
}

#[derive(Deserialize)]
struct PullSummary {
    number: u64,
    #[serde(default)]
    title: Option<String>,
}

impl From<PullSummary> for PullRequest {
    fn from(pr: PullSummary) -> Self {
        Self {
            number: pr.number,
            title: pr.title.unwrap_or_default(),
        }
    }
}

#[derive(Serialize)]
struct UpdateBasePayload<'a> {
    base: &'a str,
}

#[derive(Serialize)]
struct MergePayload<'a> {
    commit_title: &'a str,
    commit_message: String,
    merge_method: &'a str,
}

#[derive(Deserialize)]
struct MergeResponse {
    sha: String,
}

/// GitHub service using octocrab
pub struct GitHubService {
    client: Octocrab,
    config: PlatformConfig,
    /// Without a token the API is never called for merging
    has_token: bool,
}

impl GitHubService {
    /// Create a new GitHub service.
    ///
    /// Enterprise hosts use `https://<host>/api/v3`.
    pub fn new(token: Option<&str>, config: PlatformConfig) -> Result<Self> {
        let base_uri = if config.host == "github.com" {
            None
        } else {
            Some(format!("https://{}/api/v3", config.host))
        };
        Self::build(token, config, base_uri.as_deref())
    }

    /// Create a service that talks to an explicit API root
    pub fn with_base_uri(token: Option<&str>, config: PlatformConfig, base_uri: &str) -> Result<Self> {
        Self::build(token, config, Some(base_uri))
    }

    fn build(token: Option<&str>, config: PlatformConfig, base_uri: Option<&str>) -> Result<Self> {
        let mut builder = Octocrab::builder();
        if let Some(token) = token {
            builder = builder.personal_token(token.to_string());
        }
        if let Some(uri) = base_uri {
            builder = builder
                .base_uri(uri)
                .map_err(|e| Error::GitHubApi(e.to_string()))?;
        }
        let client = builder
            .build()
            .map_err(|e| Error::GitHubApi(e.to_string()))?;

        Ok(Self {
            client,
            config,
            has_token: token.is_some(),
        })
    }

    fn pulls_route(&self) -> String {
        format!("/repos/{}/{}/pulls", self.config.owner, self.config.repo)
    }

    /// Open PRs into `base`, optionally restricted to head branch `head`
    async fn open_pull_requests(&self, head: Option<&str>, base: &str) -> Result<Vec<PullRequest>> {
        let query = ListPullsQuery {
            state: "open",
            head: head.map(|h| format!("{}:{h}", self.config.owner)),
            base,
        };
        let prs: Vec<PullSummary> = self
            .client
            .get(self.pulls_route(), Some(&query))
            .await
            .map_err(|e| Error::GitHubApi(format!("failed to list pull requests: {e}")))?;
        Ok(prs.into_iter().map(Into::into).collect())
    }

    async fn update_pull_request_base(&self, number: u64, new_base: &str) -> Result<()> {
        debug!(pr_number = number, new_base, "updating PR base");
        let _: serde_json::Value = self
            .client
            .patch(
                format!("{}/{number}", self.pulls_route()),
                Some(&UpdateBasePayload { base: new_base }),
            )
            .await
            .map_err(|e| Error::GitHubApi(format!("failed to update PR #{number}: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl HostingDriver for GitHubService {
    fn config(&self) -> &PlatformConfig {
        &self.config
    }

    async fn load_pull_request_info(
        &self,
        branch: &str,
        parent_branch: &str,
    ) -> Result<PullRequestInfo> {
        if !self.has_token {
            debug!("no GitHub token, merging through the API is disabled");
            return Ok(PullRequestInfo::default());
        }
        debug!(branch, parent_branch, "loading pull request info");
        let prs = self.open_pull_requests(Some(branch), parent_branch).await?;
        let [pr] = prs.as_slice() else {
            debug!(count = prs.len(), "no unique pull request");
            return Ok(PullRequestInfo::default());
        };
        Ok(PullRequestInfo {
            can_merge_with_api: true,
            default_commit_message: format!("{} (#{})", pr.title, pr.number),
            pull_request_number: pr.number,
        })
    }

    async fn merge_pull_request(&self, options: &MergePullRequestOptions) -> Result<String> {
        debug!(branch = %options.branch, parent = %options.parent_branch, "merging pull request");

        // Re-target children first: GitHub closes PRs whose base branch disappears.
        let children = self.open_pull_requests(None, &options.branch).await?;
        for child in &children {
            self.update_pull_request_base(child.number, &options.parent_branch)
                .await?;
        }

        let prs = self
            .open_pull_requests(Some(&options.branch), &options.parent_branch)
            .await?;
        let pr = match prs.as_slice() {
            [] => {
                return Err(Error::GitHubApi(
                    "cannot merge via GitHub since there is no pull request".to_string(),
                ));
            }
            [pr] => pr,
            _ => {
                return Err(Error::GitHubApi(format!(
                    "cannot merge via GitHub since there are {} open pull requests from {} into {}",
                    prs.len(),
                    options.branch,
                    options.parent_branch
                )));
            }
        };

        let payload = MergePayload {
            commit_title: options.commit_title(),
            commit_message: options.commit_body(),
            merge_method: "squash",
        };
        let response: MergeResponse = self
            .client
            .put(format!("{}/{}/merge", self.pulls_route(), pr.number), Some(&payload))
            .await
            .map_err(|e| Error::GitHubApi(format!("merge failed: {e}")))?;

        debug!(pr_number = pr.number, sha = %response.sha, "merge complete");
        Ok(response.sha)
    }
}
