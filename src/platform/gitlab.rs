//! GitLab hosting driver

use crate::error::{Error, Result};
use crate::platform::HostingDriver;
use crate::types::{MergePullRequestOptions, PlatformConfig, PullRequest, PullRequestInfo};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Deserialize)]
struct MergeRequest {
    iid: u64,
    #[serde(default)]
    title: String,
}

impl From<MergeRequest> for PullRequest {
    fn from(mr: MergeRequest) -> Self {
        Self {
            number: mr.iid,
            title: mr.title,
        }
    }
}

/// Merge response
#[derive(Deserialize)]
struct MergeResponse {
    merge_commit_sha: Option<String>,
    squash_commit_sha: Option<String>,
}

/// GitLab service using reqwest
pub struct GitLabService {
    client: Client,
    token: Option<String>,
    api_base: String,
    config: PlatformConfig,
}

impl GitLabService {
    /// Create a new GitLab service talking to `https://<host>/api/v4`
    pub fn new(token: Option<String>, config: PlatformConfig) -> Result<Self> {
        let api_base = format!("https://{}/api/v4", config.host);
        Self::with_api_base(token, config, api_base)
    }

    /// Create a service that talks to an explicit API root
    pub fn with_api_base(
        token: Option<String>,
        config: PlatformConfig,
        api_base: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::GitLabApi(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            token,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            config,
        })
    }

    fn api_url(&self, path: &str) -> String {
        let project = format!("{}/{}", self.config.owner, self.config.repo);
        format!(
            "{}/projects/{}{path}",
            self.api_base,
            urlencoding::encode(&project)
        )
    }

    fn token(&self) -> &str {
        self.token.as_deref().unwrap_or_default()
    }

    async fn open_merge_requests(
        &self,
        source: Option<&str>,
        target: &str,
    ) -> Result<Vec<PullRequest>> {
        let mut query = vec![("state", "opened"), ("target_branch", target)];
        if let Some(source) = source {
            query.push(("source_branch", source));
        }

        let mrs: Vec<MergeRequest> = self
            .client
            .get(self.api_url("/merge_requests"))
            .header("PRIVATE-TOKEN", self.token())
            .query(&query)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::GitLabApi(e.to_string()))?
            .json()
            .await?;
        Ok(mrs.into_iter().map(Into::into).collect())
    }

    async fn update_target_branch(&self, iid: u64, new_target: &str) -> Result<()> {
        debug!(mr_iid = iid, new_target, "updating MR target");
        self.client
            .put(self.api_url(&format!("/merge_requests/{iid}")))
            .header("PRIVATE-TOKEN", self.token())
            .json(&serde_json::json!({ "target_branch": new_target }))
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::GitLabApi(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl HostingDriver for GitLabService {
    fn config(&self) -> &PlatformConfig {
        &self.config
    }

    async fn load_pull_request_info(
        &self,
        branch: &str,
        parent_branch: &str,
    ) -> Result<PullRequestInfo> {
        if self.token.is_none() {
            debug!("no GitLab token, merging through the API is disabled");
            return Ok(PullRequestInfo::default());
        }
        let mrs = self.open_merge_requests(Some(branch), parent_branch).await?;
        let [mr] = mrs.as_slice() else {
            debug!(count = mrs.len(), "no unique merge request");
            return Ok(PullRequestInfo::default());
        };
        Ok(PullRequestInfo {
            can_merge_with_api: true,
            default_commit_message: format!("{} (!{})", mr.title, mr.number),
            pull_request_number: mr.number,
        })
    }

    async fn merge_pull_request(&self, options: &MergePullRequestOptions) -> Result<String> {
        debug!(branch = %options.branch, parent = %options.parent_branch, "merging MR");

        let children = self.open_merge_requests(None, &options.branch).await?;
        for child in &children {
            self.update_target_branch(child.number, &options.parent_branch)
                .await?;
        }

        let mrs = self
            .open_merge_requests(Some(&options.branch), &options.parent_branch)
            .await?;
        let mr = match mrs.as_slice() {
            [] => {
                return Err(Error::GitLabApi(
                    "cannot merge via GitLab since there is no merge request".to_string(),
                ));
            }
            [mr] => mr,
            _ => {
                return Err(Error::GitLabApi(format!(
                    "cannot merge via GitLab since there are {} open merge requests from {} into {}",
                    mrs.len(),
                    options.branch,
                    options.parent_branch
                )));
            }
        };

        let response: MergeResponse = self
            .client
            .put(self.api_url(&format!("/merge_requests/{}/merge", mr.number)))
            .header("PRIVATE-TOKEN", self.token())
            .json(&serde_json::json!({
                "squash": true,
                "squash_commit_message": options.commit_message,
                "should_remove_source_branch": false,
            }))
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::GitLabApi(format!("merge failed: {e}")))?
            .json()
            .await?;

        let sha = response
            .squash_commit_sha
            .or(response.merge_commit_sha)
            .ok_or_else(|| Error::GitLabApi("merge response has no commit SHA".to_string()))?;
        debug!(mr_iid = mr.number, %sha, "merge complete");
        Ok(sha)
    }
}
