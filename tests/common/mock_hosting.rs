//! Mock hosting driver for testing
//!
//! These are test utilities - not all may be used in every test binary.

#![allow(dead_code)]

use async_trait::async_trait;
use git_relay::error::{Error, Result};
use git_relay::platform::HostingDriver;
use git_relay::types::{MergePullRequestOptions, PlatformConfig, PullRequestInfo};
use std::sync::Mutex;

/// An open pull request known to the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockPullRequest {
    pub number: u64,
    pub head: String,
    pub base: String,
    pub title: String,
}

/// Call record for a base change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateBaseCall {
    pub pr_number: u64,
    pub new_base: String,
}

/// Call record for `merge_pull_request`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeCall {
    pub pr_number: u64,
    pub branch: String,
    pub parent_branch: String,
    pub commit_message: String,
}

/// Hosting driver that behaves like the real ones against an in-memory
/// list of open pull requests.
///
/// Features:
/// - Child pull request rebinding before merging
/// - Call tracking for verification
/// - Error injection for failure path testing
pub struct MockHostingDriver {
    config: PlatformConfig,
    merge_sha: String,
    open: Mutex<Vec<MockPullRequest>>,
    // Call tracking
    info_calls: Mutex<Vec<(String, String)>>,
    update_base_calls: Mutex<Vec<UpdateBaseCall>>,
    merge_calls: Mutex<Vec<MergeCall>>,
    // Error injection
    error_on_merge: Mutex<Option<String>>,
}

impl MockHostingDriver {
    /// Create a new mock with the given config
    pub fn with_config(config: PlatformConfig) -> Self {
        Self {
            config,
            merge_sha: "abc123".to_string(),
            open: Mutex::new(Vec::new()),
            info_calls: Mutex::new(Vec::new()),
            update_base_calls: Mutex::new(Vec::new()),
            merge_calls: Mutex::new(Vec::new()),
            error_on_merge: Mutex::new(None),
        }
    }

    /// Register an open pull request
    pub fn add_pull_request(&self, number: u64, head: &str, base: &str, title: &str) {
        self.open.lock().unwrap().push(MockPullRequest {
            number,
            head: head.to_string(),
            base: base.to_string(),
            title: title.to_string(),
        });
    }

    /// Make `merge_pull_request` fail after the child rebinding
    pub fn fail_merge(&self, msg: &str) {
        *self.error_on_merge.lock().unwrap() = Some(msg.to_string());
    }

    /// Currently open pull requests
    pub fn open_pull_requests(&self) -> Vec<MockPullRequest> {
        self.open.lock().unwrap().clone()
    }

    // === Call verification methods ===

    /// Get all `load_pull_request_info` calls as `(branch, parent)`
    pub fn get_info_calls(&self) -> Vec<(String, String)> {
        self.info_calls.lock().unwrap().clone()
    }

    /// Get all base changes
    pub fn get_update_base_calls(&self) -> Vec<UpdateBaseCall> {
        self.update_base_calls.lock().unwrap().clone()
    }

    /// Get all merges
    pub fn get_merge_calls(&self) -> Vec<MergeCall> {
        self.merge_calls.lock().unwrap().clone()
    }

    /// Assert that pull request `pr_number` was re-targeted to `new_base`
    pub fn assert_update_base_called(&self, pr_number: u64, new_base: &str) {
        let calls = self.get_update_base_calls();
        assert!(
            calls
                .iter()
                .any(|c| c.pr_number == pr_number && c.new_base == new_base),
            "Expected update_base({pr_number}, {new_base}) but got: {calls:?}"
        );
    }

    /// Assert that nothing was merged
    pub fn assert_nothing_merged(&self) {
        let calls = self.get_merge_calls();
        assert!(calls.is_empty(), "Expected no merges but got: {calls:?}");
    }

    fn matching(&self, head: &str, base: &str) -> Vec<MockPullRequest> {
        self.open
            .lock()
            .unwrap()
            .iter()
            .filter(|pr| pr.head == head && pr.base == base)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl HostingDriver for MockHostingDriver {
    fn config(&self) -> &PlatformConfig {
        &self.config
    }

    async fn load_pull_request_info(
        &self,
        branch: &str,
        parent_branch: &str,
    ) -> Result<PullRequestInfo> {
        self.info_calls
            .lock()
            .unwrap()
            .push((branch.to_string(), parent_branch.to_string()));

        let prs = self.matching(branch, parent_branch);
        let [pr] = prs.as_slice() else {
            return Ok(PullRequestInfo::default());
        };
        Ok(PullRequestInfo {
            can_merge_with_api: true,
            default_commit_message: format!("{} (#{})", pr.title, pr.number),
            pull_request_number: pr.number,
        })
    }

    async fn merge_pull_request(&self, options: &MergePullRequestOptions) -> Result<String> {
        {
            let mut open = self.open.lock().unwrap();
            for pr in open.iter_mut().filter(|pr| pr.base == options.branch) {
                pr.base.clone_from(&options.parent_branch);
                self.update_base_calls.lock().unwrap().push(UpdateBaseCall {
                    pr_number: pr.number,
                    new_base: options.parent_branch.clone(),
                });
            }
        }

        if let Some(msg) = self.error_on_merge.lock().unwrap().clone() {
            return Err(Error::GitHubApi(msg));
        }

        let prs = self.matching(&options.branch, &options.parent_branch);
        let pr = match prs.as_slice() {
            [] => {
                return Err(Error::GitHubApi(
                    "cannot merge via GitHub since there is no pull request".to_string(),
                ));
            }
            [pr] => pr.clone(),
            _ => {
                return Err(Error::GitHubApi(format!(
                    "cannot merge via GitHub since there are {} open pull requests",
                    prs.len()
                )));
            }
        };

        self.open.lock().unwrap().retain(|p| p.number != pr.number);
        self.merge_calls.lock().unwrap().push(MergeCall {
            pr_number: pr.number,
            branch: options.branch.clone(),
            parent_branch: options.parent_branch.clone(),
            commit_message: options.commit_message.clone(),
        });
        Ok(self.merge_sha.clone())
    }
}
