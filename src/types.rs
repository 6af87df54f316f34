//! Core types shared between the engine and hosting drivers

use serde::{Deserialize, Serialize};

/// Detected platform type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    /// GitHub or GitHub Enterprise
    GitHub,
    /// GitLab or self-hosted GitLab
    GitLab,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GitHub => write!(f, "GitHub"),
            Self::GitLab => write!(f, "GitLab"),
        }
    }
}

/// Platform configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConfig {
    /// Platform type
    pub platform: Platform,
    /// Repository owner (user, organization or group path)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Web host (e.g. `github.com`)
    pub host: String,
}

impl PlatformConfig {
    /// Browser URL of the repository
    pub fn repository_url(&self) -> String {
        format!("https://{}/{}/{}", self.host, self.owner, self.repo)
    }
}

/// What the hosting service knows about the pull request for a branch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequestInfo {
    /// Whether exactly one open PR exists and can be merged through the API
    pub can_merge_with_api: bool,
    /// Suggested squash commit message (`"<title> (#<number>)"`)
    pub default_commit_message: String,
    /// PR/MR number (0 when unknown)
    pub pull_request_number: u64,
}

/// Arguments for merging a pull request through the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergePullRequestOptions {
    /// Head branch of the PR
    pub branch: String,
    /// PR/MR number from [`PullRequestInfo`]
    pub pull_request_number: u64,
    /// Full commit message; the first line becomes the commit title
    pub commit_message: String,
    /// Base branch the PR merges into
    pub parent_branch: String,
}

impl MergePullRequestOptions {
    /// Commit title (first line of the message)
    pub fn commit_title(&self) -> &str {
        self.commit_message.lines().next().unwrap_or_default()
    }

    /// Commit body (everything after the first line)
    pub fn commit_body(&self) -> String {
        self.commit_message
            .split_once('\n')
            .map(|(_, rest)| rest.to_string())
            .unwrap_or_default()
    }
}

/// Minimal open pull request record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// PR/MR number
    pub number: u64,
    /// PR/MR title
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_title_and_body_split() {
        let options = MergePullRequestOptions {
            branch: "feature".to_string(),
            pull_request_number: 1,
            commit_message: "title\nextra detail1\nextra detail2".to_string(),
            parent_branch: "main".to_string(),
        };
        assert_eq!(options.commit_title(), "title");
        assert_eq!(options.commit_body(), "extra detail1\nextra detail2");
    }

    #[test]
    fn test_single_line_message_has_empty_body() {
        let options = MergePullRequestOptions {
            branch: "feature".to_string(),
            pull_request_number: 1,
            commit_message: "title".to_string(),
            parent_branch: "main".to_string(),
        };
        assert_eq!(options.commit_title(), "title");
        assert_eq!(options.commit_body(), "");
    }

    #[test]
    fn test_repository_url() {
        let config = PlatformConfig {
            platform: Platform::GitHub,
            owner: "git-town".to_string(),
            repo: "git-town".to_string(),
            host: "self-hosted-github.com".to_string(),
        };
        assert_eq!(
            config.repository_url(),
            "https://self-hosted-github.com/git-town/git-town"
        );
    }
}
