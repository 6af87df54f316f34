//! Shared test fixtures

#![allow(dead_code)]

pub mod fake_executor;
pub mod mock_hosting;
pub mod temp_git_repo;

pub use fake_executor::{FakeExecutor, fake_repo, main_config};
pub use mock_hosting::MockHostingDriver;
pub use temp_git_repo::TempGitRepo;

use git_relay::types::{Platform, PlatformConfig};

/// Config for the `git-town/git-town` repository on github.com
pub fn github_config() -> PlatformConfig {
    PlatformConfig {
        platform: Platform::GitHub,
        owner: "git-town".to_string(),
        repo: "git-town".to_string(),
        host: "github.com".to_string(),
    }
}
