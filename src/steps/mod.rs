//! Steps: the atomic repository operations a workflow is made of
//!
//! A [`Step`] is an immutable record. Everything the engine needs to roll a
//! step back is derived from the step plus a [`StepSnapshot`] of repository
//! facts captured right before it runs, so the runner never inspects which
//! variant it is holding.

mod execute;
mod list;

pub use list::{StepList, WrapOptions};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::git::Repo;
use crate::platform::HostingDriver;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One repository operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    /// Abandon an in-progress merge
    AbortMerge,
    /// Abandon an in-progress rebase
    AbortRebase,
    /// Commit a merge whose conflicts were resolved by hand
    ContinueMerge,
    /// Resume a rebase whose conflicts were resolved by hand
    ContinueRebase,
    /// Move the working directory
    ChangeDirectory {
        /// Target directory
        directory: PathBuf,
    },
    /// Make `branch` the current branch
    CheckoutBranch {
        /// Branch to check out
        branch: String,
    },
    /// Create a local branch
    CreateBranch {
        /// New branch name
        branch: String,
        /// Commit or branch the new branch starts at
        starting_point: String,
    },
    /// Recreate a deleted remote branch at a known commit
    CreateRemoteBranch {
        /// Branch name on origin
        branch: String,
        /// Commit to push
        sha: String,
    },
    /// Push a local branch and set up tracking
    CreateTrackingBranch {
        /// Branch to publish
        branch: String,
    },
    /// Delete a local branch
    DeleteLocalBranch {
        /// Branch to delete
        branch: String,
        /// Delete even if unmerged
        force: bool,
    },
    /// Delete a branch on origin
    DeleteRemoteBranch {
        /// Branch name on origin
        branch: String,
    },
    /// Forget the configured parent of a branch
    DeleteParentBranch {
        /// Branch whose parent entry is removed
        branch: String,
    },
    /// Record the parent of a branch
    SetParentBranch {
        /// Child branch
        branch: String,
        /// Parent branch
        parent: String,
    },
    /// Fetch all remote updates
    Fetch,
    /// Merge `branch` into the current branch
    MergeBranch {
        /// Branch to merge in
        branch: String,
    },
    /// Rebase the current branch onto `branch`
    RebaseBranch {
        /// New base
        branch: String,
    },
    /// Push a branch to origin
    PushBranch {
        /// Branch to push
        branch: String,
        /// Use `--force-with-lease`
        force: bool,
    },
    /// Reset the current branch to a commit
    ResetToSha {
        /// Target commit
        sha: String,
        /// Discard working tree changes too
        hard: bool,
    },
    /// Put a branch back where it was and return to another branch,
    /// abandoning any merge or rebase in progress
    RestoreBranch {
        /// Branch to reset
        branch: String,
        /// Commit it pointed at before
        sha: String,
        /// Branch to end up on
        return_to: String,
    },
    /// Shelve uncommitted changes (including untracked files)
    StashOpenChanges,
    /// Unshelve the most recent stash
    RestoreOpenChanges,
    /// Drop the stash entry a conflicted `git stash pop` keeps around
    DropStash,
    /// Bring a branch up to date with its tracking branch and its parent
    SyncBranch {
        /// Branch to sync
        branch: String,
        /// Push the result to origin
        push_after: bool,
    },
    /// Finish a sync that stopped on a conflict
    ContinueSyncBranch {
        /// Branch being synced
        branch: String,
        /// Push the result to origin
        push_after: bool,
    },
    /// Merge a pull request through the hosting service
    MergePullRequest {
        /// Head branch of the PR
        branch: String,
        /// Base branch of the PR
        parent: String,
        /// PR/MR number
        pull_request_number: u64,
        /// Squash commit message
        commit_message: String,
    },
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AbortMerge => write!(f, "git merge --abort"),
            Self::AbortRebase => write!(f, "git rebase --abort"),
            Self::ContinueMerge => write!(f, "git commit --no-edit"),
            Self::ContinueRebase => write!(f, "git rebase --continue"),
            Self::ChangeDirectory { directory } => write!(f, "cd {}", directory.display()),
            Self::CheckoutBranch { branch } => write!(f, "git checkout {branch}"),
            Self::CreateBranch {
                branch,
                starting_point,
            } => write!(f, "git branch {branch} {starting_point}"),
            Self::CreateRemoteBranch { branch, sha } => {
                write!(f, "git push origin {sha}:refs/heads/{branch}")
            }
            Self::CreateTrackingBranch { branch } => write!(f, "git push -u origin {branch}"),
            Self::DeleteLocalBranch { branch, force } => {
                let flag = if *force { "-D" } else { "-d" };
                write!(f, "git branch {flag} {branch}")
            }
            Self::DeleteRemoteBranch { branch } => write!(f, "git push origin :{branch}"),
            Self::DeleteParentBranch { branch } => write!(f, "forget parent of {branch}"),
            Self::SetParentBranch { branch, parent } => {
                write!(f, "set parent of {branch} to {parent}")
            }
            Self::Fetch => write!(f, "git fetch --prune --tags"),
            Self::MergeBranch { branch } => write!(f, "git merge --no-edit {branch}"),
            Self::RebaseBranch { branch } => write!(f, "git rebase {branch}"),
            Self::PushBranch { branch, force } => {
                if *force {
                    write!(f, "git push --force-with-lease origin {branch}")
                } else {
                    write!(f, "git push origin {branch}")
                }
            }
            Self::ResetToSha { sha, hard } => {
                if *hard {
                    write!(f, "git reset --hard {sha}")
                } else {
                    write!(f, "git reset {sha}")
                }
            }
            Self::RestoreBranch {
                branch,
                sha,
                return_to,
            } => write!(f, "restore {branch} to {} and check out {return_to}", short(sha)),
            Self::StashOpenChanges => write!(f, "git stash"),
            Self::RestoreOpenChanges => write!(f, "git stash pop"),
            Self::DropStash => write!(f, "git stash drop"),
            Self::SyncBranch { branch, .. } => write!(f, "sync branch {branch}"),
            Self::ContinueSyncBranch { branch, .. } => write!(f, "continue syncing {branch}"),
            Self::MergePullRequest {
                branch,
                parent,
                pull_request_number,
                ..
            } => write!(
                f,
                "merge pull request #{pull_request_number} ({branch} into {parent})"
            ),
        }
    }
}

fn short(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

/// Repository facts observed immediately before a step runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSnapshot {
    /// Branch checked out before the step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_branch: Option<String>,
    /// Working directory before the step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<PathBuf>,
    /// Commit of the ref the step rewrites
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_sha: Option<String>,
    /// Parent configured before the step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_parent: Option<String>,
}

/// Result of running a step
#[derive(Debug)]
pub enum StepOutcome {
    /// The step completed
    Success,
    /// git stopped on a conflict that needs manual resolution
    Conflict(String),
    /// The step failed for any other reason
    Failed(Error),
}

impl From<Result<()>> for StepOutcome {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::Success,
            Err(Error::Conflict(reason)) => Self::Conflict(reason),
            Err(e) => Self::Failed(e),
        }
    }
}

/// Everything a step may touch while running
pub struct StepContext<'a> {
    /// Working copy
    pub repo: &'a mut Repo,
    /// Effective configuration
    pub config: &'a Config,
    /// Hosting driver for merge-type steps
    pub hosting: Option<&'a dyn HostingDriver>,
}

impl<'a> StepContext<'a> {
    /// Context without a hosting driver
    pub const fn new(repo: &'a mut Repo, config: &'a Config) -> Self {
        Self {
            repo,
            config,
            hosting: None,
        }
    }

    /// Attach a hosting driver
    #[must_use]
    pub fn with_hosting(mut self, hosting: Option<&'a dyn HostingDriver>) -> Self {
        self.hosting = hosting;
        self
    }

    /// Whether remote operations should happen at all
    pub fn is_online(&mut self) -> Result<bool> {
        Ok(!self.config.offline && self.repo.has_origin()?)
    }
}

impl Step {
    /// Capture the facts [`Self::undo_step`] and [`Self::abort_step`] need
    pub fn snapshot(&self, repo: &mut Repo) -> Result<StepSnapshot> {
        let mut snapshot = StepSnapshot::default();
        match self {
            Self::ChangeDirectory { .. } => {
                snapshot.workdir = Some(repo.workdir().to_path_buf());
            }
            Self::CheckoutBranch { .. } => {
                snapshot.current_branch = Some(repo.current_branch()?);
            }
            Self::DeleteLocalBranch { branch, .. } => {
                snapshot.target_sha = Some(
                    repo.sha(branch)?
                        .ok_or_else(|| Error::BranchNotFound(branch.clone()))?,
                );
            }
            Self::DeleteRemoteBranch { branch } => {
                snapshot.target_sha = repo.sha(&format!("origin/{branch}"))?;
            }
            Self::SetParentBranch { branch, .. } | Self::DeleteParentBranch { branch } => {
                snapshot.previous_parent = repo.parent_branch(branch)?;
            }
            Self::MergeBranch { .. }
            | Self::RebaseBranch { .. }
            | Self::ResetToSha { .. }
            | Self::RestoreOpenChanges => {
                snapshot.target_sha = repo.sha("HEAD")?;
            }
            Self::SyncBranch { branch, .. } => {
                snapshot.current_branch = Some(repo.current_branch()?);
                snapshot.target_sha = Some(
                    repo.sha(branch)?
                        .ok_or_else(|| Error::BranchNotFound(branch.clone()))?,
                );
            }
            Self::MergePullRequest { parent, .. } => {
                snapshot.current_branch = Some(repo.current_branch()?);
                snapshot.target_sha = repo.sha(parent)?;
            }
            _ => {}
        }
        Ok(snapshot)
    }

    /// The step that reverses this one after it succeeded
    pub fn undo_step(&self, snapshot: &StepSnapshot) -> Option<Self> {
        match self {
            Self::ChangeDirectory { .. } => snapshot
                .workdir
                .clone()
                .map(|directory| Self::ChangeDirectory { directory }),
            Self::CheckoutBranch { branch } => snapshot
                .current_branch
                .clone()
                .filter(|previous| previous != branch)
                .map(|previous| Self::CheckoutBranch { branch: previous }),
            Self::CreateBranch { branch, .. } => Some(Self::DeleteLocalBranch {
                branch: branch.clone(),
                force: true,
            }),
            Self::CreateRemoteBranch { branch, .. } => Some(Self::DeleteRemoteBranch {
                branch: branch.clone(),
            }),
            Self::CreateTrackingBranch { branch } => Some(Self::DeleteRemoteBranch {
                branch: branch.clone(),
            }),
            Self::DeleteLocalBranch { branch, .. } => {
                snapshot.target_sha.clone().map(|sha| Self::CreateBranch {
                    branch: branch.clone(),
                    starting_point: sha,
                })
            }
            Self::DeleteRemoteBranch { branch } => {
                snapshot.target_sha.clone().map(|sha| Self::CreateRemoteBranch {
                    branch: branch.clone(),
                    sha,
                })
            }
            Self::SetParentBranch { branch, .. } => Some(snapshot.previous_parent.clone().map_or_else(
                || Self::DeleteParentBranch {
                    branch: branch.clone(),
                },
                |parent| Self::SetParentBranch {
                    branch: branch.clone(),
                    parent,
                },
            )),
            Self::DeleteParentBranch { branch } => {
                snapshot.previous_parent.clone().map(|parent| Self::SetParentBranch {
                    branch: branch.clone(),
                    parent,
                })
            }
            Self::MergeBranch { .. } | Self::RebaseBranch { .. } => snapshot
                .target_sha
                .clone()
                .map(|sha| Self::ResetToSha { sha, hard: true }),
            Self::ResetToSha { hard, .. } => snapshot
                .target_sha
                .clone()
                .map(|sha| Self::ResetToSha { sha, hard: *hard }),
            Self::StashOpenChanges => Some(Self::RestoreOpenChanges),
            Self::RestoreOpenChanges => Some(Self::StashOpenChanges),
            Self::SyncBranch { branch, .. } => restore_branch(branch, snapshot),
            Self::MergePullRequest { parent, .. } => restore_branch(parent, snapshot),
            Self::AbortMerge
            | Self::AbortRebase
            | Self::ContinueMerge
            | Self::ContinueRebase
            | Self::DropStash
            | Self::Fetch
            | Self::PushBranch { .. }
            | Self::RestoreBranch { .. }
            | Self::ContinueSyncBranch { .. } => None,
        }
    }

    /// The step that cleans up when the run is abandoned while this step
    /// is active (for example stopped on a conflict)
    pub fn abort_step(&self, snapshot: &StepSnapshot) -> Option<Self> {
        match self {
            Self::MergeBranch { .. } => Some(Self::AbortMerge),
            Self::RebaseBranch { .. } => Some(Self::AbortRebase),
            Self::SyncBranch { branch, .. } => restore_branch(branch, snapshot),
            Self::RestoreOpenChanges => snapshot
                .target_sha
                .clone()
                .map(|sha| Self::ResetToSha { sha, hard: true }),
            _ => None,
        }
    }

    /// The step that resumes this one after conflicts were resolved
    pub fn continue_step(&self) -> Option<Self> {
        match self {
            Self::MergeBranch { .. } => Some(Self::ContinueMerge),
            Self::RebaseBranch { .. } => Some(Self::ContinueRebase),
            Self::RestoreOpenChanges => Some(Self::DropStash),
            Self::SyncBranch { branch, push_after } => Some(Self::ContinueSyncBranch {
                branch: branch.clone(),
                push_after: *push_after,
            }),
            _ => None,
        }
    }

    /// Execute the step
    pub async fn run(&self, ctx: &mut StepContext<'_>) -> StepOutcome {
        execute::run(self, ctx).await.into()
    }
}

fn restore_branch(branch: &str, snapshot: &StepSnapshot) -> Option<Step> {
    let sha = snapshot.target_sha.clone()?;
    let return_to = snapshot.current_branch.clone()?;
    Some(Step::RestoreBranch {
        branch: branch.to_string(),
        sha,
        return_to,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_on(branch: &str, sha: &str) -> StepSnapshot {
        StepSnapshot {
            current_branch: Some(branch.to_string()),
            target_sha: Some(sha.to_string()),
            ..StepSnapshot::default()
        }
    }

    #[test]
    fn test_create_branch_undo_deletes_it() {
        let step = Step::CreateBranch {
            branch: "b".to_string(),
            starting_point: "main".to_string(),
        };
        assert_eq!(
            step.undo_step(&StepSnapshot::default()),
            Some(Step::DeleteLocalBranch {
                branch: "b".to_string(),
                force: true
            })
        );
        assert_eq!(step.abort_step(&StepSnapshot::default()), None);
        assert_eq!(step.continue_step(), None);
    }

    #[test]
    fn test_checkout_undo_returns_to_previous_branch() {
        let step = Step::CheckoutBranch {
            branch: "b".to_string(),
        };
        let undo = step.undo_step(&snapshot_on("main", "abc"));
        assert_eq!(
            undo,
            Some(Step::CheckoutBranch {
                branch: "main".to_string()
            })
        );
        // already on the branch: nothing to undo
        assert_eq!(step.undo_step(&snapshot_on("b", "abc")), None);
    }

    #[test]
    fn test_set_parent_undo_restores_or_deletes() {
        let step = Step::SetParentBranch {
            branch: "b".to_string(),
            parent: "main".to_string(),
        };
        assert_eq!(
            step.undo_step(&StepSnapshot::default()),
            Some(Step::DeleteParentBranch {
                branch: "b".to_string()
            })
        );
        let previous = StepSnapshot {
            previous_parent: Some("develop".to_string()),
            ..StepSnapshot::default()
        };
        assert_eq!(
            step.undo_step(&previous),
            Some(Step::SetParentBranch {
                branch: "b".to_string(),
                parent: "develop".to_string()
            })
        );
    }

    #[test]
    fn test_merge_inverses() {
        let step = Step::MergeBranch {
            branch: "main".to_string(),
        };
        let snap = snapshot_on("feature", "abc123");
        assert_eq!(
            step.undo_step(&snap),
            Some(Step::ResetToSha {
                sha: "abc123".to_string(),
                hard: true
            })
        );
        assert_eq!(step.abort_step(&snap), Some(Step::AbortMerge));
        assert_eq!(step.continue_step(), Some(Step::ContinueMerge));
    }

    #[test]
    fn test_sync_branch_abort_restores_branch_and_checkout() {
        let step = Step::SyncBranch {
            branch: "feature".to_string(),
            push_after: false,
        };
        let snap = snapshot_on("main", "abc123");
        let restore = Step::RestoreBranch {
            branch: "feature".to_string(),
            sha: "abc123".to_string(),
            return_to: "main".to_string(),
        };
        assert_eq!(step.abort_step(&snap), Some(restore.clone()));
        assert_eq!(step.undo_step(&snap), Some(restore));
        assert_eq!(
            step.continue_step(),
            Some(Step::ContinueSyncBranch {
                branch: "feature".to_string(),
                push_after: false
            })
        );
    }

    #[test]
    fn test_stash_pair_inverts() {
        let snap = StepSnapshot::default();
        assert_eq!(
            Step::StashOpenChanges.undo_step(&snap),
            Some(Step::RestoreOpenChanges)
        );
        assert_eq!(
            Step::RestoreOpenChanges.undo_step(&snap),
            Some(Step::StashOpenChanges)
        );
    }

    #[test]
    fn test_conflicted_stash_pop_continues_by_dropping_entry() {
        let snap = snapshot_on("main", "abc123");
        assert_eq!(
            Step::RestoreOpenChanges.continue_step(),
            Some(Step::DropStash)
        );
        assert_eq!(
            Step::RestoreOpenChanges.abort_step(&snap),
            Some(Step::ResetToSha {
                sha: "abc123".to_string(),
                hard: true
            })
        );
        assert_eq!(Step::DropStash.undo_step(&snap), None);
        assert_eq!(Step::DropStash.to_string(), "git stash drop");
    }

    #[test]
    fn test_delete_remote_branch_without_sha_has_no_undo() {
        let step = Step::DeleteRemoteBranch {
            branch: "b".to_string(),
        };
        assert_eq!(step.undo_step(&StepSnapshot::default()), None);
    }

    #[test]
    fn test_steps_serialize_with_stable_tag() {
        let step = Step::CreateBranch {
            branch: "b".to_string(),
            starting_point: "main".to_string(),
        };
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["type"], "create_branch");
        assert_eq!(json["starting_point"], "main");

        let unit = serde_json::to_value(Step::StashOpenChanges).unwrap();
        assert_eq!(unit, serde_json::json!({ "type": "stash_open_changes" }));
    }

    #[test]
    fn test_display_reads_like_git() {
        let step = Step::DeleteLocalBranch {
            branch: "b".to_string(),
            force: true,
        };
        assert_eq!(step.to_string(), "git branch -D b");
        let restore = Step::RestoreBranch {
            branch: "b".to_string(),
            sha: "0123456789abcdef".to_string(),
            return_to: "main".to_string(),
        };
        assert_eq!(restore.to_string(), "restore b to 0123456 and check out main");
    }
}
