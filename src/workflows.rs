//! Step lists for the high-level commands
//!
//! Planning only reads the repository. All validation happens here, before
//! a run exists, so a rejected command leaves no run state behind.

use crate::config::{BranchHierarchy, Config};
use crate::error::{Error, Result};
use crate::git::Repo;
use crate::steps::{Step, StepList, WrapOptions};
use crate::types::PullRequestInfo;
use tracing::debug;

/// Builds step lists from the current repository state
pub struct Planner<'a> {
    repo: &'a mut Repo,
    config: &'a Config,
    hierarchy: BranchHierarchy,
}

impl<'a> Planner<'a> {
    /// Planner with the branch hierarchy loaded from git config
    pub fn new(repo: &'a mut Repo, config: &'a Config) -> Result<Self> {
        let hierarchy = BranchHierarchy::load(repo)?;
        hierarchy.validate()?;
        Ok(Self {
            repo,
            config,
            hierarchy,
        })
    }

    /// Loaded branch hierarchy
    pub const fn hierarchy(&self) -> &BranchHierarchy {
        &self.hierarchy
    }

    /// Record a parent both in git config and in the loaded hierarchy
    pub fn learn_parent(&mut self, branch: &str, parent: &str) -> Result<()> {
        self.repo.set_parent_branch(branch, parent)?;
        self.hierarchy.set_parent(branch, parent);
        Ok(())
    }

    /// The first branch in `branch`'s ancestry whose parent is unknown
    pub fn missing_parent(&self, branch: &str) -> Result<Option<String>> {
        let mut lineage = self.hierarchy.ancestors(branch)?;
        lineage.push(branch.to_string());
        Ok(lineage
            .into_iter()
            .find(|b| self.config.is_feature_branch(b) && self.hierarchy.parent(b).is_none()))
    }

    /// Local branches that could become the parent of `branch`, main first
    pub fn candidate_parents(&self, branch: &str) -> Result<Vec<String>> {
        let mut branches: Vec<String> = self
            .repo
            .local_branches()?
            .into_iter()
            .filter(|b| b != branch)
            .collect();
        branches.sort_by_key(|b| !self.config.is_main_branch(b));
        Ok(branches)
    }

    /// Create a feature branch off the main branch
    pub fn hack(&mut self, target: &str) -> Result<StepList> {
        self.ensure_new_branch(target)?;
        let main = self.config.main_branch.clone();

        let mut list = self.sync_steps(&[main.clone()])?;
        list.append_list(self.create_branch_steps(target, &main)?);
        self.wrap(list, true)
    }

    /// Create a feature branch as a child of the current branch
    pub fn append(&mut self, target: &str) -> Result<StepList> {
        self.ensure_new_branch(target)?;
        let initial = self.repo.current_branch()?;
        self.ensure_parent_known(&initial)?;

        let mut lineage = self.hierarchy.ancestors(&initial)?;
        lineage.push(initial.clone());
        let mut list = self.sync_steps(&lineage)?;
        list.append_list(self.create_branch_steps(target, &initial)?);
        self.wrap(list, true)
    }

    /// Create a feature branch between the current branch and its parent
    pub fn prepend(&mut self, target: &str) -> Result<StepList> {
        self.ensure_new_branch(target)?;
        let initial = self.repo.current_branch()?;
        if !self.config.is_feature_branch(&initial) {
            return Err(Error::NotFeatureBranch(initial));
        }
        let parent = self.ensure_parent_known(&initial)?;

        let ancestors = self.hierarchy.ancestors(&initial)?;
        let mut list = self.sync_steps(&ancestors)?;
        list.append(Step::CreateBranch {
            branch: target.to_string(),
            starting_point: parent.clone(),
        });
        list.append(Step::SetParentBranch {
            branch: target.to_string(),
            parent,
        });
        list.append(Step::SetParentBranch {
            branch: initial,
            parent: target.to_string(),
        });
        list.append(Step::CheckoutBranch {
            branch: target.to_string(),
        });
        if self.should_push_new_branches()? {
            list.append(Step::CreateTrackingBranch {
                branch: target.to_string(),
            });
        }
        self.wrap(list, true)
    }

    /// Update the current branch (or every local branch) from its tracking
    /// branch and ancestors, then return to where we started
    pub fn sync(&mut self, all: bool) -> Result<StepList> {
        let initial = self.repo.current_branch()?;
        let branches = if all {
            self.all_branches_ancestors_first()?
        } else {
            self.ensure_parent_known(&initial)?;
            let mut lineage = self.hierarchy.ancestors(&initial)?;
            lineage.push(initial.clone());
            lineage
        };

        let mut list = StepList::new();
        list.append(Step::Fetch);
        list.append_list(self.sync_steps(&branches)?);
        list.append(Step::CheckoutBranch { branch: initial });
        self.wrap(list, true)
    }

    /// Merge a feature branch into its parent through the hosting service
    /// and clean up after it
    pub fn ship(
        &mut self,
        branch: Option<&str>,
        pull_request: &PullRequestInfo,
        commit_message: Option<&str>,
    ) -> Result<StepList> {
        let initial = self.repo.current_branch()?;
        let branch = branch.map_or_else(|| initial.clone(), str::to_string);
        if !self.config.is_feature_branch(&branch) {
            return Err(Error::NotFeatureBranch(branch));
        }
        if !self.repo.has_local_branch(&branch)? {
            return Err(Error::BranchNotFound(branch));
        }
        if self.repo.has_open_changes()? {
            return Err(Error::Config(
                "you have uncommitted changes. Did you mean to commit them before shipping?"
                    .to_string(),
            ));
        }
        let parent = self.ensure_parent_known(&branch)?;
        if !pull_request.can_merge_with_api {
            return Err(Error::Hosting(format!(
                "cannot ship {branch}: there is no single open pull request from {branch} into {parent} that can be merged through the API"
            )));
        }

        let mut lineage = self.hierarchy.ancestors(&branch)?;
        lineage.push(branch.clone());

        let mut list = StepList::new();
        list.append(Step::Fetch);
        list.append_list(self.sync_steps(&lineage)?);
        list.append(Step::CheckoutBranch {
            branch: parent.clone(),
        });
        list.append(Step::MergePullRequest {
            branch: branch.clone(),
            parent: parent.clone(),
            pull_request_number: pull_request.pull_request_number,
            commit_message: commit_message
                .map_or_else(|| pull_request.default_commit_message.clone(), str::to_string),
        });
        if self.is_online()? && self.repo.has_tracking_branch(&branch)? {
            list.append(Step::DeleteRemoteBranch {
                branch: branch.clone(),
            });
        }
        list.append(Step::DeleteLocalBranch {
            branch: branch.clone(),
            force: true,
        });
        list.append(Step::DeleteParentBranch {
            branch: branch.clone(),
        });
        for child in self.hierarchy.children(&branch) {
            list.append(Step::SetParentBranch {
                branch: child,
                parent: parent.clone(),
            });
        }
        if initial != branch && initial != parent {
            list.append(Step::CheckoutBranch { branch: initial });
        }
        self.wrap(list, false)
    }

    /// One sync step per branch; perennial branches are only pushed when
    /// they already exist on origin
    fn sync_steps(&mut self, branches: &[String]) -> Result<StepList> {
        let mut list = StepList::new();
        for branch in branches {
            let push_after = if self.config.is_feature_branch(branch) {
                true
            } else {
                self.repo.has_tracking_branch(branch)?
            };
            list.append(Step::SyncBranch {
                branch: branch.clone(),
                push_after,
            });
        }
        Ok(list)
    }

    fn create_branch_steps(&mut self, target: &str, parent: &str) -> Result<StepList> {
        let mut list = StepList::new();
        list.append(Step::CreateBranch {
            branch: target.to_string(),
            starting_point: parent.to_string(),
        });
        list.append(Step::SetParentBranch {
            branch: target.to_string(),
            parent: parent.to_string(),
        });
        list.append(Step::CheckoutBranch {
            branch: target.to_string(),
        });
        if self.should_push_new_branches()? {
            list.append(Step::CreateTrackingBranch {
                branch: target.to_string(),
            });
        }
        Ok(list)
    }

    /// Perennial branches first, then feature branches by depth
    fn all_branches_ancestors_first(&mut self) -> Result<Vec<String>> {
        let local = self.repo.local_branches()?;
        let mut perennial = Vec::new();
        let mut features = Vec::new();
        for branch in local {
            if self.config.is_feature_branch(&branch) {
                if let Some(missing) = self.missing_parent(&branch)? {
                    return Err(Error::UnknownParent(missing));
                }
                let depth = self.hierarchy.ancestors(&branch)?.len();
                features.push((depth, branch));
            } else {
                perennial.push(branch);
            }
        }
        perennial.sort_by_key(|b| !self.config.is_main_branch(b));
        features.sort();
        debug!(perennial = perennial.len(), features = features.len(), "syncing all branches");
        Ok(perennial
            .into_iter()
            .chain(features.into_iter().map(|(_, b)| b))
            .collect())
    }

    fn ensure_new_branch(&mut self, target: &str) -> Result<()> {
        if self.repo.has_local_or_remote_branch(target)? {
            return Err(Error::BranchExists(target.to_string()));
        }
        Ok(())
    }

    /// Parent of `branch`; feature branches must have one recorded for
    /// themselves and every ancestor
    fn ensure_parent_known(&self, branch: &str) -> Result<String> {
        if let Some(missing) = self.missing_parent(branch)? {
            return Err(Error::UnknownParent(missing));
        }
        Ok(self
            .hierarchy
            .parent(branch)
            .map_or_else(|| self.config.main_branch.clone(), str::to_string))
    }

    fn is_online(&mut self) -> Result<bool> {
        Ok(!self.config.offline && self.repo.has_origin()?)
    }

    fn should_push_new_branches(&mut self) -> Result<bool> {
        Ok(self.config.new_branch_push && self.is_online()?)
    }

    fn wrap(&mut self, mut list: StepList, stash_open_changes: bool) -> Result<StepList> {
        list.wrap(
            WrapOptions {
                run_in_repo_root: true,
                stash_open_changes,
            },
            &mut *self.repo,
        )?;
        Ok(list)
    }
}
