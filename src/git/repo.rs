//! Working-copy handle with memoized queries

use super::{Executor, ExecOutput, GitExecutor, RepoCache, classify};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// git config section holding branch-hierarchy bookkeeping
const BRANCH_SECTION: &str = "relay-branch";

/// git config key storing the parent of `branch`
pub fn parent_config_key(branch: &str) -> String {
    format!("{BRANCH_SECTION}.{branch}.parent")
}

/// A git working copy plus the per-run query cache.
///
/// The working directory is explicit state: directory-change steps move it,
/// and every git invocation runs there.
pub struct Repo {
    executor: Arc<dyn Executor>,
    workdir: PathBuf,
    cache: RepoCache,
}

impl std::fmt::Debug for Repo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repo")
            .field("workdir", &self.workdir)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl Repo {
    /// Create a repo handle over an arbitrary executor
    pub fn new(executor: Arc<dyn Executor>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            executor,
            workdir: workdir.into(),
            cache: RepoCache::default(),
        }
    }

    /// Open the repository containing `path` using the system git binary
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Self::new(Arc::new(GitExecutor), path);
        if !repo.is_repository()? {
            return Err(Error::NotARepository(path.display().to_string()));
        }
        Ok(repo)
    }

    /// Directory git commands run in
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Move the working directory
    pub fn set_workdir(&mut self, dir: impl Into<PathBuf>) {
        self.workdir = dir.into();
    }

    /// Mutable access to the query cache
    pub const fn cache_mut(&mut self) -> &mut RepoCache {
        &mut self.cache
    }

    /// Run git and return raw output without classification
    pub fn query(&self, args: &[&str]) -> Result<ExecOutput> {
        self.executor.execute(&self.workdir, args)
    }

    /// Run git, mapping failures to conflict or git errors
    pub fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.query(args)?;
        classify(args, output)
    }

    /// Whether the working directory is inside a git work tree
    pub fn is_repository(&self) -> Result<bool> {
        let out = self.query(&["rev-parse", "--is-inside-work-tree"])?;
        Ok(out.success() && out.stdout.trim() == "true")
    }

    /// Absolute path of the work tree root
    pub fn root_dir(&mut self) -> Result<PathBuf> {
        if let Some(root) = self.cache.root_dir.get() {
            return Ok(PathBuf::from(root));
        }
        let root = self.run(&["rev-parse", "--show-toplevel"])?.trim().to_string();
        self.cache.root_dir.set(root.clone());
        Ok(PathBuf::from(root))
    }

    /// Name of the checked out branch (errors on detached HEAD)
    pub fn current_branch(&mut self) -> Result<String> {
        if let Some(branch) = self.cache.current_branch.get() {
            return Ok(branch);
        }
        let out = self.query(&["symbolic-ref", "--short", "-q", "HEAD"])?;
        if !out.success() {
            return Err(Error::Git {
                command: "symbolic-ref --short -q HEAD".to_string(),
                message: "HEAD is detached".to_string(),
            });
        }
        let branch = out.stdout.trim().to_string();
        debug!(%branch, "current branch");
        self.cache.current_branch.set(branch.clone());
        Ok(branch)
    }

    /// Check out `branch`, keeping the cache in step
    pub fn checkout(&mut self, branch: &str) -> Result<()> {
        self.run(&["checkout", branch])?;
        self.cache.current_branch.set(branch.to_string());
        Ok(())
    }

    /// Forget cached ref information after a mutation
    pub fn invalidate_refs(&mut self) {
        self.cache.invalidate_refs();
    }

    /// Whether the work tree or index contain uncommitted changes
    pub fn has_open_changes(&self) -> Result<bool> {
        let out = self.run(&["status", "--porcelain", "--ignore-submodules"])?;
        Ok(!out.trim().is_empty())
    }

    /// Whether there are files with unresolved conflicts
    pub fn has_conflicts(&self) -> Result<bool> {
        let out = self.run(&["diff", "--name-only", "--diff-filter=U"])?;
        Ok(!out.trim().is_empty())
    }

    /// Whether a local branch named `branch` exists
    pub fn has_local_branch(&self, branch: &str) -> Result<bool> {
        let refname = format!("refs/heads/{branch}");
        Ok(self
            .query(&["show-ref", "--verify", "--quiet", &refname])?
            .success())
    }

    /// Local branch names
    pub fn local_branches(&self) -> Result<Vec<String>> {
        let out = self.run(&["for-each-ref", "--format=%(refname:short)", "refs/heads"])?;
        Ok(out.lines().map(str::to_string).collect())
    }

    /// Configured remote names
    pub fn remotes(&mut self) -> Result<Vec<String>> {
        if let Some(remotes) = self.cache.remotes.get() {
            return Ok(remotes);
        }
        let out = self.run(&["remote"])?;
        let remotes: Vec<String> = out.lines().map(str::to_string).collect();
        self.cache.remotes.set(remotes.clone());
        Ok(remotes)
    }

    /// Whether the `origin` remote exists
    pub fn has_origin(&mut self) -> Result<bool> {
        if let Some(has) = self.cache.has_origin.get() {
            return Ok(has);
        }
        let has = self.remotes()?.iter().any(|r| r == "origin");
        self.cache.has_origin.set(has);
        Ok(has)
    }

    /// URL of a remote, if configured
    pub fn remote_url(&self, remote: &str) -> Result<Option<String>> {
        self.config_get(&format!("remote.{remote}.url"))
    }

    /// Remote-tracking branch names (`origin/foo`)
    pub fn remote_branches(&mut self) -> Result<Vec<String>> {
        if let Some(branches) = self.cache.remote_branches.get() {
            return Ok(branches);
        }
        let out = self.run(&["for-each-ref", "--format=%(refname:short)", "refs/remotes"])?;
        let branches: Vec<String> = out.lines().map(str::to_string).collect();
        self.cache.remote_branches.set(branches.clone());
        Ok(branches)
    }

    /// Whether `origin/<branch>` exists
    pub fn has_tracking_branch(&mut self, branch: &str) -> Result<bool> {
        let tracking = format!("origin/{branch}");
        Ok(self.remote_branches()?.contains(&tracking))
    }

    /// Whether `branch` exists locally or on any remote
    pub fn has_local_or_remote_branch(&mut self, branch: &str) -> Result<bool> {
        if self.has_local_branch(branch)? {
            return Ok(true);
        }
        let remote_branches = self.remote_branches()?;
        Ok(self.remotes()?.iter().any(|remote| {
            let tracking = format!("{remote}/{branch}");
            remote_branches.contains(&tracking)
        }))
    }

    /// Commit SHA a revision resolves to, or `None` if it does not exist
    pub fn sha(&self, rev: &str) -> Result<Option<String>> {
        let spec = format!("{rev}^{{commit}}");
        let out = self.query(&["rev-parse", "-q", "--verify", &spec])?;
        if !out.success() {
            return Ok(None);
        }
        Ok(Some(out.stdout.trim().to_string()))
    }

    /// Whether a merge is waiting to be committed
    pub fn is_merge_in_progress(&self) -> Result<bool> {
        Ok(self
            .query(&["rev-parse", "-q", "--verify", "MERGE_HEAD"])?
            .success())
    }

    /// Whether a rebase has stopped part way
    pub fn is_rebase_in_progress(&self) -> Result<bool> {
        for state_dir in ["rebase-merge", "rebase-apply"] {
            let path = self.run(&["rev-parse", "--git-path", state_dir])?;
            if self.workdir.join(path.trim()).exists() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Read a git config value
    pub fn config_get(&self, key: &str) -> Result<Option<String>> {
        let out = self.query(&["config", "--get", key])?;
        match out.exit_code {
            0 => Ok(Some(out.stdout.trim().to_string())),
            1 => Ok(None),
            _ => Err(Error::Config(format!(
                "cannot read git config {key}: {}",
                out.stderr.trim()
            ))),
        }
    }

    /// All `(key, value)` pairs whose key matches `pattern`
    pub fn config_get_regexp(&self, pattern: &str) -> Result<Vec<(String, String)>> {
        let out = self.query(&["config", "--get-regexp", pattern])?;
        if out.exit_code == 1 {
            return Ok(Vec::new());
        }
        let stdout = classify(&["config", "--get-regexp", pattern], out)?;
        Ok(stdout
            .lines()
            .filter_map(|line| {
                let (key, value) = line.split_once(' ')?;
                Some((key.to_string(), value.trim().to_string()))
            })
            .collect())
    }

    /// Write a git config value
    pub fn config_set(&self, key: &str, value: &str) -> Result<()> {
        self.run(&["config", key, value])?;
        Ok(())
    }

    /// Remove a git config value (no-op if absent)
    pub fn config_unset(&self, key: &str) -> Result<()> {
        let out = self.query(&["config", "--unset", key])?;
        // exit 5: key was not set
        if out.success() || out.exit_code == 5 {
            return Ok(());
        }
        classify(&["config", "--unset", key], out).map(|_| ())
    }

    /// Configured parent of `branch`
    pub fn parent_branch(&self, branch: &str) -> Result<Option<String>> {
        self.config_get(&parent_config_key(branch))
    }

    /// Record `parent` as the parent of `branch`
    pub fn set_parent_branch(&self, branch: &str, parent: &str) -> Result<()> {
        self.config_set(&parent_config_key(branch), parent)
    }

    /// Forget the parent of `branch`
    pub fn delete_parent_branch(&self, branch: &str) -> Result<()> {
        self.config_unset(&parent_config_key(branch))
    }
}
