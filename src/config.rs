//! Configuration: user defaults, repository settings and branch hierarchy
//!
//! Settings are read from `<config_dir>/git-relay/config.toml` first and then
//! overridden by `relay.*` keys in git config. The branch hierarchy lives in
//! git config as `relay-branch.<name>.parent`.

use crate::error::{Error, Result};
use crate::git::Repo;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory name under the platform config dir
const CONFIG_DIR: &str = "git-relay";

/// Filename for user-wide defaults
const CONFIG_FILE: &str = "config.toml";

/// Main branch used when nothing is configured
const DEFAULT_MAIN_BRANCH: &str = "main";

/// User-wide defaults as stored in `config.toml`
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct FileConfig {
    /// Default main branch name
    pub main_branch: Option<String>,
    /// Long-lived branches that are never shipped
    pub perennial_branches: Option<Vec<String>>,
    /// Push newly created branches
    pub new_branch_push_flag: Option<bool>,
    /// Never contact remotes
    pub offline: Option<bool>,
    /// Force a hosting driver (`github`/`gitlab`)
    pub code_hosting_driver: Option<String>,
    /// Hostname to use instead of the one in the origin URL
    pub code_hosting_origin_hostname: Option<String>,
    /// GitHub API token
    pub github_token: Option<String>,
    /// GitLab API token
    pub gitlab_token: Option<String>,
}

impl FileConfig {
    /// Default location of the user config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load a config file; a missing file yields empty defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
    }
}

/// Hosting-related settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostingConfig {
    /// Explicit driver name
    pub driver: Option<String>,
    /// Hostname override for remote URL detection
    pub origin_hostname: Option<String>,
    /// GitHub API token
    pub github_token: Option<String>,
    /// GitLab API token
    pub gitlab_token: Option<String>,
}

/// Effective configuration for one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Main development branch
    pub main_branch: String,
    /// Long-lived branches besides main
    pub perennial_branches: Vec<String>,
    /// Push new branches to origin when creating them
    pub new_branch_push: bool,
    /// Skip all network operations
    pub offline: bool,
    /// Hosting driver settings
    pub hosting: HostingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            main_branch: DEFAULT_MAIN_BRANCH.to_string(),
            perennial_branches: Vec::new(),
            new_branch_push: false,
            offline: false,
            hosting: HostingConfig::default(),
        }
    }
}

impl Config {
    /// Load the user config file (if any) and layer repository git config on top
    pub fn load(repo: &Repo) -> Result<Self> {
        let file = match FileConfig::default_path() {
            Some(path) => FileConfig::load(&path)?,
            None => FileConfig::default(),
        };
        Self::from_sources(file, repo)
    }

    /// Merge file defaults with `relay.*` git config values
    pub fn from_sources(file: FileConfig, repo: &Repo) -> Result<Self> {
        let git = |key: &str| repo.config_get(&format!("relay.{key}"));

        let main_branch = git("main-branch")?
            .or(file.main_branch)
            .unwrap_or_else(|| DEFAULT_MAIN_BRANCH.to_string());
        let perennial_branches = match git("perennial-branches")? {
            Some(list) => list.split_whitespace().map(str::to_string).collect(),
            None => file.perennial_branches.unwrap_or_default(),
        };
        let new_branch_push = match git("new-branch-push-flag")? {
            Some(v) => parse_bool("relay.new-branch-push-flag", &v)?,
            None => file.new_branch_push_flag.unwrap_or(false),
        };
        let offline = match git("offline")? {
            Some(v) => parse_bool("relay.offline", &v)?,
            None => file.offline.unwrap_or(false),
        };

        let hosting = HostingConfig {
            driver: git("code-hosting-driver")?.or(file.code_hosting_driver),
            origin_hostname: git("code-hosting-origin-hostname")?
                .or(file.code_hosting_origin_hostname),
            github_token: git("github-token")?.or(file.github_token),
            gitlab_token: git("gitlab-token")?.or(file.gitlab_token),
        };

        let config = Self {
            main_branch,
            perennial_branches,
            new_branch_push,
            offline,
            hosting,
        };
        debug!(main = %config.main_branch, offline = config.offline, "loaded config");
        Ok(config)
    }

    /// Whether `branch` is the main branch
    pub fn is_main_branch(&self, branch: &str) -> bool {
        branch == self.main_branch
    }

    /// Whether `branch` is main or one of the perennial branches
    pub fn is_perennial_branch(&self, branch: &str) -> bool {
        self.is_main_branch(branch) || self.perennial_branches.iter().any(|b| b == branch)
    }

    /// Feature branches are everything that is not perennial
    pub fn is_feature_branch(&self, branch: &str) -> bool {
        !self.is_perennial_branch(branch)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => Err(Error::Config(format!(
            "{key} must be a boolean, got {other:?}"
        ))),
    }
}

/// Parent relationships between branches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchHierarchy {
    parents: BTreeMap<String, String>,
}

impl BranchHierarchy {
    /// Read all `relay-branch.<name>.parent` entries
    pub fn load(repo: &Repo) -> Result<Self> {
        let entries = repo.config_get_regexp(r"^relay-branch\..*\.parent$")?;
        let parents = entries
            .into_iter()
            .filter_map(|(key, parent)| {
                let branch = key
                    .strip_prefix("relay-branch.")?
                    .strip_suffix(".parent")?;
                Some((branch.to_string(), parent))
            })
            .collect();
        Ok(Self { parents })
    }

    /// Build from explicit `(branch, parent)` pairs
    pub fn from_pairs<I, B, P>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (B, P)>,
        B: Into<String>,
        P: Into<String>,
    {
        Self {
            parents: pairs
                .into_iter()
                .map(|(b, p)| (b.into(), p.into()))
                .collect(),
        }
    }

    /// Parent of `branch`
    pub fn parent(&self, branch: &str) -> Option<&str> {
        self.parents.get(branch).map(String::as_str)
    }

    /// Record a parent in memory
    pub fn set_parent(&mut self, branch: &str, parent: &str) {
        self.parents.insert(branch.to_string(), parent.to_string());
    }

    /// Direct children of `branch`, sorted by name
    pub fn children(&self, branch: &str) -> Vec<String> {
        self.parents
            .iter()
            .filter(|(_, parent)| parent.as_str() == branch)
            .map(|(child, _)| child.clone())
            .collect()
    }

    /// Branches with a configured parent
    pub fn branches(&self) -> impl Iterator<Item = &str> {
        self.parents.keys().map(String::as_str)
    }

    /// Ancestors of `branch`, oldest first (the root comes first, the
    /// direct parent last). Fails if the chain loops.
    pub fn ancestors(&self, branch: &str) -> Result<Vec<String>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([branch.to_string()]);
        let mut current = branch;
        while let Some(parent) = self.parent(current) {
            if !seen.insert(parent.to_string()) {
                let mut path: Vec<&str> = vec![branch];
                path.extend(chain.iter().map(String::as_str));
                path.push(parent);
                return Err(Error::CyclicHierarchy(path.join(" -> ")));
            }
            chain.push(parent.to_string());
            current = parent;
        }
        chain.reverse();
        Ok(chain)
    }

    /// Whether every ancestor chain terminates
    pub fn validate(&self) -> Result<()> {
        for branch in self.parents.keys() {
            self.ancestors(branch)?;
        }
        Ok(())
    }
}
