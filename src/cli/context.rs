//! Shared command context for CLI commands
//!
//! Extracts the setup every command needs: opening the repository, loading
//! configuration and locating the run state.

use crate::cli::style::{Stylize, check, spinner_style};
use anyhow::Context as _;
use dialoguer::Select;
use git_relay::config::Config;
use git_relay::error::{Error, Result};
use git_relay::git::Repo;
use git_relay::platform::{HostingDriver, create_hosting_driver};
use git_relay::runner::{RunOutcome, Runner};
use git_relay::runstate::RunStateStore;
use git_relay::steps::{StepContext, StepList};
use git_relay::workflows::Planner;
use indicatif::ProgressBar;
use std::io::IsTerminal;
use std::path::Path;
use std::time::Duration;

/// Shared context for CLI commands
pub struct CommandContext {
    /// The working copy
    pub repo: Repo,
    /// Effective configuration
    pub config: Config,
    /// Run state location for this repository
    pub store: RunStateStore,
}

impl CommandContext {
    /// Open the repository containing `path`
    pub fn new(path: &Path) -> Result<Self> {
        let mut repo = Repo::open(path)?;
        let root = repo.root_dir()?;
        let config = Config::load(&repo)?;
        let store = RunStateStore::for_repo(&root);
        Ok(Self {
            repo,
            config,
            store,
        })
    }

    /// Fail early when a run is already paused or in flight
    pub fn ensure_no_run_in_progress(&self) -> Result<()> {
        match self.store.load()? {
            Some(state) if state.is_unfinished() => Err(Error::RunInProgress {
                command: state.command,
            }),
            _ => Ok(()),
        }
    }

    /// Hosting driver for `origin`, if any
    pub fn hosting(&mut self) -> Result<Option<Box<dyn HostingDriver>>> {
        create_hosting_driver(&self.config, &mut self.repo)
    }

    /// Fetch from origin with a spinner so planning sees current branches
    pub fn fetch(&mut self) -> Result<()> {
        if self.config.offline || !self.repo.has_origin()? {
            return Ok(());
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(spinner_style());
        spinner.set_message(format!("Fetching from {}...", "origin".emphasis()));
        spinner.enable_steady_tick(Duration::from_millis(80));

        let result = self.repo.run(&["fetch", "--prune", "--tags"]);
        self.repo.invalidate_refs();
        match result {
            Ok(_) => {
                spinner.finish_with_message(format!("{} Fetched from {}", check(), "origin".emphasis()));
                Ok(())
            }
            Err(e) => {
                spinner.finish_and_clear();
                Err(e)
            }
        }
    }

    /// Start a run of `steps`
    #[allow(clippy::future_not_send)]
    pub async fn execute(
        &mut self,
        command: &str,
        steps: StepList,
        hosting: Option<&dyn HostingDriver>,
    ) -> Result<RunOutcome> {
        let mut runner = self.runner(hosting);
        runner.run(command, steps).await
    }

    /// Runner over this repository
    pub fn runner<'a>(&'a mut self, hosting: Option<&'a dyn HostingDriver>) -> Runner<'a> {
        let ctx = StepContext::new(&mut self.repo, &self.config).with_hosting(hosting);
        Runner::new(ctx, self.store.clone())
    }
}

/// Build a step list, asking for unknown parent branches when a terminal
/// is attached
pub fn plan_with_prompts<F>(planner: &mut Planner<'_>, mut build: F) -> anyhow::Result<StepList>
where
    F: FnMut(&mut Planner<'_>) -> Result<StepList>,
{
    loop {
        match build(planner) {
            Err(Error::UnknownParent(branch)) if std::io::stdin().is_terminal() => {
                ask_parent(planner, &branch)?;
            }
            result => return Ok(result?),
        }
    }
}

/// Make sure `branch` and its ancestors have recorded parents
pub fn ensure_known_parents(planner: &mut Planner<'_>, branch: &str) -> anyhow::Result<()> {
    while let Some(missing) = planner.missing_parent(branch)? {
        if !std::io::stdin().is_terminal() {
            return Err(Error::UnknownParent(missing).into());
        }
        ask_parent(planner, &missing)?;
    }
    Ok(())
}

fn ask_parent(planner: &mut Planner<'_>, branch: &str) -> anyhow::Result<()> {
    let candidates = planner.candidate_parents(branch)?;
    if candidates.is_empty() {
        return Err(Error::UnknownParent(branch.to_string()).into());
    }
    let selection = Select::new()
        .with_prompt(format!("Please specify the parent branch of {}", branch.accent()))
        .items(&candidates)
        .default(0)
        .interact()
        .context("failed to read parent branch selection")?;
    planner.learn_parent(branch, &candidates[selection])?;
    Ok(())
}
