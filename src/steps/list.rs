//! Ordered step sequences

use super::Step;
use crate::error::Result;
use crate::git::Repo;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// A FIFO of steps. The run, undo and abort lists of a run are all `StepList`s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepList {
    steps: VecDeque<Step>,
}

/// Which brackets [`StepList::wrap`] adds around a workflow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WrapOptions {
    /// Run the workflow from the repository root and return afterwards
    pub run_in_repo_root: bool,
    /// Stash uncommitted changes first and restore them at the end
    pub stash_open_changes: bool,
}

impl StepList {
    /// Empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a step at the end
    pub fn append(&mut self, step: Step) {
        self.steps.push_back(step);
    }

    /// Add all steps of `other` at the end, preserving their order
    pub fn append_list(&mut self, other: Self) {
        self.steps.extend(other.steps);
    }

    /// Add a step at the front
    pub fn prepend(&mut self, step: Step) {
        self.steps.push_front(step);
    }

    /// Remove and return the first step
    pub fn pop_front(&mut self) -> Option<Step> {
        self.steps.pop_front()
    }

    /// First step, if any
    pub fn peek(&self) -> Option<&Step> {
        self.steps.front()
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Iterate in execution order
    pub fn iter(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter()
    }

    /// Bracket the list with directory and stash management.
    ///
    /// The stash bracket is outermost so changes are shelved before anything
    /// else runs and come back last. It is only added when there actually
    /// are uncommitted changes.
    pub fn wrap(&mut self, options: WrapOptions, repo: &mut Repo) -> Result<()> {
        if options.run_in_repo_root {
            let root = repo.root_dir()?;
            let current = repo.workdir().to_path_buf();
            if current != root {
                debug!(from = %current.display(), to = %root.display(), "running from repository root");
                self.prepend(Step::ChangeDirectory { directory: root });
                self.append(Step::ChangeDirectory {
                    directory: current,
                });
            }
        }
        if options.stash_open_changes && repo.has_open_changes()? {
            debug!("stashing open changes around the workflow");
            self.prepend(Step::StashOpenChanges);
            self.append(Step::RestoreOpenChanges);
        }
        Ok(())
    }
}

impl FromIterator<Step> for StepList {
    fn from_iter<I: IntoIterator<Item = Step>>(iter: I) -> Self {
        Self {
            steps: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for StepList {
    type Item = Step;
    type IntoIter = std::collections::vec_deque::IntoIter<Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.into_iter()
    }
}
