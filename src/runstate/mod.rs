//! Persistent record of an in-flight workflow
//!
//! A [`RunState`] holds everything needed to resume, undo or abort a run in a
//! later process: the remaining steps, the accumulated undo list and the
//! abort list of the step that was active when the process stopped.

mod storage;

pub use storage::{RunStateStore, resolve_git_dir};

use crate::steps::{Step, StepList, StepSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Current run state file format version
pub const RUNSTATE_VERSION: u32 = 1;

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created, no step executed yet
    NotStarted,
    /// Steps are being executed
    Running,
    /// Stopped on a conflict, waiting for continue, skip or abort
    PausedOnConflict,
    /// Every step completed
    Finished,
    /// Unwound after a failure or on request
    Aborted,
}

impl RunStatus {
    /// Finished and Aborted runs are never resumed
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Aborted)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotStarted => "not started",
            Self::Running => "running",
            Self::PausedOnConflict => "paused on a conflict",
            Self::Finished => "finished",
            Self::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// The step being executed (or paused on) with what it observed before running
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveStep {
    /// The step itself
    pub step: Step,
    /// Facts captured before it ran
    pub snapshot: StepSnapshot,
    /// Conflict description when paused
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict: Option<String>,
}

/// Execution record of one workflow invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    /// File format version
    pub version: u32,
    /// Name of the command that created the run (e.g. `sync`)
    pub command: String,
    /// Lifecycle status
    pub status: RunStatus,
    /// Steps still to execute, in order
    pub run_steps: StepList,
    /// Steps that reverse everything completed so far, most recent first
    pub undo_steps: StepList,
    /// Steps that unwind the active step and everything before it
    pub abort_steps: StepList,
    /// Step currently executing or paused on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<ActiveStep>,
    /// When the run was created
    pub started_at: DateTime<Utc>,
}

impl RunState {
    /// Fresh run for `command` over `steps`
    pub fn new(command: impl Into<String>, steps: StepList) -> Self {
        Self {
            version: RUNSTATE_VERSION,
            command: command.into(),
            status: RunStatus::NotStarted,
            run_steps: steps,
            undo_steps: StepList::new(),
            abort_steps: StepList::new(),
            active: None,
            started_at: Utc::now(),
        }
    }

    /// Whether a persisted run blocks starting a new one
    pub const fn is_unfinished(&self) -> bool {
        matches!(
            self.status,
            RunStatus::Running | RunStatus::PausedOnConflict
        )
    }

    /// Conflict description of the paused step
    pub fn conflict(&self) -> Option<&str> {
        self.active.as_ref()?.conflict.as_deref()
    }
}
