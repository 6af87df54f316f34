//! Run state machine: run, continue, abort and skip
//!
//! The runner only ever talks to steps through [`Step::run`],
//! [`Step::undo_step`], [`Step::abort_step`] and [`Step::continue_step`].
//! State is persisted before every step attempt and after every success, so
//! a later process can always pick up from the file alone.

use crate::error::{AbortFailure, Error, Result};
use crate::git::Repo;
use crate::runstate::{ActiveStep, RunState, RunStateStore, RunStatus};
use crate::steps::{Step, StepContext, StepList, StepOutcome};
use tracing::{debug, info, warn};

/// Exit code for a finished run
pub const EXIT_FINISHED: i32 = 0;
/// Exit code for an aborted run or a fatal failure
pub const EXIT_FAILED: i32 = 1;
/// Exit code for configuration errors
pub const EXIT_CONFIG: i32 = 2;
/// Exit code for a run paused on a conflict
pub const EXIT_PAUSED: i32 = 3;
/// Exit code for run state persistence failures
pub const EXIT_PERSISTENCE: i32 = 4;

/// How a runner operation ended (fatal failures are returned as `Err`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every step completed; run state is gone
    Finished {
        /// Command that started the run
        command: String,
    },
    /// A step stopped on a conflict; run state is persisted
    Paused {
        /// Command that started the run
        command: String,
        /// Description of the conflicted step
        step: String,
        /// What git reported
        reason: String,
    },
    /// The run was unwound on request; run state is gone
    Aborted {
        /// Command that started the run
        command: String,
        /// Abort steps that failed along the way
        failures: Vec<AbortFailure>,
    },
}

impl RunOutcome {
    /// Process exit code for this outcome
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Finished { .. } => EXIT_FINISHED,
            Self::Paused { .. } => EXIT_PAUSED,
            Self::Aborted { .. } => EXIT_FAILED,
        }
    }

    /// User-facing instructions for resuming a paused run
    pub fn resume_hint(&self) -> Option<String> {
        match self {
            Self::Paused { .. } => Some(
                "To continue after resolving the conflicts, run \"relay continue\".\n\
                 To go back to where you started, run \"relay abort\".\n\
                 To skip the conflicting step, run \"relay skip\"."
                    .to_string(),
            ),
            _ => None,
        }
    }
}

/// Executes step lists against a repository with durable, resumable state
pub struct Runner<'a> {
    ctx: StepContext<'a>,
    store: RunStateStore,
}

impl<'a> Runner<'a> {
    /// Runner over `ctx`, persisting to `store`
    pub const fn new(ctx: StepContext<'a>, store: RunStateStore) -> Self {
        Self { ctx, store }
    }

    /// The repository the runner works on
    pub fn repo(&mut self) -> &mut Repo {
        &mut *self.ctx.repo
    }

    /// Start a fresh run of `steps` for `command`.
    ///
    /// Refuses to start while another run is running or paused in the same
    /// repository.
    pub async fn run(&mut self, command: &str, steps: StepList) -> Result<RunOutcome> {
        if let Some(existing) = self.store.load()? {
            if existing.is_unfinished() {
                return Err(Error::RunInProgress {
                    command: existing.command,
                });
            }
            self.store.clear()?;
        }

        let mut state = RunState::new(command, steps);
        state.status = RunStatus::Running;
        self.store.save(&state)?;
        info!(command, steps = state.run_steps.len(), "starting run");
        self.drive(state).await
    }

    /// Resume a paused run after the user resolved the conflict.
    ///
    /// If the conflict is still there the run stays paused and nothing
    /// changes on disk.
    pub async fn continue_run(&mut self) -> Result<RunOutcome> {
        let mut state = self.load_required("continue")?;
        require_status(&state, "continue", &[RunStatus::PausedOnConflict])?;
        let active = paused_step(&state)?.clone();

        let outcome = match active.step.continue_step() {
            Some(step) => {
                debug!(step = %step, "running continue step");
                step.run(&mut self.ctx).await
            }
            None if self.ctx.repo.has_conflicts()? => StepOutcome::Conflict(
                "you must resolve the conflicts before continuing".to_string(),
            ),
            None => StepOutcome::Success,
        };
        match outcome {
            StepOutcome::Success => {}
            StepOutcome::Conflict(reason) => {
                return Ok(RunOutcome::Paused {
                    command: state.command,
                    step: active.step.to_string(),
                    reason,
                });
            }
            StepOutcome::Failed(e) => {
                warn!(step = %active.step, error = %e, "continue failed, run stays paused");
                return Err(Error::StepFailed {
                    step: active.step.to_string(),
                    source: Box::new(e),
                    abort_failures: Vec::new(),
                });
            }
        }

        if let Some(undo) = active.step.undo_step(&active.snapshot) {
            state.undo_steps.prepend(undo);
        }
        state.active = None;
        state.abort_steps = state.undo_steps.clone();
        self.drive(state).await
    }

    /// Unwind the current run and forget it.
    ///
    /// Every abort step is attempted even if earlier ones fail; the run
    /// state is cleared regardless.
    pub async fn abort(&mut self) -> Result<RunOutcome> {
        let mut state = self.load_required("abort")?;
        require_status(
            &state,
            "abort",
            &[RunStatus::PausedOnConflict, RunStatus::Running],
        )?;

        info!(command = %state.command, steps = state.abort_steps.len(), "aborting run");
        let failures = self.execute_abort_list(&state.abort_steps).await;
        state.status = RunStatus::Aborted;
        self.store.clear()?;
        Ok(RunOutcome::Aborted {
            command: state.command,
            failures,
        })
    }

    /// Drop the conflicted step and carry on with the rest of the run.
    ///
    /// The step's abort step runs first so no merge or rebase is left in
    /// progress; if that fails the run stays paused.
    pub async fn skip(&mut self) -> Result<RunOutcome> {
        let mut state = self.load_required("skip")?;
        require_status(&state, "skip", &[RunStatus::PausedOnConflict])?;
        let active = paused_step(&state)?.clone();

        if let Some(cleanup) = active.step.abort_step(&active.snapshot) {
            debug!(step = %cleanup, "leaving conflicted step");
            match cleanup.run(&mut self.ctx).await {
                StepOutcome::Success => {}
                StepOutcome::Conflict(reason) => return Err(Error::Conflict(reason)),
                StepOutcome::Failed(e) => return Err(e),
            }
        }
        info!(step = %active.step, "skipped step");

        state.active = None;
        state.abort_steps = state.undo_steps.clone();
        self.drive(state).await
    }

    /// Main loop shared by run, continue and skip
    async fn drive(&mut self, mut state: RunState) -> Result<RunOutcome> {
        state.status = RunStatus::Running;

        while let Some(step) = state.run_steps.pop_front() {
            let snapshot = match step.snapshot(&mut *self.ctx.repo) {
                Ok(snapshot) => snapshot,
                Err(e) => return Err(self.unwind(state, &step, e).await),
            };

            state.abort_steps = step
                .abort_step(&snapshot)
                .into_iter()
                .chain(state.undo_steps.iter().cloned())
                .collect();
            state.active = Some(ActiveStep {
                step: step.clone(),
                snapshot: snapshot.clone(),
                conflict: None,
            });
            if let Err(e) = self.store.save(&state) {
                state.abort_steps = state.undo_steps.clone();
                return Err(self.unwind(state, &step, e).await);
            }

            match step.run(&mut self.ctx).await {
                StepOutcome::Success => {
                    if let Some(undo) = step.undo_step(&snapshot) {
                        state.undo_steps.prepend(undo);
                    }
                    state.active = None;
                    state.abort_steps = state.undo_steps.clone();
                    if let Err(e) = self.store.save(&state) {
                        return Err(self.unwind(state, &step, e).await);
                    }
                }
                StepOutcome::Conflict(reason) => {
                    warn!(step = %step, %reason, "paused on conflict");
                    state.status = RunStatus::PausedOnConflict;
                    if let Some(active) = state.active.as_mut() {
                        active.conflict = Some(reason.clone());
                    }
                    if let Err(e) = self.store.save(&state) {
                        return Err(self.unwind(state, &step, e).await);
                    }
                    return Ok(RunOutcome::Paused {
                        command: state.command,
                        step: step.to_string(),
                        reason,
                    });
                }
                StepOutcome::Failed(e) => return Err(self.unwind(state, &step, e).await),
            }
        }

        state.status = RunStatus::Finished;
        state.active = None;
        self.store.clear()?;
        info!(command = %state.command, "run finished");
        Ok(RunOutcome::Finished {
            command: state.command,
        })
    }

    /// Best-effort rollback after a fatal failure of `step`
    async fn unwind(&mut self, mut state: RunState, step: &Step, error: Error) -> Error {
        warn!(step = %step, error = %error, "step failed, unwinding run");
        let abort_failures = self.execute_abort_list(&state.abort_steps).await;
        state.status = RunStatus::Aborted;
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "failed to clear run state");
        }
        Error::StepFailed {
            step: step.to_string(),
            source: Box::new(error),
            abort_failures,
        }
    }

    async fn execute_abort_list(&mut self, steps: &StepList) -> Vec<AbortFailure> {
        let mut failures = Vec::new();
        for step in steps.iter() {
            let message = match step.run(&mut self.ctx).await {
                StepOutcome::Success => continue,
                StepOutcome::Conflict(reason) => reason,
                StepOutcome::Failed(e) => e.to_string(),
            };
            warn!(step = %step, %message, "abort step failed");
            failures.push(AbortFailure {
                step: step.to_string(),
                message,
            });
        }
        failures
    }

    fn load_required(&self, operation: &str) -> Result<RunState> {
        let state = self.store.load()?.ok_or(Error::NoRunInProgress)?;
        debug!(operation, command = %state.command, status = %state.status, "loaded run");
        Ok(state)
    }
}

fn require_status(state: &RunState, operation: &str, allowed: &[RunStatus]) -> Result<()> {
    if allowed.contains(&state.status) {
        return Ok(());
    }
    Err(Error::InvalidRunStatus {
        operation: operation.to_string(),
        status: state.status.to_string(),
    })
}

fn paused_step(state: &RunState) -> Result<&ActiveStep> {
    state.active.as_ref().ok_or_else(|| {
        Error::Persistence(format!(
            "the paused {:?} run has no active step recorded",
            state.command
        ))
    })
}
