//! Repository executor and git queries
//!
//! [`Executor`] runs one git invocation and reports its raw output;
//! [`classify`] turns that output into success, a recoverable conflict or a
//! fatal error. [`Repo`] layers the queries the engine needs on top.

mod cache;
mod repo;

pub use cache::{BoolCache, Cached, RepoCache, StringCache, StringListCache};
pub use repo::{Repo, parent_config_key};

use crate::error::{Error, Result};
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Raw result of a git invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
    /// Process exit code (-1 if killed by a signal)
    pub exit_code: i32,
}

impl ExecOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    /// Whether git exited with status 0
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs a single git operation against a working copy
pub trait Executor: Send + Sync {
    /// Run `git <args>` in `dir`.
    ///
    /// Returns `Err` only when git could not be started at all; a nonzero
    /// exit is reported through [`ExecOutput::exit_code`].
    fn execute(&self, dir: &Path, args: &[&str]) -> Result<ExecOutput>;
}

/// Executor backed by the `git` binary on `PATH`
#[derive(Debug, Clone, Copy, Default)]
pub struct GitExecutor;

impl Executor for GitExecutor {
    fn execute(&self, dir: &Path, args: &[&str]) -> Result<ExecOutput> {
        debug!(dir = %dir.display(), args = %args.join(" "), "running git");
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .map_err(|source| Error::Spawn {
                command: args.join(" "),
                source,
            })?;

        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

/// Output fragments git prints when a merge, rebase, cherry-pick or stash
/// pop stops on conflicting changes.
const CONFLICT_MARKERS: &[&str] = &[
    "CONFLICT (",
    "Automatic merge failed",
    "could not apply",
    "Resolve all conflicts manually",
    "You have unmerged paths",
    "Merge conflict in",
    "needs merge",
];

/// Interpret the output of `git <args>`.
///
/// Returns stdout on success, [`Error::Conflict`] when git stopped on a
/// conflict and [`Error::Git`] for every other failure.
pub fn classify(args: &[&str], output: ExecOutput) -> Result<String> {
    if output.success() {
        return Ok(output.stdout);
    }

    let combined = format!("{}\n{}", output.stdout, output.stderr);
    if CONFLICT_MARKERS.iter().any(|m| combined.contains(m)) {
        let reason = combined
            .lines()
            .find(|l| CONFLICT_MARKERS.iter().any(|m| l.contains(m)))
            .unwrap_or_default()
            .trim()
            .to_string();
        debug!(args = %args.join(" "), %reason, "git reported conflict");
        return Err(Error::Conflict(reason));
    }

    let message = if output.stderr.trim().is_empty() {
        output.stdout.trim().to_string()
    } else {
        output.stderr.trim().to_string()
    };
    Err(Error::Git {
        command: args.join(" "),
        message: if message.is_empty() {
            format!("exit status {}", output.exit_code)
        } else {
            message
        },
    })
}
