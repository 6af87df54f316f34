//! Error types for git-relay

use std::fmt;
use thiserror::Error;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`], used by the command layer to pick
/// an exit code and message style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// git stopped with a merge/rebase conflict (recoverable)
    Conflict,
    /// The requested workflow cannot start in the current repository state
    Configuration,
    /// A repository operation failed for a reason other than a conflict
    ExternalOperation,
    /// The code-hosting service failed or returned ambiguous data
    HostingService,
    /// Run state could not be read or written
    Persistence,
    /// Bug or unexpected internal condition
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict => write!(f, "conflict"),
            Self::Configuration => write!(f, "configuration error"),
            Self::ExternalOperation => write!(f, "git error"),
            Self::HostingService => write!(f, "hosting service error"),
            Self::Persistence => write!(f, "run state error"),
            Self::Internal => write!(f, "internal error"),
        }
    }
}

/// A step from the abort list that failed while unwinding a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortFailure {
    /// Description of the abort step
    pub step: String,
    /// Error message it produced
    pub message: String,
}

impl fmt::Display for AbortFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.step, self.message)
    }
}

/// Errors that can occur in git-relay
#[derive(Error, Debug)]
pub enum Error {
    /// git reported a merge or rebase conflict
    #[error("conflict: {0}")]
    Conflict(String),

    /// git command exited unsuccessfully
    #[error("git {command} failed: {message}")]
    Git {
        /// Arguments passed to git
        command: String,
        /// stderr (or stdout) of the failed command
        message: String,
    },

    /// git binary could not be spawned
    #[error("failed to run git {command}: {source}")]
    Spawn {
        /// Arguments passed to git
        command: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Not inside a git repository
    #[error("not a git repository: {0}")]
    NotARepository(String),

    /// Branch already exists locally or remotely
    #[error("a branch named {0:?} already exists")]
    BranchExists(String),

    /// Branch not found
    #[error("branch not found: {0}")]
    BranchNotFound(String),

    /// Branch is not eligible for a feature-branch workflow
    #[error(
        "the branch {0:?} is not a feature branch. Only feature branches can have parent branches"
    )]
    NotFeatureBranch(String),

    /// Parent of a feature branch is not configured
    #[error("no parent branch configured for {0:?}")]
    UnknownParent(String),

    /// Branch hierarchy loops back on itself
    #[error("branch hierarchy contains a cycle: {0}")]
    CyclicHierarchy(String),

    /// A run is already persisted for this repository
    #[error(
        "a {command:?} run is already in progress. Run `relay continue`, `relay skip` or `relay abort` first"
    )]
    RunInProgress {
        /// Command of the existing run
        command: String,
    },

    /// No run persisted for this repository
    #[error("nothing to resume: no run in progress")]
    NoRunInProgress,

    /// The persisted run is in a state that does not allow the operation
    #[error("cannot {operation}: run is {status}")]
    InvalidRunStatus {
        /// Operation that was requested (continue, skip, abort)
        operation: String,
        /// Current run status
        status: String,
    },

    /// Configuration loading/parsing error
    #[error("configuration error: {0}")]
    Config(String),

    /// Run state persistence error
    #[error("run state error: {0}")]
    Persistence(String),

    /// Hosting driver could not be determined or is not configured
    #[error("hosting error: {0}")]
    Hosting(String),

    /// GitHub API error
    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    /// GitLab API error
    #[error("GitLab API error: {0}")]
    GitLabApi(String),

    /// Remote URL could not be parsed
    #[error("invalid remote URL: {0}")]
    InvalidRemoteUrl(String),

    /// A step failed fatally; the run was unwound
    #[error("{step} failed: {source}{}", format_abort_failures(.abort_failures))]
    StepFailed {
        /// Description of the failing step
        step: String,
        /// Cause of the failure
        #[source]
        source: Box<Error>,
        /// Abort steps that failed while unwinding
        abort_failures: Vec<AbortFailure>,
    },

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

fn format_abort_failures(failures: &[AbortFailure]) -> String {
    if failures.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = failures.iter().map(|f| format!("\n  - {f}")).collect();
    format!("\nabort steps that also failed:{}", lines.concat())
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Git { .. } | Self::Spawn { .. } | Self::BranchNotFound(_) => {
                ErrorKind::ExternalOperation
            }
            Self::NotARepository(_)
            | Self::BranchExists(_)
            | Self::NotFeatureBranch(_)
            | Self::UnknownParent(_)
            | Self::CyclicHierarchy(_)
            | Self::RunInProgress { .. }
            | Self::NoRunInProgress
            | Self::InvalidRunStatus { .. }
            | Self::Config(_)
            | Self::InvalidRemoteUrl(_) => ErrorKind::Configuration,
            Self::Persistence(_) => ErrorKind::Persistence,
            Self::Hosting(_) | Self::GitHubApi(_) | Self::GitLabApi(_) => {
                ErrorKind::HostingService
            }
            Self::StepFailed { source, .. } => source.kind(),
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// True for recoverable merge/rebase conflicts
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<octocrab::Error> for Error {
    fn from(err: octocrab::Error) -> Self {
        Self::GitHubApi(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::GitLabApi(err.to_string())
    }
}
