//! git-relay: resumable branch workflows for git
//!
//! High-level commands (hack, append, prepend, sync, ship) are planned into a
//! [`steps::StepList`] of atomic repository operations. The
//! [`runner::Runner`] executes that list against the working copy and
//! persists a [`runstate::RunState`] after every step, so a run that stops on
//! a merge conflict can be continued, skipped or aborted by a later process.
//!
//! # Architecture
//!
//! - [`git`]: the repository executor and the queries built on it
//! - [`config`]: settings and the branch hierarchy
//! - [`steps`]: the step catalog, its inverses and step lists
//! - [`runstate`]: the persisted run record
//! - [`runner`]: the run/continue/abort/skip state machine
//! - [`workflows`]: step lists for the high-level commands
//! - [`platform`]: GitHub and GitLab drivers for merging pull requests
//! - [`auth`]: API token discovery

pub mod auth;
pub mod config;
pub mod error;
pub mod git;
pub mod platform;
pub mod runner;
pub mod runstate;
pub mod steps;
pub mod types;
pub mod workflows;

pub use error::{Error, ErrorKind, Result};
