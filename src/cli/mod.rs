//! Command-line interface

mod branch;
mod context;
mod resume;
mod ship;
mod style;
mod sync;

use anstream::{eprintln, println};
use clap::{Parser, Subcommand};
use git_relay::error::{Error, ErrorKind};
use git_relay::runner::{EXIT_CONFIG, EXIT_FAILED, EXIT_PAUSED, EXIT_PERSISTENCE, RunOutcome};
use std::path::PathBuf;
use style::{Stylize, check, cross};

/// Resumable branch workflows for git
#[derive(Parser, Debug)]
#[command(name = "relay", version, about)]
pub struct Cli {
    /// Repository path (defaults to the current directory)
    #[arg(long, global = true, default_value = ".")]
    pub path: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new feature branch off the main branch
    Hack {
        /// Name of the new branch
        branch: String,
    },
    /// Create a new feature branch as a child of the current branch
    Append {
        /// Name of the new branch
        branch: String,
    },
    /// Create a new feature branch as the parent of the current branch
    Prepend {
        /// Name of the new branch
        branch: String,
    },
    /// Update the current branch with its remote and parent branches
    Sync {
        /// Sync every local branch
        #[arg(long)]
        all: bool,
    },
    /// Merge a feature branch's pull request and delete the branch
    Ship {
        /// Branch to ship (defaults to the current branch)
        branch: Option<String>,
        /// Squash commit message (first line is the title)
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Resume the paused run after resolving conflicts
    Continue,
    /// Undo the paused run and go back to where it started
    Abort,
    /// Drop the conflicting step and resume the paused run
    Skip,
    /// Show the run in progress, if any
    Status,
}

/// Run the selected command and return the process exit code
#[allow(clippy::future_not_send)]
pub async fn run(cli: Cli) -> anyhow::Result<i32> {
    let path = cli.path.as_path();
    match cli.command {
        Commands::Hack { branch } => branch::run_hack(path, &branch).await,
        Commands::Append { branch } => branch::run_append(path, &branch).await,
        Commands::Prepend { branch } => branch::run_prepend(path, &branch).await,
        Commands::Sync { all } => sync::run_sync(path, all).await,
        Commands::Ship { branch, message } => {
            ship::run_ship(path, branch.as_deref(), message.as_deref()).await
        }
        Commands::Continue => resume::run_continue(path).await,
        Commands::Abort => resume::run_abort(path).await,
        Commands::Skip => resume::run_skip(path).await,
        Commands::Status => resume::run_status(path),
    }
}

/// Print the result of a run and pick the exit code
pub fn report_outcome(outcome: &RunOutcome) -> i32 {
    match outcome {
        RunOutcome::Finished { command } => {
            println!("{} {} finished", check(), command.emphasis());
        }
        RunOutcome::Paused {
            command,
            step,
            reason,
        } => {
            eprintln!(
                "{} {} paused on a conflict while running {}",
                "!".warn(),
                command.emphasis(),
                step.accent()
            );
            eprintln!("  {}", reason.muted());
            if let Some(hint) = outcome.resume_hint() {
                eprintln!();
                eprintln!("{hint}");
            }
        }
        RunOutcome::Aborted { command, failures } => {
            println!("{} {} aborted", check(), command.emphasis());
            for failure in failures {
                eprintln!("  {} {}", cross(), failure.to_string().warn());
            }
            if !failures.is_empty() {
                eprintln!(
                    "{}",
                    "Some abort steps failed; check the repository state by hand.".warn()
                );
            }
        }
    }
    outcome.exit_code()
}

/// Print a failure and pick the exit code from its kind
pub fn report_error(err: &anyhow::Error) -> i32 {
    let kind = err.downcast_ref::<Error>().map(Error::kind);
    let label = kind.map_or_else(|| "error".to_string(), |k| k.to_string());
    // crate errors already render their cause
    let message = if kind.is_some() {
        err.to_string()
    } else {
        format!("{err:#}")
    };
    eprintln!("{} {}: {message}", cross(), label.error());
    match kind {
        Some(ErrorKind::Configuration) => EXIT_CONFIG,
        Some(ErrorKind::Persistence) => EXIT_PERSISTENCE,
        Some(ErrorKind::Conflict) => EXIT_PAUSED,
        _ => EXIT_FAILED,
    }
}
