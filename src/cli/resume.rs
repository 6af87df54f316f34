//! continue, abort, skip and status - manage the run in progress

use crate::cli::context::CommandContext;
use crate::cli::report_outcome;
use crate::cli::style::Stylize;
use anstream::println;
use git_relay::runner::EXIT_FINISHED;
use std::path::Path;

/// Run the continue command
#[allow(clippy::future_not_send)]
pub async fn run_continue(path: &Path) -> anyhow::Result<i32> {
    let mut ctx = CommandContext::new(path)?;
    let driver = ctx.hosting()?;
    let outcome = ctx.runner(driver.as_deref()).continue_run().await?;
    Ok(report_outcome(&outcome))
}

/// Run the abort command
#[allow(clippy::future_not_send)]
pub async fn run_abort(path: &Path) -> anyhow::Result<i32> {
    let mut ctx = CommandContext::new(path)?;
    let outcome = ctx.runner(None).abort().await?;
    Ok(report_outcome(&outcome))
}

/// Run the skip command
#[allow(clippy::future_not_send)]
pub async fn run_skip(path: &Path) -> anyhow::Result<i32> {
    let mut ctx = CommandContext::new(path)?;
    let driver = ctx.hosting()?;
    let outcome = ctx.runner(driver.as_deref()).skip().await?;
    Ok(report_outcome(&outcome))
}

/// Run the status command
pub fn run_status(path: &Path) -> anyhow::Result<i32> {
    let ctx = CommandContext::new(path)?;
    let Some(state) = ctx.store.load()? else {
        println!("{}", "No run in progress.".muted());
        return Ok(EXIT_FINISHED);
    };

    println!(
        "{} {} {}",
        state.command.emphasis(),
        "is".muted(),
        state.status.to_string().warn()
    );
    println!(
        "{}",
        format!("started {}", state.started_at.format("%Y-%m-%d %H:%M:%S UTC")).muted()
    );
    if let Some(active) = &state.active {
        println!("  {} {}", "stopped at".muted(), active.step.to_string().accent());
        if let Some(conflict) = &active.conflict {
            println!("  {}", conflict.muted());
        }
    }
    if !state.run_steps.is_empty() {
        println!("{}", "Remaining steps:".emphasis());
        for step in state.run_steps.iter() {
            println!("  {}", step.to_string().accent());
        }
    }
    println!(
        "{}",
        format!("{} step(s) to undo on abort", state.abort_steps.len()).muted()
    );
    Ok(EXIT_FINISHED)
}
