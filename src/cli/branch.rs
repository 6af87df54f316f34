//! hack, append and prepend - create feature branches

use crate::cli::context::{CommandContext, plan_with_prompts};
use crate::cli::report_outcome;
use git_relay::workflows::Planner;
use std::path::Path;

/// Run the hack command
#[allow(clippy::future_not_send)]
pub async fn run_hack(path: &Path, branch: &str) -> anyhow::Result<i32> {
    create_branch(path, "hack", |planner| planner.hack(branch)).await
}

/// Run the append command
#[allow(clippy::future_not_send)]
pub async fn run_append(path: &Path, branch: &str) -> anyhow::Result<i32> {
    create_branch(path, "append", |planner| planner.append(branch)).await
}

/// Run the prepend command
#[allow(clippy::future_not_send)]
pub async fn run_prepend(path: &Path, branch: &str) -> anyhow::Result<i32> {
    create_branch(path, "prepend", |planner| planner.prepend(branch)).await
}

#[allow(clippy::future_not_send)]
async fn create_branch<F>(path: &Path, command: &str, build: F) -> anyhow::Result<i32>
where
    F: FnMut(&mut Planner<'_>) -> git_relay::error::Result<git_relay::steps::StepList>,
{
    let mut ctx = CommandContext::new(path)?;
    ctx.ensure_no_run_in_progress()?;
    ctx.fetch()?;

    let steps = {
        let mut planner = Planner::new(&mut ctx.repo, &ctx.config)?;
        plan_with_prompts(&mut planner, build)?
    };
    let outcome = ctx.execute(command, steps, None).await?;
    Ok(report_outcome(&outcome))
}
