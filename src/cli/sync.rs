//! Sync command - update branches from origin and their parents

use crate::cli::context::{CommandContext, plan_with_prompts};
use crate::cli::report_outcome;
use crate::cli::style::Stylize;
use anstream::println;
use git_relay::workflows::Planner;
use std::path::Path;

/// Run the sync command
#[allow(clippy::future_not_send)]
pub async fn run_sync(path: &Path, all: bool) -> anyhow::Result<i32> {
    let mut ctx = CommandContext::new(path)?;
    ctx.ensure_no_run_in_progress()?;

    let steps = {
        let mut planner = Planner::new(&mut ctx.repo, &ctx.config)?;
        plan_with_prompts(&mut planner, |p| p.sync(all))?
    };
    if ctx.config.offline {
        println!("{}", "Offline: skipping fetch and push".muted());
    }
    let outcome = ctx.execute("sync", steps, None).await?;
    Ok(report_outcome(&outcome))
}
