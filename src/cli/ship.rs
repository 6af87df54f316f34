//! Ship command - merge a feature branch through its pull request

use crate::cli::context::{CommandContext, ensure_known_parents};
use crate::cli::report_outcome;
use crate::cli::style::Stylize;
use anstream::println;
use git_relay::error::Error;
use git_relay::workflows::Planner;
use std::path::Path;

/// Run the ship command
#[allow(clippy::future_not_send)]
pub async fn run_ship(
    path: &Path,
    branch: Option<&str>,
    message: Option<&str>,
) -> anyhow::Result<i32> {
    let mut ctx = CommandContext::new(path)?;
    ctx.ensure_no_run_in_progress()?;

    let Some(driver) = ctx.hosting()? else {
        return Err(Error::Hosting(
            "origin is not hosted on a supported service. Set relay.code-hosting-driver to github or gitlab"
                .to_string(),
        )
        .into());
    };
    ctx.fetch()?;

    let branch = match branch {
        Some(b) => b.to_string(),
        None => ctx.repo.current_branch()?,
    };

    let steps = {
        let mut planner = Planner::new(&mut ctx.repo, &ctx.config)?;
        ensure_known_parents(&mut planner, &branch)?;
        let parent = planner
            .hierarchy()
            .parent(&branch)
            .map_or_else(|| ctx.config.main_branch.clone(), str::to_string);

        println!(
            "{}",
            format!("Looking up the pull request of {branch} on {}...", driver.service_name())
                .muted()
        );
        let info = driver.load_pull_request_info(&branch, &parent).await?;
        planner.ship(Some(&branch), &info, message)?
    };

    let outcome = ctx.execute("ship", steps, Some(driver.as_ref())).await?;
    Ok(report_outcome(&outcome))
}
