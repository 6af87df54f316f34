//! How each step touches the repository

use super::{Step, StepContext};
use crate::error::{Error, Result};
use crate::types::MergePullRequestOptions;
use tracing::{debug, info};

pub(super) async fn run(step: &Step, ctx: &mut StepContext<'_>) -> Result<()> {
    info!(step = %step, "running step");
    match step {
        Step::AbortMerge => {
            if ctx.repo.is_merge_in_progress()? {
                ctx.repo.run(&["merge", "--abort"])?;
            }
        }
        Step::AbortRebase => {
            if ctx.repo.is_rebase_in_progress()? {
                ctx.repo.run(&["rebase", "--abort"])?;
            }
            ctx.repo.invalidate_refs();
        }
        Step::ContinueMerge => {
            ensure_resolved(ctx)?;
            if ctx.repo.is_merge_in_progress()? {
                ctx.repo.run(&["commit", "--no-edit"])?;
            }
        }
        Step::ContinueRebase => {
            ensure_resolved(ctx)?;
            if ctx.repo.is_rebase_in_progress()? {
                ctx.repo
                    .run(&["-c", "core.editor=true", "rebase", "--continue"])?;
            }
            ctx.repo.invalidate_refs();
        }
        Step::ChangeDirectory { directory } => {
            if !directory.is_dir() {
                return Err(Error::Internal(format!(
                    "directory {} does not exist",
                    directory.display()
                )));
            }
            ctx.repo.set_workdir(directory.clone());
        }
        Step::CheckoutBranch { branch } => {
            if ctx.repo.current_branch()? != *branch {
                ctx.repo.checkout(branch)?;
            }
        }
        Step::CreateBranch {
            branch,
            starting_point,
        } => {
            ctx.repo.run(&["branch", branch, starting_point])?;
        }
        Step::CreateRemoteBranch { branch, sha } => {
            if ctx.is_online()? {
                let refspec = format!("{sha}:refs/heads/{branch}");
                ctx.repo.run(&["push", "origin", &refspec])?;
                ctx.repo.invalidate_refs();
            }
        }
        Step::CreateTrackingBranch { branch } => {
            ctx.repo.run(&["push", "-u", "origin", branch])?;
            ctx.repo.invalidate_refs();
        }
        Step::DeleteLocalBranch { branch, force } => {
            let flag = if *force { "-D" } else { "-d" };
            ctx.repo.run(&["branch", flag, branch])?;
        }
        Step::DeleteRemoteBranch { branch } => {
            if ctx.is_online()? {
                let refspec = format!(":{branch}");
                ctx.repo.run(&["push", "origin", &refspec])?;
                ctx.repo.invalidate_refs();
            }
        }
        Step::DeleteParentBranch { branch } => ctx.repo.delete_parent_branch(branch)?,
        Step::SetParentBranch { branch, parent } => ctx.repo.set_parent_branch(branch, parent)?,
        Step::Fetch => {
            if ctx.is_online()? {
                ctx.repo.run(&["fetch", "--prune", "--tags"])?;
                ctx.repo.invalidate_refs();
            } else {
                debug!("offline or no origin, skipping fetch");
            }
        }
        Step::MergeBranch { branch } => {
            ctx.repo.run(&["merge", "--no-edit", branch])?;
        }
        Step::RebaseBranch { branch } => {
            ctx.repo.run(&["rebase", branch])?;
        }
        Step::PushBranch { branch, force } => push_branch(ctx, branch, *force)?,
        Step::ResetToSha { sha, hard } => {
            if *hard {
                ctx.repo.run(&["reset", "--hard", sha])?;
            } else {
                ctx.repo.run(&["reset", sha])?;
            }
        }
        Step::RestoreBranch {
            branch,
            sha,
            return_to,
        } => {
            if ctx.repo.is_merge_in_progress()? {
                ctx.repo.run(&["merge", "--abort"])?;
            }
            if ctx.repo.is_rebase_in_progress()? {
                ctx.repo.run(&["rebase", "--abort"])?;
            }
            ctx.repo.invalidate_refs();
            if ctx.repo.current_branch()? == *branch {
                ctx.repo.run(&["reset", "--hard", sha])?;
            } else {
                ctx.repo.run(&["branch", "-f", branch, sha])?;
            }
            if ctx.repo.current_branch()? != *return_to {
                ctx.repo.checkout(return_to)?;
            }
        }
        Step::StashOpenChanges => {
            ctx.repo.run(&["add", "-A"])?;
            ctx.repo.run(&["stash"])?;
        }
        Step::RestoreOpenChanges => {
            ctx.repo.run(&["stash", "pop"])?;
        }
        Step::DropStash => {
            ensure_resolved(ctx)?;
            if !ctx.repo.run(&["stash", "list"])?.trim().is_empty() {
                ctx.repo.run(&["stash", "drop"])?;
            }
        }
        Step::SyncBranch { branch, push_after } => sync_branch(ctx, branch, *push_after)?,
        Step::ContinueSyncBranch { branch, push_after } => {
            ensure_resolved(ctx)?;
            if ctx.repo.is_merge_in_progress()? {
                ctx.repo.run(&["commit", "--no-edit"])?;
            }
            sync_branch(ctx, branch, *push_after)?;
        }
        Step::MergePullRequest {
            branch,
            parent,
            pull_request_number,
            commit_message,
        } => {
            let driver = ctx.hosting.ok_or_else(|| {
                Error::Hosting("no code hosting driver is configured for this repository".into())
            })?;
            let options = MergePullRequestOptions {
                branch: branch.clone(),
                pull_request_number: *pull_request_number,
                commit_message: commit_message.clone(),
                parent_branch: parent.clone(),
            };
            let sha = driver.merge_pull_request(&options).await?;
            info!(%sha, service = %driver.service_name(), "pull request merged");
            update_from_origin(ctx, parent)?;
        }
    }
    Ok(())
}

/// Refuse to continue while files still carry conflict markers
fn ensure_resolved(ctx: &StepContext<'_>) -> Result<()> {
    if ctx.repo.has_conflicts()? {
        return Err(Error::Conflict(
            "you must resolve the conflicts before continuing".to_string(),
        ));
    }
    Ok(())
}

fn push_branch(ctx: &mut StepContext<'_>, branch: &str, force: bool) -> Result<()> {
    if !ctx.is_online()? {
        debug!(branch, "offline or no origin, skipping push");
        return Ok(());
    }
    if force {
        ctx.repo
            .run(&["push", "--force-with-lease", "origin", branch])?;
    } else if ctx.repo.has_tracking_branch(branch)? {
        ctx.repo.run(&["push", "origin", branch])?;
    } else {
        ctx.repo.run(&["push", "-u", "origin", branch])?;
    }
    ctx.repo.invalidate_refs();
    Ok(())
}

/// Bring `branch` up to date: its tracking branch first, then its parent.
///
/// Safe to re-run after a resolved conflict; merges that already happened
/// are no-ops the second time.
fn sync_branch(ctx: &mut StepContext<'_>, branch: &str, push_after: bool) -> Result<()> {
    if ctx.repo.current_branch()? != branch {
        ctx.repo.checkout(branch)?;
    }
    let online = ctx.is_online()?;
    if online && ctx.repo.has_tracking_branch(branch)? {
        let tracking = format!("origin/{branch}");
        ctx.repo.run(&["merge", "--no-edit", &tracking])?;
    }
    if ctx.config.is_feature_branch(branch) {
        if let Some(parent) = ctx.repo.parent_branch(branch)? {
            ctx.repo.run(&["merge", "--no-edit", &parent])?;
        }
    }
    if push_after {
        push_branch(ctx, branch, false)?;
    }
    Ok(())
}

/// Fast-forward the local copy of `branch` to what origin has now
fn update_from_origin(ctx: &mut StepContext<'_>, branch: &str) -> Result<()> {
    if !ctx.is_online()? {
        return Ok(());
    }
    if ctx.repo.current_branch()? == branch {
        ctx.repo.run(&["pull", "--ff-only", "origin", branch])?;
    } else {
        let refspec = format!("{branch}:{branch}");
        ctx.repo.run(&["fetch", "origin", &refspec])?;
    }
    ctx.repo.invalidate_refs();
    Ok(())
}
