//! Persistence for run state in `<git-dir>/relay/`.

use super::{RUNSTATE_VERSION, RunState};
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory name for relay metadata within the git directory
const RELAY_DIR: &str = "relay";

/// Filename for the run state
const RUNSTATE_FILE: &str = "runstate.json";

/// Resolve the git directory of a work tree.
///
/// In linked worktrees and submodules `.git` is a plain file of the form
/// `gitdir: <path>`, relative paths being relative to the work tree. An
/// unreadable pointer file resolves to itself so the error surfaces on use.
pub fn resolve_git_dir(workspace_root: &Path) -> PathBuf {
    let git_path = workspace_root.join(".git");

    if git_path.is_file() {
        if let Ok(contents) = fs::read_to_string(&git_path) {
            if let Some(target) = contents.trim().strip_prefix("gitdir:") {
                let target = workspace_root.join(target.trim());
                if target.is_dir() {
                    return fs::canonicalize(&target).unwrap_or(target);
                }
            }
        }
        return git_path;
    }

    git_path
}

/// Reads and writes the run state of one repository
#[derive(Debug, Clone)]
pub struct RunStateStore {
    path: PathBuf,
}

impl RunStateStore {
    /// Store for the repository whose work tree root is `workspace_root`
    pub fn for_repo(workspace_root: &Path) -> Self {
        Self::at(resolve_git_dir(workspace_root).join(RELAY_DIR).join(RUNSTATE_FILE))
    }

    /// Store backed by an explicit file
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted run, if any.
    ///
    /// Unreadable, unparsable or version-mismatched files are errors rather
    /// than being treated as "no run", so a half-finished workflow is never
    /// silently forgotten.
    pub fn load(&self) -> Result<Option<RunState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        debug!(path = %self.path.display(), "loading run state");

        let content = fs::read_to_string(&self.path).map_err(|e| {
            Error::Persistence(format!("failed to read {}: {e}", self.path.display()))
        })?;

        let raw: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
            Error::Persistence(format!(
                "failed to parse {}: {e}. Delete the file to discard the interrupted run",
                self.path.display()
            ))
        })?;
        let version = raw.get("version").and_then(serde_json::Value::as_u64);
        if version != Some(u64::from(RUNSTATE_VERSION)) {
            return Err(Error::Persistence(format!(
                "{} has format version {}, expected {RUNSTATE_VERSION}. Finish the run with the \
                 version of relay that started it, or delete the file to discard it",
                self.path.display(),
                version.map_or_else(|| "none".to_string(), |v| v.to_string()),
            )));
        }

        let state: RunState = serde_json::from_value(raw).map_err(|e| {
            Error::Persistence(format!(
                "failed to parse {}: {e}. Delete the file to discard the interrupted run",
                self.path.display()
            ))
        })?;
        debug!(command = %state.command, status = %state.status, "run state loaded");
        Ok(Some(state))
    }

    /// Atomically write the run state (temp file + rename).
    pub fn save(&self, state: &RunState) -> Result<()> {
        debug!(
            path = %self.path.display(),
            status = %state.status,
            remaining = state.run_steps.len(),
            "writing run state"
        );
        let parent = self.path.parent().ok_or_else(|| {
            Error::Persistence(format!("run state path {} has no parent", self.path.display()))
        })?;
        fs::create_dir_all(parent).map_err(|e| {
            Error::Persistence(format!("failed to create {}: {e}", parent.display()))
        })?;

        let mut buf = serde_json::to_string_pretty(state)
            .map_err(|e| Error::Persistence(format!("failed to serialize run state: {e}")))?;
        buf.push('\n');

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, buf).map_err(|e| {
            Error::Persistence(format!("failed to write {}: {e}", tmp_path.display()))
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|e| {
            Error::Persistence(format!("failed to replace {}: {e}", self.path.display()))
        })?;
        Ok(())
    }

    /// Remove the persisted run (no-op if there is none)
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "run state cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Persistence(format!(
                "failed to remove {}: {e}",
                self.path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runstate::{ActiveStep, RunStatus};
    use crate::steps::{Step, StepList, StepSnapshot};
    use tempfile::TempDir;

    fn setup_fake_repo() -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".git")).unwrap();
        temp
    }

    fn paused_state() -> RunState {
        let mut state = RunState::new(
            "sync",
            [Step::CheckoutBranch {
                branch: "main".to_string(),
            }]
            .into_iter()
            .collect(),
        );
        state.status = RunStatus::PausedOnConflict;
        state.undo_steps.append(Step::DeleteLocalBranch {
            branch: "b".to_string(),
            force: true,
        });
        state.abort_steps.append(Step::AbortMerge);
        state.active = Some(ActiveStep {
            step: Step::MergeBranch {
                branch: "main".to_string(),
            },
            snapshot: StepSnapshot {
                target_sha: Some("abc123".to_string()),
                ..StepSnapshot::default()
            },
            conflict: Some("CONFLICT (content): Merge conflict in file.txt".to_string()),
        });
        state
    }

    #[test]
    fn test_store_path() {
        let temp = setup_fake_repo();
        let store = RunStateStore::for_repo(temp.path());
        assert!(store.path().ends_with(".git/relay/runstate.json"));
    }

    #[test]
    fn test_load_missing_is_none() {
        let temp = setup_fake_repo();
        let store = RunStateStore::for_repo(temp.path());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_and_load_preserves_lists_and_active_step() {
        let temp = setup_fake_repo();
        let store = RunStateStore::for_repo(temp.path());
        let state = paused_state();

        store.save(&state).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, state);
        assert_eq!(
            loaded.conflict(),
            Some("CONFLICT (content): Merge conflict in file.txt")
        );
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_clear_removes_file_and_is_idempotent() {
        let temp = setup_fake_repo();
        let store = RunStateStore::for_repo(temp.path());
        store.save(&paused_state()).unwrap();
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn test_corrupt_file_is_persistence_error() {
        let temp = setup_fake_repo();
        let store = RunStateStore::for_repo(temp.path());
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "not json").unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
        assert!(err.to_string().contains("Delete the file"));
    }

    #[test]
    fn test_version_mismatch_is_persistence_error() {
        let temp = setup_fake_repo();
        let store = RunStateStore::for_repo(temp.path());
        let mut state = RunState::new("sync", StepList::new());
        state.version = RUNSTATE_VERSION + 1;
        store.save(&state).unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
        assert!(err.to_string().contains("format version"));
    }

    #[test]
    fn test_resolve_git_dir_follows_pointer_file() {
        let temp = TempDir::new().unwrap();
        let real = temp.path().join("main-repo/.git/worktrees/wt");
        fs::create_dir_all(&real).unwrap();
        let worktree = temp.path().join("wt");
        fs::create_dir_all(&worktree).unwrap();
        fs::write(
            worktree.join(".git"),
            format!("gitdir: {}\n", real.display()),
        )
        .unwrap();

        let resolved = resolve_git_dir(&worktree);
        assert_eq!(resolved, fs::canonicalize(&real).unwrap());
    }

    #[test]
    fn test_resolve_git_dir_invalid_pointer_returns_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".git"), "gitdir: /does/not/exist\n").unwrap();
        assert_eq!(resolve_git_dir(temp.path()), temp.path().join(".git"));
    }
}
