//! Real git repositories in temporary directories
//!
//! Each [`TempGitRepo`] is an isolated working copy with `main` checked out
//! and one commit, optionally cloned from a bare `origin`.

#![allow(dead_code)]

use git_relay::git::Repo;
use git_relay::runstate::RunStateStore;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// A throwaway repository driven with the system git binary
pub struct TempGitRepo {
    _dir: TempDir,
    root: PathBuf,
    origin: Option<PathBuf>,
}

impl TempGitRepo {
    /// Fresh repository without remotes
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let root = dir.path().join("work");
        fs::create_dir(&root).expect("failed to create work dir");
        let repo = Self {
            _dir: dir,
            root,
            origin: None,
        };
        repo.git(&["init", "--quiet"]);
        repo.git(&["symbolic-ref", "HEAD", "refs/heads/main"]);
        repo.git(&["config", "user.name", "Relay Test"]);
        repo.git(&["config", "user.email", "relay@example.com"]);
        repo.git(&["config", "commit.gpgsign", "false"]);
        repo.commit_file("README.md", "hello\n", "initial commit");
        repo
    }

    /// Fresh repository whose `main` is pushed to a bare `origin`
    pub fn with_origin() -> Self {
        let mut repo = Self::new();
        let origin = repo._dir.path().join("origin.git");
        run_git(
            repo._dir.path(),
            &["init", "--bare", "--quiet", "origin.git"],
        );
        run_git(&origin, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        repo.git(&["remote", "add", "origin", &origin.display().to_string()]);
        repo.git(&["push", "--quiet", "-u", "origin", "main"]);
        repo.origin = Some(origin);
        repo
    }

    /// Work tree root
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Bare origin, if any
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    /// Run git and return trimmed stdout, panicking on failure
    pub fn git(&self, args: &[&str]) -> String {
        run_git(&self.root, args)
    }

    /// Run git and report whether it succeeded
    pub fn try_git(&self, args: &[&str]) -> bool {
        Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .expect("failed to run git")
            .status
            .success()
    }

    /// Write a file relative to the work tree root
    pub fn write_file(&self, name: &str, content: &str) {
        fs::write(self.root.join(name), content).expect("failed to write file");
    }

    /// Read a file relative to the work tree root
    pub fn read_file(&self, name: &str) -> String {
        fs::read_to_string(self.root.join(name)).expect("failed to read file")
    }

    /// Write, stage and commit a file on the current branch
    pub fn commit_file(&self, name: &str, content: &str, message: &str) {
        self.write_file(name, content);
        self.git(&["add", name]);
        self.git(&["commit", "--quiet", "-m", message]);
    }

    /// Checked out branch
    pub fn current_branch(&self) -> String {
        self.git(&["symbolic-ref", "--short", "HEAD"])
    }

    /// Local branch names, sorted
    pub fn branches(&self) -> Vec<String> {
        self.git(&["for-each-ref", "--format=%(refname:short)", "refs/heads"])
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Commit SHA of a revision
    pub fn sha(&self, rev: &str) -> String {
        self.git(&["rev-parse", rev])
    }

    /// Record `parent` as the parent of `branch`
    pub fn set_parent(&self, branch: &str, parent: &str) {
        self.git(&["config", &format!("relay-branch.{branch}.parent"), parent]);
    }

    /// Parent recorded for `branch`
    pub fn parent(&self, branch: &str) -> Option<String> {
        let out = Command::new("git")
            .args(["config", "--get", &format!("relay-branch.{branch}.parent")])
            .current_dir(&self.root)
            .output()
            .expect("failed to run git");
        out.status
            .success()
            .then(|| String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    /// Engine handle over this repository
    pub fn repo(&self) -> Repo {
        Repo::open(&self.root).expect("failed to open repo")
    }

    /// Run state store of this repository
    pub fn store(&self) -> RunStateStore {
        RunStateStore::for_repo(&self.root)
    }
}

fn run_git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}
