//! Scripted executor for planning tests
//!
//! Answers git invocations from a table of exact command lines and records
//! everything it was asked to run.

#![allow(dead_code)]

use git_relay::config::Config;
use git_relay::error::Result;
use git_relay::git::{ExecOutput, Executor, Repo};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Executor that replays canned responses
pub struct FakeExecutor {
    responses: Mutex<HashMap<String, ExecOutput>>,
    log: Mutex<Vec<String>>,
}

impl FakeExecutor {
    /// Executor for a repository rooted at `root` with `main` checked out
    pub fn in_repo(root: &str) -> Arc<Self> {
        let fake = Self {
            responses: Mutex::new(HashMap::new()),
            log: Mutex::new(Vec::new()),
        };
        fake.respond("rev-parse --show-toplevel", &format!("{root}\n"));
        fake.respond("rev-parse --is-inside-work-tree", "true\n");
        fake.on_branch("main");
        Arc::new(fake)
    }

    /// Answer `command` with `stdout` and exit 0
    pub fn respond(&self, command: &str, stdout: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(command.to_string(), ExecOutput::ok(stdout));
    }

    /// Answer `command` with a failure
    pub fn fail(&self, command: &str, exit_code: i32, stderr: &str) {
        self.responses.lock().unwrap().insert(
            command.to_string(),
            ExecOutput {
                stdout: String::new(),
                stderr: stderr.to_string(),
                exit_code,
            },
        );
    }

    /// Pretend `branch` is checked out
    pub fn on_branch(&self, branch: &str) {
        self.respond("symbolic-ref --short -q HEAD", &format!("{branch}\n"));
    }

    /// Pretend these local branches exist
    pub fn local_branches(&self, branches: &[&str]) {
        for branch in branches {
            self.respond(&format!("show-ref --verify --quiet refs/heads/{branch}"), "");
        }
        self.respond(
            "for-each-ref --format=%(refname:short) refs/heads",
            &lines(branches),
        );
    }

    /// Pretend origin exists with these remote-tracking branches
    pub fn origin_branches(&self, branches: &[&str]) {
        self.respond("remote", "origin\n");
        let tracking: Vec<String> = branches.iter().map(|b| format!("origin/{b}")).collect();
        let tracking: Vec<&str> = tracking.iter().map(String::as_str).collect();
        self.respond(
            "for-each-ref --format=%(refname:short) refs/remotes",
            &lines(&tracking),
        );
    }

    /// Record parent relationships in the fake git config
    pub fn parents(&self, pairs: &[(&str, &str)]) {
        let entries: Vec<String> = pairs
            .iter()
            .map(|(branch, parent)| format!("relay-branch.{branch}.parent {parent}"))
            .collect();
        let entries: Vec<&str> = entries.iter().map(String::as_str).collect();
        self.respond(
            r"config --get-regexp ^relay-branch\..*\.parent$",
            &lines(&entries),
        );
    }

    /// Pretend the work tree has uncommitted changes
    pub fn dirty(&self) {
        self.respond("status --porcelain --ignore-submodules", " M file.txt\n");
    }

    /// Every command run so far
    pub fn commands(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl Executor for FakeExecutor {
    fn execute(&self, _dir: &Path, args: &[&str]) -> Result<ExecOutput> {
        let command = args.join(" ");
        self.log.lock().unwrap().push(command.clone());
        if let Some(output) = self.responses.lock().unwrap().get(&command) {
            return Ok(output.clone());
        }
        // Unknown refs and unset config keys
        let missing = command.starts_with("show-ref")
            || command.starts_with("config --get")
            || command.starts_with("rev-parse -q --verify");
        Ok(if missing {
            ExecOutput {
                exit_code: 1,
                ..ExecOutput::default()
            }
        } else {
            ExecOutput::ok("")
        })
    }
}

/// Repo over `fake` working in `workdir`
pub fn fake_repo(fake: &Arc<FakeExecutor>, workdir: &str) -> Repo {
    Repo::new(fake.clone(), workdir)
}

/// Default config with `main` as the main branch
pub fn main_config() -> Config {
    Config::default()
}

fn lines(items: &[&str]) -> String {
    items.iter().map(|i| format!("{i}\n")).collect()
}
