use crate::error::{DepsError, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

pub const REMOTE: &str = "origin";

/// Git primitives the update workflow is built from.
///
/// Every operation takes `&mut self`: the working tree is a single shared
/// resource and only one holder may drive it at a time.
pub trait Git {
    fn has_uncommitted_changes(&mut self) -> Result<bool>;
    /// Returns `false` when there was nothing to stash.
    fn stash(&mut self, message: &str) -> Result<bool>;
    fn stash_pop(&mut self) -> Result<()>;
    /// Branch name, or the commit sha when HEAD is detached
    fn current_branch(&mut self) -> Result<String>;
    fn create_branch(&mut self, name: &str) -> Result<()>;
    fn branch_exists(&mut self, name: &str) -> Result<bool>;
    fn rename_branch(&mut self, from: &str, to: &str) -> Result<()>;
    fn delete_branch(&mut self, name: &str) -> Result<()>;
    fn checkout(&mut self, name: &str) -> Result<()>;
    /// Stages everything and commits it
    fn add_commit(&mut self, message: &str) -> Result<()>;
    fn push_branch(&mut self, name: &str) -> Result<()>;
    fn reset_and_clean(&mut self) -> Result<()>;
    fn remote_url(&mut self) -> Result<String>;
    fn set_remote_url(&mut self, url: &str) -> Result<()>;
}

/// VersionControlAgent runs git in the project directory with hardened input validation.
pub struct VersionControlAgent {
    project_path: PathBuf,
}

impl VersionControlAgent {
    pub fn new<P: AsRef<Path>>(project_path: P) -> Result<Self> {
        let project_path = Self::validate_git_path(project_path.as_ref())?;
        Ok(Self { project_path })
    }

    fn run_git(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .current_dir(&self.project_path)
            .env("GIT_TERMINAL_PROMPT", "0")
            .args(args)
            .output()
            .map_err(|e| {
                DepsError::GitOperation(format!(
                    "Failed to execute git command '{}': {e}",
                    args.join(" ")
                ))
            })
    }

    fn run_checked(&self, args: &[&str]) -> Result<String> {
        let output = self.run_git(args)?;
        Self::ensure_success(&output, &format!("git {}", args[0]))?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn ensure_success(output: &Output, command: &str) -> Result<()> {
        if output.status.success() {
            return Ok(());
        }

        Err(DepsError::GitOperation(format!(
            "{} failed: {}",
            command,
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }

    fn ref_exists(&self, reference: &str) -> Result<bool> {
        let output = self.run_git(&["show-ref", "--verify", "--quiet", reference])?;
        Ok(output.status.success())
    }

    fn validate_git_path(path: &Path) -> Result<PathBuf> {
        let dangerous = [';', '|', '&', '$', '`', '\n', '\r'];
        let path_str = path.to_string_lossy();
        if let Some(ch) = dangerous.iter().find(|c| path_str.contains(**c)) {
            return Err(DepsError::GitOperation(format!(
                "Path contains dangerous character: '{}'",
                ch
            )));
        }

        let canonical = path.canonicalize().map_err(|e| {
            DepsError::GitOperation(format!("Invalid Git path '{}': {e}", path.display()))
        })?;
        if !canonical.is_dir() {
            return Err(DepsError::GitOperation(format!(
                "Git path '{}' is not a directory",
                canonical.display()
            )));
        }

        Ok(canonical)
    }
}

/// Auth failures are recoverable once, after the host adapter repairs the remote.
fn classify_push_failure(stderr: &str) -> DepsError {
    const AUTH_MARKERS: [&str; 5] = [
        "Authentication failed",
        "could not read Username",
        "terminal prompts disabled",
        "Permission denied",
        "403",
    ];

    let message = stderr.trim().to_string();
    if AUTH_MARKERS.iter().any(|marker| stderr.contains(marker)) {
        DepsError::PushAuthentication(message)
    } else {
        DepsError::GitOperation(format!("git push failed: {message}"))
    }
}

impl Git for VersionControlAgent {
    fn has_uncommitted_changes(&mut self) -> Result<bool> {
        Ok(!self.run_checked(&["status", "--porcelain"])?.is_empty())
    }

    fn stash(&mut self, message: &str) -> Result<bool> {
        let stdout = self.run_checked(&["stash", "push", "--include-untracked", "-m", message])?;
        Ok(!stdout.contains("No local changes to save"))
    }

    fn stash_pop(&mut self) -> Result<()> {
        self.run_checked(&["stash", "pop"]).map(drop)
    }

    fn current_branch(&mut self) -> Result<String> {
        let branch = self.run_checked(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        if branch == "HEAD" {
            return self.run_checked(&["rev-parse", "HEAD"]);
        }
        Ok(branch)
    }

    fn create_branch(&mut self, name: &str) -> Result<()> {
        self.run_checked(&["checkout", "-b", name]).map(drop)
    }

    fn branch_exists(&mut self, name: &str) -> Result<bool> {
        Ok(self.ref_exists(&format!("refs/heads/{name}"))?
            || self.ref_exists(&format!("refs/remotes/{REMOTE}/{name}"))?)
    }

    fn rename_branch(&mut self, from: &str, to: &str) -> Result<()> {
        self.run_checked(&["branch", "-m", from, to]).map(drop)
    }

    fn delete_branch(&mut self, name: &str) -> Result<()> {
        self.run_checked(&["branch", "-D", name]).map(drop)
    }

    fn checkout(&mut self, name: &str) -> Result<()> {
        self.run_checked(&["checkout", name]).map(drop)
    }

    fn add_commit(&mut self, message: &str) -> Result<()> {
        self.run_checked(&["add", "--all"])?;
        self.run_checked(&["commit", "-m", message]).map(drop)
    }

    fn push_branch(&mut self, name: &str) -> Result<()> {
        let output = self.run_git(&["push", "--set-upstream", REMOTE, name])?;
        if output.status.success() {
            return Ok(());
        }
        Err(classify_push_failure(&String::from_utf8_lossy(&output.stderr)))
    }

    fn reset_and_clean(&mut self) -> Result<()> {
        self.run_checked(&["reset", "--hard"])?;
        self.run_checked(&["clean", "-fd"]).map(drop)
    }

    fn remote_url(&mut self) -> Result<String> {
        self.run_checked(&["remote", "get-url", REMOTE])
    }

    fn set_remote_url(&mut self, url: &str) -> Result<()> {
        self.run_checked(&["remote", "set-url", REMOTE, url]).map(drop)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::{BTreeSet, HashSet};

    /// In-memory working tree that records every primitive it is asked to run.
    #[derive(Debug, Default)]
    pub struct FakeGit {
        pub branch: String,
        pub branches: BTreeSet<String>,
        pub dirty: bool,
        pub remote: String,
        pub calls: Vec<String>,
        pub commits: Vec<(String, String)>,
        pub stash_pushes: usize,
        pub stash_pops: usize,
        pub push_attempts: usize,
        /// Number of upcoming pushes that fail with an auth error
        pub failing_pushes: usize,
        /// Primitives that fail whenever called
        pub fail_on: HashSet<&'static str>,
    }

    impl FakeGit {
        pub fn on_branch(branch: &str) -> Self {
            Self {
                branch: branch.to_string(),
                branches: BTreeSet::from([branch.to_string()]),
                remote: "git@github.com:acme/widgets.git".to_string(),
                ..Default::default()
            }
        }

        pub fn dirty(mut self) -> Self {
            self.dirty = true;
            self
        }

        pub fn called(&self, op: &str) -> usize {
            self.calls
                .iter()
                .filter(|call| call.split(' ').next() == Some(op))
                .count()
        }

        fn record(&mut self, op: &'static str, args: &[&str]) -> Result<()> {
            self.calls.push(
                std::iter::once(op)
                    .chain(args.iter().copied())
                    .collect::<Vec<_>>()
                    .join(" "),
            );
            if self.fail_on.contains(op) {
                return Err(DepsError::GitOperation(format!("{op} failed")));
            }
            Ok(())
        }
    }

    impl Git for FakeGit {
        fn has_uncommitted_changes(&mut self) -> Result<bool> {
            self.record("status", &[])?;
            Ok(self.dirty)
        }

        fn stash(&mut self, message: &str) -> Result<bool> {
            self.record("stash", &[message])?;
            if !self.dirty {
                return Ok(false);
            }
            self.dirty = false;
            self.stash_pushes += 1;
            Ok(true)
        }

        fn stash_pop(&mut self) -> Result<()> {
            self.record("stash_pop", &[])?;
            if self.stash_pops >= self.stash_pushes {
                return Err(DepsError::GitOperation("no stash entries".into()));
            }
            self.stash_pops += 1;
            self.dirty = true;
            Ok(())
        }

        fn current_branch(&mut self) -> Result<String> {
            self.record("current_branch", &[])?;
            Ok(self.branch.clone())
        }

        fn create_branch(&mut self, name: &str) -> Result<()> {
            self.record("create_branch", &[name])?;
            if !self.branches.insert(name.to_string()) {
                return Err(DepsError::GitOperation(format!("{name} already exists")));
            }
            self.branch = name.to_string();
            Ok(())
        }

        fn branch_exists(&mut self, name: &str) -> Result<bool> {
            self.record("branch_exists", &[name])?;
            Ok(self.branches.contains(name))
        }

        fn rename_branch(&mut self, from: &str, to: &str) -> Result<()> {
            self.record("rename_branch", &[from, to])?;
            if !self.branches.remove(from) {
                return Err(DepsError::GitOperation(format!("{from} does not exist")));
            }
            self.branches.insert(to.to_string());
            if self.branch == from {
                self.branch = to.to_string();
            }
            Ok(())
        }

        fn delete_branch(&mut self, name: &str) -> Result<()> {
            self.record("delete_branch", &[name])?;
            self.branches.remove(name);
            Ok(())
        }

        fn checkout(&mut self, name: &str) -> Result<()> {
            self.record("checkout", &[name])?;
            self.branch = name.to_string();
            Ok(())
        }

        fn add_commit(&mut self, message: &str) -> Result<()> {
            self.record("add_commit", &[message])?;
            self.commits.push((self.branch.clone(), message.to_string()));
            Ok(())
        }

        fn push_branch(&mut self, name: &str) -> Result<()> {
            self.record("push_branch", &[name])?;
            self.push_attempts += 1;
            if self.failing_pushes > 0 {
                self.failing_pushes -= 1;
                return Err(DepsError::PushAuthentication("Authentication failed".into()));
            }
            Ok(())
        }

        fn reset_and_clean(&mut self) -> Result<()> {
            self.record("reset_and_clean", &[])
        }

        fn remote_url(&mut self) -> Result<String> {
            self.record("remote_url", &[])?;
            Ok(self.remote.clone())
        }

        fn set_remote_url(&mut self, url: &str) -> Result<()> {
            self.record("set_remote_url", &[url])?;
            self.remote = url.to_string();
            Ok(())
        }
    }
}
