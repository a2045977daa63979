//! Git plumbing for materializing historical snapshots.
//!
//! Shells out to `git` for all operations so the user's configuration,
//! credentials, and alternates are honoured. Every invocation runs under the
//! optional deadline of its [`Git`] handle; a child that outlives it is
//! killed and reported as [`GitError::Timeout`].

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// Failed to execute the `git` command.
    #[error("failed to run git: {0}")]
    Exec(#[from] std::io::Error),

    /// `git` returned a non-zero exit code.
    #[error("git {command} failed: {stderr}")]
    Command {
        /// The git subcommand that failed (e.g., "clone").
        command: String,
        /// Captured stderr.
        stderr: String,
    },

    /// Not inside a git repository.
    #[error("not a git repository (or any parent up to mount point)")]
    NotARepo,

    /// The deadline expired before `git` finished; the child was killed.
    #[error("git {command} timed out")]
    Timeout {
        /// The git subcommand that was killed.
        command: String,
    },

    /// No `git` executable on `PATH`.
    #[error("git executable not found on PATH")]
    GitNotFound,
}

/// Result alias for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// A `git` invocation context: working directory plus optional deadline.
#[derive(Debug, Clone)]
pub struct Git {
    dir: Utf8PathBuf,
    deadline: Option<Instant>,
}

impl Git {
    /// Run git commands from `dir`.
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            deadline: None,
        }
    }

    /// Kill any command still running at `deadline`.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// The directory commands run in.
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Check whether the directory is inside a work tree.
    #[instrument(skip(self), fields(dir = %self.dir))]
    pub fn is_inside_repo(&self) -> GitResult<bool> {
        match self.run(&["rev-parse", "--is-inside-work-tree"]) {
            Ok(output) => Ok(output.trim() == "true"),
            Err(GitError::Command { .. } | GitError::NotARepo) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Absolute path of the top of the work tree.
    pub fn toplevel(&self) -> GitResult<Utf8PathBuf> {
        let output = self.run(&["rev-parse", "--show-toplevel"])?;
        Ok(Utf8PathBuf::from(output.trim()))
    }

    /// Get the current branch name.
    ///
    /// Returns `None` if in a detached HEAD state.
    #[instrument(skip(self))]
    pub fn current_branch(&self) -> GitResult<Option<String>> {
        let output = self.run(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let branch = output.trim().to_string();
        if branch == "HEAD" {
            debug!("detached HEAD");
            Ok(None)
        } else {
            debug!(%branch, "current branch");
            Ok(Some(branch))
        }
    }

    /// The tag pointing exactly at HEAD, if any.
    #[instrument(skip(self))]
    pub fn exact_tag(&self) -> GitResult<Option<String>> {
        match self.run(&["describe", "--tags", "--exact-match", "HEAD"]) {
            Ok(output) => Ok(Some(output.trim().to_string())),
            Err(GitError::Command { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Full commit id of HEAD.
    pub fn head_commit(&self) -> GitResult<String> {
        Ok(self.run(&["rev-parse", "HEAD"])?.trim().to_string())
    }

    /// All tag names, unsorted.
    #[instrument(skip(self))]
    pub fn tags(&self) -> GitResult<Vec<String>> {
        let output = self.run(&["tag", "--list"])?;
        let tags: Vec<String> = output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
        debug!(count = tags.len(), "tags");
        Ok(tags)
    }

    /// Resolve `reference` to a commit id, or `None` if it names nothing.
    #[instrument(skip(self))]
    pub fn verify_ref(&self, reference: &str) -> GitResult<Option<String>> {
        let spec = format!("{reference}^{{commit}}");
        match self.run(&["rev-parse", "--verify", "--quiet", &spec]) {
            Ok(output) => Ok(Some(output.trim().to_string())),
            Err(GitError::Command { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Clone `reference` of this repository into `dest` with depth one.
    ///
    /// Only branch and tag names can be cloned this way.
    #[instrument(skip(self), fields(repo = %self.dir))]
    pub fn shallow_clone(&self, reference: &str, dest: &Utf8Path) -> GitResult<()> {
        let source = format!("file://{}", self.dir);
        self.run(&[
            "clone",
            "--quiet",
            "--depth",
            "1",
            "--branch",
            reference,
            &source,
            dest.as_str(),
        ])?;
        Ok(())
    }

    /// Check out `reference` as a detached worktree at `dest`.
    #[instrument(skip(self), fields(repo = %self.dir))]
    pub fn add_worktree(&self, reference: &str, dest: &Utf8Path) -> GitResult<()> {
        self.run(&["worktree", "add", "--quiet", "--detach", dest.as_str(), reference])?;
        Ok(())
    }

    /// Remove the worktree at `path` and prune its registration.
    #[instrument(skip(self), fields(repo = %self.dir))]
    pub fn remove_worktree(&self, path: &Utf8Path) -> GitResult<()> {
        let removed = self.run(&["worktree", "remove", "--force", path.as_str()]);
        // prune even when removal failed so a half-created entry does not linger
        self.run(&["worktree", "prune"])?;
        removed.map(|_| ())
    }

    /// Registered worktree paths, the main one first.
    pub fn worktrees(&self) -> GitResult<Vec<Utf8PathBuf>> {
        let output = self.run(&["worktree", "list", "--porcelain"])?;
        Ok(output
            .lines()
            .filter_map(|line| line.strip_prefix("worktree "))
            .map(Utf8PathBuf::from)
            .collect())
    }

    /// Run a git command and return its stdout.
    fn run(&self, args: &[&str]) -> GitResult<String> {
        let command = args.first().copied().unwrap_or_default().to_string();
        if self.expired() {
            return Err(GitError::Timeout { command });
        }
        let child = Command::new("git")
            .arg("-C")
            .arg(self.dir.as_str())
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => GitError::GitNotFound,
                _ => GitError::Exec(e),
            })?;

        let (success, stdout, stderr) = self.wait(child, &command)?;
        if success {
            return Ok(stdout);
        }

        let stderr = stderr.trim().to_string();
        if stderr.contains("not a git repository") {
            return Err(GitError::NotARepo);
        }
        Err(GitError::Command { command, stderr })
    }

    fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Wait for `child`, draining its pipes on helper threads, and kill it if
    /// the deadline passes first.
    fn wait(&self, mut child: Child, command: &str) -> GitResult<(bool, String, String)> {
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if self.expired() {
                debug!(command, "deadline expired, killing git");
                let _ = child.kill();
                let _ = child.wait();
                return Err(GitError::Timeout {
                    command: command.to_string(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();
        Ok((status.success(), stdout, stderr))
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Check that a `git` executable is available.
pub fn is_installed() -> bool {
    which::which("git").is_ok()
}
