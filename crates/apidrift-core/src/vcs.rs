//! Contracts at historical references.
//!
//! [`VcsAdapter`] materializes a branch, tag, or commit into a temporary
//! [`Workspace`], runs the configured extractor there, and tags the contract
//! with the reference name. A shallow clone is tried first; if that fails the
//! reference is checked out once as a detached worktree. Workspaces clean up
//! after themselves when dropped, whatever happened in between.

use std::cmp::Ordering;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::contract::{Contract, ContractDiff};
use crate::diff::Differ;
use crate::extract::{ExtractError, ExtractOptions, Strategy};
use crate::git::{Git, GitError};

/// Version label given to contracts of the live working tree.
pub const WORKING_TREE: &str = "working";

const CLEANUP_GRACE: Duration = Duration::from_secs(30);

/// Errors from the version-control adapter.
#[derive(Error, Debug)]
pub enum VcsError {
    /// The tag pattern is not a valid regular expression.
    #[error("invalid tag pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// The pattern as given.
        pattern: String,
        /// Why it failed to compile.
        source: regex::Error,
    },

    /// The reference does not name a commit.
    #[error("reference {reference:?} not found")]
    RefNotFound {
        /// The reference as given.
        reference: String,
    },

    /// Both the shallow clone and the worktree checkout failed.
    #[error("could not materialize {reference}: clone failed ({clone}); worktree failed ({worktree})")]
    Materialize {
        /// The reference being materialized.
        reference: String,
        /// Why the shallow clone failed.
        clone: GitError,
        /// Why the worktree checkout failed.
        worktree: GitError,
    },

    /// A git command failed.
    #[error(transparent)]
    Git(#[from] GitError),

    /// Extraction failed inside the workspace.
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// The temporary workspace could not be created.
    #[error("failed to create workspace: {0}")]
    Workspace(#[source] std::io::Error),
}

/// Result alias for adapter operations.
pub type VcsResult<T> = Result<T, VcsError>;

/// Adapter settings.
#[derive(Debug, Clone, Default)]
pub struct VcsOptions {
    /// Filters applied to every extraction, old and new alike.
    pub extract: ExtractOptions,
    /// Which extractor to run.
    pub strategy: Strategy,
    /// Package to extract, relative to the adapter root. Empty means the
    /// root itself; `dir/...` patterns work with the resolved strategy.
    pub package: Utf8PathBuf,
    /// Upper bound on the git work of one operation.
    pub timeout: Option<Duration>,
}

/// How a workspace was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Materialization {
    /// `git clone --depth 1`.
    Clone,
    /// `git worktree add --detach`.
    Worktree,
}

/// A reference checked out into a temporary directory.
///
/// Dropping the guard unregisters the worktree, if any, and deletes the
/// directory.
#[derive(Debug)]
pub struct Workspace {
    tree: Utf8PathBuf,
    method: Materialization,
    repo: Utf8PathBuf,
    // dropped after `Drop::drop` has unregistered the worktree
    _dir: TempDir,
}

impl Workspace {
    /// Root of the checked-out tree.
    pub fn path(&self) -> &Utf8Path {
        &self.tree
    }

    /// How the tree was produced.
    pub const fn method(&self) -> Materialization {
        self.method
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.method != Materialization::Worktree {
            return;
        }
        let git = Git::new(&self.repo).with_deadline(Some(Instant::now() + CLEANUP_GRACE));
        if let Err(e) = git.remove_worktree(&self.tree) {
            debug!(tree = %self.tree, error = %e, "worktree removal failed");
        }
    }
}

/// Extracts and compares contracts at references of one repository.
#[derive(Debug, Clone)]
pub struct VcsAdapter {
    root: Utf8PathBuf,
    repo: Utf8PathBuf,
    prefix: Utf8PathBuf,
    options: VcsOptions,
}

impl VcsAdapter {
    /// Open the repository containing `root`.
    ///
    /// The package path in `options` is taken relative to `root`, which may
    /// be a subdirectory of the work tree.
    #[instrument(skip(options), fields(%root))]
    pub fn new(root: &Utf8Path, options: VcsOptions) -> VcsResult<Self> {
        let root = root
            .canonicalize_utf8()
            .map_err(|e| VcsError::Git(GitError::Exec(e)))?;
        let git = Git::new(&root).with_deadline(options.timeout.map(|t| Instant::now() + t));
        if !git.is_inside_repo()? {
            return Err(GitError::NotARepo.into());
        }
        let repo = git.toplevel()?;
        let repo = repo.canonicalize_utf8().unwrap_or(repo);
        let prefix = root
            .strip_prefix(&repo)
            .map(Utf8Path::to_path_buf)
            .unwrap_or_default();
        debug!(%repo, %prefix, "opened repository");
        Ok(Self {
            root,
            repo,
            prefix,
            options,
        })
    }

    fn deadline(&self) -> Option<Instant> {
        self.options.timeout.map(|t| Instant::now() + t)
    }

    fn git(&self, deadline: Option<Instant>) -> Git {
        Git::new(&self.repo).with_deadline(deadline)
    }

    /// Tags matching `pattern`, newest version first.
    #[instrument(skip(self))]
    pub fn list_version_tags(&self, pattern: &str) -> VcsResult<Vec<String>> {
        let re = Regex::new(pattern).map_err(|source| VcsError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        let mut tags: Vec<String> = self
            .git(self.deadline())
            .tags()?
            .into_iter()
            .filter(|tag| re.is_match(tag))
            .collect();
        sort_version_tags(&mut tags);
        debug!(count = tags.len(), "matching tags");
        Ok(tags)
    }

    /// The branch name, else the tag exactly at HEAD, else the commit id.
    #[instrument(skip(self))]
    pub fn current_ref(&self) -> VcsResult<String> {
        let git = self.git(self.deadline());
        if let Some(branch) = git.current_branch()? {
            return Ok(branch);
        }
        if let Some(tag) = git.exact_tag()? {
            return Ok(tag);
        }
        Ok(git.head_commit()?)
    }

    /// Check `reference` out into a fresh temporary workspace.
    pub fn materialize(&self, reference: &str) -> VcsResult<Workspace> {
        self.materialize_by(reference, self.deadline())
    }

    #[instrument(skip(self, deadline))]
    fn materialize_by(&self, reference: &str, deadline: Option<Instant>) -> VcsResult<Workspace> {
        let git = self.git(deadline);
        if git.verify_ref(reference)?.is_none() {
            return Err(VcsError::RefNotFound {
                reference: reference.to_string(),
            });
        }

        let dir = tempfile::Builder::new()
            .prefix("apidrift-")
            .tempdir()
            .map_err(VcsError::Workspace)?;
        let base = Utf8PathBuf::try_from(dir.path().to_path_buf())
            .map_err(|e| VcsError::Workspace(e.into_io_error()))?;
        let tree = base.join("tree");

        let clone = match git.shallow_clone(reference, &tree) {
            Ok(()) => {
                debug!(%tree, "materialized by clone");
                return Ok(Workspace {
                    tree,
                    method: Materialization::Clone,
                    repo: self.repo.clone(),
                    _dir: dir,
                });
            }
            Err(e @ GitError::Timeout { .. }) => return Err(e.into()),
            Err(e) => e,
        };
        warn!(reference, error = %clone, "shallow clone failed, falling back to worktree");
        if tree.exists()
            && let Err(e) = std::fs::remove_dir_all(&tree)
        {
            return Err(VcsError::Workspace(e));
        }

        // built before the checkout so a half-registered worktree is pruned too
        let workspace = Workspace {
            tree,
            method: Materialization::Worktree,
            repo: self.repo.clone(),
            _dir: dir,
        };
        match git.add_worktree(reference, &workspace.tree) {
            Ok(()) => {
                debug!(tree = %workspace.tree, "materialized by worktree");
                Ok(workspace)
            }
            Err(e @ GitError::Timeout { .. }) => Err(e.into()),
            Err(worktree) => Err(VcsError::Materialize {
                reference: reference.to_string(),
                clone,
                worktree,
            }),
        }
    }

    /// Extract the package at `reference`; the contract's version is the
    /// reference name.
    pub fn extract_ref(&self, reference: &str) -> VcsResult<Contract> {
        self.extract_ref_by(reference, self.deadline())
    }

    fn extract_ref_by(&self, reference: &str, deadline: Option<Instant>) -> VcsResult<Contract> {
        let workspace = self.materialize_by(reference, deadline)?;
        let mut contract = self.extract_in(&workspace.path().join(&self.prefix))?;
        contract.version = reference.to_string();
        Ok(contract)
    }

    /// Extract the package from the live working tree, uncommitted changes
    /// included.
    pub fn extract_working_tree(&self) -> VcsResult<Contract> {
        let mut contract = self.extract_in(&self.root)?;
        contract.version = WORKING_TREE.to_string();
        Ok(contract)
    }

    fn extract_in(&self, root: &Utf8Path) -> VcsResult<Contract> {
        let target = if self.options.package.as_str().is_empty() {
            root.to_path_buf()
        } else {
            root.join(&self.options.package)
        };
        let source = self.options.strategy.source(self.options.extract);
        Ok(source.extract(&target)?)
    }

    /// Compare the package at `old` against `new`, or against the working
    /// tree when `new` is `None`. Both sides use the same extraction
    /// options.
    #[instrument(skip(self, differ))]
    pub fn compare_refs(
        &self,
        old: &str,
        new: Option<&str>,
        differ: &Differ,
    ) -> VcsResult<ContractDiff> {
        let deadline = self.deadline();
        let before = self.extract_ref_by(old, deadline)?;
        let after = match new {
            Some(reference) => self.extract_ref_by(reference, deadline)?,
            None => self.extract_working_tree()?,
        };
        Ok(differ.diff(&before, &after))
    }
}

/// Sort tags newest version first.
///
/// Tags are compared as semantic versions after dropping any `path/` prefix
/// and a leading `v`; tags that do not parse sort after all versions, in
/// descending name order.
pub fn sort_version_tags(tags: &mut [String]) {
    tags.sort_by(|a, b| match (tag_version(a), tag_version(b)) {
        (Some(x), Some(y)) => y.cmp(&x).then_with(|| b.cmp(a)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.cmp(a),
    });
}

fn tag_version(tag: &str) -> Option<semver::Version> {
    let base = tag.rsplit('/').next().unwrap_or(tag);
    let base = base.strip_prefix('v').unwrap_or(base);
    semver::Version::parse(base).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ChangeType;
    use crate::git::is_installed;
    use crate::git::tests::{commit, git, repo};

    const V1: &str = "package demo\n\n// Connect dials host.\nfunc Connect(host string) error { return nil }\n";
    const V2: &str = "package demo\n\n// Connect dials host.\nfunc Connect(host string, timeout int) error { return nil }\n";

    fn adapter(dir: &Utf8Path, options: VcsOptions) -> VcsAdapter {
        VcsAdapter::new(dir, options).expect("open repository")
    }

    fn tagged_repo() -> Option<(tempfile::TempDir, Utf8PathBuf)> {
        let (tmp, dir) = repo()?;
        commit(&dir, &[("go.mod", "module example.com/demo\n"), ("api.go", V1)], "v1");
        git(&dir, &["tag", "v1.0.0"]);
        commit(&dir, &[("api.go", V2)], "v2");
        git(&dir, &["tag", "v2.0.0"]);
        Some((tmp, dir))
    }

    #[test]
    fn sorts_semver_before_other_tags() {
        let mut tags: Vec<String> = ["v1.2.0", "nightly", "v1.10.0", "api/v2.0.0", "v1.2.0-rc.1", "beta"]
            .map(String::from)
            .to_vec();
        sort_version_tags(&mut tags);
        assert_eq!(
            tags,
            ["api/v2.0.0", "v1.10.0", "v1.2.0", "v1.2.0-rc.1", "nightly", "beta"]
        );
    }

    #[test]
    fn lists_tags_by_pattern() {
        let Some((_tmp, dir)) = tagged_repo() else { return };
        git(&dir, &["tag", "release-candidate"]);
        let a = adapter(&dir, VcsOptions::default());
        assert_eq!(a.list_version_tags(r"^v\d").expect("tags"), ["v2.0.0", "v1.0.0"]);
        assert_eq!(a.list_version_tags("").expect("all").len(), 3);

        let err = a.list_version_tags("v(").expect_err("bad regex");
        assert!(matches!(err, VcsError::InvalidPattern { .. }));
    }

    #[test]
    fn current_ref_prefers_branch_then_tag_then_commit() {
        let Some((_tmp, dir)) = tagged_repo() else { return };
        let a = adapter(&dir, VcsOptions::default());
        assert_eq!(a.current_ref().expect("ref"), "main");

        git(&dir, &["checkout", "--quiet", "--detach", "v1.0.0"]);
        assert_eq!(a.current_ref().expect("ref"), "v1.0.0");

        commit(&dir, &[("notes.txt", "x")], "untagged");
        assert_eq!(a.current_ref().expect("ref").len(), 40);
    }

    #[test]
    fn compares_two_tags() {
        let Some((_tmp, dir)) = tagged_repo() else { return };
        let a = adapter(&dir, VcsOptions::default());
        let d = a
            .compare_refs("v1.0.0", Some("v2.0.0"), &Differ::default())
            .expect("compare");
        assert_eq!(d.old_version, "v1.0.0");
        assert_eq!(d.new_version, "v2.0.0");
        assert_eq!(d.breaking_changes.len(), 1);
        assert_eq!(d.breaking_changes[0].change_type, ChangeType::ChangedFunctionSignature);
    }

    #[test]
    fn compares_against_working_tree_with_same_options() {
        let Some((_tmp, dir)) = tagged_repo() else { return };
        std::fs::write(
            dir.join("api.go"),
            format!("{V2}\nfunc helper() {{}}\n"),
        )
        .expect("edit");
        let options = VcsOptions {
            extract: ExtractOptions {
                include_private: true,
                ..ExtractOptions::default()
            },
            ..VcsOptions::default()
        };
        let a = adapter(&dir, options);
        let d = a.compare_refs("v2.0.0", None, &Differ::default()).expect("compare");
        assert_eq!(d.new_version, WORKING_TREE);
        assert!(d.breaking_changes.is_empty());
        assert_eq!(d.added_items.len(), 1);
        assert_eq!(d.added_items[0].item, "helper");
    }

    #[test]
    fn commit_ids_fall_back_to_worktree_and_clean_up() {
        let Some((_tmp, dir)) = tagged_repo() else { return };
        let a = adapter(&dir, VcsOptions::default());
        let commit_id = git(&dir, &["rev-parse", "v1.0.0"]).trim().to_string();

        let workspace = a.materialize(&commit_id).expect("materialize");
        assert_eq!(workspace.method(), Materialization::Worktree);
        let tree = workspace.path().to_path_buf();
        assert!(tree.join("api.go").is_file());
        assert_eq!(Git::new(&dir).worktrees().expect("list").len(), 2);

        drop(workspace);
        assert!(!tree.exists());
        assert_eq!(Git::new(&dir).worktrees().expect("list").len(), 1);
    }

    #[test]
    fn tags_are_cloned_and_cleaned_up() {
        let Some((_tmp, dir)) = tagged_repo() else { return };
        let a = adapter(&dir, VcsOptions::default());
        let workspace = a.materialize("v1.0.0").expect("materialize");
        assert_eq!(workspace.method(), Materialization::Clone);
        let tree = workspace.path().to_path_buf();
        drop(workspace);
        assert!(!tree.exists());
    }

    #[test]
    fn extraction_failure_still_cleans_up() {
        let Some((_tmp, dir)) = tagged_repo() else { return };
        let a = adapter(
            &dir,
            VcsOptions {
                package: "missing".into(),
                ..VcsOptions::default()
            },
        );
        let err = a.extract_ref("v1.0.0").expect_err("no package");
        assert!(matches!(err, VcsError::Extract(_)));
        assert_eq!(Git::new(&dir).worktrees().expect("list").len(), 1);
    }

    #[test]
    fn unknown_reference() {
        let Some((_tmp, dir)) = tagged_repo() else { return };
        let err = adapter(&dir, VcsOptions::default())
            .extract_ref("v9.9.9")
            .expect_err("missing ref");
        assert!(matches!(err, VcsError::RefNotFound { reference } if reference == "v9.9.9"));
    }

    #[test]
    fn root_outside_repository() {
        if !is_installed() {
            return;
        }
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let dir = Utf8PathBuf::try_from(tmp.path().to_path_buf()).expect("utf-8");
        let err = VcsAdapter::new(&dir, VcsOptions::default()).expect_err("not a repo");
        assert!(matches!(err, VcsError::Git(GitError::NotARepo)));
    }

    #[test]
    fn zero_timeout_surfaces_timeout() {
        let Some((_tmp, dir)) = tagged_repo() else { return };
        let mut a = adapter(&dir, VcsOptions::default());
        a.options.timeout = Some(Duration::ZERO);
        let err = a.extract_ref("v1.0.0").expect_err("timeout");
        assert!(matches!(err, VcsError::Git(GitError::Timeout { .. })));
    }
}
