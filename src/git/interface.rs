//! git::interface
//!
//! Git interface implementation using git2.
//!
//! The [`Git`] struct is the only way to interact with a git repository.
//! No other module imports `git2` directly. This ensures:
//!
//! - Consistent error handling across all git operations
//! - Strong type guarantees at the boundary
//!
//! # Submodule recursion
//!
//! A submodule's repository is just another [`Git`], opened through
//! [`Git::open_submodule`]. Errors crossing that boundary are wrapped with
//! the submodule path via [`GitError::InSubmodule`] so callers always know
//! which repository failed.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::identity::Identity;
use crate::core::types::{Oid, SubmodulePath, TypeError};

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Requested remote does not exist.
    #[error("remote not found: {name}")]
    RemoteNotFound {
        /// The remote name
        name: String,
    },

    /// Object not found in repository.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// A submodule is listed but its repository is not open on disk.
    #[error("submodule not open: {path}")]
    SubmoduleClosed {
        /// The submodule path
        path: SubmodulePath,
    },

    /// No submodule is recorded at the given path.
    #[error("no submodule at path: {path}")]
    SubmoduleNotFound {
        /// The path that was looked up
        path: SubmodulePath,
    },

    /// Fetch from a remote failed.
    #[error("fetch from '{remote}' failed: {message}")]
    FetchFailed {
        /// The remote name or URL
        remote: String,
        /// The underlying message
        message: String,
    },

    /// A push was rejected by the remote (non-fast-forward).
    #[error("push rejected for {refname}: {reason}")]
    PushRejected {
        /// The refspec destination that was rejected
        refname: String,
        /// The remote's reason
        reason: String,
    },

    /// Committer identity is not configured.
    #[error("committer identity not configured: {message}")]
    NoIdentity {
        /// Description of what is missing
        message: String,
    },

    /// An error raised inside a submodule repository, wrapped with the
    /// submodule path for context.
    #[error("in submodule '{path}': {source}")]
    InSubmodule {
        /// The submodule path
        path: SubmodulePath,
        /// The underlying error
        #[source]
        source: Box<GitError>,
    },

    /// Permission or filesystem error.
    #[error("repository access error: {message}")]
    AccessError {
        /// Description of the error
        message: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => {
                if context.starts_with("refs/") || context.contains("ref") {
                    GitError::RefNotFound {
                        refname: context.to_string(),
                    }
                } else {
                    GitError::ObjectNotFound {
                        oid: context.to_string(),
                    }
                }
            }
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: context.to_string(),
            },
            git2::ErrorCode::Locked => GitError::AccessError {
                message: format!("repository is locked: {}", err.message()),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }

    /// Wrap this error with a submodule path for context.
    pub fn in_submodule(self, path: &SubmodulePath) -> Self {
        GitError::InSubmodule {
            path: path.clone(),
            source: Box::new(self),
        }
    }
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => GitError::RefNotFound {
                refname: err.message().to_string(),
            },
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: err.message().to_string(),
            },
            _ => GitError::Internal {
                message: err.message().to_string(),
            },
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(msg) => GitError::InvalidOid { oid: msg },
            TypeError::InvalidPath(msg) => GitError::AccessError { message: msg },
        }
    }
}

/// Information about a git repository.
#[derive(Debug, Clone)]
pub struct RepoInfo {
    /// Path to the per-worktree .git directory
    pub git_dir: PathBuf,
    /// Path to the shared git directory (equals git_dir for normal repos)
    pub common_dir: PathBuf,
    /// Path to the working directory
    pub work_dir: PathBuf,
}

/// Classification of a single path's change, as produced by the status
/// and diff layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Newly added.
    Added,
    /// Content modified.
    Modified,
    /// Removed.
    Removed,
    /// Renamed.
    Renamed,
    /// File type changed (e.g. file to symlink).
    TypeChanged,
    /// Unresolved conflict.
    Conflicted,
    /// Not tracked by git (workdir only).
    Untracked,
}

/// A single change between two trees, tagged by kind.
///
/// The diff layer distinguishes file changes from submodule (gitlink)
/// changes up front so callers never inspect raw modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeChange {
    /// An ordinary blob changed.
    File {
        /// Repository-relative path
        path: String,
        /// What happened to it
        status: FileStatus,
    },
    /// A submodule gitlink changed.
    Submodule {
        /// The submodule path
        path: SubmodulePath,
        /// The gitlink on the old side, if present
        old: Option<Oid>,
        /// The gitlink on the new side, if present
        new: Option<Oid>,
    },
}

/// One side of a three-way index conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSide {
    /// File mode of the entry (0o160000 for gitlinks)
    pub mode: u32,
    /// Object id of the entry
    pub oid: Oid,
}

impl StageSide {
    /// Whether this side is a submodule gitlink.
    pub fn is_gitlink(&self) -> bool {
        self.mode == 0o160000
    }
}

/// The three sides of an index conflict for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictSides {
    /// Repository-relative path
    pub path: String,
    /// Common ancestor entry, if any
    pub ancestor: Option<StageSide>,
    /// Our side, if any
    pub ours: Option<StageSide>,
    /// Their side, if any
    pub theirs: Option<StageSide>,
}

impl ConflictSides {
    /// Whether any side of this conflict is a submodule gitlink.
    pub fn is_submodule(&self) -> bool {
        [&self.ancestor, &self.ours, &self.theirs]
            .into_iter()
            .flatten()
            .any(StageSide::is_gitlink)
    }
}

/// Stage numbers in the git index.
const STAGE_ANCESTOR: i32 = 1;
const STAGE_OURS: i32 = 2;
const STAGE_THEIRS: i32 = 3;
const STAGE_SHIFT: u16 = 12;

/// An in-memory merge result index.
///
/// Produced by [`Git::merge_commits`] and [`Git::cherrypick_commit`].
/// Callers inspect conflicts, resolve submodule entries, and either write
/// the merged tree or install the conflicted index into the repository so
/// the user can resolve by hand.
pub struct MergeIndex {
    index: git2::Index,
}

impl MergeIndex {
    /// Whether unresolved conflicts remain.
    pub fn has_conflicts(&self) -> bool {
        self.index.has_conflicts()
    }

    /// Enumerate the remaining conflicts with all three sides.
    pub fn conflicts(&self) -> Result<Vec<ConflictSides>, GitError> {
        let mut out = Vec::new();
        for conflict in self.index.conflicts()? {
            let conflict = conflict?;
            let side = |entry: &Option<git2::IndexEntry>| -> Result<Option<StageSide>, GitError> {
                match entry {
                    Some(e) => Ok(Some(StageSide {
                        mode: e.mode,
                        oid: domain_oid(e.id)?,
                    })),
                    None => Ok(None),
                }
            };
            let path_entry = conflict
                .our
                .as_ref()
                .or(conflict.their.as_ref())
                .or(conflict.ancestor.as_ref());
            let path = match path_entry {
                Some(e) => String::from_utf8_lossy(&e.path).into_owned(),
                None => continue,
            };
            out.push(ConflictSides {
                path,
                ancestor: side(&conflict.ancestor)?,
                ours: side(&conflict.our)?,
                theirs: side(&conflict.their)?,
            });
        }
        Ok(out)
    }

    /// Resolve a conflicted path to a single stage-0 gitlink entry.
    ///
    /// Removes any stage 1-3 entries for the path first.
    pub fn resolve_gitlink(&mut self, path: &SubmodulePath, oid: &Oid) -> Result<(), GitError> {
        for stage in [STAGE_ANCESTOR, STAGE_OURS, STAGE_THEIRS] {
            if self.index.get_path(path.as_path(), stage).is_some() {
                self.index.remove(path.as_path(), stage)?;
            }
        }
        self.index.add(&gitlink_entry(path, oid, 0)?)?;
        Ok(())
    }

    /// Write the merged tree into the given repository's object database.
    ///
    /// Fails if conflicts remain.
    pub fn write_tree(&mut self, git: &Git) -> Result<Oid, GitError> {
        let tree = self.index.write_tree_to(&git.repo)?;
        domain_oid(tree)
    }
}

/// The Git interface.
///
/// The single point of interaction with git. Owns one repository; a
/// submodule's repository is a separate `Git` obtained through
/// [`Git::open_submodule`].
pub struct Git {
    /// The underlying git2 repository
    repo: git2::Repository,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl Git {
    // =========================================================================
    // Repository Opening and Info
    // =========================================================================

    /// Open a repository at the given path.
    ///
    /// Uses `git2::Repository::discover` to find the repository root,
    /// so `path` can be any directory within the repository.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        if repo.is_bare() {
            return Err(GitError::BareRepo);
        }

        Ok(Self { repo })
    }

    /// Get repository information (git_dir, common_dir, work_dir).
    pub fn info(&self) -> Result<RepoInfo, GitError> {
        let git_dir = self.repo.path().to_path_buf();
        let common_dir = self.repo.commondir().to_path_buf();
        let work_dir = self.repo.workdir().ok_or(GitError::BareRepo)?.to_path_buf();

        Ok(RepoInfo {
            git_dir,
            common_dir,
            work_dir,
        })
    }

    /// Path to the working directory.
    pub fn work_dir(&self) -> Result<&Path, GitError> {
        self.repo.workdir().ok_or(GitError::BareRepo)
    }

    // =========================================================================
    // Refs and Commits
    // =========================================================================

    /// The short name of the currently checked-out branch, if HEAD is not
    /// detached or unborn.
    pub fn current_branch(&self) -> Option<String> {
        let head = self.repo.head().ok()?;
        if !head.is_branch() {
            return None;
        }
        head.shorthand().map(str::to_owned)
    }

    /// The full ref name HEAD points at, if HEAD is a symbolic ref.
    pub fn head_ref(&self) -> Option<String> {
        let head = self.repo.find_reference("HEAD").ok()?;
        head.symbolic_target().map(str::to_owned)
    }

    /// The commit HEAD resolves to, or `None` on an unborn branch.
    pub fn head_oid(&self) -> Result<Option<Oid>, GitError> {
        match self.repo.head() {
            Ok(head) => {
                let commit = head.peel_to_commit()?;
                Ok(Some(domain_oid(commit.id())?))
            }
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => Ok(None),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::from_git2(e, "HEAD")),
        }
    }

    /// Resolve a ref name to the commit it points at.
    pub fn resolve_ref(&self, refname: &str) -> Result<Oid, GitError> {
        let reference = self
            .repo
            .find_reference(refname)
            .map_err(|e| GitError::from_git2(e, refname))?;
        let commit = reference.peel_to_commit()?;
        domain_oid(commit.id())
    }

    /// Resolve a ref name, returning `None` if it does not exist.
    pub fn try_resolve_ref(&self, refname: &str) -> Result<Option<Oid>, GitError> {
        match self.resolve_ref(refname) {
            Ok(oid) => Ok(Some(oid)),
            Err(GitError::RefNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Resolve any commit-ish (branch, ref, abbreviated sha, `HEAD~2`, ...)
    /// to a commit OID.
    pub fn resolve_commitish(&self, spec: &str) -> Result<Oid, GitError> {
        let obj = self
            .repo
            .revparse_single(spec)
            .map_err(|e| GitError::from_git2(e, spec))?;
        let commit = obj.peel_to_commit().map_err(|_| GitError::ObjectNotFound {
            oid: spec.to_string(),
        })?;
        domain_oid(commit.id())
    }

    /// Whether the commit object exists locally.
    pub fn commit_exists(&self, oid: &Oid) -> bool {
        match raw_oid(oid) {
            Ok(raw) => self.repo.find_commit(raw).is_ok(),
            Err(_) => false,
        }
    }

    /// Move HEAD's branch (or detached HEAD) to a commit and check out its
    /// tree. Used for fast-forwards and sequencer resets.
    pub fn reset_head(&self, to: &Oid, log_message: &str) -> Result<(), GitError> {
        let raw = raw_oid(to)?;
        let commit = self
            .repo
            .find_commit(raw)
            .map_err(|e| GitError::from_git2(e, to.as_str()))?;

        match self.head_ref() {
            Some(refname) if refname.starts_with("refs/heads/") => {
                self.repo.reference(&refname, raw, true, log_message)?;
            }
            _ => {
                self.repo.set_head_detached(raw)?;
            }
        }

        let mut opts = git2::build::CheckoutBuilder::new();
        opts.force();
        self.repo
            .checkout_tree(commit.as_object(), Some(&mut opts))?;
        Ok(())
    }

    /// List the commits in `base..tip`, oldest first.
    pub fn commits_between(&self, base: &Oid, tip: &Oid) -> Result<Vec<Oid>, GitError> {
        let mut walk = self.repo.revwalk()?;
        walk.push(raw_oid(tip)?)?;
        walk.hide(raw_oid(base)?)?;
        walk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::REVERSE)?;

        let mut commits = Vec::new();
        for oid in walk {
            commits.push(domain_oid(oid?)?);
        }
        Ok(commits)
    }

    // =========================================================================
    // Ancestry
    // =========================================================================

    /// The merge base of two commits, or `None` if their histories are
    /// unrelated.
    pub fn merge_base(&self, a: &Oid, b: &Oid) -> Result<Option<Oid>, GitError> {
        match self.repo.merge_base(raw_oid(a)?, raw_oid(b)?) {
            Ok(base) => Ok(Some(domain_oid(base)?)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::from_git2(e, "merge-base")),
        }
    }

    /// Whether `commit` is a strict descendant of `ancestor`.
    ///
    /// Uses git's bounded generation-number walk, never a full history
    /// materialization. Equal commits are not descendants.
    pub fn is_descendant_of(&self, commit: &Oid, ancestor: &Oid) -> Result<bool, GitError> {
        if commit == ancestor {
            return Ok(false);
        }
        self.repo
            .graph_descendant_of(raw_oid(commit)?, raw_oid(ancestor)?)
            .map_err(|e| GitError::from_git2(e, "ancestry"))
    }

    // =========================================================================
    // Trees and Gitlinks
    // =========================================================================

    /// All submodule gitlinks in a commit's tree, as path -> sha.
    pub fn tree_gitlinks(&self, commit: &Oid) -> Result<BTreeMap<SubmodulePath, Oid>, GitError> {
        let tree = self.commit_tree(commit)?;
        let mut links = BTreeMap::new();
        let mut walk_err = None;

        tree.walk(git2::TreeWalkMode::PreOrder, |root, entry| {
            if entry.kind() == Some(git2::ObjectType::Commit) {
                let name = entry.name().unwrap_or_default();
                let path = format!("{root}{name}");
                match (SubmodulePath::new(path), domain_oid(entry.id())) {
                    (Ok(path), Ok(oid)) => {
                        links.insert(path, oid);
                    }
                    (Err(e), _) => {
                        walk_err = Some(GitError::AccessError {
                            message: format!("bad gitlink path in tree: {e}"),
                        });
                        return git2::TreeWalkResult::Abort;
                    }
                    (_, Err(e)) => {
                        walk_err = Some(e);
                        return git2::TreeWalkResult::Abort;
                    }
                }
            }
            git2::TreeWalkResult::Ok
        })?;

        match walk_err {
            Some(e) => Err(e),
            None => Ok(links),
        }
    }

    /// The gitlink recorded at `path` in a commit's tree, if any.
    pub fn gitlink_at(&self, commit: &Oid, path: &SubmodulePath) -> Result<Option<Oid>, GitError> {
        let tree = self.commit_tree(commit)?;
        match tree.get_path(path.as_path()) {
            Ok(entry) if entry.kind() == Some(git2::ObjectType::Commit) => {
                Ok(Some(domain_oid(entry.id())?))
            }
            Ok(_) => Ok(None),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::from_git2(e, path.as_str())),
        }
    }

    /// Submodule URLs recorded in a commit's `.gitmodules`, as path -> url.
    pub fn gitmodules_urls(&self, commit: &Oid) -> Result<BTreeMap<SubmodulePath, String>, GitError> {
        let tree = self.commit_tree(commit)?;
        let entry = match tree.get_path(Path::new(".gitmodules")) {
            Ok(entry) => entry,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(GitError::from_git2(e, ".gitmodules")),
        };
        let blob = self.repo.find_blob(entry.id())?;
        Ok(parse_gitmodules(&String::from_utf8_lossy(blob.content())))
    }

    /// All submodule gitlinks staged in the index, as path -> sha.
    pub fn index_gitlinks(&self) -> Result<BTreeMap<SubmodulePath, Oid>, GitError> {
        let index = self.repo.index()?;
        let mut links = BTreeMap::new();
        for entry in index.iter() {
            if entry.mode == 0o160000 && stage_of(&entry) == 0 {
                let path = String::from_utf8_lossy(&entry.path).into_owned();
                let path = SubmodulePath::new(path).map_err(|e| GitError::AccessError {
                    message: format!("bad gitlink path in index: {e}"),
                })?;
                links.insert(path, domain_oid(entry.id)?);
            }
        }
        Ok(links)
    }

    /// Stage a gitlink entry at `path` pointing at `oid`.
    pub fn stage_gitlink(&self, path: &SubmodulePath, oid: &Oid) -> Result<(), GitError> {
        let mut index = self.repo.index()?;
        index.add(&gitlink_entry(path, oid, 0)?)?;
        index.write()?;
        Ok(())
    }

    /// Stage working tree changes.
    ///
    /// With an empty `paths` slice stages everything (like `git add -A`);
    /// otherwise stages only the given pathspecs.
    pub fn stage_paths(&self, paths: &[String]) -> Result<(), GitError> {
        let mut index = self.repo.index()?;
        let specs: Vec<&str> = if paths.is_empty() {
            vec!["*"]
        } else {
            paths.iter().map(String::as_str).collect()
        };
        index.add_all(specs.iter(), git2::IndexAddOption::DEFAULT, None)?;
        index.write()?;
        Ok(())
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Per-path status of the index and working tree, excluding submodules.
    ///
    /// Returns `(staged, workdir)` maps. Pass pathspecs to restrict; an
    /// empty slice means the whole repository.
    #[allow(clippy::type_complexity)]
    pub fn file_statuses(
        &self,
        paths: &[String],
        include_untracked: bool,
    ) -> Result<(BTreeMap<String, FileStatus>, BTreeMap<String, FileStatus>), GitError> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(include_untracked)
            .include_ignored(false)
            .exclude_submodules(true);
        for path in paths {
            opts.pathspec(path);
        }

        let statuses = self
            .repo
            .statuses(Some(&mut opts))
            .map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;

        let mut staged = BTreeMap::new();
        let mut workdir = BTreeMap::new();

        for entry in statuses.iter() {
            let status = entry.status();
            let path = match entry.path() {
                Some(p) => p.to_string(),
                None => continue,
            };

            if status.is_conflicted() {
                staged.insert(path.clone(), FileStatus::Conflicted);
                continue;
            }

            if status.is_index_new() {
                staged.insert(path.clone(), FileStatus::Added);
            } else if status.is_index_modified() {
                staged.insert(path.clone(), FileStatus::Modified);
            } else if status.is_index_deleted() {
                staged.insert(path.clone(), FileStatus::Removed);
            } else if status.is_index_renamed() {
                staged.insert(path.clone(), FileStatus::Renamed);
            } else if status.is_index_typechange() {
                staged.insert(path.clone(), FileStatus::TypeChanged);
            }

            if status.is_wt_new() {
                workdir.insert(path, FileStatus::Untracked);
            } else if status.is_wt_modified() {
                workdir.insert(path, FileStatus::Modified);
            } else if status.is_wt_deleted() {
                workdir.insert(path, FileStatus::Removed);
            } else if status.is_wt_renamed() {
                workdir.insert(path, FileStatus::Renamed);
            } else if status.is_wt_typechange() {
                workdir.insert(path, FileStatus::TypeChanged);
            }
        }

        Ok((staged, workdir))
    }

    /// Whether the index has unresolved conflicts.
    pub fn has_conflicts(&self) -> Result<bool, GitError> {
        Ok(self.repo.index()?.has_conflicts())
    }

    /// Detect conflict markers in the index without matching stage entries.
    ///
    /// git marks a path conflicted through stage 1-3 entries; a status that
    /// reports a conflict for a path with no stage entries means the index
    /// is malformed. Returns such paths.
    pub fn malformed_conflict_paths(&self) -> Result<Vec<String>, GitError> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(false).include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut opts))?;

        let index = self.repo.index()?;
        let mut bad = Vec::new();
        for entry in statuses.iter() {
            if !entry.status().is_conflicted() {
                continue;
            }
            let Some(path) = entry.path() else { continue };
            let has_stage = (STAGE_ANCESTOR..=STAGE_THEIRS)
                .any(|stage| index.get_path(Path::new(path), stage).is_some());
            if !has_stage {
                bad.push(path.to_string());
            }
        }
        Ok(bad)
    }

    // =========================================================================
    // Diffs
    // =========================================================================

    /// Diff two commits' trees into a tagged change list.
    ///
    /// Submodule (gitlink) changes are reported as
    /// [`TreeChange::Submodule`]; everything else as [`TreeChange::File`].
    pub fn tree_changes(&self, from: &Oid, to: &Oid) -> Result<Vec<TreeChange>, GitError> {
        let from_tree = self.commit_tree(from)?;
        let to_tree = self.commit_tree(to)?;

        let diff = self
            .repo
            .diff_tree_to_tree(Some(&from_tree), Some(&to_tree), None)?;

        let mut changes = Vec::new();
        for delta in diff.deltas() {
            let old = delta.old_file();
            let new = delta.new_file();
            let is_gitlink =
                old.mode() == git2::FileMode::Commit || new.mode() == git2::FileMode::Commit;

            let path = new
                .path()
                .or_else(|| old.path())
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();

            if is_gitlink {
                let sub_path = SubmodulePath::new(path).map_err(|e| GitError::AccessError {
                    message: format!("bad gitlink path in diff: {e}"),
                })?;
                changes.push(TreeChange::Submodule {
                    path: sub_path,
                    old: nonzero_oid(old.id())?,
                    new: nonzero_oid(new.id())?,
                });
            } else {
                let status = match delta.status() {
                    git2::Delta::Added => FileStatus::Added,
                    git2::Delta::Deleted => FileStatus::Removed,
                    git2::Delta::Renamed => FileStatus::Renamed,
                    git2::Delta::Typechange => FileStatus::TypeChanged,
                    git2::Delta::Conflicted => FileStatus::Conflicted,
                    _ => FileStatus::Modified,
                };
                changes.push(TreeChange::File { path, status });
            }
        }
        Ok(changes)
    }

    // =========================================================================
    // Merging
    // =========================================================================

    /// Three-way merge of two commits into an in-memory index, using their
    /// merge base as ancestor.
    pub fn merge_commits(&self, ours: &Oid, theirs: &Oid) -> Result<MergeIndex, GitError> {
        let ours = self.repo.find_commit(raw_oid(ours)?)?;
        let theirs = self.repo.find_commit(raw_oid(theirs)?)?;
        let index = self
            .repo
            .merge_commits(&ours, &theirs, Some(&git2::MergeOptions::new()))?;
        Ok(MergeIndex { index })
    }

    /// Replay a single commit onto `onto` as an in-memory index
    /// (cherry-pick without touching the working tree).
    pub fn cherrypick_commit(&self, pick: &Oid, onto: &Oid) -> Result<MergeIndex, GitError> {
        let pick = self.repo.find_commit(raw_oid(pick)?)?;
        let onto = self.repo.find_commit(raw_oid(onto)?)?;
        let index = self
            .repo
            .cherrypick_commit(&pick, &onto, 0, Some(&git2::MergeOptions::new()))?;
        Ok(MergeIndex { index })
    }

    /// Install an in-memory merge index as the repository's real index,
    /// conflicts included, so the user can resolve by hand.
    pub fn install_index(&self, merged: &MergeIndex) -> Result<(), GitError> {
        let mut index = self.repo.index()?;
        index.clear()?;
        for entry in merged.index.iter() {
            index.add(&entry)?;
        }
        if let Ok(conflicts) = merged.index.conflicts() {
            for conflict in conflicts.flatten() {
                for entry in [conflict.ancestor, conflict.our, conflict.their]
                    .into_iter()
                    .flatten()
                {
                    index.add(&entry)?;
                }
            }
        }
        index.write()?;
        Ok(())
    }

    // =========================================================================
    // Commits
    // =========================================================================

    /// Create a commit from a tree with explicit identity.
    ///
    /// Pass a ref name in `update_ref` to advance it (e.g. `HEAD`), or
    /// `None` to create a dangling commit.
    pub fn create_commit(
        &self,
        identity: &Identity,
        message: &str,
        tree: &Oid,
        parents: &[&Oid],
        update_ref: Option<&str>,
    ) -> Result<Oid, GitError> {
        let sig = git2::Signature::now(&identity.name, &identity.email).map_err(|e| {
            GitError::NoIdentity {
                message: e.message().to_string(),
            }
        })?;

        let tree = self.repo.find_tree(raw_oid(tree)?)?;
        let mut parent_commits = Vec::with_capacity(parents.len());
        for parent in parents {
            parent_commits.push(self.repo.find_commit(raw_oid(parent)?)?);
        }
        let parent_refs: Vec<&git2::Commit<'_>> = parent_commits.iter().collect();

        let oid = self
            .repo
            .commit(update_ref, &sig, &sig, message, &tree, &parent_refs)?;
        domain_oid(oid)
    }

    /// Write the current index as a tree.
    pub fn write_index_tree(&self) -> Result<Oid, GitError> {
        let mut index = self.repo.index()?;
        let tree = index.write_tree()?;
        domain_oid(tree)
    }

    /// The full message of a commit.
    pub fn commit_message(&self, oid: &Oid) -> Result<String, GitError> {
        let commit = self.repo.find_commit(raw_oid(oid)?)?;
        Ok(commit.message().unwrap_or_default().to_string())
    }

    /// The number of parents of a commit.
    pub fn parent_count(&self, oid: &Oid) -> Result<usize, GitError> {
        let commit = self.repo.find_commit(raw_oid(oid)?)?;
        Ok(commit.parent_count())
    }

    /// The tree a commit points at.
    pub fn commit_tree_oid(&self, oid: &Oid) -> Result<Oid, GitError> {
        let tree = self.commit_tree(oid)?;
        domain_oid(tree.id())
    }

    /// Hard-reset HEAD, index, and working tree to a commit.
    ///
    /// Used by abort flows to discard a half-applied step.
    pub fn hard_reset(&self, oid: &Oid) -> Result<(), GitError> {
        let commit = self.repo.find_commit(raw_oid(oid)?)?;
        self.repo
            .reset(commit.as_object(), git2::ResetType::Hard, None)?;
        Ok(())
    }

    /// The identity resolved from git configuration (`user.name`,
    /// `user.email`).
    pub fn default_identity(&self) -> Result<Identity, GitError> {
        let sig = self.repo.signature().map_err(|e| GitError::NoIdentity {
            message: e.message().to_string(),
        })?;
        Ok(Identity::new(
            sig.name().unwrap_or("unknown"),
            sig.email().unwrap_or("unknown"),
        ))
    }

    // =========================================================================
    // Remotes
    // =========================================================================

    /// Whether a remote with this name is configured.
    pub fn has_remote(&self, name: &str) -> bool {
        self.repo.find_remote(name).is_ok()
    }

    /// Ensure a commit exists locally, fetching from the given remote name
    /// or URL if needed.
    ///
    /// Tries an exact-sha fetch first (servers permitting), falling back to
    /// a full branch fetch.
    pub fn fetch_commit(&self, remote: &str, oid: &Oid) -> Result<(), GitError> {
        if self.commit_exists(oid) {
            return Ok(());
        }

        let mut r = match self.repo.find_remote(remote) {
            Ok(r) => r,
            Err(_) => self
                .repo
                .remote_anonymous(remote)
                .map_err(|e| GitError::FetchFailed {
                    remote: remote.to_string(),
                    message: e.message().to_string(),
                })?,
        };

        let exact = r.fetch(&[oid.as_str()], None, None);
        if exact.is_err() {
            r.fetch(&["+refs/heads/*:refs/weld/fetch/*"], None, None)
                .map_err(|e| GitError::FetchFailed {
                    remote: remote.to_string(),
                    message: e.message().to_string(),
                })?;
        }

        if self.commit_exists(oid) {
            Ok(())
        } else {
            Err(GitError::FetchFailed {
                remote: remote.to_string(),
                message: format!("commit {} not found on remote", oid.short(12)),
            })
        }
    }

    /// The remote-tracking value of a branch, `refs/remotes/<remote>/<branch>`.
    pub fn remote_tracking_oid(
        &self,
        remote: &str,
        branch: &str,
    ) -> Result<Option<Oid>, GitError> {
        self.try_resolve_ref(&format!("refs/remotes/{remote}/{branch}"))
    }

    /// Push a single refspec to a named remote or URL.
    ///
    /// A non-fast-forward rejection surfaces as [`GitError::PushRejected`]
    /// unless `force` (which prefixes the refspec with `+`).
    pub fn push(
        &self,
        remote: &str,
        src: &str,
        dst: &str,
        force: bool,
    ) -> Result<(), GitError> {
        let mut r = match self.repo.find_remote(remote) {
            Ok(r) => r,
            Err(_) => self
                .repo
                .remote_anonymous(remote)
                .map_err(|_| GitError::RemoteNotFound {
                    name: remote.to_string(),
                })?,
        };

        let refspec = if force {
            format!("+{src}:{dst}")
        } else {
            format!("{src}:{dst}")
        };

        let rejections: RefCell<Vec<(String, String)>> = RefCell::new(Vec::new());
        // The callback borrows `rejections`; end that borrow before the
        // RefCell is consumed below.
        {
            let mut callbacks = git2::RemoteCallbacks::new();
            callbacks.push_update_reference(|refname, status| {
                if let Some(msg) = status {
                    rejections
                        .borrow_mut()
                        .push((refname.to_string(), msg.to_string()));
                }
                Ok(())
            });

            let mut opts = git2::PushOptions::new();
            opts.remote_callbacks(callbacks);

            r.push(&[refspec.as_str()], Some(&mut opts))
                .map_err(|e| GitError::PushRejected {
                    refname: dst.to_string(),
                    reason: e.message().to_string(),
                })?;
        }

        let rejections = rejections.into_inner();
        if let Some((refname, reason)) = rejections.into_iter().next() {
            return Err(GitError::PushRejected { refname, reason });
        }
        Ok(())
    }

    // =========================================================================
    // Submodules
    // =========================================================================

    /// All submodule paths known to the repository (from `.gitmodules`
    /// and the index).
    pub fn submodule_paths(&self) -> Result<Vec<SubmodulePath>, GitError> {
        let mut paths = Vec::new();
        for sm in self.repo.submodules()? {
            let p = sm.path().to_string_lossy().into_owned();
            paths.push(SubmodulePath::new(p).map_err(|e| GitError::AccessError {
                message: format!("bad submodule path: {e}"),
            })?);
        }
        Ok(paths)
    }

    /// The URL configured for a submodule in the working tree's
    /// `.gitmodules`, if any.
    pub fn submodule_url(&self, path: &SubmodulePath) -> Option<String> {
        self.repo
            .find_submodule(path.as_str())
            .ok()
            .and_then(|sm| sm.url().map(str::to_owned))
    }

    /// Whether a submodule's repository is open (cloned and checked out)
    /// in the working tree.
    pub fn submodule_is_open(&self, path: &SubmodulePath) -> bool {
        match self.repo.workdir() {
            Some(workdir) => {
                let dir = workdir.join(path.as_path());
                dir.join(".git").exists()
            }
            None => false,
        }
    }

    /// Open a submodule's repository as its own [`Git`].
    ///
    /// # Errors
    ///
    /// [`GitError::SubmoduleClosed`] if the submodule is not open on disk.
    pub fn open_submodule(&self, path: &SubmodulePath) -> Result<Git, GitError> {
        if !self.submodule_is_open(path) {
            return Err(GitError::SubmoduleClosed { path: path.clone() });
        }
        let workdir = self.work_dir()?.join(path.as_path());
        let repo = git2::Repository::open(&workdir)
            .map_err(|e| GitError::from_git2(e, path.as_str()).in_submodule(path))?;
        Ok(Git { repo })
    }

    /// Clone and check out a submodule (init + update), making it open.
    pub fn clone_submodule(&self, path: &SubmodulePath) -> Result<(), GitError> {
        let mut sm =
            self.repo
                .find_submodule(path.as_str())
                .map_err(|_| GitError::SubmoduleNotFound {
                    path: path.clone(),
                })?;
        sm.update(true, None)
            .map_err(|e| GitError::from_git2(e, path.as_str()).in_submodule(path))?;
        Ok(())
    }

    /// Close an open submodule by removing its working tree contents.
    ///
    /// The gitlink stays in the index; the clone under `.git/modules`
    /// remains so reopening is cheap. Refuses when the submodule has
    /// uncommitted changes.
    pub fn close_submodule(&self, path: &SubmodulePath) -> Result<(), GitError> {
        let sub = self.open_submodule(path)?;
        let (staged, workdir) = sub
            .file_statuses(&[], false)
            .map_err(|e| e.in_submodule(path))?;
        if !staged.is_empty() || !workdir.is_empty() {
            return Err(GitError::AccessError {
                message: format!("submodule '{path}' has uncommitted changes"),
            });
        }

        let dir = self.work_dir()?.join(path.as_path());
        std::fs::remove_dir_all(&dir).map_err(|e| GitError::AccessError {
            message: format!("removing '{}': {e}", dir.display()),
        })?;
        std::fs::create_dir(&dir).map_err(|e| GitError::AccessError {
            message: format!("recreating '{}': {e}", dir.display()),
        })?;
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn commit_tree(&self, commit: &Oid) -> Result<git2::Tree<'_>, GitError> {
        let commit = self
            .repo
            .find_commit(raw_oid(commit)?)
            .map_err(|e| GitError::from_git2(e, commit.as_str()))?;
        Ok(commit.tree()?)
    }
}

/// Convert a git2 OID into the domain type.
fn domain_oid(oid: git2::Oid) -> Result<Oid, GitError> {
    Oid::new(oid.to_string()).map_err(|_| GitError::InvalidOid {
        oid: oid.to_string(),
    })
}

/// Convert a possibly-zero git2 OID into an optional domain OID.
fn nonzero_oid(oid: git2::Oid) -> Result<Option<Oid>, GitError> {
    if oid.is_zero() {
        Ok(None)
    } else {
        Ok(Some(domain_oid(oid)?))
    }
}

/// Parse a domain OID into a git2 OID.
fn raw_oid(oid: &Oid) -> Result<git2::Oid, GitError> {
    git2::Oid::from_str(oid.as_str()).map_err(|_| GitError::InvalidOid {
        oid: oid.to_string(),
    })
}

/// The stage number encoded in an index entry's flags.
fn stage_of(entry: &git2::IndexEntry) -> u16 {
    (entry.flags >> STAGE_SHIFT) & 0x3
}

/// Build a gitlink index entry at the given stage.
fn gitlink_entry(path: &SubmodulePath, oid: &Oid, stage: i32) -> Result<git2::IndexEntry, GitError> {
    Ok(git2::IndexEntry {
        ctime: git2::IndexTime::new(0, 0),
        mtime: git2::IndexTime::new(0, 0),
        dev: 0,
        ino: 0,
        mode: 0o160000,
        uid: 0,
        gid: 0,
        file_size: 0,
        id: raw_oid(oid)?,
        flags: (stage as u16) << STAGE_SHIFT,
        flags_extended: 0,
        path: path.as_str().as_bytes().to_vec(),
    })
}

/// Parse `.gitmodules` content into path -> url.
///
/// Minimal INI-style parse: `[submodule "name"]` sections with `path` and
/// `url` keys. Keyed by path (the submodule's identity in the tree), not
/// by name.
fn parse_gitmodules(content: &str) -> BTreeMap<SubmodulePath, String> {
    let mut out = BTreeMap::new();
    let mut current_path: Option<String> = None;
    let mut current_url: Option<String> = None;

    fn flush(
        path: &mut Option<String>,
        url: &mut Option<String>,
        out: &mut BTreeMap<SubmodulePath, String>,
    ) {
        if let (Some(p), Some(u)) = (path.take(), url.take()) {
            if let Ok(p) = SubmodulePath::new(p) {
                out.insert(p, u);
            }
        }
    }

    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            flush(&mut current_path, &mut current_url, &mut out);
        } else if let Some((key, value)) = line.split_once('=') {
            match key.trim() {
                "path" => current_path = Some(value.trim().to_string()),
                "url" => current_url = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }
    flush(&mut current_path, &mut current_url, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    mod gitmodules {
        use super::*;

        #[test]
        fn parses_sections() {
            let content = r#"
[submodule "parser"]
	path = libs/parser
	url = https://example.com/parser.git
[submodule "lexer"]
	path = libs/lexer
	url = https://example.com/lexer.git
"#;
            let urls = parse_gitmodules(content);
            assert_eq!(urls.len(), 2);
            assert_eq!(
                urls[&SubmodulePath::new("libs/parser").unwrap()],
                "https://example.com/parser.git"
            );
        }

        #[test]
        fn ignores_incomplete_sections() {
            let content = "[submodule \"x\"]\n\turl = https://example.com/x.git\n";
            assert!(parse_gitmodules(content).is_empty());
        }

        #[test]
        fn empty_input() {
            assert!(parse_gitmodules("").is_empty());
        }
    }

    mod stage_flags {
        use super::*;

        #[test]
        fn round_trips_stage_number() {
            let path = SubmodulePath::new("s").unwrap();
            let oid = Oid::new("a".repeat(40)).unwrap();
            for stage in [0, 1, 2, 3] {
                let entry = gitlink_entry(&path, &oid, stage).unwrap();
                assert_eq!(stage_of(&entry) as i32, stage);
                assert_eq!(entry.mode, 0o160000);
            }
        }
    }
}
