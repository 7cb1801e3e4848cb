//! Git revision backend
//!
//! Answers "which commits touched this file" for the versioned store and
//! records new snapshots. A commit touches a path when the path's blob
//! differs from the one in its first parent, the same rule `git log -- path`
//! uses. Every write is a commit, even when it leaves the tree unchanged;
//! such commits list the paths they were made for in a note under
//! `refs/notes/gitstore`. History is read newest first.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use git2::{Commit, ErrorCode, Oid, Repository, Signature, Sort, Tree};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::identity::Signatory;
use crate::storage::{StoreError, StoreResult};

/// Notes ref naming the paths of commits that left the tree unchanged
const PATHS_NOTES_REF: &str = "refs/notes/gitstore";

/// Metadata about a single commit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitInfo {
    /// Full hex object id
    pub id: String,
    pub author_name: String,
    pub author_email: String,
    pub committer_name: String,
    pub committer_email: String,
    pub message: String,
    /// Author time
    pub time: DateTime<Utc>,
}

impl CommitInfo {
    fn from_commit(commit: &Commit<'_>) -> Self {
        let author = commit.author();
        let committer = commit.committer();
        Self {
            id: commit.id().to_string(),
            author_name: author.name().unwrap_or("unknown").to_string(),
            author_email: author.email().unwrap_or("").to_string(),
            committer_name: committer.name().unwrap_or("unknown").to_string(),
            committer_email: committer.email().unwrap_or("").to_string(),
            message: commit.message().unwrap_or("").to_string(),
            time: DateTime::from_timestamp(author.when().seconds(), 0).unwrap_or_default(),
        }
    }
}

/// One commit that touched a path, and whether the path survived it
struct PathChange {
    info: CommitInfo,
    present: bool,
}

/// Append-only commit history of the store root
pub struct GitBackend {
    repo: Mutex<Repository>,
    workdir: PathBuf,
}

impl GitBackend {
    /// Open the repository at `root`, initializing one if there is none
    pub fn open_or_init(root: &Path) -> StoreResult<Self> {
        let repo = match Repository::open(root) {
            Ok(repo) => repo,
            Err(err) if err.code() == ErrorCode::NotFound => {
                info!(root = %root.display(), "initializing revision repository");
                Repository::init(root)?
            }
            Err(err) => return Err(err.into()),
        };

        let workdir = repo
            .workdir()
            .ok_or_else(|| StoreError::InvalidName {
                name: root.display().to_string(),
                reason: "repository has no working directory",
            })?
            .to_path_buf();

        Ok(Self {
            repo: Mutex::new(repo),
            workdir,
        })
    }

    /// Working directory of the repository
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Most recent commit touching `rel_path`
    pub fn latest_commit(&self, rel_path: &str) -> StoreResult<Option<CommitInfo>> {
        let changes = self.changes(None, rel_path, Some(1))?;
        Ok(changes.into_iter().next().map(|c| c.info))
    }

    /// Commit that created the current incarnation of `rel_path`
    ///
    /// Walks the whole history; if the path was deleted and written again,
    /// the walk stops at the deletion.
    pub fn earliest_commit(&self, rel_path: &str) -> StoreResult<Option<CommitInfo>> {
        self.earliest_from(None, rel_path)
    }

    /// Commit that created the incarnation of `rel_path` alive at `commit_id`
    pub fn earliest_commit_at(
        &self,
        commit_id: &str,
        rel_path: &str,
    ) -> StoreResult<Option<CommitInfo>> {
        let oid = Oid::from_str(commit_id).map_err(|_| StoreError::RevisionNotFound {
            revision: commit_id.to_string(),
            path: rel_path.to_string(),
        })?;
        self.earliest_from(Some(oid), rel_path)
    }

    fn earliest_from(
        &self,
        start: Option<Oid>,
        rel_path: &str,
    ) -> StoreResult<Option<CommitInfo>> {
        let mut earliest = None;
        for change in self.changes(start, rel_path, None)? {
            if !change.present {
                if earliest.is_some() {
                    break;
                }
                continue;
            }
            earliest = Some(change.info);
        }
        Ok(earliest)
    }

    /// Commits touching `rel_path`, newest first
    pub fn history(&self, rel_path: &str, limit: Option<usize>) -> StoreResult<Vec<CommitInfo>> {
        Ok(self
            .changes(None, rel_path, limit)?
            .into_iter()
            .map(|c| c.info)
            .collect())
    }

    /// Read `rel_path` as stored in `commit_id`, up to `max_bytes`
    ///
    /// Returns `None` if the commit's tree has no such file.
    pub fn read_at(
        &self,
        commit_id: &str,
        rel_path: &str,
        max_bytes: Option<usize>,
    ) -> StoreResult<Option<Vec<u8>>> {
        let repo = self.lock_repo();
        let not_found = || StoreError::RevisionNotFound {
            revision: commit_id.to_string(),
            path: rel_path.to_string(),
        };

        let oid = Oid::from_str(commit_id).map_err(|_| not_found())?;
        let commit = match repo.find_commit(oid) {
            Ok(commit) => commit,
            Err(err) if err.code() == ErrorCode::NotFound => return Err(not_found()),
            Err(err) => return Err(err.into()),
        };

        let blob_id = match entry_id(&commit.tree()?, rel_path)? {
            Some(id) => id,
            None => return Ok(None),
        };
        let blob = repo.find_blob(blob_id)?;
        let content = blob.content();
        let end = max_bytes.map_or(content.len(), |max| max.min(content.len()));

        Ok(Some(content[..end].to_vec()))
    }

    /// Snapshot `rel_paths` as they are on disk and commit them on HEAD
    ///
    /// Paths missing from disk are recorded as removed. A commit is made
    /// even when the tree equals HEAD's.
    pub fn commit(
        &self,
        rel_paths: &[&str],
        message: &str,
        author: &Signatory,
        committer: &Signatory,
    ) -> StoreResult<CommitInfo> {
        let repo = self.lock_repo();
        let parent = resolve_head(&repo)?;

        let mut index = repo.index()?;
        match parent {
            Some(ref commit) => index.read_tree(&commit.tree()?)?,
            None => index.clear()?,
        }

        for rel_path in rel_paths {
            let path = Path::new(rel_path);
            if self.workdir.join(path).is_file() {
                index.add_path(path)?;
            } else if index.get_path(path, 0).is_some() {
                index.remove_path(path)?;
            }
        }

        let tree_oid = index.write_tree()?;
        let unchanged = parent.as_ref().is_some_and(|c| c.tree_id() == tree_oid);

        let tree = repo.find_tree(tree_oid)?;
        let author_sig = Signature::now(&author.name, &author.email)?;
        let committer_sig = Signature::now(&committer.name, &committer.email)?;
        let parents: Vec<&Commit<'_>> = parent.iter().collect();

        // HEAD must still point at `parent`, otherwise libgit2 refuses
        let oid = repo.commit(
            Some("HEAD"),
            &author_sig,
            &committer_sig,
            message,
            &tree,
            &parents,
        )?;
        index.write()?;

        if unchanged {
            repo.note(
                &committer_sig,
                &committer_sig,
                Some(PATHS_NOTES_REF),
                oid,
                &rel_paths.join("\n"),
                true,
            )?;
        }

        let commit = repo.find_commit(oid)?;
        debug!(id = %oid, message, unchanged, "created commit");
        Ok(CommitInfo::from_commit(&commit))
    }

    fn lock_repo(&self) -> MutexGuard<'_, Repository> {
        self.repo.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Walk from `start` (HEAD if `None`), collecting commits that touch `rel_path`
    fn changes(
        &self,
        start: Option<Oid>,
        rel_path: &str,
        limit: Option<usize>,
    ) -> StoreResult<Vec<PathChange>> {
        let repo = self.lock_repo();
        let start = match start {
            Some(oid) => match repo.find_commit(oid) {
                Ok(commit) => commit.id(),
                Err(err) if err.code() == ErrorCode::NotFound => {
                    return Err(StoreError::RevisionNotFound {
                        revision: oid.to_string(),
                        path: rel_path.to_string(),
                    })
                }
                Err(err) => return Err(err.into()),
            },
            None => match resolve_head(&repo)? {
                Some(commit) => commit.id(),
                None => return Ok(Vec::new()),
            },
        };

        let mut revwalk = repo.revwalk()?;
        revwalk.push(start)?;
        revwalk.set_sorting(Sort::TOPOLOGICAL)?;

        let mut changes = Vec::new();
        for oid in revwalk {
            if limit.is_some_and(|max| changes.len() >= max) {
                break;
            }

            let commit = repo.find_commit(oid?)?;
            let current = entry_id(&commit.tree()?, rel_path)?;
            let (previous, same_tree) = match commit.parent_count() {
                0 => (None, false),
                _ => {
                    let parent = commit.parent(0)?;
                    let same_tree = parent.tree_id() == commit.tree_id();
                    (entry_id(&parent.tree()?, rel_path)?, same_tree)
                }
            };

            let touched = current != previous
                || (same_tree && noted_paths(&repo, commit.id())?.iter().any(|p| p == rel_path));
            if touched {
                changes.push(PathChange {
                    info: CommitInfo::from_commit(&commit),
                    present: current.is_some(),
                });
            }
        }

        Ok(changes)
    }
}

/// Blob id of `rel_path` in `tree`, if present
fn entry_id(tree: &Tree<'_>, rel_path: &str) -> StoreResult<Option<Oid>> {
    match tree.get_path(Path::new(rel_path)) {
        Ok(entry) => Ok(Some(entry.id())),
        Err(err) if err.code() == ErrorCode::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Paths recorded for a commit that left the tree unchanged
fn noted_paths(repo: &Repository, commit_id: Oid) -> StoreResult<Vec<String>> {
    match repo.find_note(Some(PATHS_NOTES_REF), commit_id) {
        Ok(note) => Ok(note
            .message()
            .unwrap_or("")
            .lines()
            .map(str::to_string)
            .collect()),
        Err(err) if err.code() == ErrorCode::NotFound => Ok(Vec::new()),
        Err(err) => Err(err.into()),
    }
}

/// The commit HEAD points at, or `None` for an unborn branch
fn resolve_head(repo: &Repository) -> StoreResult<Option<Commit<'_>>> {
    match repo.head() {
        Ok(head) => Ok(Some(head.peel_to_commit()?)),
        Err(err) if matches!(err.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}
