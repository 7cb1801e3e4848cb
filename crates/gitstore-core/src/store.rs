//! Versioned tiddler store
//!
//! The `Store` keeps each tiddler as a plain file and lets git decide
//! everything about its history:
//! - the revision is the id of the latest commit touching the file
//! - creator and created come from the oldest commit's snapshot
//!
//! Callers never supply revisions; whatever a tiddler carries on `put` is
//! discarded and replaced by the new commit id.
//!
//! ## Usage
//!
//! ```ignore
//! let store = Store::open(config)?.with_usersign("john");
//!
//! let mut tiddler = Tiddler::new("Foo", "alpha");
//! tiddler.set_text("lorem ipsum");
//! store.put(&mut tiddler)?;
//!
//! let current = store.get("alpha", "Foo")?;
//! assert_eq!(current.revision, tiddler.revision);
//! ```

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::Config;
use crate::identity::{Signatory, GUEST_USER};
use crate::lock::{acquire_with_retry, FileLocker, Locker};
use crate::models::{Bag, Tiddler};
use crate::revision::{CommitInfo, GitBackend};
use crate::serializer::{Serializer, TextSerializer};
use crate::storage::{FileStore, StoreError, StoreResult};

/// How much of the first snapshot is read to recover creation details
const CREATION_PREFIX_BYTES: usize = 1024;

/// Who wrote the first revision of a file, and when
#[derive(Debug, Clone)]
struct Creation {
    creator: Option<String>,
    created: DateTime<Utc>,
}

/// Tiddler store revisioned by git
///
/// Creation details are cached per path; only deletes made through this
/// `Store` invalidate the cache, not deletes or re-creates by other processes.
pub struct Store {
    files: FileStore,
    backend: GitBackend,
    locker: Box<dyn Locker>,
    serializer: Box<dyn Serializer>,
    config: Config,
    usersign: String,
    /// First-revision details per relative path; immutable once recorded
    creations: Mutex<HashMap<String, Creation>>,
}

impl Store {
    /// Open the store at `config.store_root`, initializing git if needed
    pub fn open(config: Config) -> StoreResult<Self> {
        std::fs::create_dir_all(&config.store_root)
            .map_err(|e| StoreError::from_io(e, config.store_root.clone()))?;

        let files = FileStore::new(config.store_root.clone());
        let backend = GitBackend::open_or_init(&config.store_root)?;

        Ok(Self {
            files,
            backend,
            locker: Box::new(FileLocker),
            serializer: Box::new(TextSerializer),
            config,
            usersign: GUEST_USER.to_string(),
            creations: Mutex::new(HashMap::new()),
        })
    }

    /// Open the store with a custom tiddler text format
    pub fn open_with(config: Config, serializer: Box<dyn Serializer>) -> StoreResult<Self> {
        Ok(Self::open(config)?.with_serializer(serializer))
    }

    /// Attribute subsequent writes to `user`
    pub fn with_usersign(mut self, user: impl Into<String>) -> Self {
        self.usersign = user.into();
        self
    }

    /// Replace the locking service
    pub fn with_locker(mut self, locker: Box<dyn Locker>) -> Self {
        self.locker = locker;
        self
    }

    /// Replace the tiddler text format
    pub fn with_serializer(mut self, serializer: Box<dyn Serializer>) -> Self {
        self.serializer = serializer;
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The user writes are attributed to
    pub fn usersign(&self) -> &str {
        &self.usersign
    }

    /// The underlying file layout
    pub fn files(&self) -> &FileStore {
        &self.files
    }

    /// The underlying revision backend
    pub fn backend(&self) -> &GitBackend {
        &self.backend
    }

    // ==================== Tiddler Operations ====================

    /// Write a tiddler and record it as a new revision
    ///
    /// The tiddler's write lock is held across the file write and the
    /// commit, so commit order matches write order. On return,
    /// `tiddler.revision` holds the new commit id; every put makes a new
    /// commit, even when the content is unchanged.
    pub fn put(&self, tiddler: &mut Tiddler) -> StoreResult<()> {
        let path = self.files.tiddler_path(&tiddler.bag, &tiddler.title)?;
        let rel_path = self.files.relative_path(&path)?;
        self.files.ensure_bag(&tiddler.bag)?;

        let guard = acquire_with_retry(self.locker.as_ref(), &path, &self.config.retry_policy())?;

        tiddler.revision = None;
        let text = self.serializer.to_text(tiddler)?;
        self.files.write_utf8(&path, &text)?;

        let message = commit_message(&tiddler.bag, &tiddler.title, "put");
        let revision = self
            .backend
            .commit(&[&rel_path], &message, &self.author(), &self.committer())?
            .id;
        drop(guard);

        debug!(bag = %tiddler.bag, title = %tiddler.title, %revision, "put tiddler");
        tiddler.revision = Some(revision);
        Ok(())
    }

    /// Read the current revision of a tiddler
    ///
    /// `revision` is the latest commit touching the file; `creator` and
    /// `created` are the modifier and modified time of its first revision.
    pub fn get(&self, bag: &str, title: &str) -> StoreResult<Tiddler> {
        let path = self.files.tiddler_path(bag, title)?;
        let rel_path = self.files.relative_path(&path)?;

        let text = match self.files.read_utf8(&path) {
            Ok(text) => text,
            Err(StoreError::NotFound { .. }) => return Err(no_tiddler(bag, title)),
            Err(e) => return Err(e),
        };

        let mut tiddler = self.serializer.from_text(title, bag, &text)?;
        tiddler.revision = Some(self.latest_revision(&rel_path)?);
        self.apply_creation(&mut tiddler, &rel_path, None)?;
        Ok(tiddler)
    }

    /// Read a tiddler as it was at `revision`
    ///
    /// `creator` and `created` describe the incarnation alive at `revision`,
    /// which differs from the current one if the tiddler was deleted since.
    pub fn get_revision(&self, bag: &str, title: &str, revision: &str) -> StoreResult<Tiddler> {
        let path = self.files.tiddler_path(bag, title)?;
        let rel_path = self.files.relative_path(&path)?;

        let bytes = self
            .backend
            .read_at(revision, &rel_path, None)?
            .ok_or_else(|| StoreError::RevisionNotFound {
                revision: revision.to_string(),
                path: rel_path.clone(),
            })?;
        let text = String::from_utf8(bytes).map_err(|e| StoreError::Serialization {
            details: format!("revision {} of '{}' is not UTF-8: {}", revision, rel_path, e),
        })?;

        let mut tiddler = self.serializer.from_text(title, bag, &text)?;
        tiddler.revision = Some(revision.to_string());
        self.apply_creation(&mut tiddler, &rel_path, Some(revision))?;
        Ok(tiddler)
    }

    /// Commits that touched a tiddler, newest first
    pub fn list_revisions(&self, bag: &str, title: &str) -> StoreResult<Vec<CommitInfo>> {
        let path = self.files.tiddler_path(bag, title)?;
        let rel_path = self.files.relative_path(&path)?;

        let history = self.backend.history(&rel_path, None)?;
        if history.is_empty() && !path.is_file() {
            return Err(no_tiddler(bag, title));
        }
        Ok(history)
    }

    /// Remove a tiddler and record the removal as a commit
    pub fn delete(&self, bag: &str, title: &str) -> StoreResult<()> {
        let path = self.files.tiddler_path(bag, title)?;
        let rel_path = self.files.relative_path(&path)?;

        let guard = acquire_with_retry(self.locker.as_ref(), &path, &self.config.retry_policy())?;

        if !path.is_file() {
            return Err(no_tiddler(bag, title));
        }
        self.files.remove(&path)?;

        let message = commit_message(bag, title, "delete");
        self.backend
            .commit(&[&rel_path], &message, &self.author(), &self.committer())?;
        self.creations_cache().remove(&rel_path);
        drop(guard);

        debug!(bag, title, "deleted tiddler");
        Ok(())
    }

    /// Titles of the tiddlers in a bag
    pub fn list_tiddlers(&self, bag: &str) -> StoreResult<Vec<String>> {
        self.files.list_tiddlers(bag)
    }

    // ==================== Bag Operations ====================

    /// Create or update a bag
    pub fn put_bag(&self, bag: &Bag) -> StoreResult<()> {
        self.files.put_bag(bag)
    }

    /// Load a bag
    pub fn get_bag(&self, name: &str) -> StoreResult<Bag> {
        self.files.get_bag(name)
    }

    /// Names of all bags
    pub fn list_bags(&self) -> StoreResult<Vec<String>> {
        self.files.list_bags()
    }

    // ==================== Internals ====================

    fn author(&self) -> Signatory {
        Signatory::author(&self.usersign, &self.config.server_host)
    }

    fn committer(&self) -> Signatory {
        Signatory::committer(&self.config.system_name, &self.config.server_host)
    }

    /// Id of the newest commit touching `rel_path`
    fn latest_revision(&self, rel_path: &str) -> StoreResult<String> {
        self.backend
            .latest_commit(rel_path)?
            .map(|commit| commit.id)
            .ok_or_else(|| StoreError::HistoryInconsistency {
                path: rel_path.to_string(),
            })
    }

    fn apply_creation(
        &self,
        tiddler: &mut Tiddler,
        rel_path: &str,
        at: Option<&str>,
    ) -> StoreResult<()> {
        let creation = self.creation(&tiddler.bag, &tiddler.title, rel_path, at)?;
        tiddler.creator = creation.creator;
        tiddler.created = Some(creation.created);
        Ok(())
    }

    /// Creation details from the first snapshot
    ///
    /// With `at` unset this is the current incarnation, cached per path.
    /// Otherwise history is walked from the `at` revision, uncached.
    fn creation(
        &self,
        bag: &str,
        title: &str,
        rel_path: &str,
        at: Option<&str>,
    ) -> StoreResult<Creation> {
        if at.is_none() {
            if let Some(creation) = self.creations_cache().get(rel_path) {
                return Ok(creation.clone());
            }
        }

        let inconsistent = || StoreError::HistoryInconsistency {
            path: rel_path.to_string(),
        };
        let first = match at {
            Some(revision) => self.backend.earliest_commit_at(revision, rel_path)?,
            None => self.backend.earliest_commit(rel_path)?,
        }
        .ok_or_else(inconsistent)?;
        let bytes = self
            .backend
            .read_at(&first.id, rel_path, Some(CREATION_PREFIX_BYTES))?
            .ok_or_else(inconsistent)?;

        let first_tiddler = self
            .serializer
            .from_text(title, bag, &complete_lines(&bytes, CREATION_PREFIX_BYTES))?;
        let creation = Creation {
            creator: first_tiddler.modifier,
            created: first_tiddler.modified,
        };

        if at.is_none() {
            self.creations_cache()
                .insert(rel_path.to_string(), creation.clone());
        }
        Ok(creation)
    }

    fn creations_cache(&self) -> std::sync::MutexGuard<'_, HashMap<String, Creation>> {
        self.creations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Commit message for an action on a tiddler: `tiddler <bag>:<title> <action>`
pub fn commit_message(bag: &str, title: &str, action: &str) -> String {
    format!("tiddler {}:{} {}", bag, title, action)
}

fn no_tiddler(bag: &str, title: &str) -> StoreError {
    StoreError::NoTiddler {
        bag: bag.to_string(),
        title: title.to_string(),
    }
}

/// Decode a possibly truncated snapshot, dropping a cut-off final line
fn complete_lines(bytes: &[u8], limit: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    if bytes.len() < limit {
        return text.into_owned();
    }
    match text.rfind('\n') {
        Some(pos) => text[..pos].to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ServerHost;
    use crate::lock::LockError;
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir) -> Config {
        Config {
            store_root: temp_dir.path().to_path_buf(),
            server_host: ServerHost::new("example.com", 80),
            system_name: "tiddlyweb".to_string(),
            lock_attempts: 5,
            lock_backoff_ms: 100,
            log_file: None,
        }
    }

    fn foo_tiddler(text: &str) -> Tiddler {
        let mut tiddler = Tiddler::new("Foo", "alpha");
        tiddler.set_text(text);
        tiddler
    }

    /// Always reports the lock as held, counting attempts
    struct HeldLocker {
        calls: Arc<AtomicU32>,
    }

    impl Locker for HeldLocker {
        fn acquire(&self, path: &Path) -> Result<crate::lock::LockGuard, LockError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(LockError::Held {
                path: path.to_path_buf(),
            })
        }
    }

    #[test]
    fn test_open_initializes_repository() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(test_config(&temp_dir)).unwrap();

        assert!(temp_dir.path().join(".git").is_dir());
        assert_eq!(store.usersign(), "GUEST");
        assert!(store.list_bags().unwrap().is_empty());
    }

    #[test]
    fn test_put_writes_file_and_assigns_revision() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(test_config(&temp_dir)).unwrap();

        store.put_bag(&Bag::new("alpha")).unwrap();
        let bag_dir = temp_dir.path().join("bags").join("alpha");
        assert!(bag_dir.is_dir());
        assert!(bag_dir.join("tiddlers").is_dir());

        let mut tiddler = foo_tiddler("lorem ipsum\ndolor sit amet");
        tiddler.set_tags(vec!["foo".to_string(), "bar".to_string()]);
        store.put(&mut tiddler).unwrap();

        let tiddler_file = bag_dir.join("tiddlers").join("Foo");
        assert!(tiddler_file.is_file());
        assert_eq!(tiddler.revision.as_ref().unwrap().len(), 40);

        let contents = std::fs::read_to_string(tiddler_file).unwrap();
        assert!(contents.contains("tags: foo bar"));
        assert!(contents.contains(&tiddler.text));
    }

    #[test]
    fn test_put_scenario_get_serializes_tags() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(test_config(&temp_dir)).unwrap();

        let mut tiddler = foo_tiddler("lorem ipsum\ndolor sit amet");
        tiddler.set_tags(vec!["foo".to_string(), "bar".to_string()]);
        store.put(&mut tiddler).unwrap();

        let fetched = store.get("alpha", "Foo").unwrap();
        let text = TextSerializer.to_text(&fetched).unwrap();
        assert!(text.contains("tags: foo bar"));
        assert_eq!(fetched.revision.as_ref().unwrap().len(), 40);
        assert_eq!(fetched.text, "lorem ipsum\ndolor sit amet");
    }

    #[test]
    fn test_put_creates_bag_implicitly() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(test_config(&temp_dir)).unwrap();

        let mut tiddler = Tiddler::new("Foo", "implicit");
        store.put(&mut tiddler).unwrap();

        assert_eq!(store.list_bags().unwrap(), vec!["implicit"]);
        assert_eq!(store.list_tiddlers("implicit").unwrap(), vec!["Foo"]);
    }

    #[test]
    fn test_commit_message_and_identities() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(test_config(&temp_dir))
            .unwrap()
            .with_usersign("JohnDoe");

        let mut tiddler = foo_tiddler("text");
        store.put(&mut tiddler).unwrap();

        let commit = store
            .backend()
            .latest_commit("bags/alpha/tiddlers/Foo")
            .unwrap()
            .unwrap();
        assert_eq!(commit.message, "tiddler alpha:Foo put");
        assert_eq!(commit.author_name, "JohnDoe");
        assert_eq!(commit.author_email, "JohnDoe@example.com");
        assert_eq!(commit.committer_email, "tiddlyweb@example.com");
        assert_eq!(Some(commit.id), tiddler.revision);
    }

    #[test]
    fn test_get_returns_put_revision() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(test_config(&temp_dir)).unwrap();

        let mut tiddler = foo_tiddler("lorem ipsum2\ndolor sit amet2");
        tiddler.set_tags(vec!["foo2".to_string(), "bar2".to_string()]);
        store.put(&mut tiddler).unwrap();

        let same = store.get("alpha", "Foo").unwrap();
        assert_eq!(same.revision, tiddler.revision);
        assert_eq!(same.tags, vec!["foo2", "bar2"]);
    }

    #[test]
    fn test_repeated_get_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(test_config(&temp_dir)).unwrap();

        let mut tiddler = foo_tiddler("stable");
        tiddler.set_modifier("john");
        store.put(&mut tiddler).unwrap();

        let first = store.get("alpha", "Foo").unwrap();
        let second = store.get("alpha", "Foo").unwrap();

        // A fresh store has no cached creation details
        let reopened = Store::open(test_config(&temp_dir)).unwrap();
        let third = reopened.get("alpha", "Foo").unwrap();

        for other in [&second, &third] {
            assert_eq!(first.revision, other.revision);
            assert_eq!(first.creator, other.creator);
            assert_eq!(first.created, other.created);
            assert_eq!(first.text, other.text);
        }
    }

    #[test]
    fn test_sequential_puts_yield_distinct_revisions() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(test_config(&temp_dir)).unwrap();

        let mut revisions = Vec::new();
        for n in 0..5 {
            let mut tiddler = foo_tiddler(&format!("version {}", n));
            store.put(&mut tiddler).unwrap();
            revisions.push(tiddler.revision.unwrap());
        }

        let mut unique = revisions.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 5);

        let current = store.get("alpha", "Foo").unwrap();
        assert_eq!(current.revision.as_ref(), revisions.last());
    }

    #[test]
    fn test_creation_info_comes_from_first_revision() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(test_config(&temp_dir)).unwrap();

        let mut tiddler = foo_tiddler("lorem ipsum");
        tiddler.set_modifier("john");
        store.put(&mut tiddler).unwrap();

        thread::sleep(Duration::from_millis(50));

        let mut tiddler = foo_tiddler("lorem ipsum\ndolor sit amet");
        tiddler.set_modifier("jane");
        store.put(&mut tiddler).unwrap();

        let tiddler = store.get("alpha", "Foo").unwrap();
        assert_eq!(tiddler.creator.as_deref(), Some("john"));
        assert_eq!(tiddler.modifier.as_deref(), Some("jane"));
        assert_ne!(tiddler.created, Some(tiddler.modified));
    }

    #[test]
    fn test_incoming_revision_is_discarded() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(test_config(&temp_dir)).unwrap();

        let mut tiddler = foo_tiddler("text");
        tiddler.revision = Some("1234567890".to_string());
        store.put(&mut tiddler).unwrap();

        let revision = tiddler.revision.clone().unwrap();
        assert_ne!(revision, "1234567890");
        assert_eq!(revision.len(), 40);

        let contents = std::fs::read_to_string(
            store.files().tiddler_path("alpha", "Foo").unwrap(),
        )
        .unwrap();
        assert!(!contents.contains("1234567890"));
    }

    #[test]
    fn test_replayed_tiddler_gets_new_revision() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(test_config(&temp_dir)).unwrap();

        let mut tiddler = foo_tiddler("first");
        store.put(&mut tiddler).unwrap();

        let mut replay = store.get("alpha", "Foo").unwrap();
        let old_revision = replay.revision.clone();
        replay.set_text("second");
        store.put(&mut replay).unwrap();

        assert_ne!(replay.revision, old_revision);
        assert_eq!(store.get("alpha", "Foo").unwrap().revision, replay.revision);
    }

    #[test]
    fn test_unchanged_put_makes_new_revision() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(test_config(&temp_dir)).unwrap();

        let mut tiddler = foo_tiddler("same");
        store.put(&mut tiddler).unwrap();
        let first = tiddler.revision.clone().unwrap();

        let mut again = Tiddler::new("Foo", "alpha");
        again.text = tiddler.text.clone();
        again.modified = tiddler.modified;
        store.put(&mut again).unwrap();
        let second = again.revision.clone().unwrap();

        assert_eq!(first.len(), 40);
        assert_eq!(second.len(), 40);
        assert_ne!(first, second);
        let ids: Vec<String> = store
            .list_revisions("alpha", "Foo")
            .unwrap()
            .into_iter()
            .map(|commit| commit.id)
            .collect();
        assert_eq!(ids, vec![second.clone(), first]);
        assert_eq!(store.get("alpha", "Foo").unwrap().revision, Some(second));
    }

    #[test]
    fn test_put_fails_after_five_lock_attempts() {
        let temp_dir = TempDir::new().unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let store = Store::open(test_config(&temp_dir))
            .unwrap()
            .with_locker(Box::new(HeldLocker {
                calls: Arc::clone(&calls),
            }));

        let start = Instant::now();
        let err = store.put(&mut foo_tiddler("blocked")).unwrap_err();
        let elapsed = start.elapsed();

        assert!(matches!(err, StoreError::Lock(ref e) if e.attempts == 5));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert!(elapsed >= Duration::from_millis(400));
        assert!(elapsed < Duration::from_secs(2));

        // Nothing was written or committed
        assert!(!store.files().tiddler_path("alpha", "Foo").unwrap().exists());
        assert!(store
            .backend()
            .latest_commit("bags/alpha/tiddlers/Foo")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_put_fails_while_file_lock_is_held() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(test_config(&temp_dir)).unwrap();

        let path = store.files().tiddler_path("alpha", "Foo").unwrap();
        let held = FileLocker.acquire(&path).unwrap();

        let err = store.put(&mut foo_tiddler("blocked")).unwrap_err();
        assert!(matches!(err, StoreError::Lock(_)));

        drop(held);
        store.put(&mut foo_tiddler("unblocked")).unwrap();
    }

    #[test]
    fn test_get_missing_tiddler() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(test_config(&temp_dir)).unwrap();

        assert!(matches!(
            store.get("alpha", "Missing"),
            Err(StoreError::NoTiddler { .. })
        ));
    }

    #[test]
    fn test_uncommitted_file_is_history_inconsistency() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(test_config(&temp_dir)).unwrap();

        let path = store.files().tiddler_path("alpha", "Stray").unwrap();
        store.files().write_utf8(&path, "\nwritten behind the store's back").unwrap();

        assert!(matches!(
            store.get("alpha", "Stray"),
            Err(StoreError::HistoryInconsistency { .. })
        ));
    }

    #[test]
    fn test_get_revision_reads_old_content() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(test_config(&temp_dir)).unwrap();

        let mut first = foo_tiddler("first text");
        first.set_modifier("john");
        store.put(&mut first).unwrap();

        let mut second = foo_tiddler("second text");
        second.set_modifier("jane");
        store.put(&mut second).unwrap();

        let old = store
            .get_revision("alpha", "Foo", first.revision.as_ref().unwrap())
            .unwrap();
        assert_eq!(old.text, "first text");
        assert_eq!(old.revision, first.revision);
        assert_eq!(old.creator.as_deref(), Some("john"));

        let bogus = "0123456789abcdef0123456789abcdef01234567";
        assert!(matches!(
            store.get_revision("alpha", "Foo", bogus),
            Err(StoreError::RevisionNotFound { .. })
        ));
    }

    #[test]
    fn test_list_revisions_newest_first() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(test_config(&temp_dir)).unwrap();

        let mut ids = Vec::new();
        for text in ["one", "two", "three"] {
            let mut tiddler = foo_tiddler(text);
            store.put(&mut tiddler).unwrap();
            ids.push(tiddler.revision.unwrap());
        }
        ids.reverse();

        let listed: Vec<_> = store
            .list_revisions("alpha", "Foo")
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(listed, ids);

        assert!(matches!(
            store.list_revisions("alpha", "Missing"),
            Err(StoreError::NoTiddler { .. })
        ));
    }

    #[test]
    fn test_delete_records_removal() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(test_config(&temp_dir)).unwrap();

        store.put(&mut foo_tiddler("doomed")).unwrap();
        store.delete("alpha", "Foo").unwrap();

        assert!(matches!(
            store.get("alpha", "Foo"),
            Err(StoreError::NoTiddler { .. })
        ));
        let history = store.list_revisions("alpha", "Foo").unwrap();
        assert_eq!(history[0].message, "tiddler alpha:Foo delete");
        assert_eq!(history.len(), 2);

        assert!(matches!(
            store.delete("alpha", "Foo"),
            Err(StoreError::NoTiddler { .. })
        ));
    }

    #[test]
    fn test_recreated_tiddler_has_new_creator() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(test_config(&temp_dir)).unwrap();

        let mut original = foo_tiddler("first life");
        original.set_modifier("john");
        store.put(&mut original).unwrap();
        assert_eq!(
            store.get("alpha", "Foo").unwrap().creator.as_deref(),
            Some("john")
        );

        store.delete("alpha", "Foo").unwrap();

        let mut reborn = foo_tiddler("second life");
        reborn.set_modifier("jane");
        store.put(&mut reborn).unwrap();

        assert_eq!(
            store.get("alpha", "Foo").unwrap().creator.as_deref(),
            Some("jane")
        );
    }

    #[test]
    fn test_get_revision_keeps_creator_of_its_incarnation() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(test_config(&temp_dir)).unwrap();

        let mut original = foo_tiddler("one");
        original.set_modifier("john");
        store.put(&mut original).unwrap();
        store.delete("alpha", "Foo").unwrap();

        let mut reborn = foo_tiddler("two");
        reborn.set_modifier("jane");
        store.put(&mut reborn).unwrap();
        assert_eq!(
            store.get("alpha", "Foo").unwrap().creator.as_deref(),
            Some("jane")
        );

        let old = store
            .get_revision("alpha", "Foo", original.revision.as_ref().unwrap())
            .unwrap();
        assert_eq!(old.text, "one");
        assert_eq!(old.creator.as_deref(), Some("john"));
        assert_eq!(
            old.created.map(|t| t.timestamp_millis()),
            Some(original.modified.timestamp_millis())
        );

        assert_eq!(
            store.get("alpha", "Foo").unwrap().creator.as_deref(),
            Some("jane")
        );
    }

    #[test]
    fn test_creation_survives_long_first_revision() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(test_config(&temp_dir)).unwrap();

        let mut tiddler = foo_tiddler(&"long line of text\n".repeat(200));
        tiddler.set_modifier("john");
        store.put(&mut tiddler).unwrap();

        let fetched = store.get("alpha", "Foo").unwrap();
        assert_eq!(fetched.creator.as_deref(), Some("john"));
        assert_eq!(
            fetched.created.map(|t| t.timestamp_millis()),
            Some(tiddler.modified.timestamp_millis())
        );
    }

    #[test]
    fn test_concurrent_writers_commit_in_write_order() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(&temp_dir);
        config.lock_attempts = 200;
        config.lock_backoff_ms = 5;
        let store = Arc::new(Store::open(config).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|writer| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for n in 0..3 {
                        let mut tiddler = foo_tiddler(&format!("writer {} pass {}", writer, n));
                        store.put(&mut tiddler).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let history = store.list_revisions("alpha", "Foo").unwrap();
        assert_eq!(history.len(), 12);

        // The file on disk is exactly the newest commit's snapshot
        let current = store.get("alpha", "Foo").unwrap();
        assert_eq!(current.revision.as_ref(), Some(&history[0].id));
        let committed = store
            .backend()
            .read_at(&history[0].id, "bags/alpha/tiddlers/Foo", None)
            .unwrap()
            .unwrap();
        let on_disk = std::fs::read(store.files().tiddler_path("alpha", "Foo").unwrap()).unwrap();
        assert_eq!(committed, on_disk);
    }

    #[test]
    fn test_open_with_custom_serializer() {
        /// Marks every stored body so the serializer is visibly in use
        struct Marked;

        impl Serializer for Marked {
            fn to_text(&self, tiddler: &Tiddler) -> StoreResult<String> {
                Ok(format!("marked\n{}", TextSerializer.to_text(tiddler)?))
            }

            fn from_text(&self, title: &str, bag: &str, text: &str) -> StoreResult<Tiddler> {
                let inner = text.strip_prefix("marked\n").unwrap_or(text);
                TextSerializer.from_text(title, bag, inner)
            }
        }

        let temp_dir = TempDir::new().unwrap();
        let store = Store::open_with(test_config(&temp_dir), Box::new(Marked)).unwrap();

        store.put(&mut foo_tiddler("hidden")).unwrap();

        let raw = std::fs::read_to_string(store.files().tiddler_path("alpha", "Foo").unwrap())
            .unwrap();
        assert!(raw.starts_with("marked\n"));
        assert_eq!(store.get("alpha", "Foo").unwrap().text, "hidden");
    }

    #[test]
    fn test_bag_operations() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(test_config(&temp_dir)).unwrap();

        let mut bag = Bag::new("alpha");
        bag.set_description("a bag");
        store.put_bag(&bag).unwrap();

        assert_eq!(store.get_bag("alpha").unwrap(), bag);
        assert_eq!(store.list_bags().unwrap(), vec!["alpha"]);
        assert!(store.list_tiddlers("alpha").unwrap().is_empty());
        assert!(matches!(
            store.get_bag("beta"),
            Err(StoreError::NoBag { .. })
        ));
    }

    #[test]
    fn test_complete_lines_drops_partial_line() {
        assert_eq!(complete_lines(b"a: 1\nb: 2", 100), "a: 1\nb: 2");
        assert_eq!(complete_lines(b"a: 1\nb: 2", 9), "a: 1");
        assert_eq!(complete_lines(b"abc", 3), "");
    }

    #[test]
    fn test_commit_message_format() {
        assert_eq!(commit_message("alpha", "Foo", "put"), "tiddler alpha:Foo put");
    }
}
