//! gitstore Core Library
//!
//! A file-backed tiddler store that records every write as a git commit.
//! Tiddlers live as plain text files under `bags/<bag>/tiddlers/<title>`;
//! their revisions and creation details are read back from git history.
//!
//! # Architecture
//!
//! - **Files**: the current text of each tiddler, one file per tiddler
//! - **Git**: every put and delete, with the requesting user as author
//! - **Locks**: one advisory lock file per tiddler, held across write and commit
//!
//! # Quick Start
//!
//! ```text
//! let store = Store::open(Config::load()?)?.with_usersign("john");
//!
//! let mut tiddler = Tiddler::new("Foo", "alpha");
//! tiddler.set_text("lorem ipsum");
//! store.put(&mut tiddler)?;
//!
//! let current = store.get("alpha", "Foo")?;
//! ```
//!
//! # Modules
//!
//! - `store`: Versioned store (main entry point)
//! - `models`: Tiddlers and bags
//! - `serializer`: Tiddler text format
//! - `storage`: File layout and errors
//! - `revision`: Git history access
//! - `lock`: Per-tiddler write locks
//! - `identity`: Commit author and committer addresses
//! - `config`: Store configuration

pub mod config;
pub mod identity;
pub mod lock;
pub mod models;
pub mod revision;
pub mod serializer;
pub mod storage;
pub mod store;

pub use config::Config;
pub use identity::{ServerHost, Signatory, GUEST_USER};
pub use lock::{FileLocker, LockError, Locker, RetryPolicy, StoreLockError};
pub use models::{Bag, Tiddler};
pub use revision::{CommitInfo, GitBackend};
pub use serializer::{Serializer, TextSerializer};
pub use storage::{FileStore, StoreError, StoreResult};
pub use store::Store;
