//! Plain file storage for bags and tiddlers
//!
//! Layout under the store root:
//!
//! - `bags/<bag>/description` - bag description
//! - `bags/<bag>/tiddlers/<title>` - serialized tiddler text
//!
//! Bag names and titles are percent-encoded so that any string maps to a
//! single path component. Encoded names never begin with `.`; hidden files
//! in a tiddlers directory belong to the store (locks, temp files).

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use crate::models::Bag;
use crate::storage::error::{StoreError, StoreResult};

/// Characters that cannot appear verbatim in a file name
const NAME_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b'/')
    .add(b'\\')
    .add(b'%')
    .add(b':')
    .add(b'*')
    .add(b'?')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'|');

const BAGS_DIR: &str = "bags";
const TIDDLERS_DIR: &str = "tiddlers";
const DESCRIPTION_FILE: &str = "description";

/// Maps bags and tiddlers onto files below a root directory
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a file store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The store root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding all bags
    pub fn bags_path(&self) -> PathBuf {
        self.root.join(BAGS_DIR)
    }

    /// Directory of a single bag
    pub fn bag_path(&self, bag: &str) -> StoreResult<PathBuf> {
        Ok(self.bags_path().join(encode_name(bag)?))
    }

    /// Directory holding a bag's tiddler files
    pub fn tiddlers_path(&self, bag: &str) -> StoreResult<PathBuf> {
        Ok(self.bag_path(bag)?.join(TIDDLERS_DIR))
    }

    /// File holding a tiddler's text
    pub fn tiddler_path(&self, bag: &str, title: &str) -> StoreResult<PathBuf> {
        Ok(self.tiddlers_path(bag)?.join(encode_name(title)?))
    }

    /// Path relative to the root, `/`-separated
    pub fn relative_path(&self, path: &Path) -> StoreResult<String> {
        let relative = path
            .strip_prefix(&self.root)
            .map_err(|_| StoreError::InvalidName {
                name: path.display().to_string(),
                reason: "path is outside the store root",
            })?;

        let parts = relative
            .components()
            .map(|c| match c {
                Component::Normal(part) => Ok(part.to_string_lossy().into_owned()),
                _ => Err(StoreError::InvalidName {
                    name: path.display().to_string(),
                    reason: "path is not a plain relative path",
                }),
            })
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(parts.join("/"))
    }

    /// Read a UTF-8 file
    pub fn read_utf8(&self, path: &Path) -> StoreResult<String> {
        fs::read_to_string(path).map_err(|e| StoreError::from_read(e, path.to_path_buf()))
    }

    /// Replace a file's contents atomically
    pub fn write_utf8(&self, path: &Path, text: &str) -> StoreResult<()> {
        atomic_write(path, text.as_bytes())
    }

    /// Remove a file
    pub fn remove(&self, path: &Path) -> StoreResult<()> {
        fs::remove_file(path).map_err(|e| StoreError::from_io(e, path.to_path_buf()))
    }

    /// Create the bag's directories if they do not exist yet
    pub fn ensure_bag(&self, bag: &str) -> StoreResult<PathBuf> {
        let tiddlers = self.tiddlers_path(bag)?;
        if !tiddlers.is_dir() {
            fs::create_dir_all(&tiddlers)
                .map_err(|e| StoreError::from_io(e, tiddlers.clone()))?;
            // Concurrent writers may race to create the same bag
            let description = self.bag_path(bag)?.join(DESCRIPTION_FILE);
            match OpenOptions::new().write(true).create_new(true).open(&description) {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(StoreError::from_io(e, description)),
            }
        }
        Ok(tiddlers)
    }

    /// Create or update a bag
    pub fn put_bag(&self, bag: &Bag) -> StoreResult<()> {
        self.ensure_bag(&bag.name)?;
        let description = self.bag_path(&bag.name)?.join(DESCRIPTION_FILE);
        self.write_utf8(&description, &bag.description)
    }

    /// Load a bag
    pub fn get_bag(&self, name: &str) -> StoreResult<Bag> {
        let path = self.bag_path(name)?;
        if !path.is_dir() {
            return Err(StoreError::NoBag {
                name: name.to_string(),
            });
        }

        let description = match self.read_utf8(&path.join(DESCRIPTION_FILE)) {
            Ok(text) => text,
            Err(StoreError::NotFound { .. }) => String::new(),
            Err(e) => return Err(e),
        };

        Ok(Bag {
            name: name.to_string(),
            description,
        })
    }

    /// Names of all bags, sorted
    pub fn list_bags(&self) -> StoreResult<Vec<String>> {
        let path = self.bags_path();
        if !path.is_dir() {
            return Ok(Vec::new());
        }
        list_names(&path, |entry| entry.is_dir())
    }

    /// Titles of all tiddlers in a bag, sorted
    pub fn list_tiddlers(&self, bag: &str) -> StoreResult<Vec<String>> {
        let path = self.tiddlers_path(bag)?;
        if !path.is_dir() {
            return Err(StoreError::NoBag {
                name: bag.to_string(),
            });
        }
        list_names(&path, |entry| entry.is_file())
    }
}

/// Decoded names of the visible entries in `dir` accepted by `keep`
fn list_names(dir: &Path, keep: impl Fn(&Path) -> bool) -> StoreResult<Vec<String>> {
    let entries = fs::read_dir(dir).map_err(|e| StoreError::from_read(e, dir.to_path_buf()))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::from_read(e, dir.to_path_buf()))?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if file_name.starts_with('.') || !keep(&entry.path()) {
            continue;
        }
        names.push(decode_name(&file_name));
    }

    names.sort();
    Ok(names)
}

/// Encode a bag name or title as a single file name component
pub fn encode_name(name: &str) -> StoreResult<String> {
    if name.is_empty() {
        return Err(StoreError::InvalidName {
            name: name.to_string(),
            reason: "name is empty",
        });
    }

    let encoded = utf8_percent_encode(name, NAME_ENCODE_SET).to_string();
    Ok(match encoded.strip_prefix('.') {
        Some(rest) => format!("%2E{}", rest),
        None => encoded,
    })
}

/// Reverse `encode_name`
pub fn decode_name(encoded: &str) -> String {
    percent_decode_str(encoded).decode_utf8_lossy().into_owned()
}

/// Write data to a file atomically
///
/// 1. Write to a hidden temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
fn atomic_write(path: &Path, data: &[u8]) -> StoreResult<()> {
    let parent = path.parent().ok_or_else(|| StoreError::InvalidName {
        name: path.display().to_string(),
        reason: "path has no parent directory",
    })?;
    fs::create_dir_all(parent).map_err(|e| StoreError::from_io(e, parent.to_path_buf()))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = parent.join(format!(".{}.tmp", file_name));

    let mut file =
        File::create(&temp_path).map_err(|e| StoreError::from_io(e, temp_path.clone()))?;
    file.write_all(data)
        .map_err(|e| StoreError::from_io(e, temp_path.clone()))?;
    file.sync_all()
        .map_err(|e| StoreError::from_io(e, temp_path.clone()))?;

    fs::rename(&temp_path, path).map_err(|e| StoreError::from_io(e, path.to_path_buf()))?;

    Ok(())
}
