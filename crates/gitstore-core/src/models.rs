//! Data models for gitstore
//!
//! Defines the core data structures: Tiddler and Bag.
//! A `Tiddler` is transient: it is built per request, filled by a read or
//! about to be written. Durable state is the file plus its commit history.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single text document tracked by the store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tiddler {
    /// Title, unique within its bag
    pub title: String,
    /// Name of the containing bag
    pub bag: String,
    /// Body text
    pub text: String,
    /// Tags, in the order they were added
    pub tags: Vec<String>,
    /// Identity of the last writer
    pub modifier: Option<String>,
    /// When this tiddler was last modified
    pub modified: DateTime<Utc>,
    /// Identity of the first writer (derived from history)
    pub creator: Option<String>,
    /// When the first revision was written (derived from history)
    pub created: Option<DateTime<Utc>>,
    /// Commit id of the current revision (assigned by the store)
    pub revision: Option<String>,
    /// MIME type of the text, when not plain tiddler markup
    pub content_type: Option<String>,
    /// Extended key/value fields
    pub fields: BTreeMap<String, String>,
}

impl Tiddler {
    /// Create an empty tiddler addressed by bag and title
    pub fn new(title: impl Into<String>, bag: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            bag: bag.into(),
            text: String::new(),
            tags: Vec::new(),
            modifier: None,
            modified: Utc::now(),
            creator: None,
            created: None,
            revision: None,
            content_type: None,
            fields: BTreeMap::new(),
        }
    }

    /// Update the body text
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.modified = Utc::now();
    }

    /// Set the identity of the writer
    pub fn set_modifier(&mut self, modifier: impl Into<String>) {
        self.modifier = Some(modifier.into());
        self.modified = Utc::now();
    }

    /// Add a tag
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
            self.modified = Utc::now();
        }
    }

    /// Remove a tag
    pub fn remove_tag(&mut self, tag: &str) {
        if let Some(pos) = self.tags.iter().position(|t| t == tag) {
            self.tags.remove(pos);
            self.modified = Utc::now();
        }
    }

    /// Set all tags (replacing existing)
    pub fn set_tags(&mut self, tags: Vec<String>) {
        self.tags = tags;
        self.modified = Utc::now();
    }

    /// Set an extended field
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
        self.modified = Utc::now();
    }
}

/// A named grouping of tiddlers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bag {
    /// Bag name
    pub name: String,
    /// Free-form description
    pub description: String,
}

impl Bag {
    /// Create a new bag with an empty description
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
        }
    }

    /// Update the description
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }
}
