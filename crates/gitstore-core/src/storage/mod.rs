//! Storage layer
//!
//! Plain file storage for bags and tiddlers, and the error type shared by
//! every store operation.
//!
//! ## Architecture
//!
//! - **Files**: source of truth for the current text of each tiddler
//! - **Git**: history of those files, see `crate::revision`

pub mod error;
pub mod files;

pub use error::{StoreError, StoreResult};
pub use files::{decode_name, encode_name, FileStore};
