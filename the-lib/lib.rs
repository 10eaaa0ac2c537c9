//! Versioned text documents: revision trees with copy-on-write freezing,
//! commit, diff-based position remapping, search and file import/export.

pub mod config;
pub mod cursor;
pub mod diff;
pub mod document;
pub mod encoding;
pub mod error;
pub mod file;
pub mod regex;
pub mod search;

pub use config::StoreConfig;
pub use document::{
  DiffEntry,
  Document,
};
pub use error::{
  DocumentError,
  Result,
};
pub use the_core::{
  DocId,
  DocKind,
  Eol,
  Interval,
  NodeRef,
};
pub use the_event::{
  DocEvent,
  Subscription,
};
pub use the_store::Store;
