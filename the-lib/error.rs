use the_store::StoreError;
use thiserror::Error;

use crate::{
  file::FileError,
  search::SearchError,
};

#[derive(Debug, Error)]
pub enum DocumentError {
  #[error(transparent)]
  Store(#[from] StoreError),
  #[error(transparent)]
  File(#[from] FileError),
  #[error(transparent)]
  Search(#[from] SearchError),
  #[error("internal invariant violated: {0}")]
  InvariantViolation(String),
  #[error("operation requires a draft")]
  NotDraft,
  #[error("document handle is not valid")]
  InvalidDocument,
}

pub type Result<T> = std::result::Result<T, DocumentError>;

/// Reports a broken invariant.
///
/// Fatal in debug builds. Release builds log it and hand back an error so the
/// caller abandons the operation instead of corrupting state.
#[track_caller]
pub(crate) fn invariant(msg: impl Into<String>) -> DocumentError {
  let msg = msg.into();
  log::error!("invariant violation: {msg}");
  debug_assert!(false, "invariant violation: {msg}");
  DocumentError::InvariantViolation(msg)
}

/// Returns an invariant error from the enclosing function unless `cond` holds.
macro_rules! ensure_invariant {
  ($cond:expr, $($arg:tt)+) => {
    if !$cond {
      return Err($crate::error::invariant(format!($($arg)+)).into());
    }
  };
}

pub(crate) use ensure_invariant;
