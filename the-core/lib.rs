pub mod chars;
pub mod id;
pub mod interval;
pub mod line_ending;

pub use id::{
  DocId,
  DocKind,
  DocumentId,
  NodeRef,
  VersionId,
};
pub use interval::Interval;
pub use line_ending::{
  Eol,
  EolTally,
  NATIVE_EOL,
};
