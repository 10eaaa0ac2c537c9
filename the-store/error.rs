use the_core::{
  DocId,
  DocKind,
  DocumentId,
  NodeRef,
};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("no {kind:?} lineage with id {id}")]
  UnknownLineage { kind: DocKind, id: DocumentId },
  #[error("no revision {0}")]
  UnknownVersion(DocId),
  #[error("no node {0}")]
  UnknownNode(NodeRef),
  #[error("{0} does not hold {1}")]
  NodeKind(NodeRef, &'static str),
  #[error("revision {0} is frozen")]
  FrozenRevision(DocId),
  #[error("node {0} is frozen")]
  FrozenNode(NodeRef),
  #[error("position {pos} out of range (length {len})")]
  OutOfRange { pos: usize, len: usize },
  #[error("position {0} is not on a char boundary")]
  NotCharBoundary(usize),
  #[error(transparent)]
  Io(#[from] std::io::Error),
}
