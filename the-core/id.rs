//! Identity value types for revisions and content-tree nodes.

use std::fmt;

pub type DocumentId = i64;
pub type VersionId = i64;

/// Which table a lineage lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DocKind {
  /// Mutable, in-progress lineage.
  Draft,
  /// Committed, immutable lineage.
  Document,
}

/// Identifies one revision of one lineage.
///
/// Both ids must be non-negative for the id to be valid; the default value is
/// deliberately invalid so that an unset handle can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocId {
  pub kind:        DocKind,
  pub document_id: DocumentId,
  pub version_id:  VersionId,
}

impl DocId {
  pub const fn new(kind: DocKind, document_id: DocumentId, version_id: VersionId) -> Self {
    Self {
      kind,
      document_id,
      version_id,
    }
  }

  pub const fn draft(document_id: DocumentId, version_id: VersionId) -> Self {
    Self::new(DocKind::Draft, document_id, version_id)
  }

  pub const fn document(document_id: DocumentId, version_id: VersionId) -> Self {
    Self::new(DocKind::Document, document_id, version_id)
  }

  #[inline]
  pub const fn is_valid(&self) -> bool {
    self.document_id >= 0 && self.version_id >= 0
  }

  #[inline]
  pub const fn is_draft(&self) -> bool {
    matches!(self.kind, DocKind::Draft)
  }

  #[inline]
  pub const fn is_document(&self) -> bool {
    matches!(self.kind, DocKind::Document)
  }

  /// Same lineage, other version.
  #[inline]
  pub const fn with_version(self, version_id: VersionId) -> Self {
    Self {
      version_id,
      ..self
    }
  }

  /// True if both ids point into the same lineage.
  #[inline]
  pub fn same_lineage(&self, other: &DocId) -> bool {
    self.kind == other.kind && self.document_id == other.document_id
  }
}

impl Default for DocId {
  fn default() -> Self {
    Self::draft(-1, -1)
  }
}

impl fmt::Display for DocId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let kind = match self.kind {
      DocKind::Draft => "draft",
      DocKind::Document => "doc",
    };
    write!(f, "{kind}:{}@{}", self.document_id, self.version_id)
  }
}

/// Pointer to a content-tree node inside one lineage.
///
/// `version_id` is the revision the node was created in. Two equal refs point
/// at the very same node and therefore at identical content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef {
  pub version_id: VersionId,
  pub node_id:    i64,
}

impl NodeRef {
  pub const fn new(version_id: VersionId, node_id: i64) -> Self {
    Self {
      version_id,
      node_id,
    }
  }
}

impl fmt::Display for NodeRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "node:{}/{}", self.version_id, self.node_id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_id_is_invalid() {
    assert!(!DocId::default().is_valid());
    assert!(DocId::draft(0, 0).is_valid());
    assert!(!DocId::document(3, -1).is_valid());
  }

  #[test]
  fn with_version_keeps_lineage() {
    let id = DocId::document(4, 1);
    let other = id.with_version(7);
    assert!(id.same_lineage(&other));
    assert_eq!(other.version_id, 7);
    assert!(!id.same_lineage(&DocId::draft(4, 1)));
  }

  #[test]
  fn display() {
    assert_eq!(DocId::draft(2, 5).to_string(), "draft:2@5");
    assert_eq!(NodeRef::new(1, 9).to_string(), "node:1/9");
  }
}
