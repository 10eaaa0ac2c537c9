use chrono::{
  DateTime,
  Utc,
};
use the_core::{
  DocId,
  DocKind,
  DocumentId,
  NodeRef,
  VersionId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionState {
  Editable,
  Frozen,
}

/// One row of a lineage's history.
#[derive(Debug, Clone)]
pub struct RevisionRow {
  pub parent:      Option<VersionId>,
  pub state:       RevisionState,
  pub head:        NodeRef,
  pub prop:        Option<NodeRef>,
  pub length:      u64,
  pub date:        DateTime<Utc>,
  pub label:       Option<NodeRef>,
  pub description: Option<NodeRef>,
  pub signature:   Option<String>,
  pub unread:      bool,
}

impl RevisionRow {
  pub fn new(head: NodeRef) -> Self {
    Self {
      parent: None,
      state: RevisionState::Editable,
      head,
      prop: None,
      length: 0,
      date: Utc::now(),
      label: None,
      description: None,
      signature: None,
      unread: false,
    }
  }

  /// Editable child of this row sharing its nodes.
  pub fn child(&self, parent: VersionId) -> Self {
    Self {
      parent: Some(parent),
      state: RevisionState::Editable,
      label: None,
      description: None,
      signature: None,
      unread: false,
      ..self.clone()
    }
  }

  #[inline]
  pub fn is_frozen(&self) -> bool {
    self.state == RevisionState::Frozen
  }
}

/// A draft or committed document with its revision history.
#[derive(Debug, Clone)]
pub struct Lineage {
  pub kind:            DocKind,
  pub id:              DocumentId,
  pub history:         Vec<RevisionRow>,
  /// Current head. For a document this may name an attached draft.
  pub head:            Option<DocId>,
  /// Document version a draft was forked from.
  pub parent_document: Option<(DocumentId, VersionId)>,
  /// Random id of the append-only file holding freshly loaded text.
  pub buffer_file:     Option<String>,
  /// Last change of a draft.
  pub date:            DateTime<Utc>,
}

impl Lineage {
  pub fn new(kind: DocKind, id: DocumentId) -> Self {
    Self {
      kind,
      id,
      history: Vec::new(),
      head: None,
      parent_document: None,
      buffer_file: None,
      date: Utc::now(),
    }
  }

  pub fn doc_id(&self, version: VersionId) -> DocId {
    DocId::new(self.kind, self.id, version)
  }

  pub fn row(&self, version: VersionId) -> Option<&RevisionRow> {
    usize::try_from(version)
      .ok()
      .and_then(|v| self.history.get(v))
  }

  pub fn row_mut(&mut self, version: VersionId) -> Option<&mut RevisionRow> {
    usize::try_from(version)
      .ok()
      .and_then(|v| self.history.get_mut(v))
  }

  pub fn push(&mut self, row: RevisionRow) -> VersionId {
    self.history.push(row);
    (self.history.len() - 1) as VersionId
  }

  /// Versions whose parent is `version`.
  pub fn children(&self, version: VersionId) -> Vec<VersionId> {
    self
      .history
      .iter()
      .enumerate()
      .filter(|(_, row)| row.parent == Some(version))
      .map(|(i, _)| i as VersionId)
      .collect()
  }

  pub fn touch(&mut self) {
    self.date = Utc::now();
  }
}
