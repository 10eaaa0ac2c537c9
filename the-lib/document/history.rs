//! Walking the revision tree: parents, children, diffs between revisions and
//! the per-range change history.

use std::sync::Arc;

use ropey::Rope;
use the_core::{
  DocId,
  DocKind,
  DocumentId,
  Interval,
  NodeRef,
  VersionId,
};
use the_store::NodeStore;

use super::Document;
use crate::{
  diff::{
    self,
    Match,
    Remapped,
  },
  error::{
    DocumentError,
    Result,
  },
};

/// One revision in which a range of text changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
  pub doc:    DocId,
  /// Index of the previous entry, for all but the oldest.
  pub parent: Option<usize>,
  /// The range in `doc`'s text.
  pub range:  Interval,
}

/// Draft parent, then the attached document version, then the document
/// parent.
fn parent_in(store: &NodeStore, doc: DocId) -> Result<Option<DocId>> {
  let row = store.revision(doc)?;
  if let Some(parent) = row.parent {
    return Ok(Some(doc.with_version(parent)));
  }
  if doc.kind == DocKind::Draft {
    let lineage = store.lineage(doc.kind, doc.document_id)?;
    return Ok(
      lineage
        .parent_document
        .map(|(document, version)| DocId::document(document, version)),
    );
  }
  Ok(None)
}

/// The lineage a revision's history is rooted in: the attached document for
/// an attached draft, its own lineage otherwise.
fn history_root(store: &NodeStore, doc: DocId) -> Result<(DocKind, DocumentId)> {
  if doc.kind == DocKind::Draft
    && let Some((document, _)) = store.lineage(doc.kind, doc.document_id)?.parent_document
  {
    return Ok((DocKind::Document, document));
  }
  Ok((doc.kind, doc.document_id))
}

impl Document {
  pub fn parent_of(&self, doc: DocId) -> Result<Option<DocId>> {
    parent_in(&self.store.lock(), doc)
  }

  /// Versions of the working lineage forked from `version`.
  pub fn children_of(&self, version: VersionId) -> Result<Vec<VersionId>> {
    let store = self.store.lock();
    let id = self.checked_id(&store)?;
    Ok(store.lineage(id.kind, id.document_id)?.children(version))
  }

  pub fn head_node(&self) -> Result<NodeRef> {
    let store = self.store.lock();
    let id = self.checked_id(&store)?;
    Ok(store.revision(id)?.head)
  }

  pub fn prop_node(&self) -> Result<Option<NodeRef>> {
    let store = self.store.lock();
    let id = self.checked_id(&store)?;
    Ok(store.revision(id)?.prop)
  }

  /// False when both revisions share their text node.
  pub fn text_changed(&self, v1: DocId, v2: DocId) -> Result<bool> {
    let store = self.store.lock();
    Ok(store.revision(v1)?.head != store.revision(v2)?.head)
  }

  pub fn properties_changed(&self, v1: DocId, v2: DocId) -> Result<bool> {
    let store = self.store.lock();
    Ok(store.revision(v1)?.prop != store.revision(v2)?.prop)
  }

  /// Equal runs between the texts of `v1` and `v2`.
  pub fn diff(&self, v1: DocId, v2: DocId) -> Result<Vec<Match>> {
    let (before, after) = {
      let store = self.store.lock();
      (store.text(v1)?.clone(), store.text(v2)?.clone())
    };
    Ok(diff::compare_texts(&before, &after))
  }

  /// Lines of `v2` that differ from `v1`.
  pub fn changed_lines(&self, v1: DocId, v2: DocId) -> Result<Vec<usize>> {
    let after = self.rope_at(v2)?;
    Ok(diff::changed_lines(&self.diff(v1, v2)?, &after))
  }

  /// Moves the handle to `target`, carrying a cursor position, selections and
  /// viewport top over from the working revision.
  pub fn switch_to(
    &mut self,
    target: DocId,
    pos: usize,
    selections: &[Interval],
    top: usize,
  ) -> Result<Remapped> {
    self.sync();
    {
      let store = self.store.lock();
      let id = self.checked_id(&store)?;
      if history_root(&store, id)? != history_root(&store, target)? {
        return Err(DocumentError::InvariantViolation(format!(
          "cannot switch from {id} to {target}: not in the same history"
        )));
      }
    }
    let matches = self.diff(self.id, target)?;
    let remapped = diff::remap(&matches, pos, selections, top)?;
    let shared = Arc::clone(&self.store);
    let mut store = shared.lock();
    store.make_head(target)?;
    log::debug!("switched {} -> {target}", self.id);
    self.id = target;
    Ok(remapped)
  }

  /// Revisions in which `range` of the working text changed, oldest first.
  ///
  /// The range is followed back through every ancestor. A revision that only
  /// copied the range from its parent is skipped; the revision the text first
  /// appeared in is always included.
  pub fn partial_diff(&self, range: Interval) -> Result<Vec<DiffEntry>> {
    let store = self.store.lock();
    let mut doc = self.checked_id(&store)?;
    let mut range = range;
    let mut newest_first = Vec::new();

    while !range.is_empty() {
      let Some(parent) = parent_in(&store, doc)? else {
        newest_first.push((doc, range));
        break;
      };
      let before: Rope = store.text(parent)?.clone();
      let after: Rope = store.text(doc)?.clone();
      let matches = diff::compare_texts(&before, &after);

      if let Some(source) = diff::unchanged_source(&matches, range) {
        range = source;
      } else {
        newest_first.push((doc, range));
        let start = diff::remap_pos_back(&matches, range.start).unwrap_or(0);
        let end = diff::remap_pos_back(&matches, range.end).unwrap_or(start);
        range = Interval::new(start, end.max(start));
      }
      doc = parent;
    }

    Ok(
      newest_first
        .into_iter()
        .rev()
        .enumerate()
        .map(|(i, (doc, range))| {
          DiffEntry {
            doc,
            parent: i.checked_sub(1),
            range,
          }
        })
        .collect(),
    )
  }
}

#[cfg(test)]
mod tests {
  use the_store::Store;

  use super::*;
  use crate::config::StoreConfig;

  fn doc() -> Document {
    let store = Store::new(std::env::temp_dir());
    Document::new(store, Arc::new(StoreConfig::default())).unwrap()
  }

  #[test]
  fn fork_shares_nodes_until_written() {
    let mut doc = doc();
    doc.insert(0, "shared").unwrap();
    doc.freeze().unwrap();
    let frozen = doc.id();
    let head = doc.head_node().unwrap();

    let forked = doc.fork().unwrap();
    assert_eq!(doc.head_node().unwrap(), head);
    assert!(!doc.text_changed(frozen, forked).unwrap());
    assert_eq!(doc.children_of(frozen.version_id).unwrap(), vec![forked.version_id]);
    assert_eq!(doc.parent_of(forked).unwrap(), Some(frozen));

    doc.insert(0, "un").unwrap();
    assert!(doc.text_changed(frozen, forked).unwrap());
    assert!(!doc.properties_changed(frozen, forked).unwrap());
  }

  #[test]
  fn switch_to_self_keeps_positions() {
    let mut doc = doc();
    doc.insert(0, "abc\ndef\n").unwrap();
    let id = doc.id();
    let sel = [Interval::new(1, 5)];
    let remapped = doc.switch_to(id, 6, &sel, 4).unwrap();
    assert_eq!(remapped.pos, 6);
    assert_eq!(remapped.selections, sel.to_vec());
    assert_eq!(remapped.top, 4);
  }

  #[test]
  fn switch_to_parent_remaps() {
    let mut doc = doc();
    doc.insert(0, "one\nthree\n").unwrap();
    doc.freeze().unwrap();
    let old = doc.id();
    doc.insert(4, "two\n").unwrap();
    let remapped = doc.switch_to(old, 8, &[], 0).unwrap();
    assert_eq!(remapped.pos, 4);
    assert_eq!(doc.id(), old);
    assert_eq!(doc.text().unwrap(), "one\nthree\n");
  }

  #[test]
  fn switch_stays_within_one_history() {
    let mut doc = doc();
    doc.insert(0, "mine").unwrap();
    doc.freeze().unwrap();
    let mut other = Document::new(Arc::clone(doc.store()), Arc::new(StoreConfig::default())).unwrap();
    other.insert(0, "theirs").unwrap();
    let foreign = other.id();

    let before = doc.id();
    assert!(matches!(
      doc.switch_to(foreign, 0, &[], 0),
      Err(DocumentError::InvariantViolation(_))
    ));
    assert_eq!(doc.id(), before);
    let store = doc.store().lock();
    assert_eq!(
      store.lineage(DocKind::Draft, foreign.document_id).unwrap().head,
      Some(foreign)
    );
  }

  #[test]
  fn switch_from_attached_draft_to_its_document() {
    let mut doc = doc();
    doc.insert(0, "one\n").unwrap();
    let v0 = doc.commit(None, None).unwrap();
    doc.insert(4, "two\n").unwrap();
    assert!(doc.id().is_draft());
    let remapped = doc.switch_to(v0, 8, &[], 0).unwrap();
    assert_eq!(remapped.pos, 4);
    assert_eq!(doc.text().unwrap(), "one\n");
  }

  #[test]
  fn partial_diff_follows_range_back() {
    let mut doc = doc();
    doc.insert(0, "alpha\nbeta\n").unwrap();
    doc.freeze().unwrap();
    let first = doc.id();
    doc.insert(0, "zero\n").unwrap();
    doc.freeze().unwrap();
    doc.replace(11, 15, "BETA").unwrap();
    let last = doc.id();

    // "alpha" was copied unchanged through both later revisions.
    let alpha = doc.partial_diff(Interval::new(5, 10)).unwrap();
    assert_eq!(alpha, vec![DiffEntry {
      doc:    first,
      parent: None,
      range:  Interval::new(0, 5),
    }]);

    // "BETA" was rewritten in the last revision.
    let beta = doc.partial_diff(Interval::new(11, 15)).unwrap();
    assert_eq!(beta.first().map(|e| e.doc), Some(first));
    assert_eq!(beta.last().map(|e| e.doc), Some(last));
    assert_eq!(beta.last().map(|e| e.range), Some(Interval::new(11, 15)));
    assert_eq!(beta.last().and_then(|e| e.parent), Some(beta.len() - 2));
  }
}
