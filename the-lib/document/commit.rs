use std::sync::Arc;

use the_core::{
  DocId,
  DocKind,
};
use the_event::DocEvent;
use the_store::{
  RevisionRow,
  RevisionState,
};

use super::Document;
use crate::error::{
  DocumentError,
  Result,
  ensure_invariant,
};

impl Document {
  /// Consolidates the working draft into a new committed version and moves
  /// the handle onto it.
  ///
  /// The version is appended to the document the draft was attached to, or to
  /// a new document. Mirrors of the committed revision follow it; mirrors of
  /// other revisions of the draft are marked modified. The draft is deleted.
  pub fn commit(&mut self, label: Option<&str>, description: Option<&str>) -> Result<DocId> {
    self.sync();
    if label.is_some_and(|l| l.contains('\n')) {
      return Err(DocumentError::InvariantViolation(
        "commit label must be a single line".into(),
      ));
    }
    let shared = Arc::clone(&self.store);
    let mut store = shared.lock();
    let id = self.checked_id(&store)?;
    let row = store.revision(id)?;
    let text_len = store.text_node(row.head)?.len_bytes() as u64;
    ensure_invariant!(
      row.length == text_len,
      "{id}: recorded length {} but text holds {text_len} bytes",
      row.length
    );
    if id.is_document() {
      self.new_revision(&shared, &mut store)?;
    }
    let draft = self.id;

    let source = store.revision(draft)?.clone();
    let lineage = store.lineage(DocKind::Draft, draft.document_id)?;
    let (date, attached) = (lineage.date, lineage.parent_document);

    let document = match attached {
      Some((document, _)) => document,
      None => store.new_document(),
    };
    let target = DocId::document(document, store.next_document_version(document)?);

    let label = label
      .filter(|s| !s.is_empty())
      .map(|s| store.new_text_node(target, s));
    let description = description
      .filter(|s| !s.is_empty())
      .map(|s| store.new_text_node(target, s));
    let head = store.consolidate(source.head, target)?;
    let prop = source
      .prop
      .map(|prop| store.consolidate(prop, target))
      .transpose()?;
    let length = store.text_node(head)?.len_bytes() as u64;

    let version = store.append_document_revision(document, RevisionRow {
      parent: attached.map(|(_, version)| version),
      state: RevisionState::Frozen,
      head,
      prop,
      length,
      date,
      label,
      description,
      signature: None,
      unread: false,
    })?;
    ensure_invariant!(
      version == target.version_id,
      "document {document} appended version {version}, expected {}",
      target.version_id
    );
    store.sign_revision(target)?;

    for path in store.mirror_paths_for_draft(draft.document_id) {
      let Some(mirror) = store.get_file_mirror(&path) else {
        continue;
      };
      if mirror.doc == draft && !mirror.modified {
        store.set_file_mirror(&path, target, mirror.mtime);
      } else {
        store.set_file_mirror_to_modified(&path, target);
      }
    }

    store.delete_draft(draft.document_id)?;
    self.id = target;
    store.make_head(target)?;
    log::info!("committed {draft} as {target}");

    shared.notify(&mut store, DocEvent::DocDeleted(draft));
    shared.notify(&mut store, DocEvent::Committed {
      old: draft,
      new: target,
    });
    Ok(target)
  }

  /// Label of a committed version.
  pub fn label(&self) -> Result<Option<String>> {
    let store = self.store.lock();
    let id = self.checked_id(&store)?;
    match store.revision(id)?.label {
      Some(node) => Ok(Some(store.text_node(node)?.to_string())),
      None => Ok(None),
    }
  }

  pub fn description(&self) -> Result<Option<String>> {
    let store = self.store.lock();
    let id = self.checked_id(&store)?;
    match store.revision(id)?.description {
      Some(node) => Ok(Some(store.text_node(node)?.to_string())),
      None => Ok(None),
    }
  }

  /// Whether the stored signature of a committed version still matches.
  pub fn verify(&self) -> Result<bool> {
    let store = self.store.lock();
    let id = self.checked_id(&store)?;
    Ok(store.verify_revision(id)?)
  }
}
