use std::{
  fs,
  path::{
    Path,
    PathBuf,
  },
  sync::Arc,
  time::SystemTime,
};

use hashbrown::HashMap;
use parking_lot::{
  Mutex,
  MutexGuard,
};
use ropey::Rope;
use the_core::{
  DocId,
  DocKind,
  DocumentId,
  NodeRef,
  VersionId,
};
use the_event::{
  DocEvent,
  EventBus,
  Subscription,
};

use crate::{
  error::{
    Result,
    StoreError,
  },
  lineage::{
    Lineage,
    RevisionRow,
    RevisionState,
  },
  mirror::{
    Mirror,
    MirrorTable,
  },
  node::{
    Node,
    NodeData,
    NodeState,
    PropMap,
  },
  sign::Signer,
};

/// Shared handle: the node store behind its coarse lock, plus the bus that
/// notifications go out on.
pub struct Store {
  nodes: Mutex<NodeStore>,
  bus:   EventBus,
}

impl Store {
  pub fn new(draft_dir: impl Into<PathBuf>) -> Arc<Self> {
    Arc::new(Self {
      nodes: Mutex::new(NodeStore::new(draft_dir.into())),
      bus:   EventBus::new(),
    })
  }

  pub fn lock(&self) -> MutexGuard<'_, NodeStore> {
    self.nodes.lock()
  }

  pub fn bus(&self) -> &EventBus {
    &self.bus
  }

  pub fn subscribe(&self) -> Subscription {
    self.bus.subscribe()
  }

  /// Emits `event` with `guard` released, then re-takes the lock.
  ///
  /// Subscribers may call back into the store while handling the event.
  pub fn notify(&self, guard: &mut MutexGuard<'_, NodeStore>, event: DocEvent) {
    MutexGuard::unlocked(guard, || self.bus.emit(event));
  }
}

/// Lineage tables, the node arena and the file mirror table.
pub struct NodeStore {
  drafts:        HashMap<DocumentId, Lineage>,
  documents:     HashMap<DocumentId, Lineage>,
  next_draft:    DocumentId,
  next_document: DocumentId,
  nodes:         HashMap<i64, Node>,
  next_node:     i64,
  mirrors:       MirrorTable,
  draft_dir:     PathBuf,
  signer:        Signer,
}

impl NodeStore {
  pub fn new(draft_dir: PathBuf) -> Self {
    Self {
      drafts: HashMap::new(),
      documents: HashMap::new(),
      next_draft: 0,
      next_document: 0,
      nodes: HashMap::new(),
      next_node: 0,
      mirrors: MirrorTable::default(),
      draft_dir,
      signer: Signer::new(),
    }
  }

  pub fn draft_storage_path(&self) -> &Path {
    &self.draft_dir
  }

  /// Random hex id used to name draft buffer files.
  pub fn random_id(&self) -> String {
    format!("{:016x}", rand::random::<u64>())
  }

  fn table(&self, kind: DocKind) -> &HashMap<DocumentId, Lineage> {
    match kind {
      DocKind::Draft => &self.drafts,
      DocKind::Document => &self.documents,
    }
  }

  fn table_mut(&mut self, kind: DocKind) -> &mut HashMap<DocumentId, Lineage> {
    match kind {
      DocKind::Draft => &mut self.drafts,
      DocKind::Document => &mut self.documents,
    }
  }

  // - Lineages ---

  fn insert_draft(&mut self) -> DocumentId {
    let id = self.next_draft;
    self.next_draft += 1;
    self.drafts.insert(id, Lineage::new(DocKind::Draft, id));
    id
  }

  /// Creates a draft with one empty, editable revision.
  pub fn new_draft(&mut self) -> DocumentId {
    let id = self.insert_draft();
    let head = self.alloc_node(
      (DocKind::Draft, id),
      0,
      NodeState::Editable,
      NodeData::Text(Rope::new()),
    );
    if let Some(lineage) = self.drafts.get_mut(&id) {
      let version = lineage.push(RevisionRow::new(head));
      lineage.head = Some(lineage.doc_id(version));
    }
    log::debug!("new draft {id}");
    id
  }

  /// Creates a document lineage with an empty history.
  pub fn new_document(&mut self) -> DocumentId {
    let id = self.next_document;
    self.next_document += 1;
    self.documents.insert(id, Lineage::new(DocKind::Document, id));
    log::debug!("new document {id}");
    id
  }

  /// Creates a draft attached to a committed revision.
  ///
  /// Version 0 is a frozen copy of `document`, version 1 an editable child of
  /// it. Both share the document's nodes. Returns the id of version 1.
  pub fn attach_draft(&mut self, document: DocId) -> Result<DocId> {
    let base = self.revision(document)?.clone();
    let draft = self.insert_draft();
    let lineage = self.lineage_mut(DocKind::Draft, draft)?;
    lineage.parent_document = Some((document.document_id, document.version_id));
    let root = RevisionRow {
      parent: None,
      state: RevisionState::Frozen,
      label: None,
      description: None,
      signature: None,
      unread: false,
      ..base
    };
    let editable = root.child(0);
    lineage.history = vec![root, editable];
    lineage.head = Some(DocId::draft(draft, 1));
    log::debug!("new draft {draft} attached to {document}");
    Ok(DocId::draft(draft, 1))
  }

  pub fn delete_draft(&mut self, id: DocumentId) -> Result<()> {
    let lineage = self
      .drafts
      .remove(&id)
      .ok_or(StoreError::UnknownLineage {
        kind: DocKind::Draft,
        id,
      })?;
    self.nodes.retain(|_, n| n.owner != (DocKind::Draft, id));
    self
      .mirrors
      .retain(|_, m| !(m.doc.is_draft() && m.doc.document_id == id));

    // A document whose head was this draft falls back to its own latest row.
    if let Some((doc, _)) = lineage.parent_document
      && let Some(parent) = self.documents.get_mut(&doc)
      && parent.head.is_some_and(|h| h.is_draft() && h.document_id == id)
    {
      parent.head = parent
        .history
        .len()
        .checked_sub(1)
        .map(|v| DocId::document(doc, v as VersionId));
    }

    self.remove_buffer_file(&lineage);
    log::debug!("deleted draft {id}");
    Ok(())
  }

  fn remove_buffer_file(&self, lineage: &Lineage) {
    let Some(buffer) = &lineage.buffer_file else {
      return;
    };
    let path = self.draft_dir.join(buffer);
    if let Err(err) = fs::remove_file(&path)
      && err.kind() != std::io::ErrorKind::NotFound
    {
      log::warn!("failed to remove buffer file {}: {err}", path.display());
    }
  }

  pub fn delete_document(&mut self, id: DocumentId) -> Result<()> {
    self
      .documents
      .remove(&id)
      .ok_or(StoreError::UnknownLineage {
        kind: DocKind::Document,
        id,
      })?;
    self.nodes.retain(|_, n| n.owner != (DocKind::Document, id));
    self
      .mirrors
      .retain(|_, m| !(m.doc.is_document() && m.doc.document_id == id));
    log::debug!("deleted document {id}");
    Ok(())
  }

  pub fn lineage(&self, kind: DocKind, id: DocumentId) -> Result<&Lineage> {
    self
      .table(kind)
      .get(&id)
      .ok_or(StoreError::UnknownLineage { kind, id })
  }

  pub fn lineage_mut(&mut self, kind: DocKind, id: DocumentId) -> Result<&mut Lineage> {
    self
      .table_mut(kind)
      .get_mut(&id)
      .ok_or(StoreError::UnknownLineage { kind, id })
  }

  pub fn contains(&self, doc: DocId) -> bool {
    self
      .table(doc.kind)
      .get(&doc.document_id)
      .is_some_and(|l| l.row(doc.version_id).is_some())
  }

  pub fn revision(&self, doc: DocId) -> Result<&RevisionRow> {
    self
      .lineage(doc.kind, doc.document_id)?
      .row(doc.version_id)
      .ok_or(StoreError::UnknownVersion(doc))
  }

  pub fn revision_mut(&mut self, doc: DocId) -> Result<&mut RevisionRow> {
    self
      .lineage_mut(doc.kind, doc.document_id)?
      .row_mut(doc.version_id)
      .ok_or(StoreError::UnknownVersion(doc))
  }

  /// Freezes `doc` and appends an editable child of it to its draft lineage.
  pub fn fork_revision(&mut self, doc: DocId) -> Result<DocId> {
    if doc.is_document() {
      return Err(StoreError::FrozenRevision(doc));
    }
    self.freeze_revision(doc)?;
    let child = self.revision(doc)?.child(doc.version_id);
    let lineage = self.lineage_mut(doc.kind, doc.document_id)?;
    let version = lineage.push(child);
    lineage.touch();
    Ok(doc.with_version(version))
  }

  /// Appends a committed row to a document lineage.
  pub fn append_document_revision(
    &mut self,
    document: DocumentId,
    row: RevisionRow,
  ) -> Result<VersionId> {
    Ok(self.lineage_mut(DocKind::Document, document)?.push(row))
  }

  /// Next version id a document lineage will hand out.
  pub fn next_document_version(&self, document: DocumentId) -> Result<VersionId> {
    Ok(self.lineage(DocKind::Document, document)?.history.len() as VersionId)
  }

  /// Freezes the nodes of `doc` and then the revision itself.
  pub fn freeze_revision(&mut self, doc: DocId) -> Result<()> {
    let row = self.revision(doc)?;
    let (head, prop) = (row.head, row.prop);
    if row.is_frozen() {
      debug_assert!(self.node(head).is_ok_and(Node::is_frozen));
      debug_assert!(prop.is_none_or(|p| self.node(p).is_ok_and(Node::is_frozen)));
      return Ok(());
    }
    self.node_mut(head)?.state = NodeState::Frozen;
    if let Some(prop) = prop {
      self.node_mut(prop)?.state = NodeState::Frozen;
    }
    self.revision_mut(doc)?.state = RevisionState::Frozen;
    log::debug!("froze {doc}");
    Ok(())
  }

  /// Points the lineage head at `doc`, and the parent document's head too if
  /// `doc` is an attached draft.
  pub fn make_head(&mut self, doc: DocId) -> Result<()> {
    let lineage = self.lineage_mut(doc.kind, doc.document_id)?;
    lineage.head = Some(doc);
    let parent = if doc.is_draft() {
      lineage.parent_document.map(|(d, _)| d)
    } else {
      None
    };
    if let Some(parent) = parent {
      self.lineage_mut(DocKind::Document, parent)?.head = Some(doc);
    }
    Ok(())
  }

  // - Nodes ---

  fn alloc_node(
    &mut self,
    owner: (DocKind, DocumentId),
    version: VersionId,
    state: NodeState,
    data: NodeData,
  ) -> NodeRef {
    let id = self.next_node;
    self.next_node += 1;
    self.nodes.insert(id, Node { owner, state, data });
    NodeRef::new(version, id)
  }

  pub fn node(&self, at: NodeRef) -> Result<&Node> {
    self.nodes.get(&at.node_id).ok_or(StoreError::UnknownNode(at))
  }

  fn node_mut(&mut self, at: NodeRef) -> Result<&mut Node> {
    self
      .nodes
      .get_mut(&at.node_id)
      .ok_or(StoreError::UnknownNode(at))
  }

  pub fn text(&self, doc: DocId) -> Result<&Rope> {
    let head = self.revision(doc)?.head;
    self.node(head)?.text(head)
  }

  pub fn text_node(&self, at: NodeRef) -> Result<&Rope> {
    self.node(at)?.text(at)
  }

  pub fn props(&self, doc: DocId) -> Result<Option<&PropMap>> {
    match self.revision(doc)?.prop {
      Some(prop) => self.node(prop)?.props(prop).map(Some),
      None => Ok(None),
    }
  }

  /// Ensures `doc` owns an editable node for `slot`, copying a frozen or
  /// foreign one first. Returns the node to write to.
  fn writable_node(&mut self, doc: DocId, slot: Slot) -> Result<NodeRef> {
    let row = self.revision(doc)?;
    if doc.is_document() || row.is_frozen() {
      return Err(StoreError::FrozenRevision(doc));
    }
    let owner = (doc.kind, doc.document_id);
    let current = match slot {
      Slot::Head => Some(row.head),
      Slot::Prop => row.prop,
    };
    if let Some(at) = current {
      // Nodes are only written by the revision that created them.
      let node = self.node(at)?;
      if !node.is_frozen() && node.owner == owner && at.version_id == doc.version_id {
        return Ok(at);
      }
    }

    let data = match current {
      Some(at) => self.node(at)?.data.clone(),
      None => NodeData::Props(PropMap::new()),
    };
    let fresh = self.alloc_node(owner, doc.version_id, NodeState::Editable, data);
    let row = self.revision_mut(doc)?;
    match slot {
      Slot::Head => row.head = fresh,
      Slot::Prop => row.prop = Some(fresh),
    }
    log::trace!("copy-on-write {current:?} -> {fresh} in {doc}");
    Ok(fresh)
  }

  /// Editable text of `doc`, copied on write if the head node is frozen.
  pub fn text_mut(&mut self, doc: DocId) -> Result<&mut Rope> {
    let at = self.writable_node(doc, Slot::Head)?;
    match &mut self.node_mut(at)?.data {
      NodeData::Text(rope) => Ok(rope),
      NodeData::Props(_) => Err(StoreError::NodeKind(at, "text")),
    }
  }

  /// Editable properties of `doc`, created or copied on write as needed.
  pub fn props_mut(&mut self, doc: DocId) -> Result<&mut PropMap> {
    let at = self.writable_node(doc, Slot::Prop)?;
    match &mut self.node_mut(at)?.data {
      NodeData::Props(map) => Ok(map),
      NodeData::Text(_) => Err(StoreError::NodeKind(at, "properties")),
    }
  }

  /// Frozen text node owned by `owner`, used for commit labels.
  pub fn new_text_node(&mut self, owner: DocId, text: &str) -> NodeRef {
    self.alloc_node(
      (owner.kind, owner.document_id),
      owner.version_id,
      NodeState::Frozen,
      NodeData::Text(Rope::from_str(text)),
    )
  }

  /// Copies `src` into a fresh, self-contained frozen node owned by `target`.
  pub fn consolidate(&mut self, src: NodeRef, target: DocId) -> Result<NodeRef> {
    let owner = (target.kind, target.document_id);
    let flat = self.node(src)?.flattened(owner);
    let id = self.next_node;
    self.next_node += 1;
    self.nodes.insert(id, flat);
    Ok(NodeRef::new(target.version_id, id))
  }

  pub fn sign_revision(&mut self, doc: DocId) -> Result<()> {
    let row = self.revision(doc)?;
    let text = self.text_node(row.head)?;
    let props = match row.prop {
      Some(p) => Some(self.node(p)?.props(p)?),
      None => None,
    };
    let signature = self.signer.sign(row, text.chunks(), props);
    self.revision_mut(doc)?.signature = Some(signature);
    Ok(())
  }

  /// Re-computes the signature of `doc` and compares it to the stored one.
  pub fn verify_revision(&self, doc: DocId) -> Result<bool> {
    let row = self.revision(doc)?;
    let Some(stored) = &row.signature else {
      return Ok(false);
    };
    let text = self.text_node(row.head)?;
    let props = match row.prop {
      Some(p) => Some(self.node(p)?.props(p)?),
      None => None,
    };
    Ok(*stored == self.signer.sign(row, text.chunks(), props))
  }

  pub fn node_count(&self) -> usize {
    self.nodes.len()
  }

  // - File mirrors ---

  pub fn get_file_mirror(&self, path: &Path) -> Option<Mirror> {
    self.mirrors.get(path)
  }

  pub fn set_file_mirror(&mut self, path: &Path, doc: DocId, mtime: Option<SystemTime>) {
    self.mirrors.set(path, doc, mtime);
  }

  pub fn set_file_mirror_to_modified(&mut self, path: &Path, doc: DocId) {
    self.mirrors.set_modified(path, doc);
  }

  pub fn remove_file_mirror(&mut self, path: &Path) -> Option<Mirror> {
    self.mirrors.remove(path)
  }

  pub fn mirror_paths_for_draft(&self, draft: DocumentId) -> Vec<PathBuf> {
    self.mirrors.paths_for_draft(draft)
  }
}

#[derive(Clone, Copy)]
enum Slot {
  Head,
  Prop,
}

/// Drafts live only as long as the store, so their buffer files go with it.
impl Drop for NodeStore {
  fn drop(&mut self) {
    for lineage in self.drafts.values() {
      self.remove_buffer_file(lineage);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::node::PropValue;

  fn store() -> NodeStore {
    NodeStore::new(std::env::temp_dir())
  }

  #[test]
  fn new_draft_has_editable_root() {
    let mut store = store();
    let id = store.new_draft();
    let doc = DocId::draft(id, 0);
    let row = store.revision(doc).unwrap();
    assert_eq!(row.state, RevisionState::Editable);
    assert_eq!(row.parent, None);
    assert_eq!(store.text(doc).unwrap().len_bytes(), 0);
    assert_eq!(store.lineage(DocKind::Draft, id).unwrap().head, Some(doc));
  }

  #[test]
  fn fork_shares_head_until_written() {
    let mut store = store();
    let doc = DocId::draft(store.new_draft(), 0);
    store.text_mut(doc).unwrap().insert(0, "abc");
    store.revision_mut(doc).unwrap().length = 3;
    store.freeze_revision(doc).unwrap();

    let child = store.fork_revision(doc).unwrap();
    let parent_head = store.revision(doc).unwrap().head;
    assert_eq!(store.revision(child).unwrap().head, parent_head);
    assert_eq!(store.revision(child).unwrap().length, 3);

    store.text_mut(child).unwrap().insert(3, "d");
    assert_ne!(store.revision(child).unwrap().head, parent_head);
    assert_eq!(store.text(doc).unwrap().to_string(), "abc");
    assert_eq!(store.text(child).unwrap().to_string(), "abcd");
  }

  #[test]
  fn fork_of_editable_revision_keeps_parent_intact() {
    let mut store = store();
    let doc = DocId::draft(store.new_draft(), 0);
    store.text_mut(doc).unwrap().insert(0, "abc");
    store.revision_mut(doc).unwrap().length = 3;
    store
      .props_mut(doc)
      .unwrap()
      .insert("name".into(), PropValue::from("a.txt"));

    let child = store.fork_revision(doc).unwrap();
    assert!(store.revision(doc).unwrap().is_frozen());
    store.text_mut(child).unwrap().insert(3, "d");
    store
      .props_mut(child)
      .unwrap()
      .insert("name".into(), PropValue::from("b.txt"));

    assert_eq!(store.text(doc).unwrap().to_string(), "abc");
    assert_eq!(
      store.props(doc).unwrap().and_then(|p| p.get("name")),
      Some(&PropValue::from("a.txt"))
    );
    assert_eq!(store.text(child).unwrap().to_string(), "abcd");
  }

  #[test]
  fn node_written_only_by_its_creating_revision() {
    let mut store = store();
    let doc = DocId::draft(store.new_draft(), 0);
    store.text_mut(doc).unwrap().insert(0, "abc");
    // An editable child that still points at its parent's unfrozen head.
    let row = store.revision(doc).unwrap().child(0);
    let lineage = store.lineage_mut(DocKind::Draft, doc.document_id).unwrap();
    let child = doc.with_version(lineage.push(row));

    store.text_mut(child).unwrap().insert(0, "x");
    assert_eq!(store.text(doc).unwrap().to_string(), "abc");
    assert_eq!(store.text(child).unwrap().to_string(), "xabc");
  }

  #[test]
  fn dropping_the_store_removes_draft_buffers() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = NodeStore::new(dir.path().to_path_buf());
    let draft = store.new_draft();
    let buffer = store.random_id();
    fs::write(dir.path().join(&buffer), b"loaded text").unwrap();
    store
      .lineage_mut(DocKind::Draft, draft)
      .unwrap()
      .buffer_file = Some(buffer.clone());

    drop(store);
    assert!(!dir.path().join(&buffer).exists());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
  }

  #[test]
  fn frozen_revision_rejects_writes() {
    let mut store = store();
    let doc = DocId::draft(store.new_draft(), 0);
    store.freeze_revision(doc).unwrap();
    assert!(matches!(
      store.text_mut(doc),
      Err(StoreError::FrozenRevision(_))
    ));
    // Freezing twice is fine and changes nothing.
    let head = store.revision(doc).unwrap().head;
    store.freeze_revision(doc).unwrap();
    assert_eq!(store.revision(doc).unwrap().head, head);
  }

  #[test]
  fn props_created_on_first_write() {
    let mut store = store();
    let doc = DocId::draft(store.new_draft(), 0);
    assert!(store.props(doc).unwrap().is_none());
    store
      .props_mut(doc)
      .unwrap()
      .insert("bom".into(), PropValue::Bool(true));
    let props = store.props(doc).unwrap().unwrap();
    assert_eq!(props.get("bom"), Some(&PropValue::Bool(true)));
  }

  #[test]
  fn attach_and_delete_draft() {
    let mut store = store();
    let document = store.new_document();
    let head = store.new_text_node(DocId::document(document, 0), "text");
    let mut row = RevisionRow::new(head);
    row.state = RevisionState::Frozen;
    row.length = 4;
    let version = store.append_document_revision(document, row).unwrap();
    let doc = DocId::document(document, version);
    store.make_head(doc).unwrap();

    let draft = store.attach_draft(doc).unwrap();
    assert_eq!(draft.version_id, 1);
    assert_eq!(store.revision(draft).unwrap().head, head);
    assert!(store.revision(draft.with_version(0)).unwrap().is_frozen());

    store.make_head(draft).unwrap();
    assert_eq!(
      store.lineage(DocKind::Document, document).unwrap().head,
      Some(draft)
    );

    let nodes = store.node_count();
    store.text_mut(draft).unwrap().insert(4, "!");
    assert_eq!(store.node_count(), nodes + 1);
    store.delete_draft(draft.document_id).unwrap();
    assert_eq!(store.node_count(), nodes);
    assert!(!store.contains(draft));
    assert_eq!(
      store.lineage(DocKind::Document, document).unwrap().head,
      Some(doc)
    );
  }

  #[test]
  fn consolidate_copies_into_target() {
    let mut store = store();
    let draft = DocId::draft(store.new_draft(), 0);
    store.text_mut(draft).unwrap().insert(0, "hello");
    let src = store.revision(draft).unwrap().head;
    let document = store.new_document();
    let target = DocId::document(document, 0);
    let copy = store.consolidate(src, target).unwrap();
    assert_ne!(copy, src);
    assert_eq!(copy.version_id, 0);
    assert_eq!(store.text_node(copy).unwrap().to_string(), "hello");
    assert!(store.node(copy).unwrap().is_frozen());

    store.delete_draft(draft.document_id).unwrap();
    assert_eq!(store.text_node(copy).unwrap().to_string(), "hello");
  }

  #[test]
  fn signatures_verify() {
    let mut store = store();
    let document = store.new_document();
    let head = store.new_text_node(DocId::document(document, 0), "signed");
    let mut row = RevisionRow::new(head);
    row.state = RevisionState::Frozen;
    let version = store.append_document_revision(document, row).unwrap();
    let doc = DocId::document(document, version);
    assert!(!store.verify_revision(doc).unwrap());
    store.sign_revision(doc).unwrap();
    assert!(store.verify_revision(doc).unwrap());
  }

  #[test]
  fn shared_store_notifies_unlocked() {
    let store = Store::new(std::env::temp_dir());
    let sub = store.subscribe();
    let mut guard = store.lock();
    let id = guard.new_draft();
    store.notify(&mut guard, DocEvent::NewRevision(DocId::draft(id, 0)));
    drop(guard);
    assert_eq!(sub.try_recv(), Some(DocEvent::NewRevision(DocId::draft(id, 0))));
  }
}
