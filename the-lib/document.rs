//! Handle onto one lineage of versioned text.
//!
//! A [`Document`] tracks a working [`DocId`] inside a shared [`Store`]. Reads
//! go to that revision; edits go through [`Document::prepare_for_change`],
//! which forks a fresh editable draft revision whenever the current one is
//! frozen or committed. Every public operation takes the store lock for its
//! whole duration and releases it only to emit notifications.

mod commit;
mod find;
mod history;
mod io;
mod properties;

use std::sync::Arc;

use chrono::{
  DateTime,
  Utc,
};
use parking_lot::MutexGuard;
use ropey::Rope;
use the_core::{
  DocId,
  DocKind,
  VersionId,
  chars::utf8_len,
};
use the_event::{
  DocEvent,
  Subscription,
};
use the_stdx::rope::RopeExt;
use the_store::{
  NodeStore,
  Store,
  StoreError,
  node,
};

pub use self::history::DiffEntry;
use crate::{
  config::StoreConfig,
  error::{
    DocumentError,
    Result,
    ensure_invariant,
  },
  regex::RegexCache,
};

pub struct Document {
  store:        Arc<Store>,
  config:       Arc<StoreConfig>,
  id:           DocId,
  /// Nesting depth of `start_change` groups.
  change_level: usize,
  group_notify: bool,
  group_dirty:  bool,
  regex_cache:  RegexCache,
  scratch:      Vec<u8>,
  events:       Subscription,
}

impl std::fmt::Debug for Document {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Document")
      .field("id", &self.id)
      .field("change_level", &self.change_level)
      .finish_non_exhaustive()
  }
}

impl Document {
  fn with_id(store: Arc<Store>, config: Arc<StoreConfig>, id: DocId) -> Self {
    let events = store.subscribe();
    Self {
      store,
      config,
      id,
      change_level: 0,
      group_notify: false,
      group_dirty: false,
      regex_cache: RegexCache::new(),
      scratch: Vec::new(),
      events,
    }
  }

  /// Creates an empty draft carrying the configured format defaults.
  pub fn new(store: Arc<Store>, config: Arc<StoreConfig>) -> Result<Self> {
    let id = {
      let mut guard = store.lock();
      DocId::draft(guard.new_draft(), 0)
    };
    let mut doc = Self::with_id(store, config, id);
    doc.apply_format_defaults()?;
    Ok(doc)
  }

  /// Handle onto an existing revision.
  pub fn open(store: Arc<Store>, config: Arc<StoreConfig>, id: DocId) -> Result<Self> {
    if !store.lock().contains(id) {
      return Err(DocumentError::InvalidDocument);
    }
    Ok(Self::with_id(store, config, id))
  }

  /// Another handle onto the same revision.
  pub fn try_clone(&self) -> Result<Self> {
    Self::open(Arc::clone(&self.store), Arc::clone(&self.config), self.id)
  }

  pub fn id(&self) -> DocId {
    self.id
  }

  pub fn store(&self) -> &Arc<Store> {
    &self.store
  }

  pub fn config(&self) -> &StoreConfig {
    &self.config
  }

  /// Picks up commits and deletions made through other handles.
  ///
  /// A commit of this handle's draft moves it onto the committed version; a
  /// deletion of its lineage invalidates it. Returns the drained events.
  pub fn sync(&mut self) -> Vec<DocEvent> {
    let events = self.events.drain();
    for event in &events {
      if let DocEvent::Committed { old, new } = *event
        && old.same_lineage(&self.id)
      {
        log::debug!("{} follows commit to {new}", self.id);
        self.id = new;
      }
    }
    for event in &events {
      if let DocEvent::DocDeleted(gone) = *event
        && gone.same_lineage(&self.id)
      {
        log::debug!("{} was deleted", self.id);
        self.id = DocId::default();
      }
    }
    events
  }

  /// True while the working id names a live revision.
  pub fn is_ok(&mut self) -> bool {
    self.sync();
    self.id.is_valid() && self.store.lock().contains(self.id)
  }

  fn checked_id(&self, store: &NodeStore) -> Result<DocId> {
    if self.id.is_valid() && store.contains(self.id) {
      Ok(self.id)
    } else {
      Err(DocumentError::InvalidDocument)
    }
  }

  // - Revision tree ---

  /// Moves the working id onto a new editable revision.
  ///
  /// A committed version gets a fresh attached draft; a draft revision gets an
  /// editable child sharing its nodes.
  fn new_revision(&mut self, shared: &Store, store: &mut MutexGuard<'_, NodeStore>) -> Result<DocId> {
    let id = self.checked_id(store)?;
    let next = match id.kind {
      DocKind::Document => store.attach_draft(id)?,
      DocKind::Draft => store.fork_revision(id)?,
    };
    store.make_head(next)?;
    store.lineage_mut(next.kind, next.document_id)?.touch();
    log::debug!("new revision {next} from {id}");
    self.id = next;
    shared.notify(store, DocEvent::NewRevision(next));
    Ok(next)
  }

  /// Forks unless the working revision is already an editable draft.
  fn prepare_for_change(
    &mut self,
    shared: &Store,
    store: &mut MutexGuard<'_, NodeStore>,
  ) -> Result<DocId> {
    let id = self.checked_id(store)?;
    if id.is_document() || store.revision(id)?.is_frozen() {
      self.new_revision(shared, store)?;
    }
    let id = self.id;
    ensure_invariant!(
      id.is_draft() && !store.revision(id)?.is_frozen(),
      "{id} is not an editable draft after preparing for a change"
    );
    Ok(id)
  }

  /// Reports a change to the working revision, or defers it to the end of the
  /// current group.
  fn changed(&mut self, shared: &Store, store: &mut MutexGuard<'_, NodeStore>) {
    if self.change_level > 0 {
      self.group_dirty = true;
    } else {
      shared.notify(store, DocEvent::RevisionUpdated(self.id));
    }
  }

  /// Explicitly forks a new revision, returning its id.
  pub fn fork(&mut self) -> Result<DocId> {
    self.sync();
    let shared = Arc::clone(&self.store);
    let mut store = shared.lock();
    self.new_revision(&shared, &mut store)
  }

  /// Freezes the working revision. Does nothing inside a change group or on a
  /// committed version.
  pub fn freeze(&mut self) -> Result<()> {
    if self.change_level > 0 || self.id.is_document() {
      return Ok(());
    }
    let mut store = self.store.lock();
    let id = self.checked_id(&store)?;
    store.freeze_revision(id)?;
    Ok(())
  }

  pub fn make_head(&mut self) -> Result<()> {
    let mut store = self.store.lock();
    let id = self.checked_id(&store)?;
    store.make_head(id)?;
    Ok(())
  }

  /// Starts a group of edits that end up in one revision.
  pub fn start_change(&mut self, notify: bool) -> Result<()> {
    if self.change_level == 0 {
      self.freeze()?;
      self.group_notify = notify;
      self.group_dirty = false;
    }
    self.change_level += 1;
    Ok(())
  }

  /// Closes a group. The outermost close freezes the revision and reports the
  /// change.
  pub fn end_change(&mut self) -> Result<()> {
    if self.change_level == 0 {
      return Err(DocumentError::InvariantViolation(
        "end_change without start_change".into(),
      ));
    }
    self.change_level -= 1;
    if self.change_level > 0 {
      return Ok(());
    }
    self.freeze()?;
    if self.group_notify && self.group_dirty {
      let shared = Arc::clone(&self.store);
      let mut store = shared.lock();
      shared.notify(&mut store, DocEvent::RevisionUpdated(self.id));
    }
    self.group_dirty = false;
    Ok(())
  }

  pub fn in_change(&self) -> bool {
    self.change_level > 0
  }

  /// Deletes the working lineage. The handle is invalid afterwards.
  pub fn delete(&mut self) -> Result<()> {
    self.sync();
    let shared = Arc::clone(&self.store);
    let mut store = shared.lock();
    let id = self.checked_id(&store)?;
    match id.kind {
      DocKind::Draft => store.delete_draft(id.document_id)?,
      DocKind::Document => store.delete_document(id.document_id)?,
    }
    self.id = DocId::default();
    shared.notify(&mut store, DocEvent::DocDeleted(id));
    Ok(())
  }

  // - Edits ---

  /// Runs `op` on the working text, forking first if needed.
  ///
  /// `op` sees a structural copy of the text, so a rejected position leaves
  /// the revision tree untouched.
  fn edit<T>(&mut self, op: impl FnOnce(&mut Rope) -> the_store::Result<T>) -> Result<T> {
    self.sync();
    let shared = Arc::clone(&self.store);
    let mut store = shared.lock();
    let id = self.checked_id(&store)?;

    let recorded = store.revision(id)?.length;
    let mut text = store.text(id)?.clone();
    ensure_invariant!(
      recorded == text.len_bytes() as u64,
      "{id}: recorded length {recorded} but text holds {} bytes",
      text.len_bytes()
    );
    let out = op(&mut text)?;

    let id = self.prepare_for_change(&shared, &mut store)?;
    let len = text.len_bytes() as u64;
    *store.text_mut(id)? = text;
    store.revision_mut(id)?.length = len;
    store.lineage_mut(id.kind, id.document_id)?.touch();
    self.changed(&shared, &mut store);
    Ok(out)
  }

  /// Inserts `text` at byte `pos`, returning the bytes inserted.
  pub fn insert(&mut self, pos: usize, text: &str) -> Result<usize> {
    if text.is_empty() {
      return Ok(0);
    }
    self.edit(|rope| node::insert(rope, pos, text))
  }

  /// Removes `start..end`, returning the bytes removed.
  pub fn delete_range(&mut self, start: usize, end: usize) -> Result<usize> {
    if start == end {
      return Ok(0);
    }
    self.edit(|rope| node::delete(rope, start, end))
  }

  /// Removes the character after (`forward`) or before `pos`.
  pub fn delete_char(&mut self, pos: usize, forward: bool) -> Result<usize> {
    let (start, end) = if forward {
      (pos, self.next_char_pos(pos)?)
    } else {
      (self.prev_char_pos(pos)?, pos)
    };
    self.delete_range(start, end)
  }

  pub fn delete_all(&mut self) -> Result<usize> {
    if self.len()? == 0 {
      return Ok(0);
    }
    self.edit(|rope| {
      let len = rope.len_bytes();
      node::clear(rope);
      Ok(len)
    })
  }

  /// Moves `src_start..src_end` to `dest`, given in pre-move coordinates.
  pub fn move_range(&mut self, src_start: usize, src_end: usize, dest: usize) -> Result<()> {
    if src_start == src_end {
      return Ok(());
    }
    self.edit(|rope| node::move_range(rope, src_start, src_end, dest))
  }

  /// Replaces `start..end` with `text`, returning the bytes inserted.
  pub fn replace(&mut self, start: usize, end: usize, text: &str) -> Result<usize> {
    if start == end && text.is_empty() {
      return Ok(0);
    }
    self.edit(|rope| node::replace(rope, start, end, text))
  }

  // - Text access ---

  /// Structural copy of the working text.
  pub fn rope(&self) -> Result<Rope> {
    let store = self.store.lock();
    let id = self.checked_id(&store)?;
    Ok(store.text(id)?.clone())
  }

  fn rope_at(&self, doc: DocId) -> Result<Rope> {
    Ok(self.store.lock().text(doc)?.clone())
  }

  pub fn text(&self) -> Result<String> {
    Ok(self.rope()?.to_string())
  }

  pub fn len(&self) -> Result<usize> {
    let store = self.store.lock();
    let id = self.checked_id(&store)?;
    Ok(store.revision(id)?.length as usize)
  }

  pub fn text_range(&self, start: usize, end: usize) -> Result<String> {
    slice_string(&self.rope()?, start, end)
  }

  /// Text of another version of this lineage.
  pub fn text_range_at(&self, version: VersionId, start: usize, end: usize) -> Result<String> {
    slice_string(&self.rope_at(self.id.with_version(version))?, start, end)
  }

  /// Character starting at `pos`, or `None` at the end.
  pub fn char_at(&self, pos: usize) -> Result<Option<char>> {
    let rope = self.rope()?;
    check_boundary(&rope, pos)?;
    if pos == rope.len_bytes() {
      return Ok(None);
    }
    Ok(Some(rope.char(rope.byte_to_char(pos))))
  }

  pub fn len_in_chars(&self, start: usize, end: usize) -> Result<usize> {
    let rope = self.rope()?;
    check_boundary(&rope, start)?;
    check_boundary(&rope, end)?;
    Ok(rope.byte_to_char(end.max(start)) - rope.byte_to_char(start))
  }

  /// Start of the character after the one at `pos`, clamped to the length.
  pub fn next_char_pos(&self, pos: usize) -> Result<usize> {
    let rope = self.rope()?;
    Ok(match rope.byte_at(pos) {
      Some(lead) => (pos + utf8_len(lead)).min(rope.len_bytes()),
      None => rope.len_bytes(),
    })
  }

  /// Start of the character before `pos`.
  pub fn prev_char_pos(&self, pos: usize) -> Result<usize> {
    let rope = self.rope()?;
    let mut pos = pos.min(rope.len_bytes());
    if pos == 0 {
      return Ok(0);
    }
    pos -= 1;
    while pos > 0 && !rope.is_byte_boundary(pos) {
      pos -= 1;
    }
    Ok(pos)
  }

  /// `pos` clamped to the text and moved back onto a character boundary.
  pub fn valid_char_pos(&self, pos: usize) -> Result<usize> {
    let rope = self.rope()?;
    let mut pos = pos.min(rope.len_bytes());
    while pos > 0 && !rope.is_byte_boundary(pos) {
      pos -= 1;
    }
    Ok(pos)
  }

  /// Offset just past the `\n` before `pos`, or 0.
  pub fn line_start(&self, pos: usize) -> Result<usize> {
    let rope = self.rope()?;
    let pos = pos.min(rope.len_bytes());
    Ok(rope.rfind_byte(b'\n', 0, pos).map_or(0, |nl| nl + 1))
  }

  /// Offset of the `\n` at or after `pos`, or the length.
  pub fn line_end(&self, pos: usize) -> Result<usize> {
    let rope = self.rope()?;
    let len = rope.len_bytes();
    Ok(rope.find_byte(b'\n', pos.min(len), len).unwrap_or(len))
  }

  /// Copies the line containing `pos`, terminator included, into `out` and
  /// returns the offset just past it.
  pub fn line_at(&self, pos: usize, out: &mut Vec<u8>) -> Result<usize> {
    let rope = self.rope()?;
    let len = rope.len_bytes();
    let pos = pos.min(len);
    let start = rope.rfind_byte(b'\n', 0, pos).map_or(0, |nl| nl + 1);
    let end = rope.find_byte(b'\n', pos, len).map_or(len, |nl| nl + 1);
    out.clear();
    rope.write_bytes(start, end, out);
    Ok(end)
  }

  /// End offset of every line, the unterminated last line included.
  pub fn line_offsets(&self) -> Result<Vec<usize>> {
    let rope = self.rope()?;
    let len = rope.len_bytes();
    let mut offsets = Vec::new();
    let mut pos = 0;
    while pos < len {
      let end = rope.find_byte(b'\n', pos, len).map_or(len, |nl| nl + 1);
      offsets.push(end);
      pos = end;
    }
    Ok(offsets)
  }

  // - Lineage queries ---

  pub fn version_count(&self) -> Result<usize> {
    let store = self.store.lock();
    let id = self.checked_id(&store)?;
    Ok(store.lineage(id.kind, id.document_id)?.history.len())
  }

  pub fn version_length(&self, version: VersionId) -> Result<usize> {
    let store = self.store.lock();
    Ok(store.revision(self.id.with_version(version))?.length as usize)
  }

  /// A fresh draft nobody has written to.
  pub fn is_empty(&self) -> Result<bool> {
    let store = self.store.lock();
    let id = self.checked_id(&store)?;
    if id.is_document() {
      return Ok(false);
    }
    let lineage = store.lineage(id.kind, id.document_id)?;
    Ok(
      lineage.parent_document.is_none()
        && lineage.history.len() <= 1
        && store.revision(id)?.length == 0,
    )
  }

  pub fn is_draft_attached(&self) -> Result<bool> {
    let store = self.store.lock();
    let id = self.checked_id(&store)?;
    Ok(id.is_draft() && store.lineage(id.kind, id.document_id)?.parent_document.is_some())
  }

  /// Parent version of a draft revision.
  pub fn draft_parent(&self, version: VersionId) -> Result<Option<VersionId>> {
    if !self.id.is_draft() {
      return Err(DocumentError::NotDraft);
    }
    let store = self.store.lock();
    Ok(store.revision(self.id.with_version(version))?.parent)
  }

  /// Last change of a draft, or the commit date of a version.
  pub fn date(&self) -> Result<DateTime<Utc>> {
    let store = self.store.lock();
    let id = self.checked_id(&store)?;
    Ok(match id.kind {
      DocKind::Draft => store.lineage(id.kind, id.document_id)?.date,
      DocKind::Document => store.revision(id)?.date,
    })
  }

  /// Marks a committed version read or unread.
  pub fn set_read(&mut self, read: bool) -> Result<()> {
    let shared = Arc::clone(&self.store);
    let mut store = shared.lock();
    let id = self.checked_id(&store)?;
    if id.is_draft() {
      return Ok(());
    }
    let row = store.revision_mut(id)?;
    if row.unread == !read {
      return Ok(());
    }
    row.unread = !read;
    shared.notify(&mut store, DocEvent::DocUpdated(id));
    Ok(())
  }

  pub fn is_unread(&self) -> Result<bool> {
    let store = self.store.lock();
    let id = self.checked_id(&store)?;
    Ok(store.revision(id)?.unread)
  }
}

fn check_boundary(rope: &Rope, pos: usize) -> Result<()> {
  let len = rope.len_bytes();
  if pos > len {
    return Err(StoreError::OutOfRange { pos, len }.into());
  }
  if !rope.is_byte_boundary(pos) {
    return Err(StoreError::NotCharBoundary(pos).into());
  }
  Ok(())
}

fn slice_string(rope: &Rope, start: usize, end: usize) -> Result<String> {
  check_boundary(rope, start)?;
  check_boundary(rope, end)?;
  if start > end {
    return Err(StoreError::OutOfRange { pos: start, len: end }.into());
  }
  Ok(rope.byte_slice(start..end).to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn doc() -> Document {
    let config = Arc::new(StoreConfig::default());
    let store = Store::new(std::env::temp_dir());
    Document::new(store, config).unwrap()
  }

  #[test]
  fn edits_on_fresh_draft_stay_in_place() {
    let mut doc = doc();
    let id = doc.id();
    assert!(doc.is_empty().unwrap());
    assert_eq!(doc.insert(0, "hello").unwrap(), 5);
    assert_eq!(doc.insert(5, " world").unwrap(), 6);
    assert_eq!(doc.id(), id);
    assert_eq!(doc.text().unwrap(), "hello world");
    assert_eq!(doc.len().unwrap(), 11);
    assert!(!doc.is_empty().unwrap());
  }

  #[test]
  fn frozen_revision_forks_on_edit() {
    let mut doc = doc();
    doc.insert(0, "abc").unwrap();
    doc.freeze().unwrap();
    doc.freeze().unwrap();
    let frozen = doc.id();

    doc.insert(3, "d").unwrap();
    assert_ne!(doc.id(), frozen);
    assert_eq!(doc.draft_parent(doc.id().version_id).unwrap(), Some(frozen.version_id));
    assert_eq!(doc.text_range_at(frozen.version_id, 0, 3).unwrap(), "abc");
    assert_eq!(doc.text().unwrap(), "abcd");
  }

  #[test]
  fn explicit_fork_leaves_parent_untouched() {
    let mut doc = doc();
    doc.insert(0, "abc").unwrap();
    doc.set_name("a.txt").unwrap();
    let parent = doc.id();
    doc.fork().unwrap();
    doc.insert(3, "d").unwrap();
    doc.set_name("b.txt").unwrap();

    assert_eq!(doc.rope_at(parent).unwrap().to_string(), "abc");
    assert_eq!(doc.version_length(parent.version_id).unwrap(), 3);
    assert!(!doc.properties_changed(parent, parent).unwrap());
    assert!(doc.properties_changed(parent, doc.id()).unwrap());

    // Back on the parent, the next edit forks again and sees the old text.
    doc.switch_to(parent, 0, &[], 0).unwrap();
    assert_eq!(doc.name().unwrap().as_deref(), Some("a.txt"));
    doc.insert(0, "x").unwrap();
    assert_ne!(doc.id(), parent);
    assert_eq!(doc.text().unwrap(), "xabc");
  }

  #[test]
  fn rejected_position_does_not_fork() {
    let mut doc = doc();
    doc.insert(0, "h\u{e9}").unwrap();
    doc.freeze().unwrap();
    let before = doc.id();
    assert!(matches!(
      doc.insert(2, "x"),
      Err(DocumentError::Store(StoreError::NotCharBoundary(2)))
    ));
    assert!(matches!(
      doc.delete_range(0, 10),
      Err(DocumentError::Store(StoreError::OutOfRange { .. }))
    ));
    assert_eq!(doc.id(), before);
    assert_eq!(doc.version_count().unwrap(), 1);
  }

  #[test]
  fn delete_variants() {
    let mut doc = doc();
    doc.insert(0, "a\u{e9}b").unwrap();
    assert_eq!(doc.delete_char(1, true).unwrap(), 2);
    assert_eq!(doc.text().unwrap(), "ab");
    assert_eq!(doc.delete_char(2, false).unwrap(), 1);
    assert_eq!(doc.text().unwrap(), "a");
    assert_eq!(doc.delete_char(1, true).unwrap(), 0);
    assert_eq!(doc.delete_all().unwrap(), 1);
    assert_eq!(doc.len().unwrap(), 0);
  }

  #[test]
  fn move_and_replace() {
    let mut doc = doc();
    doc.insert(0, "one two three").unwrap();
    doc.move_range(0, 4, 13).unwrap();
    assert_eq!(doc.text().unwrap(), "two threeone ");
    assert_eq!(doc.replace(0, 3, "2").unwrap(), 1);
    assert_eq!(doc.text().unwrap(), "2 threeone ");
  }

  #[test]
  fn grouped_changes_share_a_revision() {
    let mut doc = doc();
    doc.insert(0, "base").unwrap();
    let sub = doc.store().subscribe();
    doc.start_change(true).unwrap();
    doc.insert(4, "1").unwrap();
    let grouped = doc.id();
    doc.start_change(true).unwrap();
    doc.insert(5, "2").unwrap();
    doc.freeze().unwrap();
    doc.insert(6, "3").unwrap();
    doc.end_change().unwrap();
    assert!(doc.in_change());
    doc.end_change().unwrap();
    assert!(!doc.in_change());

    assert_eq!(doc.id(), grouped);
    assert_eq!(doc.text().unwrap(), "base123");
    let updates = sub
      .drain()
      .into_iter()
      .filter(|e| matches!(e, DocEvent::RevisionUpdated(_)))
      .count();
    assert_eq!(updates, 1);
    assert!(doc.end_change().is_err());
  }

  #[test]
  fn character_positions() {
    let mut doc = doc();
    doc.insert(0, "a\u{e9}\u{1F600}").unwrap();
    assert_eq!(doc.next_char_pos(1).unwrap(), 3);
    assert_eq!(doc.next_char_pos(3).unwrap(), 7);
    assert_eq!(doc.next_char_pos(7).unwrap(), 7);
    assert_eq!(doc.prev_char_pos(7).unwrap(), 3);
    assert_eq!(doc.prev_char_pos(3).unwrap(), 1);
    assert_eq!(doc.prev_char_pos(0).unwrap(), 0);
    assert_eq!(doc.valid_char_pos(5).unwrap(), 3);
    assert_eq!(doc.valid_char_pos(99).unwrap(), 7);
    assert_eq!(doc.char_at(1).unwrap(), Some('\u{e9}'));
    assert_eq!(doc.char_at(7).unwrap(), None);
    assert!(doc.char_at(2).is_err());
    assert_eq!(doc.len_in_chars(0, 7).unwrap(), 3);
  }

  #[test]
  fn line_helpers() {
    let mut doc = doc();
    doc.insert(0, "ab\ncd\nef").unwrap();
    assert_eq!(doc.line_start(4).unwrap(), 3);
    assert_eq!(doc.line_start(2).unwrap(), 0);
    assert_eq!(doc.line_end(4).unwrap(), 5);
    assert_eq!(doc.line_end(7).unwrap(), 8);
    let mut line = Vec::new();
    assert_eq!(doc.line_at(3, &mut line).unwrap(), 6);
    assert_eq!(line, b"cd\n");
    assert_eq!(doc.line_offsets().unwrap(), vec![3, 6, 8]);
    assert_eq!(doc.text_range(3, 5).unwrap(), "cd");
  }

  #[test]
  fn second_handle_follows_deletion() {
    let mut doc = doc();
    let mut other = doc.try_clone().unwrap();
    assert!(other.is_ok());
    doc.delete().unwrap();
    assert!(!doc.is_ok());
    assert!(!other.is_ok());
    assert!(matches!(other.insert(0, "x"), Err(DocumentError::InvalidDocument)));
  }
}
