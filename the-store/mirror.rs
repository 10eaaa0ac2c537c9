use std::{
  path::{
    Path,
    PathBuf,
  },
  time::SystemTime,
};

use hashbrown::HashMap;
use the_core::{
  DocId,
  DocumentId,
};

/// Association between a file on disk and the revision it was loaded from or
/// saved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mirror {
  pub doc:      DocId,
  /// Modification time of the file when the association was made.
  pub mtime:    Option<SystemTime>,
  /// The file no longer corresponds to `doc` exactly.
  pub modified: bool,
}

#[derive(Debug, Default)]
pub struct MirrorTable {
  entries: HashMap<PathBuf, Mirror>,
}

impl MirrorTable {
  pub fn get(&self, path: &Path) -> Option<Mirror> {
    self.entries.get(path).copied()
  }

  pub fn set(&mut self, path: &Path, doc: DocId, mtime: Option<SystemTime>) {
    self.entries.insert(path.to_path_buf(), Mirror {
      doc,
      mtime,
      modified: false,
    });
  }

  /// Points `path` at `doc` but flags it as no longer matching the file.
  pub fn set_modified(&mut self, path: &Path, doc: DocId) {
    let mtime = self.entries.get(path).and_then(|m| m.mtime);
    self.entries.insert(path.to_path_buf(), Mirror {
      doc,
      mtime,
      modified: true,
    });
  }

  pub fn remove(&mut self, path: &Path) -> Option<Mirror> {
    self.entries.remove(path)
  }

  /// Paths mirroring any revision of the given draft.
  pub fn paths_for_draft(&self, draft: DocumentId) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = self
      .entries
      .iter()
      .filter(|(_, m)| m.doc.is_draft() && m.doc.document_id == draft)
      .map(|(p, _)| p.clone())
      .collect();
    paths.sort();
    paths
  }

  pub fn retain(&mut self, f: impl FnMut(&PathBuf, &mut Mirror) -> bool) {
    self.entries.retain(f);
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}
