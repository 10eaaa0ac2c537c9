//! Loading documents from files and saving them back.

use std::{
  fs,
  path::{
    Path,
    PathBuf,
  },
  sync::Arc,
  time::SystemTime,
};

use the_core::DocId;
use the_event::DocEvent;
use the_stdx::path as fs_path;
use the_store::{
  PropValue,
  Store,
};

use super::{
  Document,
  properties,
};
use crate::{
  config::StoreConfig,
  encoding::TextEncoding,
  error::Result,
  file::{
    self,
    FileError,
    ImportedText,
    SaveOptions,
  },
};

/// Key a file is mirrored under.
fn mirror_key(path: &Path) -> PathBuf {
  std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

impl Document {
  /// Opens `path` as a new draft.
  ///
  /// A missing file gives an empty draft whose mirror is already marked
  /// modified. Empty and missing files get the configured format defaults.
  pub fn load(
    store: Arc<Store>,
    config: Arc<StoreConfig>,
    path: &Path,
    forced: Option<TextEncoding>,
  ) -> Result<Self> {
    let (buffer_id, buffer_path) = {
      let guard = store.lock();
      let id = guard.random_id();
      let buffer = guard.draft_storage_path().join(&id);
      (id, buffer)
    };

    let imported = match file::load(path, forced, Some(&buffer_path)) {
      Ok(imported) => Some(imported),
      Err(err) if err.is_not_found() => None,
      Err(err) => {
        if fs::metadata(&buffer_path).is_ok_and(|meta| meta.len() == 0) {
          let _ = fs::remove_file(&buffer_path);
        }
        return Err(err.into());
      },
    };

    let id = DocId::draft(store.lock().new_draft(), 0);
    let mut doc = Self::with_id(store, config, id);
    let key = mirror_key(path);
    match imported {
      None => {
        doc.apply_format_defaults()?;
        let shared = Arc::clone(&doc.store);
        let mut store = shared.lock();
        store.set_file_mirror_to_modified(&key, doc.id);
        log::info!("{} does not exist, starting empty", path.display());
        shared.notify(&mut store, DocEvent::MirrorUpdated(doc.id));
      },
      Some(imported) => {
        let empty = imported.text.len_bytes() == 0 && !imported.bom;
        if empty {
          doc.apply_format_defaults()?;
        }
        let has_buffer = buffer_path.exists();
        doc.import(imported, has_buffer.then_some(buffer_id), &key)?;
      },
    }
    doc.freeze()?;
    Ok(doc)
  }

  /// Installs loaded text into the fresh revision 0 of this draft.
  fn import(&mut self, imported: ImportedText, buffer: Option<String>, key: &Path) -> Result<()> {
    let shared = Arc::clone(&self.store);
    let mut store = shared.lock();
    let id = self.checked_id(&store)?;

    let length = imported.text.len_bytes() as u64;
    *store.text_mut(id)? = imported.text;
    store.revision_mut(id)?.length = length;

    let props = store.props_mut(id)?;
    if let Some(eol) = imported.eol {
      props.insert(properties::EOL.into(), PropValue::from(eol.property_name()));
    }
    if !imported.encoding.is_utf8() {
      props.insert(properties::ENCODING.into(), PropValue::from(imported.encoding.name()));
    }
    if imported.bom {
      props.insert(properties::BOM.into(), PropValue::Bool(true));
    }
    if let Some(name) = key.file_name().and_then(|n| n.to_str()) {
      props.insert(properties::NAME.into(), PropValue::from(name));
    }

    store.lineage_mut(id.kind, id.document_id)?.buffer_file = buffer;
    store.set_file_mirror(key, id, imported.mtime);
    log::info!(
      "loaded {} into {id} ({length} bytes, {})",
      key.display(),
      imported.encoding
    );
    shared.notify(&mut store, DocEvent::MirrorUpdated(id));
    Ok(())
  }

  /// Writes the working text to `path` in the recorded format.
  ///
  /// Afterwards the name property follows the file, the revision is frozen and
  /// the file is mirrored to it. With `keep_mirror_date` the file gets the
  /// modification time recorded for it before; a committed version stamps its
  /// commit date on the file.
  pub fn save(&mut self, path: &Path, keep_mirror_date: bool) -> Result<()> {
    self.sync();
    let options = SaveOptions {
      encoding: self.encoding()?,
      eol:      self.eol()?,
      bom:      self.bom()?,
      atomic:   self.config.atomic_save,
    };
    let text = self.rope()?;
    let key = mirror_key(path);
    let previous = self
      .store
      .lock()
      .get_file_mirror(&key)
      .and_then(|mirror| mirror.mtime);

    file::save(&text, path, &options)?;

    if self.id.is_draft() {
      if let Some(name) = key.file_name().and_then(|n| n.to_str()) {
        self.set_name(name)?;
      }
      self.freeze()?;
    }

    let shared = Arc::clone(&self.store);
    let mut store = shared.lock();
    let id = self.checked_id(&store)?;
    let stamp = if id.is_document() {
      Some(SystemTime::from(store.revision(id)?.date))
    } else if keep_mirror_date {
      previous
    } else {
      None
    };
    let mtime = match stamp {
      Some(time) => {
        fs_path::set_modified_time(path, time).map_err(FileError::from)?;
        time
      },
      None => fs_path::modified_time(path).map_err(FileError::from)?,
    };
    store.set_file_mirror(&key, id, Some(mtime));
    log::info!("saved {id} to {} as {}", path.display(), options.encoding);
    shared.notify(&mut store, DocEvent::MirrorUpdated(id));
    Ok(())
  }

  /// Whether `path` changed on disk since it was last loaded or saved through
  /// the store.
  pub fn is_modified_on_disk(&self, path: &Path) -> Result<bool> {
    let Some(mirror) = self.store.lock().get_file_mirror(&mirror_key(path)) else {
      return Ok(true);
    };
    if mirror.modified {
      return Ok(true);
    }
    match fs_path::modified_time(path) {
      Ok(mtime) => Ok(mirror.mtime != Some(mtime)),
      Err(_) => Ok(true),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use the_core::Eol;

  use super::*;
  use crate::config::FormatDefaults;

  fn setup(format: FormatDefaults) -> (tempfile::TempDir, Arc<Store>, Arc<StoreConfig>) {
    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(StoreConfig {
      draft_dir: dir.path().join("drafts"),
      format,
      ..StoreConfig::default()
    });
    let store = Store::new(config.draft_dir.clone());
    (dir, store, config)
  }

  #[test]
  fn load_records_format_and_mirror() {
    let (dir, store, config) = setup(FormatDefaults::default());
    let path = dir.path().join("dos.txt");
    fs::write(&path, b"\xEF\xBB\xBFa\r\nb\r\n").unwrap();

    let doc = Document::load(store, config, &path, None).unwrap();
    assert_eq!(doc.text().unwrap(), "a\nb\n");
    assert_eq!(doc.eol().unwrap(), Eol::Dos);
    assert!(doc.bom().unwrap());
    assert_eq!(doc.encoding().unwrap(), TextEncoding::Utf8);
    assert_eq!(doc.name().unwrap().as_deref(), Some("dos.txt"));
    assert!(!doc.is_modified_on_disk(&path).unwrap());

    let store = doc.store().lock();
    assert!(store.revision(doc.id()).unwrap().is_frozen());
    let buffer = store
      .lineage(doc.id().kind, doc.id().document_id)
      .unwrap()
      .buffer_file
      .clone()
      .unwrap();
    assert_eq!(fs::read(dir.path().join("drafts").join(buffer)).unwrap(), b"a\nb\n");
  }

  #[test]
  fn missing_file_starts_empty_with_defaults() {
    let (dir, store, config) = setup(FormatDefaults {
      eol: Some(Eol::Mac),
      ..FormatDefaults::default()
    });
    let path = dir.path().join("new.txt");
    let doc = Document::load(store, config, &path, None).unwrap();
    assert_eq!(doc.len().unwrap(), 0);
    assert_eq!(doc.eol().unwrap(), Eol::Mac);
    let mirror = doc.store().lock().get_file_mirror(&mirror_key(&path)).unwrap();
    assert!(mirror.modified);
    assert!(doc.is_modified_on_disk(&path).unwrap());
  }

  #[test]
  fn empty_file_gets_defaults_and_date() {
    let (dir, store, config) = setup(FormatDefaults {
      bom: Some(true),
      ..FormatDefaults::default()
    });
    let path = dir.path().join("empty.txt");
    fs::write(&path, b"").unwrap();
    let doc = Document::load(store, config, &path, None).unwrap();
    assert!(doc.bom().unwrap());
    let mirror = doc.store().lock().get_file_mirror(&mirror_key(&path)).unwrap();
    assert!(!mirror.modified);
    assert_eq!(mirror.mtime, Some(fs_path::modified_time(&path).unwrap()));
  }

  #[test]
  fn failed_load_leaves_no_draft() {
    let (dir, store, config) = setup(FormatDefaults::default());
    let path = dir.path().join("bad.txt");
    fs::write(&path, b"ok\n\xFF\xFE\xFA").unwrap();
    let err = Document::load(
      Arc::clone(&store),
      config,
      &path,
      Some(TextEncoding::Utf8),
    )
    .unwrap_err();
    assert!(matches!(
      err,
      crate::DocumentError::File(FileError::Conversion { offset: 3, .. })
    ));
    assert!(store.lock().get_file_mirror(&mirror_key(&path)).is_none());
  }

  #[test]
  fn save_freezes_names_and_mirrors() {
    let (dir, store, config) = setup(FormatDefaults::default());
    let mut doc = Document::new(store, config).unwrap();
    doc.insert(0, "line\n").unwrap();
    doc.set_eol(Eol::Dos).unwrap();
    let path = dir.path().join("out.txt");
    doc.save(&path, false).unwrap();

    assert_eq!(fs::read(&path).unwrap(), b"line\r\n");
    assert_eq!(doc.name().unwrap().as_deref(), Some("out.txt"));
    let saved = doc.id();
    assert!(doc.store().lock().revision(saved).unwrap().is_frozen());
    assert!(!doc.is_modified_on_disk(&path).unwrap());

    doc.insert(0, "more ").unwrap();
    assert_ne!(doc.id(), saved);
  }

  #[test]
  fn keep_mirror_date_restores_mtime() {
    let (dir, store, config) = setup(FormatDefaults::default());
    let path = dir.path().join("kept.txt");
    fs::write(&path, b"old\n").unwrap();
    let old = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000_000);
    fs_path::set_modified_time(&path, old).unwrap();

    let mut doc = Document::load(store, config, &path, None).unwrap();
    doc.insert(0, "new ").unwrap();
    doc.save(&path, true).unwrap();
    assert_eq!(fs_path::modified_time(&path).unwrap(), old);
    assert_eq!(fs::read(&path).unwrap(), b"new old\n");
  }

  #[test]
  fn committed_version_stamps_commit_date() {
    let (dir, store, config) = setup(FormatDefaults::default());
    let mut doc = Document::new(store, config).unwrap();
    doc.insert(0, "frozen\n").unwrap();
    doc.commit(None, None).unwrap();
    let path = dir.path().join("stamped.txt");
    doc.save(&path, false).unwrap();
    let secs = |t: SystemTime| t.duration_since(SystemTime::UNIX_EPOCH).unwrap().as_secs();
    let date = SystemTime::from(doc.date().unwrap());
    assert_eq!(secs(fs_path::modified_time(&path).unwrap()), secs(date));
  }
}
