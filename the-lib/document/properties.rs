//! Per-revision properties and the typed format accessors built on them.

use std::sync::Arc;

use the_core::{
  Eol,
  NATIVE_EOL,
};
use the_store::{
  PropMap,
  PropValue,
};

use super::Document;
use crate::{
  encoding::TextEncoding,
  error::Result,
};

pub const NAME: &str = "name";
pub const EOL: &str = "eol";
pub const ENCODING: &str = "encoding";
pub const BOM: &str = "bom";

impl Document {
  /// Snapshot of every property of the working revision.
  pub fn properties(&self) -> Result<PropMap> {
    let store = self.store.lock();
    let id = self.checked_id(&store)?;
    Ok(store.props(id)?.cloned().unwrap_or_default())
  }

  pub fn get_property(&self, key: &str) -> Result<Option<PropValue>> {
    let store = self.store.lock();
    let id = self.checked_id(&store)?;
    Ok(store.props(id)?.and_then(|map| map.get(key).cloned()))
  }

  pub fn has_property(&self, key: &str) -> Result<bool> {
    Ok(self.get_property(key)?.is_some())
  }

  /// Sets `key`, forking first if needed. Setting the current value does
  /// nothing.
  pub fn set_property(&mut self, key: &str, value: impl Into<PropValue>) -> Result<()> {
    let value = value.into();
    if self.get_property(key)?.as_ref() == Some(&value) {
      return Ok(());
    }
    self.sync();
    let shared = Arc::clone(&self.store);
    let mut store = shared.lock();
    let id = self.prepare_for_change(&shared, &mut store)?;
    store.props_mut(id)?.insert(key.to_owned(), value);
    self.changed(&shared, &mut store);
    Ok(())
  }

  /// Removes `key`, returning whether it was present.
  pub fn remove_property(&mut self, key: &str) -> Result<bool> {
    if !self.has_property(key)? {
      return Ok(false);
    }
    self.sync();
    let shared = Arc::clone(&self.store);
    let mut store = shared.lock();
    let id = self.prepare_for_change(&shared, &mut store)?;
    store.props_mut(id)?.remove(key);
    self.changed(&shared, &mut store);
    Ok(true)
  }

  pub fn name(&self) -> Result<Option<String>> {
    Ok(
      self
        .get_property(NAME)?
        .and_then(|v| v.as_str().map(str::to_owned)),
    )
  }

  pub fn set_name(&mut self, name: &str) -> Result<()> {
    self.set_property(NAME, name)
  }

  /// Line terminator used on save.
  pub fn eol(&self) -> Result<Eol> {
    let value = self.get_property(EOL)?;
    Ok(
      value
        .as_ref()
        .and_then(PropValue::as_str)
        .and_then(Eol::from_property_name)
        .unwrap_or(NATIVE_EOL),
    )
  }

  pub fn set_eol(&mut self, eol: Eol) -> Result<()> {
    if self.has_property(EOL)? && self.eol()? == eol {
      return Ok(());
    }
    self.set_property(EOL, eol.property_name())
  }

  /// Encoding used on save. An unknown label falls back to UTF-8.
  pub fn encoding(&self) -> Result<TextEncoding> {
    let Some(label) = self.get_property(ENCODING)? else {
      return Ok(TextEncoding::Utf8);
    };
    let label = label.as_str().unwrap_or_default();
    Ok(TextEncoding::for_label(label).unwrap_or_else(|| {
      log::warn!("unknown encoding {label:?} on {}, using UTF-8", self.id);
      TextEncoding::Utf8
    }))
  }

  /// Stores `encoding`; UTF-8 is the implied default and clears the property.
  pub fn set_encoding(&mut self, encoding: TextEncoding) -> Result<()> {
    if encoding.is_utf8() {
      self.remove_property(ENCODING).map(drop)
    } else {
      self.set_property(ENCODING, encoding.name())
    }
  }

  pub fn bom(&self) -> Result<bool> {
    Ok(
      self
        .get_property(BOM)?
        .and_then(|v| v.as_bool())
        .unwrap_or(false),
    )
  }

  pub fn set_bom(&mut self, bom: bool) -> Result<()> {
    if self.bom()? == bom {
      return Ok(());
    }
    self.set_property(BOM, bom)
  }

  /// Applies the configured format defaults to the working revision.
  pub(super) fn apply_format_defaults(&mut self) -> Result<()> {
    let format = self.config.format.clone();
    if let Some(eol) = format.eol {
      self.set_eol(eol)?;
    }
    if let Some(label) = format.encoding.as_deref() {
      match TextEncoding::for_label(label) {
        Some(encoding) => self.set_encoding(encoding)?,
        None => log::warn!("ignoring unknown default encoding {label:?}"),
      }
    }
    if let Some(bom) = format.bom {
      self.set_bom(bom)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use the_store::Store;

  use super::*;
  use crate::config::{
    FormatDefaults,
    StoreConfig,
  };

  fn doc_with(format: FormatDefaults) -> Document {
    let config = Arc::new(StoreConfig {
      format,
      ..StoreConfig::default()
    });
    let store = Store::new(std::env::temp_dir());
    Document::new(store, config).unwrap()
  }

  #[test]
  fn defaults_apply_to_new_documents() {
    let doc = doc_with(FormatDefaults {
      eol:      Some(Eol::Dos),
      encoding: Some("latin1".into()),
      bom:      Some(true),
    });
    assert_eq!(doc.eol().unwrap(), Eol::Dos);
    assert_eq!(doc.encoding().unwrap().name(), "windows-1252");
    assert!(doc.bom().unwrap());
    assert_eq!(doc.version_count().unwrap(), 1);
  }

  #[test]
  fn unset_properties_fall_back() {
    let doc = doc_with(FormatDefaults::default());
    assert_eq!(doc.eol().unwrap(), NATIVE_EOL);
    assert_eq!(doc.encoding().unwrap(), TextEncoding::Utf8);
    assert!(!doc.bom().unwrap());
    assert_eq!(doc.name().unwrap(), None);
    assert!(doc.properties().unwrap().is_empty());
  }

  #[test]
  fn setting_current_value_does_not_fork() {
    let mut doc = doc_with(FormatDefaults::default());
    doc.set_name("notes.txt").unwrap();
    doc.freeze().unwrap();
    let frozen = doc.id();

    doc.set_name("notes.txt").unwrap();
    doc.set_bom(false).unwrap();
    assert_eq!(doc.id(), frozen);

    doc.set_name("todo.txt").unwrap();
    assert_ne!(doc.id(), frozen);
    assert_eq!(doc.name().unwrap().as_deref(), Some("todo.txt"));
  }

  #[test]
  fn generic_properties() {
    let mut doc = doc_with(FormatDefaults::default());
    doc.set_property("tab-width", 4i64).unwrap();
    assert_eq!(doc.get_property("tab-width").unwrap(), Some(PropValue::Int(4)));
    assert!(doc.has_property("tab-width").unwrap());
    assert!(doc.remove_property("tab-width").unwrap());
    assert!(!doc.remove_property("tab-width").unwrap());
    assert!(!doc.has_property("tab-width").unwrap());
  }

  #[test]
  fn unknown_encoding_label_falls_back() {
    let mut doc = doc_with(FormatDefaults::default());
    doc.set_property(ENCODING, "no-such-charset").unwrap();
    assert_eq!(doc.encoding().unwrap(), TextEncoding::Utf8);
  }
}
