//! Revision signatures.
//!
//! A signature is a keyed SHA-256 over everything that identifies a committed
//! revision: its place in history, its text, its properties and its date. It
//! lets a later reader detect rows whose content no longer matches.

use sha2::Digest as _;

use crate::{
  lineage::RevisionRow,
  node::{
    PropMap,
    PropValue,
  },
};

pub struct Signer {
  key: [u8; 32],
}

impl Signer {
  pub fn new() -> Self {
    Self {
      key: rand::random(),
    }
  }

  pub fn with_key(key: [u8; 32]) -> Self {
    Self { key }
  }

  pub fn sign<'a>(
    &self,
    row: &RevisionRow,
    text: impl Iterator<Item = &'a str>,
    props: Option<&PropMap>,
  ) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(self.key);
    hasher.update(row.parent.unwrap_or(-1).to_le_bytes());
    hasher.update(row.length.to_le_bytes());
    hasher.update(row.date.timestamp_micros().to_le_bytes());
    for chunk in text {
      hasher.update(chunk.as_bytes());
    }
    if let Some(props) = props {
      for (key, value) in props {
        hasher.update(key.as_bytes());
        match value {
          PropValue::Bool(b) => hasher.update([0, *b as u8]),
          PropValue::Int(i) => {
            hasher.update([1]);
            hasher.update(i.to_le_bytes());
          },
          PropValue::Str(s) => {
            hasher.update([2]);
            hasher.update(s.as_bytes());
          },
        }
      }
    }
    hex(&hasher.finalize())
  }
}

impl Default for Signer {
  fn default() -> Self {
    Self::new()
  }
}

fn hex(bytes: &[u8]) -> String {
  use std::fmt::Write as _;
  let mut out = String::with_capacity(bytes.len() * 2);
  for b in bytes {
    let _ = write!(out, "{b:02x}");
  }
  out
}
