//! Store configuration, read from TOML.
//!
//! ```toml
//! draft-dir = "/var/tmp/drafts"
//! atomic-save = true
//!
//! [format]
//! eol = "crlf"
//! encoding = "windows-1252"
//! bom = false
//! ```

use std::{
  fs,
  io::Error as IOError,
  path::{
    Path,
    PathBuf,
  },
};

use serde::Deserialize;
use the_core::Eol;
use thiserror::Error;
use toml::de::Error as TomlError;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {}: {source}", path.display())]
  Read { path: PathBuf, source: IOError },
  #[error("bad config: {0}")]
  Parse(#[from] TomlError),
}

/// Format settings applied to new documents and to empty or missing files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct FormatDefaults {
  pub eol:      Option<Eol>,
  pub encoding: Option<String>,
  pub bom:      Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct StoreConfig {
  /// Directory holding the append-only buffer files of drafts.
  pub draft_dir:   PathBuf,
  /// Save through a temporary file and rename over the target.
  pub atomic_save: bool,
  pub format:      FormatDefaults,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      draft_dir:   std::env::temp_dir().join("the-docstore").join("drafts"),
      atomic_save: true,
      format:      FormatDefaults::default(),
    }
  }
}

impl StoreConfig {
  pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
    Ok(toml::from_str(s)?)
  }

  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| {
      ConfigError::Read {
        path: path.to_path_buf(),
        source,
      }
    })?;
    Self::from_toml_str(&contents)
  }
}
