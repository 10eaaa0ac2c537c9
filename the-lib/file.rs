//! File import and export.
//!
//! [`load`] maps a file, decodes it to UTF-8, normalizes every line terminator
//! to `\n` (tallying the styles it saw) and replaces NUL bytes with a private
//! use stand-in. The decoded lines also go to an append-only buffer file; if
//! decoding fails, that file is cut back to where it was before the load.
//!
//! [`save`] runs the inverse transform line by line and writes through a
//! temporary file beside the destination, renamed over it on success.

use std::{
  fs::{
    self,
    File,
    OpenOptions,
  },
  io::{
    self,
    BufWriter,
    Write,
  },
  path::{
    Path,
    PathBuf,
  },
  time::SystemTime,
};

use memmap2::Mmap;
use ropey::{
  Rope,
  RopeBuilder,
};
use tempfile::NamedTempFile;
use the_core::{
  Eol,
  EolTally,
  chars::{
    replace_nul,
    restore_nul,
  },
};
use the_stdx::{
  path as fs_path,
  rope::RopeExt,
};
use thiserror::Error;

use crate::encoding::{
  self,
  Decoder,
  Encoder,
  EncodingError,
  TextEncoding,
};

#[derive(Debug, Error)]
pub enum FileError {
  #[error("cannot open {}: {source}", path.display())]
  Open { path: PathBuf, source: io::Error },
  #[error("conversion failed at byte {offset}: {source}")]
  Conversion {
    offset: u64,
    source: EncodingError,
  },
  #[error("{} is not writable", path.display())]
  NotWritable { path: PathBuf },
  #[error(transparent)]
  Io(#[from] io::Error),
}

impl From<EncodingError> for FileError {
  fn from(source: EncodingError) -> Self {
    Self::Conversion {
      offset: source.offset(),
      source,
    }
  }
}

impl FileError {
  /// True for an open failure caused by the file not existing.
  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::Open { source, .. } if source.kind() == io::ErrorKind::NotFound)
  }
}

pub type Result<T> = std::result::Result<T, FileError>;

/// Decoded contents of a file and what was learned about its format.
#[derive(Debug, Clone)]
pub struct ImportedText {
  pub text:     Rope,
  pub encoding: TextEncoding,
  pub bom:      bool,
  /// Majority line terminator, if the file had any.
  pub eol:      Option<Eol>,
  pub tally:    EolTally,
  /// NUL bytes replaced by the stand-in character.
  pub nuls:     usize,
  pub mtime:    Option<SystemTime>,
}

impl ImportedText {
  fn empty(mtime: Option<SystemTime>) -> Self {
    Self {
      text: Rope::new(),
      encoding: TextEncoding::Utf8,
      bom: false,
      eol: None,
      tally: EolTally::default(),
      nuls: 0,
      mtime,
    }
  }
}

/// Append-only buffer file that is truncated back to its starting length when
/// dropped without [`BufferGuard::keep`].
struct BufferGuard {
  file:  BufWriter<File>,
  start: u64,
  kept:  bool,
}

impl BufferGuard {
  fn open(path: &Path) -> io::Result<Self> {
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let start = file.metadata()?.len();
    Ok(Self {
      file: BufWriter::new(file),
      start,
      kept: false,
    })
  }

  fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
    self.file.write_all(bytes)
  }

  fn keep(mut self) -> io::Result<()> {
    self.file.flush()?;
    self.kept = true;
    Ok(())
  }
}

impl Drop for BufferGuard {
  fn drop(&mut self) {
    if self.kept {
      return;
    }
    let _ = self.file.flush();
    if let Err(err) = self.file.get_ref().set_len(self.start) {
      log::warn!("failed to truncate draft buffer: {err}");
    }
  }
}

/// Splits decoded text into `\n`-terminated lines, whatever terminator the
/// source used.
#[derive(Default)]
struct LineSplitter {
  raw:        Vec<u8>,
  line:       Vec<u8>,
  pending_cr: bool,
  tally:      EolTally,
  nuls:       usize,
}

impl LineSplitter {
  fn feed(
    &mut self,
    chunk: &[u8],
    emit: &mut impl FnMut(&[u8]) -> io::Result<()>,
  ) -> io::Result<()> {
    for &b in chunk {
      if self.pending_cr {
        self.pending_cr = false;
        if b == b'\n' {
          self.tally.push(Eol::Dos);
          self.end_line(true, emit)?;
          continue;
        }
        self.tally.push(Eol::Mac);
        self.end_line(true, emit)?;
      }
      match b {
        b'\r' => self.pending_cr = true,
        b'\n' => {
          self.tally.push(Eol::Unix);
          self.end_line(true, emit)?;
        },
        _ => self.raw.push(b),
      }
    }
    Ok(())
  }

  fn end_line(
    &mut self,
    terminated: bool,
    emit: &mut impl FnMut(&[u8]) -> io::Result<()>,
  ) -> io::Result<()> {
    self.line.clear();
    self.nuls += replace_nul(&self.raw, &mut self.line);
    if terminated {
      self.line.push(b'\n');
    }
    self.raw.clear();
    emit(&self.line)
  }

  fn finish(&mut self, emit: &mut impl FnMut(&[u8]) -> io::Result<()>) -> io::Result<()> {
    if self.pending_cr {
      self.pending_cr = false;
      self.tally.push(Eol::Mac);
      self.end_line(true, emit)?;
    }
    if !self.raw.is_empty() {
      self.end_line(false, emit)?;
    }
    Ok(())
  }
}

const DECODE_BLOCK: usize = 64 * 1024;

/// Reads `path` into a rope.
///
/// With `forced` set, no detection is done beyond stripping a matching BOM.
/// Decoded lines are appended to `buffer` when given.
pub fn load(path: &Path, forced: Option<TextEncoding>, buffer: Option<&Path>) -> Result<ImportedText> {
  let open_err = |source| {
    FileError::Open {
      path: path.to_path_buf(),
      source,
    }
  };
  let file = File::open(path).map_err(open_err)?;
  let meta = file.metadata().map_err(open_err)?;
  let mtime = meta.modified().ok();
  if meta.len() == 0 {
    log::debug!("loaded empty file {}", path.display());
    return Ok(ImportedText::empty(mtime));
  }

  // SAFETY: the map is read-only and dropped before this function returns. A
  // concurrent writer truncating the file can still fault the process, which
  // is the usual caveat of mapping files not owned by us.
  let map = unsafe { Mmap::map(&file) }.map_err(open_err)?;
  let bytes: &[u8] = &map;

  let (encoding, bom_len) = match (encoding::detect_bom(bytes), forced) {
    (Some((found, len)), None) => (found, len),
    (Some((found, len)), Some(forced)) if found == forced => (found, len),
    (_, Some(forced)) => (forced, 0),
    (None, None) => (encoding::detect(bytes), 0),
  };
  let content = &bytes[bom_len..];

  let mut guard = buffer.map(BufferGuard::open).transpose()?;
  let mut builder = RopeBuilder::new();
  let mut emit = |line: &[u8]| -> io::Result<()> {
    if let Some(guard) = guard.as_mut() {
      guard.append(line)?;
    }
    // Lines come from a UTF-8 decoder, with NULs swapped for a valid char.
    let line = std::str::from_utf8(line).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    builder.append(line);
    Ok(())
  };

  let mut decoder = Decoder::new(encoding);
  let mut splitter = LineSplitter::default();
  let mut decoded = String::with_capacity(DECODE_BLOCK);
  let mut blocks = content.chunks(DECODE_BLOCK).peekable();
  if blocks.peek().is_none() {
    decoder.decode(&[], true, &mut decoded)?;
  }
  while let Some(block) = blocks.next() {
    decoded.clear();
    let last = blocks.peek().is_none();
    if let Err(err) = decoder.decode(block, last, &mut decoded) {
      let err = match err {
        EncodingError::Malformed { offset } => EncodingError::Malformed {
          offset: offset + bom_len as u64,
        },
        other => other,
      };
      log::warn!("failed to decode {} as {encoding}: {err}", path.display());
      return Err(err.into());
    }
    splitter.feed(decoded.as_bytes(), &mut emit)?;
  }
  splitter.finish(&mut emit)?;
  drop(emit);
  drop(map);

  if let Some(guard) = guard {
    guard.keep()?;
  }

  let text = builder.finish();
  let eol = splitter.tally.majority();
  log::debug!(
    "loaded {} ({} bytes, {encoding}, bom: {}, eol: {:?})",
    path.display(),
    text.len_bytes(),
    bom_len > 0,
    eol
  );
  Ok(ImportedText {
    text,
    encoding,
    bom: bom_len > 0,
    eol,
    tally: splitter.tally,
    nuls: splitter.nuls,
    mtime,
  })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
  pub encoding: TextEncoding,
  pub eol:      Eol,
  pub bom:      bool,
  /// Write to a temporary file and rename it over the destination.
  pub atomic:   bool,
}

impl Default for SaveOptions {
  fn default() -> Self {
    Self {
      encoding: TextEncoding::Utf8,
      eol:      the_core::NATIVE_EOL,
      bom:      false,
      atomic:   true,
    }
  }
}

/// Encodes `text` line by line into `out`.
fn write_encoded(text: &Rope, options: &SaveOptions, out: &mut impl Write) -> Result<()> {
  let mut encoder = Encoder::new(options.encoding);
  let mut buf = Vec::new();
  if options.bom {
    out.write_all(options.encoding.bom())?;
  }

  let mut raw = Vec::new();
  let mut line = Vec::new();
  let len = text.len_bytes();
  let mut pos = 0;
  while pos < len {
    let newline = text.find_byte(b'\n', pos, len);
    let end = newline.unwrap_or(len);
    raw.clear();
    text.write_bytes(pos, end, &mut raw);
    line.clear();
    restore_nul(&raw, &mut line);
    let line = std::str::from_utf8(&line).map_err(|err| {
      FileError::Conversion {
        offset: (pos + err.valid_up_to()) as u64,
        source: EncodingError::Malformed {
          offset: (pos + err.valid_up_to()) as u64,
        },
      }
    })?;

    buf.clear();
    encoder.encode(line, &mut buf)?;
    if newline.is_some() {
      encoder.encode(options.eol.as_str(), &mut buf)?;
    }
    out.write_all(&buf)?;
    pos = end + 1;
  }

  buf.clear();
  encoder.finish(&mut buf)?;
  out.write_all(&buf)?;
  Ok(())
}

/// Writes `text` to `path`.
///
/// The destination is left untouched if encoding fails.
pub fn save(text: &Rope, path: &Path, options: &SaveOptions) -> Result<()> {
  if !fs_path::is_writable(path) {
    return Err(FileError::NotWritable {
      path: path.to_path_buf(),
    });
  }

  if options.atomic {
    let dir = match path.parent() {
      Some(parent) if !parent.as_os_str().is_empty() => parent,
      _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
      let mut out = BufWriter::new(tmp.as_file_mut());
      write_encoded(text, options, &mut out)?;
      out.flush()?;
    }
    tmp.as_file().sync_all()?;
    fs_path::copy_permissions(path, tmp.path())?;
    tmp.persist(path).map_err(|err| FileError::Io(err.error))?;
  } else {
    let mut encoded = Vec::with_capacity(text.len_bytes());
    write_encoded(text, options, &mut encoded)?;
    fs::write(path, encoded)?;
  }

  log::debug!(
    "saved {} ({}, eol: {}, bom: {})",
    path.display(),
    options.encoding,
    options.eol,
    options.bom
  );
  Ok(())
}
