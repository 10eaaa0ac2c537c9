//! Byte-addressed helpers for [`ropey::Rope`].
//!
//! The store addresses text by byte offset everywhere, so these helpers avoid
//! ropey's char and line indexing entirely.

use ropey::{
  Rope,
  RopeSlice,
};
pub use regex_cursor::{
  Cursor,
  Input,
  engines::meta::{
    Builder as RegexBuilder,
    Regex,
  },
  regex_automata::{
    Anchored,
    util::syntax::Config,
  },
};

pub trait RopeExt {
  /// Byte at `pos`, or `None` at or past the end.
  fn byte_at(&self, pos: usize) -> Option<u8>;

  /// Appends the bytes of `start..end` to `out`.
  fn write_bytes(&self, start: usize, end: usize, out: &mut Vec<u8>);

  fn bytes_range(&self, start: usize, end: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(end.saturating_sub(start));
    self.write_bytes(start, end, &mut out);
    out
  }

  /// First occurrence of `needle` in `from..end`.
  fn find_byte(&self, needle: u8, from: usize, end: usize) -> Option<usize>;

  /// Last occurrence of `needle` in `start..before`.
  fn rfind_byte(&self, needle: u8, start: usize, before: usize) -> Option<usize>;

  /// True if `pos` does not split a UTF-8 sequence.
  fn is_byte_boundary(&self, pos: usize) -> bool;
}

impl RopeExt for RopeSlice<'_> {
  fn byte_at(&self, pos: usize) -> Option<u8> {
    (pos < self.len_bytes()).then(|| self.byte(pos))
  }

  fn write_bytes(&self, start: usize, end: usize, out: &mut Vec<u8>) {
    let end = end.min(self.len_bytes());
    let mut pos = start;
    while pos < end {
      let (chunk, chunk_start, ..) = self.chunk_at_byte(pos);
      let chunk_end = (chunk_start + chunk.len()).min(end);
      out.extend_from_slice(&chunk.as_bytes()[pos - chunk_start..chunk_end - chunk_start]);
      pos = chunk_end;
    }
  }

  fn find_byte(&self, needle: u8, from: usize, end: usize) -> Option<usize> {
    let end = end.min(self.len_bytes());
    let mut pos = from;
    while pos < end {
      let (chunk, chunk_start, ..) = self.chunk_at_byte(pos);
      let chunk_end = (chunk_start + chunk.len()).min(end);
      let bytes = &chunk.as_bytes()[pos - chunk_start..chunk_end - chunk_start];
      if let Some(i) = bytes.iter().position(|&b| b == needle) {
        return Some(pos + i);
      }
      pos = chunk_end;
    }
    None
  }

  fn rfind_byte(&self, needle: u8, start: usize, before: usize) -> Option<usize> {
    let mut end = before.min(self.len_bytes());
    while end > start {
      let (chunk, chunk_start, ..) = self.chunk_at_byte(end - 1);
      let lo = chunk_start.max(start);
      let bytes = &chunk.as_bytes()[lo - chunk_start..end - chunk_start];
      if let Some(i) = bytes.iter().rposition(|&b| b == needle) {
        return Some(lo + i);
      }
      end = lo;
    }
    None
  }

  fn is_byte_boundary(&self, pos: usize) -> bool {
    match self.byte_at(pos) {
      Some(b) => b & 0xC0 != 0x80,
      None => pos == self.len_bytes(),
    }
  }
}

impl RopeExt for Rope {
  fn byte_at(&self, pos: usize) -> Option<u8> {
    self.slice(..).byte_at(pos)
  }

  fn write_bytes(&self, start: usize, end: usize, out: &mut Vec<u8>) {
    self.slice(..).write_bytes(start, end, out)
  }

  fn find_byte(&self, needle: u8, from: usize, end: usize) -> Option<usize> {
    self.slice(..).find_byte(needle, from, end)
  }

  fn rfind_byte(&self, needle: u8, start: usize, before: usize) -> Option<usize> {
    self.slice(..).rfind_byte(needle, start, before)
  }

  fn is_byte_boundary(&self, pos: usize) -> bool {
    self.slice(..).is_byte_boundary(pos)
  }
}

#[cfg(test)]
mod tests {
  use ropey::RopeBuilder;

  use super::*;

  fn chunked(parts: &[&str]) -> Rope {
    let mut builder = RopeBuilder::new();
    for part in parts {
      builder.append(part);
    }
    builder.finish()
  }

  #[test]
  fn find_bytes_across_chunks() {
    let text = "line one\n".repeat(200);
    let rope = chunked(&[&text, "tail"]);
    assert_eq!(rope.find_byte(b'\n', 0, rope.len_bytes()), Some(8));
    assert_eq!(rope.find_byte(b'\n', 9, rope.len_bytes()), Some(17));
    assert_eq!(
      rope.rfind_byte(b'\n', 0, rope.len_bytes()),
      Some(text.len() - 1)
    );
    assert_eq!(rope.rfind_byte(b'\n', 0, 8), None);
    assert_eq!(rope.find_byte(b'x', 0, rope.len_bytes()), None);
  }

  #[test]
  fn bytes_range_matches_string() {
    let text = "héllo wörld\n".repeat(100);
    let rope = Rope::from_str(&text);
    assert_eq!(rope.bytes_range(3, 500), text.as_bytes()[3..500].to_vec());
    assert_eq!(rope.bytes_range(10, 10), Vec::<u8>::new());
  }

  #[test]
  fn boundaries() {
    let rope = Rope::from_str("aé");
    assert!(rope.is_byte_boundary(0));
    assert!(rope.is_byte_boundary(1));
    assert!(!rope.is_byte_boundary(2));
    assert!(rope.is_byte_boundary(3));
    assert!(!rope.is_byte_boundary(4));
  }
}
