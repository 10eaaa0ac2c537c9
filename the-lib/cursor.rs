//! Bounds-checked byte cursor over a revision's text.
//!
//! [`ByteCursor`] walks the logical byte sequence of a rope while caching the
//! contiguous chunk it currently sits in, so sequential access only touches the
//! tree when it steps into a neighbouring chunk. Reading at the end yields
//! [`END_SENTINEL`] instead of panicking.
//!
//! The cursor also implements [`the_stdx::rope::Cursor`], which lets the regex
//! engine scan a revision chunk by chunk without copying it into one buffer.

use std::cmp::Ordering;

use ropey::Rope;
use the_stdx::rope::Cursor;

/// Value returned when reading at or past the end of the text.
pub const END_SENTINEL: u8 = 0;

#[derive(Clone, Debug)]
pub struct ByteCursor<'a> {
  text:      &'a Rope,
  len:       usize,
  index:     usize,
  seg_start: usize,
  seg:       &'a [u8],
}

impl<'a> ByteCursor<'a> {
  /// Cursor at `index`, clamped to the text length.
  pub fn at(text: &'a Rope, index: usize) -> Self {
    let len = text.len_bytes();
    let mut cursor = Self {
      text,
      len,
      index: index.min(len),
      seg_start: 0,
      seg: &[],
    };
    cursor.load_segment();
    cursor
  }

  fn load_segment(&mut self) {
    let (chunk, start, ..) = self.text.chunk_at_byte(self.index.min(self.len));
    self.seg_start = start;
    self.seg = chunk.as_bytes();
  }

  #[inline]
  fn seg_end(&self) -> usize {
    self.seg_start + self.seg.len()
  }

  #[inline]
  fn in_segment(&self, pos: usize) -> bool {
    self.seg_start <= pos && pos < self.seg_end()
  }

  #[inline]
  fn refresh(&mut self) {
    if self.index < self.len && !self.in_segment(self.index) {
      self.load_segment();
    }
  }

  #[inline]
  pub fn index(&self) -> usize {
    self.index
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.len
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  #[inline]
  pub fn is_end(&self) -> bool {
    self.index == self.len
  }

  /// Byte under the cursor.
  #[inline]
  pub fn byte(&self) -> u8 {
    if self.in_segment(self.index) {
      self.seg[self.index - self.seg_start]
    } else {
      END_SENTINEL
    }
  }

  /// Byte `offset` positions away from the cursor.
  pub fn peek(&self, offset: isize) -> u8 {
    let Some(pos) = self.index.checked_add_signed(offset) else {
      return END_SENTINEL;
    };
    if self.in_segment(pos) {
      self.seg[pos - self.seg_start]
    } else if pos < self.len {
      self.text.byte(pos)
    } else {
      END_SENTINEL
    }
  }

  /// Steps forward one byte. Returns false at the end.
  #[inline]
  pub fn advance(&mut self) -> bool {
    if self.index >= self.len {
      return false;
    }
    self.index += 1;
    self.refresh();
    true
  }

  /// Steps back one byte. Returns false at the start.
  #[inline]
  pub fn retreat(&mut self) -> bool {
    if self.index == 0 {
      return false;
    }
    self.index -= 1;
    self.refresh();
    true
  }

  /// Moves by `delta` bytes, clamping to `0..=len`.
  pub fn seek(&mut self, delta: isize) {
    self.index = self
      .index
      .checked_add_signed(delta)
      .unwrap_or(0)
      .min(self.len);
    self.refresh();
  }

  /// Jumps to an absolute index, clamped to the text length.
  pub fn set_index(&mut self, index: usize) {
    self.index = index.min(self.len);
    self.refresh();
  }

  /// True if the text at the cursor begins with `bytes`.
  pub fn starts_with(&self, bytes: &[u8]) -> bool {
    if self.index + bytes.len() > self.len {
      return false;
    }
    let mut pos = self.index;
    let mut rest = bytes;
    if self.in_segment(pos) {
      let avail = &self.seg[pos - self.seg_start..];
      let n = avail.len().min(rest.len());
      if avail[..n] != rest[..n] {
        return false;
      }
      pos += n;
      rest = &rest[n..];
    }
    while !rest.is_empty() {
      let (chunk, start, ..) = self.text.chunk_at_byte(pos);
      let avail = &chunk.as_bytes()[pos - start..];
      let n = avail.len().min(rest.len());
      if avail[..n] != rest[..n] {
        return false;
      }
      pos += n;
      rest = &rest[n..];
    }
    true
  }

  /// Rest of the cached segment from the cursor on.
  pub fn segment(&self) -> &'a [u8] {
    if self.in_segment(self.index) {
      &self.seg[self.index - self.seg_start..]
    } else {
      &[]
    }
  }
}

impl PartialEq for ByteCursor<'_> {
  fn eq(&self, other: &Self) -> bool {
    self.index == other.index
  }
}

impl Eq for ByteCursor<'_> {}

impl PartialOrd for ByteCursor<'_> {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for ByteCursor<'_> {
  fn cmp(&self, other: &Self) -> Ordering {
    self.index.cmp(&other.index)
  }
}

impl Cursor for ByteCursor<'_> {
  fn chunk(&self) -> &[u8] {
    self.seg
  }

  fn utf8_aware(&self) -> bool {
    true
  }

  fn advance(&mut self) -> bool {
    let next = self.seg_end();
    if next >= self.len {
      return false;
    }
    self.index = next;
    self.load_segment();
    true
  }

  fn backtrack(&mut self) -> bool {
    if self.seg_start == 0 {
      return false;
    }
    self.index = self.seg_start - 1;
    self.load_segment();
    self.index = self.seg_start;
    true
  }

  fn total_bytes(&self) -> Option<usize> {
    Some(self.len)
  }

  fn offset(&self) -> usize {
    self.seg_start
  }
}
