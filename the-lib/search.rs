//! Literal substring search over a revision's text.
//!
//! # Overview
//!
//! [`Needle`] compiles a search string into Boyer-Moore-Horspool skip tables
//! and scans a [`Rope`] through a [`ByteCursor`], so the text is never copied
//! into one contiguous buffer. [`find`] and [`find_backwards`] are one-shot
//! wrappers for callers that search once.
//!
//! # Matching
//!
//! Both directions work on UTF-8 bytes. A forward scan looks at the byte under
//! the last position of the window and jumps by the distance to the last
//! occurrence of that byte in the needle. A backward scan mirrors this: it looks
//! at the first byte of the window and jumps by the distance to the first
//! occurrence of that byte after the needle's first position.
//!
//! # Case folding
//!
//! Case-insensitive search compares each needle byte against the matching byte
//! of both the lowercase and uppercase form of the needle. This only works where
//! a character and its other case have the same UTF-8 width, which holds for
//! ASCII and most Latin, Greek and Cyrillic letters. Characters whose case
//! mapping changes width, or maps to several characters, match only exactly.
//!
//! # Positions
//!
//! Positions are byte offsets. A match always starts on a character boundary:
//! the needle is valid UTF-8, so its first byte is never a continuation byte,
//! and the scan checks this before reporting a hit.

use ropey::Rope;
use the_core::{
  Interval,
  chars::is_continuation,
};
use thiserror::Error;

use crate::cursor::ByteCursor;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
  #[error("invalid pattern: {0}")]
  InvalidPattern(String),
}

pub type Result<T> = std::result::Result<T, SearchError>;

/// A compiled literal search string.
#[derive(Debug, Clone)]
pub struct Needle {
  lower:     Vec<u8>,
  /// Uppercase form for case-insensitive search. Same length as `lower`.
  upper:     Option<Vec<u8>>,
  skip:      [usize; 256],
  skip_back: [usize; 256],
}

impl Needle {
  pub fn new(needle: &str, case_sensitive: bool) -> Self {
    let (lower, upper) = if case_sensitive {
      (needle.as_bytes().to_vec(), None)
    } else {
      let (lower, upper) = fold_cases(needle);
      (lower, Some(upper))
    };

    let m = lower.len();
    let mut skip = [m.max(1); 256];
    let mut skip_back = [m.max(1); 256];
    for variant in std::iter::once(&lower).chain(upper.as_ref()) {
      for (i, &b) in variant.iter().enumerate().take(m.saturating_sub(1)) {
        skip[b as usize] = skip[b as usize].min(m - 1 - i);
      }
      for (i, &b) in variant.iter().enumerate().skip(1) {
        skip_back[b as usize] = skip_back[b as usize].min(i);
      }
    }

    Self {
      lower,
      upper,
      skip,
      skip_back,
    }
  }

  pub fn len(&self) -> usize {
    self.lower.len()
  }

  pub fn is_empty(&self) -> bool {
    self.lower.is_empty()
  }

  #[inline]
  fn matches_at(&self, i: usize, b: u8) -> bool {
    self.lower[i] == b || self.upper.as_ref().is_some_and(|u| u[i] == b)
  }

  fn matches_window(&self, cursor: &ByteCursor, start: usize) -> bool {
    let at = cursor.index() as isize;
    (0..self.len()).all(|i| self.matches_at(i, cursor.peek(start as isize + i as isize - at)))
  }

  /// First match lying entirely within `start..end`.
  pub fn find_in(&self, text: &Rope, start: usize, end: usize) -> Option<Interval> {
    let m = self.len();
    let end = end.min(text.len_bytes());
    if m == 0 || start > end || end - start < m {
      return None;
    }

    let mut cursor = ByteCursor::at(text, start + m - 1);
    let mut s = start;
    while s + m <= end {
      cursor.set_index(s + m - 1);
      let last = cursor.byte();
      if self.matches_at(m - 1, last)
        && self.matches_window(&cursor, s)
        && !is_continuation(cursor.peek(1 - m as isize))
      {
        return Some(Interval::new(s, s + m));
      }
      s += self.skip[last as usize];
    }
    None
  }

  /// Last match ending at or before `before` and starting at or after `floor`.
  pub fn rfind_in(&self, text: &Rope, floor: usize, before: usize) -> Option<Interval> {
    let m = self.len();
    let before = before.min(text.len_bytes());
    if m == 0 || floor > before || before - floor < m {
      return None;
    }

    let mut cursor = ByteCursor::at(text, before - m);
    let mut s = before - m;
    loop {
      cursor.set_index(s);
      let first = cursor.byte();
      if self.matches_at(0, first) && !is_continuation(first) && self.matches_window(&cursor, s) {
        return Some(Interval::new(s, s + m));
      }
      let step = self.skip_back[first as usize];
      if s < floor + step {
        return None;
      }
      s -= step;
    }
  }
}

/// Lowercase and uppercase forms of `needle`, byte for byte the same length.
fn fold_cases(needle: &str) -> (Vec<u8>, Vec<u8>) {
  let mut lower = Vec::with_capacity(needle.len());
  let mut upper = Vec::with_capacity(needle.len());
  let mut buf = [0u8; 4];
  for ch in needle.chars() {
    let width = ch.len_utf8();
    let lo = single(ch.to_lowercase()).filter(|c| c.len_utf8() == width);
    let up = single(ch.to_uppercase()).filter(|c| c.len_utf8() == width);
    lower.extend_from_slice(lo.unwrap_or(ch).encode_utf8(&mut buf).as_bytes());
    upper.extend_from_slice(up.unwrap_or(ch).encode_utf8(&mut buf).as_bytes());
  }
  (lower, upper)
}

fn single(mut it: impl Iterator<Item = char>) -> Option<char> {
  let c = it.next()?;
  it.next().is_none().then_some(c)
}

/// First occurrence of `needle` within `start..end`.
pub fn find(
  text: &Rope,
  needle: &str,
  start: usize,
  end: usize,
  case_sensitive: bool,
) -> Option<Interval> {
  Needle::new(needle, case_sensitive).find_in(text, start, end)
}

/// Last occurrence of `needle` ending at or before `start_pos`.
pub fn find_backwards(
  text: &Rope,
  needle: &str,
  start_pos: usize,
  case_sensitive: bool,
) -> Option<Interval> {
  Needle::new(needle, case_sensitive).rfind_in(text, 0, start_pos)
}
